//! Append-only markdown report of task updates

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use tracing::{debug, info};

use crate::domain::Task;

/// Writes one markdown section per recorded task update
#[derive(Debug, Clone)]
pub struct MarkdownReport {
    path: PathBuf,
}

impl MarkdownReport {
    /// Prepare a report at `path`, creating its parent directory
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create report directory {}", parent.display()))?;
        }
        debug!(path = %path.display(), "MarkdownReport::open");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the task's current details and state
    pub fn record_task(&self, task: &Task) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open report {}", self.path.display()))?;
        file.write_all(render_entry(task).as_bytes())
            .with_context(|| format!("Failed to write report {}", self.path.display()))?;
        info!(task_id = %task.id, path = %self.path.display(), "Report updated");
        Ok(())
    }
}

/// Markdown section for one task update
pub fn render_entry(task: &Task) -> String {
    let mut out = format!(
        "## Task {}\n- **Details:** {}\n- **State:** {}\n",
        task.id,
        task.objective.replace('\n', " "),
        task.state
    );
    for (i, step) in task.steps.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, step));
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskState;
    use tempfile::TempDir;

    fn task() -> Task {
        Task {
            id: "a1b2c3-task-nightly-etl".to_string(),
            objective: "Create a nightly ETL job".to_string(),
            steps: vec!["Create the job".to_string(), "Schedule at 02:00".to_string()],
            documentation: String::new(),
            state: TaskState::Complete,
        }
    }

    #[test]
    fn test_render_entry() {
        assert_eq!(
            render_entry(&task()),
            "## Task a1b2c3-task-nightly-etl\n\
             - **Details:** Create a nightly ETL job\n\
             - **State:** COMPLETE\n\
             1. Create the job\n\
             2. Schedule at 02:00\n\
             \n"
        );
    }

    #[test]
    fn test_multiline_objective_kept_on_one_line() {
        let mut t = task();
        t.objective = "First line\nsecond line".to_string();
        assert!(render_entry(&t).contains("- **Details:** First line second line\n"));
    }

    #[test]
    fn test_record_appends_and_creates_dirs() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data").join("tasks.md");
        let report = MarkdownReport::open(&path).unwrap();
        assert!(path.parent().unwrap().is_dir());

        report.record_task(&task()).unwrap();
        let mut second = task();
        second.id = "d4e5f6-task-monitor".to_string();
        report.record_task(&second).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("## Task ").count(), 2);
        assert!(content.find("a1b2c3").unwrap() < content.find("d4e5f6").unwrap());
    }
}
