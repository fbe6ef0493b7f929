//! Worker - carries out the tasks produced by planning
//!
//! Each task goes through validate, plan and apply. Applying a step is logged
//! only; nothing is executed against the workspace. A completed task is marked
//! COMPLETE in the state store and appended to the markdown report.

use eyre::{Context, Result};
use tracing::{debug, info, warn};

use crate::domain::{Task, TaskState};
use crate::report::MarkdownReport;
use crate::state::StateManager;

/// What happened to one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkOutcome {
    Completed,
    /// Dry run: steps were listed but no state was written
    Previewed,
    /// Validation failed; the task stays pending
    Skipped(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkSummary {
    pub completed: usize,
    pub previewed: usize,
    pub skipped: Vec<(String, String)>,
}

pub struct Worker {
    state: StateManager,
    report: MarkdownReport,
    dry_run: bool,
}

impl Worker {
    pub fn new(state: StateManager, report: MarkdownReport) -> Self {
        Self {
            state,
            report,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Check that a task can be applied
    pub fn validate(&self, task: &Task) -> std::result::Result<(), String> {
        debug!(task_id = %task.id, "validate: called");
        if task.objective.trim().is_empty() {
            return Err("objective is empty".to_string());
        }
        if task.steps.iter().all(|s| s.trim().is_empty()) {
            return Err("task has no steps".to_string());
        }
        if !task.is_pending() {
            return Err(format!("task is already {}", task.state));
        }
        Ok(())
    }

    /// Ordered steps to apply
    pub fn plan(&self, task: &Task) -> Vec<String> {
        task.steps
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    /// Execute the plan and record completion
    pub async fn apply(&self, task: &mut Task, plan: &[String]) -> Result<()> {
        info!(task_id = %task.id, steps = plan.len(), "Applying task");
        for (i, step) in plan.iter().enumerate() {
            info!(task_id = %task.id, step = i + 1, %step, "Executing step");
        }

        // A failed append must leave the task pending in the store
        let mut completed = task.clone();
        completed.mark_complete();
        self.report.record_task(&completed)?;

        self.state
            .set_state(&task.id, TaskState::Complete)
            .await
            .with_context(|| format!("Failed to record completion of {}", task.id))?;
        task.mark_complete();
        info!(task_id = %task.id, "Task completed");
        Ok(())
    }

    /// Validate, plan and apply one task
    pub async fn process_task(&self, task: &mut Task) -> Result<WorkOutcome> {
        if let Err(reason) = self.validate(task) {
            warn!(task_id = %task.id, %reason, "Task failed validation");
            return Ok(WorkOutcome::Skipped(reason));
        }
        let plan = self.plan(task);

        if self.dry_run {
            for (i, step) in plan.iter().enumerate() {
                info!(task_id = %task.id, step = i + 1, %step, "Would execute step");
            }
            return Ok(WorkOutcome::Previewed);
        }

        self.state
            .set_state(&task.id, TaskState::Pending)
            .await
            .with_context(|| format!("Failed to register {}", task.id))?;
        self.apply(task, &plan).await?;
        Ok(WorkOutcome::Completed)
    }

    /// Process tasks in order; the first storage failure stops the batch
    pub async fn process_all(&self, tasks: &mut [Task]) -> Result<WorkSummary> {
        let mut summary = WorkSummary::default();
        for task in tasks.iter_mut() {
            match self.process_task(task).await? {
                WorkOutcome::Completed => summary.completed += 1,
                WorkOutcome::Previewed => summary.previewed += 1,
                WorkOutcome::Skipped(reason) => summary.skipped.push((task.id.clone(), reason)),
            }
        }
        info!(
            completed = summary.completed,
            previewed = summary.previewed,
            skipped = summary.skipped.len(),
            "Worker finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn worker(temp: &TempDir) -> (Worker, StateManager) {
        let state = StateManager::spawn_in_memory().unwrap();
        let report = MarkdownReport::open(temp.path().join("tasks.md")).unwrap();
        (Worker::new(state.clone(), report), state)
    }

    fn task(objective: &str, steps: &[&str]) -> Task {
        Task::new(objective, steps.iter().map(|s| s.to_string()).collect(), "docs")
    }

    #[tokio::test]
    async fn test_process_task_completes_and_records() {
        let temp = TempDir::new().unwrap();
        let (worker, state) = worker(&temp);
        let mut t = task("Create a nightly ETL job", &["Create the job", "Schedule it"]);

        let outcome = worker.process_task(&mut t).await.unwrap();
        assert_eq!(outcome, WorkOutcome::Completed);
        assert_eq!(t.state, TaskState::Complete);
        assert_eq!(state.require_state(&t.id).await.unwrap().state, "COMPLETE");

        let report = std::fs::read_to_string(temp.path().join("tasks.md")).unwrap();
        assert!(report.contains(&format!("## Task {}", t.id)));
        assert!(report.contains("- **State:** COMPLETE"));
        assert!(report.contains("2. Schedule it"));
    }

    #[tokio::test]
    async fn test_invalid_task_is_skipped() {
        let temp = TempDir::new().unwrap();
        let (worker, state) = worker(&temp);
        let mut t = task("Do nothing", &["  "]);

        let outcome = worker.process_task(&mut t).await.unwrap();
        assert_eq!(outcome, WorkOutcome::Skipped("task has no steps".to_string()));
        assert!(t.is_pending());
        assert!(state.get_state(&t.id).await.unwrap().is_none());
        assert!(!temp.path().join("tasks.md").exists());
    }

    #[tokio::test]
    async fn test_completed_task_not_reapplied() {
        let temp = TempDir::new().unwrap();
        let (worker, _) = worker(&temp);
        let mut t = task("Create job", &["step"]);
        t.mark_complete();
        assert!(matches!(worker.process_task(&mut t).await.unwrap(), WorkOutcome::Skipped(_)));
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let (worker, state) = worker(&temp);
        let worker = worker.with_dry_run(true);
        let mut t = task("Create job", &["step"]);

        assert_eq!(worker.process_task(&mut t).await.unwrap(), WorkOutcome::Previewed);
        assert!(t.is_pending());
        assert!(state.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_process_all_summary() {
        let temp = TempDir::new().unwrap();
        let (worker, state) = worker(&temp);
        let mut tasks = vec![task("First", &["a"]), task("", &["b"]), task("Third", &["c"])];

        let summary = worker.process_all(&mut tasks).await.unwrap();
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].1, "objective is empty");
        assert_eq!(state.list(Some(TaskState::Complete)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_report_failure_leaves_task_pending() {
        let temp = TempDir::new().unwrap();
        let state = StateManager::spawn_in_memory().unwrap();
        // A directory cannot be opened for append
        let report = MarkdownReport::open(temp.path()).unwrap();
        let worker = Worker::new(state.clone(), report);
        let mut t = task("Create job", &["step"]);

        assert!(worker.process_task(&mut t).await.is_err());
        assert!(t.is_pending());
        assert_eq!(state.require_state(&t.id).await.unwrap().state, "PENDING");
    }

    #[tokio::test]
    async fn test_plan_drops_blank_steps() {
        let temp = TempDir::new().unwrap();
        let (worker, _) = worker(&temp);
        let t = task("x", &[" one ", "", "two"]);
        assert_eq!(worker.plan(&t), vec!["one", "two"]);
    }
}
