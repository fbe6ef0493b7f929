//! Task - the Tech Lead's output and the Worker's input

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::generate_id;

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskState {
    #[default]
    Pending,
    Complete,
}

impl TaskState {
    /// Representation stored in the state database and the report
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "PENDING",
            TaskState::Complete => "COMPLETE",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Ok(TaskState::Pending),
            "COMPLETE" => Ok(TaskState::Complete),
            other => Err(format!("unknown task state '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub objective: String,
    /// Ordered steps
    pub steps: Vec<String>,
    /// Documentation the plan was built from
    pub documentation: String,
    pub state: TaskState,
}

impl Task {
    /// New pending task with a generated id
    pub fn new(objective: impl Into<String>, steps: Vec<String>, documentation: impl Into<String>) -> Self {
        let objective = objective.into();
        Self {
            id: generate_id("task", &objective),
            objective,
            steps,
            documentation: documentation.into(),
            state: TaskState::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == TaskState::Pending
    }

    pub fn mark_complete(&mut self) {
        self.state = TaskState::Complete;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_is_pending() {
        let task = Task::new("Create job", vec!["step".to_string()], "docs");
        assert!(task.is_pending());
        assert!(task.id.contains("-task-create-job"));
    }

    #[test]
    fn test_mark_complete() {
        let mut task = Task::new("Create job", vec![], "");
        task.mark_complete();
        assert_eq!(task.state, TaskState::Complete);
    }

    #[test]
    fn test_state_round_trips_through_db_text() {
        assert_eq!("complete".parse::<TaskState>().unwrap(), TaskState::Complete);
        assert_eq!(TaskState::Pending.to_string(), "PENDING");
        assert!("done".parse::<TaskState>().is_err());
    }

    #[test]
    fn test_serde_uppercase() {
        assert_eq!(serde_json::to_string(&TaskState::Complete).unwrap(), "\"COMPLETE\"");
    }
}
