//! Run log - one JSONL file per planning run
//!
//! Each completed iteration and the final outcome are appended to
//! `{runs_dir}/{run_id}/events.jsonl` for later inspection.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::generate_id;
use crate::planning::{PlanObserver, PlanOutcome, PlanningState, RetrieveDecision, Termination, Verification};

/// Something that happened during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RunEvent {
    Started {
        requirements: String,
    },
    Iteration {
        iteration: u32,
        search_query: String,
        document_ids: Vec<String>,
        verification: Verification,
        rating: u8,
        decision: RetrieveDecision,
        plan: String,
    },
    Finished {
        termination: Termination,
        iterations: u32,
        task_ids: Vec<String>,
    },
    Failed {
        error: String,
    },
}

impl RunEvent {
    pub fn iteration(state: &PlanningState) -> Self {
        RunEvent::Iteration {
            iteration: state.iteration,
            search_query: state.search_query.clone(),
            document_ids: state.document_ids(),
            verification: state.verification,
            rating: state.rating,
            decision: state.retrieve_decision,
            plan: state.plan.clone(),
        }
    }

    pub fn finished(outcome: &PlanOutcome) -> Self {
        RunEvent::Finished {
            termination: outcome.termination,
            iterations: outcome.state.iteration,
            task_ids: outcome.tasks.iter().map(|t| t.id.clone()).collect(),
        }
    }
}

/// One line of `events.jsonl`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLogEntry {
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    pub event: RunEvent,
}

pub struct RunLog {
    run_id: String,
    path: PathBuf,
    writer: BufWriter<File>,
}

impl RunLog {
    /// Start a new run log under `runs_dir`, named after the requirements
    pub fn create(runs_dir: impl AsRef<Path>, requirements: &str) -> eyre::Result<Self> {
        let run_id = generate_id("run", requirements);
        Self::create_with_id(runs_dir, &run_id)
    }

    pub fn create_with_id(runs_dir: impl AsRef<Path>, run_id: &str) -> eyre::Result<Self> {
        let run_dir = runs_dir.as_ref().join(run_id);
        fs::create_dir_all(&run_dir)?;
        let path = run_dir.join("events.jsonl");
        debug!(?path, "RunLog: creating log file");

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            run_id: run_id.to_string(),
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&mut self, event: RunEvent) -> eyre::Result<()> {
        let entry = RunLogEntry {
            timestamp: Utc::now(),
            event,
        };
        let json = serde_json::to_string(&entry)?;
        writeln!(self.writer, "{}", json)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Append an event, logging instead of failing on I/O errors
    pub fn record(&mut self, event: RunEvent) {
        if let Err(e) = self.write(event) {
            warn!(run_id = %self.run_id, error = %e, "Failed to append to run log");
        }
    }
}

impl PlanObserver for RunLog {
    fn iteration_complete(&mut self, state: &PlanningState) {
        self.record(RunEvent::iteration(state));
    }

    fn finished(&mut self, outcome: &PlanOutcome) {
        self.record(RunEvent::finished(outcome));
    }
}

/// Read every entry of a run's log; a missing run yields an empty list
pub fn read_run_events(runs_dir: impl AsRef<Path>, run_id: &str) -> eyre::Result<Vec<RunLogEntry>> {
    let log_path = runs_dir.as_ref().join(run_id).join("events.jsonl");
    debug!(?log_path, "read_run_events: reading log file");

    if !log_path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(&log_path)?;
    let mut entries = Vec::new();
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        match serde_json::from_str::<RunLogEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!(line, error = %e, "read_run_events: failed to parse line"),
        }
    }
    Ok(entries)
}
