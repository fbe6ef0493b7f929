//! TaskStore - persistent task state for ask-dbx
//!
//! A single SQLite table keyed by task id. Each row carries the task's current
//! state and the time of the last transition. States are stored as plain
//! strings so the store stays agnostic of the caller's state enum.
//!
//! # Example
//!
//! ```ignore
//! use taskstore::Store;
//!
//! let mut store = Store::open("data/state.db")?;
//! store.set_state("0193ab-task-nightly-etl", "pending")?;
//! store.set_state("0193ab-task-nightly-etl", "complete")?;
//! assert_eq!(store.get("0193ab-task-nightly-etl")?.unwrap().state, "complete");
//! ```

pub mod cli;
mod store;

pub use store::{Store, StoreError, TaskRow, Upsert};

/// Current wall-clock time in unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Default database location (`{data_local_dir}/ask-dbx/state.db`)
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("ask-dbx")
        .join("state.db")
}
