//! SQLite-backed task state table

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::now_ms;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid task id: {0:?}")]
    InvalidId(String),
}

/// One row of the `tasks` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: String,
    pub state: String,
    /// Unix ms of the last state change
    pub updated_at: i64,
}

/// Whether `set_state` created a row or changed an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    state TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tasks_state ON tasks(state);
";

/// Task state store
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    /// Open or create the database at `path`, creating parent directories as needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        conn.execute_batch(SCHEMA)?;
        info!(path = %path.display(), "Task store initialized");
        Ok(Self { conn, path: Some(path) })
    }

    /// Open a throwaway in-memory store
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        debug!("open_in_memory: initialized");
        Ok(Self { conn, path: None })
    }

    /// Path of the backing file (None for in-memory stores)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Set a task's state, inserting the row if the task is unknown
    pub fn set_state(&mut self, id: &str, state: &str) -> Result<Upsert, StoreError> {
        debug!(%id, %state, "set_state: called");
        if id.trim().is_empty() {
            return Err(StoreError::InvalidId(id.to_string()));
        }

        let tx = self.conn.transaction()?;
        let exists = tx
            .query_row("SELECT 1 FROM tasks WHERE id = ?1", params![id], |_| Ok(()))
            .optional()?
            .is_some();

        let outcome = if exists {
            tx.execute(
                "UPDATE tasks SET state = ?1, updated_at = ?2 WHERE id = ?3",
                params![state, now_ms(), id],
            )?;
            Upsert::Updated
        } else {
            tx.execute(
                "INSERT INTO tasks (id, state, updated_at) VALUES (?1, ?2, ?3)",
                params![id, state, now_ms()],
            )?;
            Upsert::Inserted
        };
        tx.commit()?;

        info!(%id, %state, ?outcome, "Task state recorded");
        Ok(outcome)
    }

    /// Fetch a single task row
    pub fn get(&self, id: &str) -> Result<Option<TaskRow>, StoreError> {
        debug!(%id, "get: called");
        let row = self
            .conn
            .query_row(
                "SELECT id, state, updated_at FROM tasks WHERE id = ?1",
                params![id],
                |row| {
                    Ok(TaskRow {
                        id: row.get(0)?,
                        state: row.get(1)?,
                        updated_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// List tasks, optionally restricted to one state, oldest change first
    pub fn list(&self, state: Option<&str>) -> Result<Vec<TaskRow>, StoreError> {
        debug!(?state, "list: called");
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<TaskRow> {
            Ok(TaskRow {
                id: row.get(0)?,
                state: row.get(1)?,
                updated_at: row.get(2)?,
            })
        };

        let rows = match state {
            Some(state) => {
                let mut stmt = self
                    .conn
                    .prepare("SELECT id, state, updated_at FROM tasks WHERE state = ?1 ORDER BY updated_at, id")?;
                let rows = stmt.query_map(params![state], map_row)?.collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = self
                    .conn
                    .prepare("SELECT id, state, updated_at FROM tasks ORDER BY updated_at, id")?;
                let rows = stmt.query_map([], map_row)?.collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(rows)
    }

    /// Remove a task row; returns whether anything was deleted
    pub fn delete(&mut self, id: &str) -> Result<bool, StoreError> {
        debug!(%id, "delete: called");
        let count = self.conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_state_inserts_then_updates() {
        let mut store = Store::open_in_memory().unwrap();

        assert_eq!(store.set_state("task-1", "pending").unwrap(), Upsert::Inserted);
        assert_eq!(store.set_state("task-1", "complete").unwrap(), Upsert::Updated);

        let row = store.get("task-1").unwrap().unwrap();
        assert_eq!(row.state, "complete");
        assert!(row.updated_at > 0);
    }

    #[test]
    fn test_get_missing_returns_none() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.get("nope").unwrap().is_none());
    }

    #[test]
    fn test_empty_id_rejected() {
        let mut store = Store::open_in_memory().unwrap();
        assert!(matches!(store.set_state("  ", "pending"), Err(StoreError::InvalidId(_))));
    }

    #[test]
    fn test_list_with_state_filter() {
        let mut store = Store::open_in_memory().unwrap();
        store.set_state("a", "pending").unwrap();
        store.set_state("b", "complete").unwrap();
        store.set_state("c", "pending").unwrap();

        let all = store.list(None).unwrap();
        assert_eq!(all.len(), 3);

        let pending: Vec<String> = store.list(Some("pending")).unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(pending.len(), 2);
        assert!(pending.contains(&"a".to_string()));
        assert!(pending.contains(&"c".to_string()));
    }

    #[test]
    fn test_open_creates_parent_dirs_and_persists() {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("nested").join("data").join("state.db");

        {
            let mut store = Store::open(&db_path).unwrap();
            store.set_state("task-9", "pending").unwrap();
            assert_eq!(store.path(), Some(db_path.as_path()));
        }

        let store = Store::open(&db_path).unwrap();
        assert_eq!(store.get("task-9").unwrap().unwrap().state, "pending");
    }

    #[test]
    fn test_delete() {
        let mut store = Store::open_in_memory().unwrap();
        store.set_state("x", "pending").unwrap();
        assert!(store.delete("x").unwrap());
        assert!(!store.delete("x").unwrap());
    }
}
