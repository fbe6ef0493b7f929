//! StateManager - actor that owns the task state store
//!
//! Processes commands via channels so async callers never touch the SQLite
//! connection directly.

use std::path::Path;

use taskstore::{Store, TaskRow, Upsert};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::messages::{StateCommand, StateError, StateResponse};
use crate::domain::TaskState;

/// Handle to send commands to the StateManager
#[derive(Clone)]
pub struct StateManager {
    tx: mpsc::Sender<StateCommand>,
}

impl StateManager {
    /// Spawn a StateManager actor over the database at `store_path`
    pub fn spawn(store_path: impl AsRef<Path>) -> eyre::Result<Self> {
        debug!(store_path = %store_path.as_ref().display(), "spawn: called");
        let store = Store::open(store_path.as_ref())?;
        Ok(Self::start(store))
    }

    /// Spawn an actor over a throwaway in-memory database
    pub fn spawn_in_memory() -> eyre::Result<Self> {
        debug!("spawn_in_memory: called");
        Ok(Self::start(Store::open_in_memory()?))
    }

    fn start(store: Store) -> Self {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(actor_loop(store, rx));
        info!("StateManager spawned");
        Self { tx }
    }

    /// Record a task's state, creating the row on first use
    pub async fn set_state(&self, id: &str, state: TaskState) -> StateResponse<Upsert> {
        debug!(%id, %state, "set_state: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(StateCommand::SetState {
                id: id.to_string(),
                state: state.as_str().to_string(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    pub async fn get_state(&self, id: &str) -> StateResponse<Option<TaskRow>> {
        debug!(%id, "get_state: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(StateCommand::GetState {
                id: id.to_string(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// Like `get_state`, but a missing task is an error
    pub async fn require_state(&self, id: &str) -> StateResponse<TaskRow> {
        self.get_state(id)
            .await?
            .ok_or_else(|| StateError::NotFound(id.to_string()))
    }

    pub async fn list(&self, state_filter: Option<TaskState>) -> StateResponse<Vec<TaskRow>> {
        debug!(?state_filter, "list: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(StateCommand::List {
                state_filter: state_filter.map(|s| s.as_str().to_string()),
                reply: reply_tx,
            })
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// Stop the actor; later calls fail with `ChannelError`
    pub async fn shutdown(&self) -> Result<(), StateError> {
        debug!("shutdown: called");
        self.tx
            .send(StateCommand::Shutdown)
            .await
            .map_err(|_| StateError::ChannelError)
    }
}

async fn actor_loop(mut store: Store, mut rx: mpsc::Receiver<StateCommand>) {
    debug!("StateManager actor started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            StateCommand::SetState { id, state, reply } => {
                debug!(%id, %state, "actor_loop: SetState command");
                let result = store
                    .set_state(&id, &state)
                    .map_err(|e| StateError::StoreError(e.to_string()));
                let _ = reply.send(result);
            }

            StateCommand::GetState { id, reply } => {
                debug!(%id, "actor_loop: GetState command");
                let result = store.get(&id).map_err(|e| StateError::StoreError(e.to_string()));
                let _ = reply.send(result);
            }

            StateCommand::List { state_filter, reply } => {
                debug!(?state_filter, "actor_loop: List command");
                let result = store
                    .list(state_filter.as_deref())
                    .map_err(|e| StateError::StoreError(e.to_string()));
                let _ = reply.send(result);
            }

            StateCommand::Shutdown => {
                info!("StateManager shutting down");
                break;
            }
        }
    }

    debug!("StateManager actor stopped");
}
