//! State manager messages
//!
//! Commands and responses for the actor pattern.

use taskstore::{TaskRow, Upsert};
use thiserror::Error;
use tokio::sync::oneshot;

/// Errors from state operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Channel error")]
    ChannelError,
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;

/// Commands sent to the StateManager actor
#[derive(Debug)]
pub enum StateCommand {
    SetState {
        id: String,
        state: String,
        reply: oneshot::Sender<StateResponse<Upsert>>,
    },
    GetState {
        id: String,
        reply: oneshot::Sender<StateResponse<Option<TaskRow>>>,
    },
    List {
        state_filter: Option<String>,
        reply: oneshot::Sender<StateResponse<Vec<TaskRow>>>,
    },
    Shutdown,
}
