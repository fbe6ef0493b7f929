//! Task state with the actor pattern
//!
//! StateManager owns the `taskstore::Store` and processes messages via
//! channels, providing async access to persistent task state.

mod manager;
mod messages;

pub use manager::StateManager;
pub use messages::{StateCommand, StateError, StateResponse};
