//! Domain types for ask-dbx
//!
//! A `Task` is the unit of work the Tech Lead hands to the Worker.

mod id;
mod task;

pub use id::generate_id;
pub use task::{Task, TaskState};
