//! Tech Lead planning loop
//!
//! An explicit state machine that alternates retrieval and plan generation
//! until the plan is accepted, the model stops asking for more documentation,
//! or the iteration bound is reached.

mod batch;
mod controller;
mod decompose;
mod error;
mod state;

pub use batch::score_batch;
pub use controller::{PlanObserver, PlanningController, REFINE_CLAUSE, termination_for};
pub use decompose::build_tasks;
pub use error::PlanningError;
pub use state::{
    DocumentRecord, FilterScore, NO_DOCUMENTATION, PlanOutcome, PlanningStage, PlanningState, RetrieveDecision,
    Termination, Verification, VerifyScore, aggregate_support,
};
