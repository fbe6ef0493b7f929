use thiserror::Error;

use crate::gateway::GatewayError;
use crate::retriever::RetrieverError;

/// Errors that abort a planning run
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("retrieval failed: {0}")]
    Retriever(#[from] RetrieverError),

    /// A collaborator broke its contract (e.g. a batch of the wrong size)
    #[error("contract violation: {0}")]
    ContractViolation(String),

    #[error("invalid planning input: {0}")]
    Configuration(String),
}

impl PlanningError {
    /// Whether a retry of the whole run could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            PlanningError::Gateway(e) => e.is_transient(),
            PlanningError::Retriever(e) => e.is_transient(),
            PlanningError::ContractViolation(_) | PlanningError::Configuration(_) => false,
        }
    }
}
