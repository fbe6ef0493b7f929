//! Model Invocation Gateway
//!
//! Renders a prompt template with variables and returns either free text or a
//! value from a small, validated schema. The planning loop talks to models only
//! through the `Gateway` trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::LlmError;

mod llm_gateway;
mod schema;

#[cfg(test)]
pub mod mock;

pub use llm_gateway::LlmGateway;
pub use schema::Schema;

/// Errors from gateway calls
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The model service failed (network, timeout, rate limit, 5xx)
    #[error("model service error: {0}")]
    Service(#[from] LlmError),

    /// The model answered outside the declared output domain
    #[error("contract violation: {0}")]
    ContractViolation(String),

    #[error("template error: {0}")]
    Template(String),
}

impl GatewayError {
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Service(e) => e.is_retryable(),
            GatewayError::ContractViolation(_) | GatewayError::Template(_) => false,
        }
    }
}

/// Yes/no answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Decision {
    Yes,
    No,
}

/// Relevance of a document to the requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Relevance {
    Relevant,
    Irrelevant,
}

/// How well documentation backs a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Support {
    FullySupported,
    PartiallySupported,
    NoSupport,
}

/// One task proposed by plan decomposition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub objective: String,
    pub steps: Vec<String>,
}

/// A validated structured model answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuredValue {
    Decision(Decision),
    /// Always within 1..=5
    Rating(u8),
    Verification(Support),
    Relevance(Relevance),
    Tasks(Vec<TaskDraft>),
}

impl StructuredValue {
    fn kind(&self) -> &'static str {
        match self {
            StructuredValue::Decision(_) => "decision",
            StructuredValue::Rating(_) => "rating",
            StructuredValue::Verification(_) => "verification",
            StructuredValue::Relevance(_) => "relevance",
            StructuredValue::Tasks(_) => "tasks",
        }
    }

    fn mismatch(&self, expected: &str) -> GatewayError {
        GatewayError::ContractViolation(format!("expected a {} value, got {}", expected, self.kind()))
    }

    pub fn into_decision(self) -> Result<Decision, GatewayError> {
        match self {
            StructuredValue::Decision(d) => Ok(d),
            other => Err(other.mismatch("decision")),
        }
    }

    pub fn into_rating(self) -> Result<u8, GatewayError> {
        match self {
            StructuredValue::Rating(r) => Ok(r),
            other => Err(other.mismatch("rating")),
        }
    }

    pub fn into_support(self) -> Result<Support, GatewayError> {
        match self {
            StructuredValue::Verification(s) => Ok(s),
            other => Err(other.mismatch("verification")),
        }
    }

    pub fn into_relevance(self) -> Result<Relevance, GatewayError> {
        match self {
            StructuredValue::Relevance(r) => Ok(r),
            other => Err(other.mismatch("relevance")),
        }
    }

    pub fn into_tasks(self) -> Result<Vec<TaskDraft>, GatewayError> {
        match self {
            StructuredValue::Tasks(t) => Ok(t),
            other => Err(other.mismatch("tasks")),
        }
    }
}

/// One item of a structured batch
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    pub template: String,
    pub vars: serde_json::Value,
    pub schema: Schema,
}

impl StructuredRequest {
    pub fn new(template: impl Into<String>, vars: serde_json::Value, schema: Schema) -> Self {
        Self {
            template: template.into(),
            vars,
            schema,
        }
    }
}

/// Model invocation boundary used by the planning loop
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Free-text completion
    async fn complete(&self, template: &str, vars: &serde_json::Value) -> Result<String, GatewayError>;

    /// Completion constrained to `schema`
    async fn complete_structured(
        &self,
        template: &str,
        vars: &serde_json::Value,
        schema: Schema,
    ) -> Result<StructuredValue, GatewayError>;

    /// Several structured completions; results are in input order
    async fn complete_structured_batch(
        &self,
        requests: Vec<StructuredRequest>,
    ) -> Result<Vec<StructuredValue>, GatewayError>;
}
