//! LLM client module
//!
//! Chat-completion clients for Databricks model serving and OpenAI.

use std::sync::Arc;

use tracing::debug;

pub mod client;
mod error;
mod openai;
mod types;

pub use client::LlmClient;
pub use error::LlmError;
pub use openai::OpenAIClient;
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, TokenUsage, ToolCall, ToolDefinition};

use crate::config::{LlmConfig, ResolvedLlmConfig};

/// Create an LLM client for the configured provider
///
/// `host` is the Databricks workspace URL, used when the provider is
/// `databricks` and no explicit `base-url` is set.
pub fn create_client(config: &LlmConfig, host: Option<&str>) -> Result<Arc<dyn LlmClient>, LlmError> {
    let resolved = config.resolve(host).map_err(|e| LlmError::Config(e.to_string()))?;
    create_client_from_resolved(&resolved)
}

/// Create an LLM client from an already resolved configuration
pub fn create_client_from_resolved(config: &ResolvedLlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, url = %config.endpoint_url, "create_client_from_resolved: called");
    // Both providers speak the Chat Completions wire format; only the URL differs.
    Ok(Arc::new(OpenAIClient::from_config(config)?))
}
