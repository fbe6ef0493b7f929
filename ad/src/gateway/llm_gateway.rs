//! Gateway backed by an `LlmClient` and Handlebars prompt templates

use std::sync::Arc;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use tracing::{debug, warn};

use super::{Gateway, GatewayError, Schema, StructuredRequest, StructuredValue};
use crate::llm::{CompletionRequest, CompletionResponse, LlmClient};
use crate::prompts::{PromptLoader, names};

/// Default response budget for free-text completions
const TEXT_MAX_TOKENS: u32 = 4096;

/// Structured answers are small; task lists are the largest
const STRUCTURED_MAX_TOKENS: u32 = 2048;

pub struct LlmGateway {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLoader>,
    max_concurrency: usize,
}

impl LlmGateway {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>, max_concurrency: usize) -> Self {
        Self {
            llm,
            prompts,
            max_concurrency: max_concurrency.max(1),
        }
    }

    fn build_request(
        &self,
        template: &str,
        vars: &serde_json::Value,
        max_tokens: u32,
    ) -> Result<CompletionRequest, GatewayError> {
        let system = self
            .prompts
            .render(names::SYSTEM, vars)
            .map_err(|e| GatewayError::Template(e.to_string()))?;
        let user = self
            .prompts
            .render(template, vars)
            .map_err(|e| GatewayError::Template(e.to_string()))?;
        Ok(CompletionRequest::single(system, user, max_tokens))
    }

    fn extract_structured(schema: Schema, response: &CompletionResponse) -> Result<StructuredValue, GatewayError> {
        if let Some(call) = response.find_tool_call(schema.tool_name()) {
            return schema.parse(&call.input);
        }

        if let Some(content) = response.content.as_deref().filter(|c| !c.trim().is_empty()) {
            debug!(tool = schema.tool_name(), "extract_structured: no tool call, parsing content");
            return schema.parse_content(content);
        }

        Err(GatewayError::ContractViolation(format!(
            "model did not call {} and returned no content",
            schema.tool_name()
        )))
    }
}

#[async_trait]
impl Gateway for LlmGateway {
    async fn complete(&self, template: &str, vars: &serde_json::Value) -> Result<String, GatewayError> {
        debug!(%template, "complete: called");
        let request = self.build_request(template, vars, TEXT_MAX_TOKENS)?;
        let response = self.llm.complete(request).await?;

        let text = response.content.unwrap_or_default().trim().to_string();
        if text.is_empty() {
            warn!(%template, "complete: empty completion");
            return Err(GatewayError::ContractViolation(format!(
                "empty completion for template '{}'",
                template
            )));
        }
        Ok(text)
    }

    async fn complete_structured(
        &self,
        template: &str,
        vars: &serde_json::Value,
        schema: Schema,
    ) -> Result<StructuredValue, GatewayError> {
        debug!(%template, ?schema, "complete_structured: called");
        let request = self
            .build_request(template, vars, STRUCTURED_MAX_TOKENS)?
            .with_forced_tool(schema.tool());
        let response = self.llm.complete(request).await?;
        Self::extract_structured(schema, &response)
    }

    async fn complete_structured_batch(
        &self,
        requests: Vec<StructuredRequest>,
    ) -> Result<Vec<StructuredValue>, GatewayError> {
        debug!(count = requests.len(), max_concurrency = self.max_concurrency, "complete_structured_batch: called");
        // buffered() keeps input order while running up to max_concurrency calls at once
        stream::iter(requests)
            .map(|req| async move { self.complete_structured(&req.template, &req.vars, req.schema).await })
            .buffered(self.max_concurrency)
            .try_collect()
            .await
    }
}
