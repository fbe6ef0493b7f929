//! Batch scoring with an input/output count check

use tracing::debug;

use super::PlanningError;
use crate::gateway::{Gateway, Schema, StructuredRequest, StructuredValue};

/// Score every set of variables against one template
///
/// The gateway must answer exactly once per input. Callers validate and
/// convert the whole result before writing any score, so a short or long
/// batch leaves their state untouched.
pub async fn score_batch(
    gateway: &dyn Gateway,
    template: &str,
    schema: Schema,
    inputs: Vec<serde_json::Value>,
) -> Result<Vec<StructuredValue>, PlanningError> {
    let expected = inputs.len();
    if expected == 0 {
        return Ok(Vec::new());
    }
    debug!(template, expected, "score_batch: called");

    let requests = inputs
        .into_iter()
        .map(|vars| StructuredRequest::new(template, vars, schema))
        .collect();
    let results = gateway.complete_structured_batch(requests).await?;

    if results.len() != expected {
        return Err(PlanningError::ContractViolation(format!(
            "{} batch returned {} results for {} inputs",
            template,
            results.len(),
            expected
        )));
    }
    Ok(results)
}
