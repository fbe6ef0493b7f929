//! Output schemas for structured completions
//!
//! Each schema is offered to the model as a single `submit_*` tool whose input
//! carries the value. Answers are validated here before they reach the caller.

use serde_json::{Value, json};

use super::{Decision, GatewayError, Relevance, StructuredValue, Support, TaskDraft};
use crate::llm::ToolDefinition;

/// Declared output domain of a structured completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Schema {
    /// {yes, no}
    Decision,
    /// Integer in [1, 5]
    Rating,
    /// {fully-supported, partially-supported, no-support}
    Verification,
    /// {relevant, irrelevant}
    Relevance,
    /// List of {objective, steps}
    TaskList,
}

impl Schema {
    pub fn tool_name(&self) -> &'static str {
        match self {
            Schema::Decision => "submit_decision",
            Schema::Rating => "submit_rating",
            Schema::Verification => "submit_verification",
            Schema::Relevance => "submit_relevance",
            Schema::TaskList => "submit_tasks",
        }
    }

    /// Name of the single property holding the value
    fn field(&self) -> &'static str {
        match self {
            Schema::Decision => "decision",
            Schema::Rating => "rating",
            Schema::Verification => "verdict",
            Schema::Relevance => "relevance",
            Schema::TaskList => "tasks",
        }
    }

    pub fn tool(&self) -> ToolDefinition {
        let (description, property) = match self {
            Schema::Decision => (
                "Submit the yes/no decision.",
                json!({ "type": "string", "enum": ["yes", "no"] }),
            ),
            Schema::Rating => (
                "Submit the plan rating.",
                json!({ "type": "integer", "minimum": 1, "maximum": 5 }),
            ),
            Schema::Verification => (
                "Submit how well the document supports the plan.",
                json!({ "type": "string", "enum": ["fully-supported", "partially-supported", "no-support"] }),
            ),
            Schema::Relevance => (
                "Submit whether the document is relevant.",
                json!({ "type": "string", "enum": ["relevant", "irrelevant"] }),
            ),
            Schema::TaskList => (
                "Submit the tasks the plan decomposes into. Call this once with all tasks.",
                json!({
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "properties": {
                            "objective": { "type": "string", "description": "One-sentence goal of the task" },
                            "steps": {
                                "type": "array",
                                "items": { "type": "string" },
                                "description": "Ordered steps to carry out the task"
                            }
                        },
                        "required": ["objective", "steps"]
                    }
                }),
            ),
        };

        ToolDefinition::new(
            self.tool_name(),
            description,
            json!({
                "type": "object",
                "properties": { self.field(): property },
                "required": [self.field()]
            }),
        )
    }

    /// Validate a tool-call input object
    pub fn parse(&self, input: &Value) -> Result<StructuredValue, GatewayError> {
        let value = input
            .get(self.field())
            .ok_or_else(|| violation(format!("{} input is missing '{}'", self.tool_name(), self.field())))?;
        self.parse_value(value)
    }

    /// Validate an answer the model gave as plain content instead of a tool call
    ///
    /// Accepts the tool input object as JSON (optionally inside a code fence), a
    /// bare JSON value, or bare text for scalar schemas.
    pub fn parse_content(&self, content: &str) -> Result<StructuredValue, GatewayError> {
        let text = strip_code_fence(content.trim());
        match serde_json::from_str::<Value>(text) {
            Ok(v @ Value::Object(_)) => self.parse(&v),
            Ok(v) => self.parse_value(&v),
            Err(_) if *self != Schema::TaskList => self.parse_value(&Value::String(text.to_string())),
            Err(e) => Err(violation(format!("content is not a task list: {}", e))),
        }
    }

    fn parse_value(&self, value: &Value) -> Result<StructuredValue, GatewayError> {
        match self {
            Schema::Decision => match normalize(value)?.as_str() {
                "yes" => Ok(StructuredValue::Decision(Decision::Yes)),
                "no" => Ok(StructuredValue::Decision(Decision::No)),
                other => Err(violation(format!("decision '{}' is not yes/no", other))),
            },
            Schema::Relevance => match normalize(value)?.as_str() {
                "relevant" => Ok(StructuredValue::Relevance(Relevance::Relevant)),
                "irrelevant" => Ok(StructuredValue::Relevance(Relevance::Irrelevant)),
                other => Err(violation(format!("relevance '{}' is not relevant/irrelevant", other))),
            },
            Schema::Verification => match normalize(value)?.as_str() {
                "fully-supported" => Ok(StructuredValue::Verification(Support::FullySupported)),
                "partially-supported" => Ok(StructuredValue::Verification(Support::PartiallySupported)),
                "no-support" => Ok(StructuredValue::Verification(Support::NoSupport)),
                other => Err(violation(format!("verdict '{}' is outside the verification domain", other))),
            },
            Schema::Rating => {
                let rating = match value {
                    Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(integral)),
                    Value::String(s) => {
                        let s = s.trim();
                        s.parse::<u64>().ok().or_else(|| s.parse::<f64>().ok().and_then(integral))
                    }
                    _ => None,
                }
                .ok_or_else(|| violation(format!("rating {} is not an integer", value)))?;
                if !(1..=5).contains(&rating) {
                    return Err(violation(format!("rating {} is outside 1..=5", rating)));
                }
                Ok(StructuredValue::Rating(rating as u8))
            }
            Schema::TaskList => {
                let drafts: Vec<TaskDraft> = serde_json::from_value(value.clone())
                    .map_err(|e| violation(format!("malformed task list: {}", e)))?;
                if drafts.is_empty() {
                    return Err(violation("task list is empty".to_string()));
                }
                if let Some(idx) = drafts.iter().position(|d| d.objective.trim().is_empty()) {
                    return Err(violation(format!("task {} has an empty objective", idx + 1)));
                }
                Ok(StructuredValue::Tasks(drafts))
            }
        }
    }
}

/// Whole non-negative floats such as `4.0`
fn integral(f: f64) -> Option<u64> {
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0).then_some(f as u64)
}

fn violation(message: String) -> GatewayError {
    GatewayError::ContractViolation(message)
}

/// Lowercase, trim, and map `_`/spaces to `-` so `Fully_Supported` and `fully supported` match
fn normalize(value: &Value) -> Result<String, GatewayError> {
    let raw = value
        .as_str()
        .ok_or_else(|| violation(format!("expected a string, got {}", value)))?;
    let cleaned = raw
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '.')
        .to_lowercase()
        .split(|c: char| c == '_' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    Ok(cleaned)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
