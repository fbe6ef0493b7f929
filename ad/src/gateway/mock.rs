//! Scripted gateway for planning tests

use std::sync::Mutex;

use async_trait::async_trait;

use super::{Gateway, GatewayError, Schema, StructuredRequest, StructuredValue};

/// One recorded gateway invocation
#[derive(Debug, Clone)]
pub struct Call {
    pub template: String,
    pub vars: serde_json::Value,
    pub schema: Option<Schema>,
}

/// What the script answers for a call
pub enum Reply {
    Text(String),
    Value(StructuredValue),
    Fail(GatewayError),
}

type Handler = Box<dyn Fn(&Call) -> Reply + Send + Sync>;

/// Gateway whose answers come from a closure; records every call
pub struct ScriptedGateway {
    handler: Handler,
    calls: Mutex<Vec<Call>>,
    batch_calls: Mutex<usize>,
    /// Drop this many results from the end of every batch
    batch_shortfall: usize,
}

impl ScriptedGateway {
    pub fn new(handler: impl Fn(&Call) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
            batch_calls: Mutex::new(0),
            batch_shortfall: 0,
        }
    }

    pub fn with_batch_shortfall(mut self, missing: usize) -> Self {
        self.batch_shortfall = missing;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, template: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.template == template).collect()
    }

    pub fn batch_count(&self) -> usize {
        *self.batch_calls.lock().unwrap()
    }

    fn invoke(&self, template: &str, vars: &serde_json::Value, schema: Option<Schema>) -> Reply {
        let call = Call {
            template: template.to_string(),
            vars: vars.clone(),
            schema,
        };
        let reply = (self.handler)(&call);
        self.calls.lock().unwrap().push(call);
        reply
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn complete(&self, template: &str, vars: &serde_json::Value) -> Result<String, GatewayError> {
        match self.invoke(template, vars, None) {
            Reply::Text(text) => Ok(text),
            Reply::Value(v) => Err(GatewayError::ContractViolation(format!("script gave {:?} for text", v))),
            Reply::Fail(e) => Err(e),
        }
    }

    async fn complete_structured(
        &self,
        template: &str,
        vars: &serde_json::Value,
        schema: Schema,
    ) -> Result<StructuredValue, GatewayError> {
        match self.invoke(template, vars, Some(schema)) {
            Reply::Value(v) => Ok(v),
            Reply::Text(text) => schema.parse_content(&text),
            Reply::Fail(e) => Err(e),
        }
    }

    async fn complete_structured_batch(
        &self,
        requests: Vec<StructuredRequest>,
    ) -> Result<Vec<StructuredValue>, GatewayError> {
        *self.batch_calls.lock().unwrap() += 1;
        let keep = requests.len().saturating_sub(self.batch_shortfall);
        let mut out = Vec::with_capacity(keep);
        for req in requests.into_iter().take(keep) {
            out.push(self.complete_structured(&req.template, &req.vars, req.schema).await?);
        }
        Ok(out)
    }
}
