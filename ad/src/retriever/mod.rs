//! Document Retriever
//!
//! Turns a query into an ordered list of documentation chunks. Two backends:
//! Databricks vector search (`VectorSearchRetriever`) and the offline docstore
//! (`LocalRetriever`).

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

mod local;
mod vector_search;

pub use local::LocalRetriever;
pub use vector_search::VectorSearchRetriever;

use crate::config::{Config, RetrieverBackend};

/// Errors from retrieval
#[derive(Debug, Error)]
pub enum RetrieverError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Vector search API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid search response: {0}")]
    InvalidResponse(String),

    #[error("Docstore error: {0}")]
    Store(String),

    #[error("Retriever configuration error: {0}")]
    Config(String),
}

impl RetrieverError {
    pub fn is_transient(&self) -> bool {
        match self {
            RetrieverError::Network(_) => true,
            RetrieverError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Vector search query type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Approximate nearest neighbour on embeddings only
    Ann,
    /// Embeddings combined with keyword matching
    #[default]
    Hybrid,
}

impl SearchMode {
    /// Value of the `query_type` request field
    pub fn as_query_type(&self) -> &'static str {
        match self {
            SearchMode::Ann => "ANN",
            SearchMode::Hybrid => "HYBRID",
        }
    }
}

/// A retrieval request
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    pub top_k: usize,
    pub mode: SearchMode,
    /// Columns to return; empty means the backend's defaults
    pub columns: Vec<String>,
}

/// One retrieved documentation chunk
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub content: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Chunk {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: serde_json::Map::new(),
        }
    }
}

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Ordered by decreasing relevance, at most `query.top_k` chunks
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Chunk>, RetrieverError>;
}

/// Build the retriever selected by configuration
pub fn create_retriever(config: &Config) -> Result<Arc<dyn Retriever>, RetrieverError> {
    match config.retriever.backend {
        RetrieverBackend::VectorSearch => {
            let host = config
                .retriever_host()
                .ok_or_else(|| RetrieverError::Config("no vector search host configured".to_string()))?;
            let token = config.api_token().map_err(|e| RetrieverError::Config(e.to_string()))?;
            info!(%host, index = %config.retriever.index, "Using vector search retriever");
            Ok(Arc::new(VectorSearchRetriever::new(host, token, &config.retriever, config.llm.timeout_ms)?))
        }
        RetrieverBackend::Local => {
            let dir = config
                .retriever
                .docstore_dir
                .clone()
                .unwrap_or_else(docstore::config::default_store_path);
            info!(dir = %dir.display(), "Using local docstore retriever");
            Ok(Arc::new(LocalRetriever::open(dir, config.retriever.context_id.clone())?))
        }
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Retriever that answers each call with the next scripted response
    pub struct ScriptedRetriever {
        responses: Mutex<Vec<Vec<Chunk>>>,
        queries: Mutex<Vec<SearchQuery>>,
    }

    impl ScriptedRetriever {
        pub fn new(responses: Vec<Vec<Chunk>>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().collect()),
                queries: Mutex::new(Vec::new()),
            }
        }

        /// Same chunks for every call
        pub fn repeating(chunks: Vec<Chunk>, times: usize) -> Self {
            Self::new(vec![chunks; times])
        }

        pub fn queries(&self) -> Vec<SearchQuery> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Retriever for ScriptedRetriever {
        async fn search(&self, query: &SearchQuery) -> Result<Vec<Chunk>, RetrieverError> {
            self.queries.lock().unwrap().push(query.clone());
            Ok(self.responses.lock().unwrap().pop().unwrap_or_default())
        }
    }
}
