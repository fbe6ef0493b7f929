//! Offline retriever over a docstore context

use std::path::PathBuf;

use async_trait::async_trait;
use docstore::DocStore;
use tracing::debug;

use super::{Chunk, Retriever, RetrieverError, SearchQuery};

/// Keyword-ranked search over chunks ingested with `ds ingest`
pub struct LocalRetriever {
    store_dir: PathBuf,
    context_id: String,
}

impl LocalRetriever {
    /// Open a docstore; uses the newest context when `context_id` is None
    pub fn open(store_dir: impl Into<PathBuf>, context_id: Option<String>) -> Result<Self, RetrieverError> {
        let store_dir = store_dir.into();
        let store = DocStore::open(&store_dir).map_err(|e| RetrieverError::Store(e.to_string()))?;

        let context_id = match context_id {
            Some(id) => id,
            None => store
                .latest_context()
                .map_err(|e| RetrieverError::Store(e.to_string()))?
                .ok_or_else(|| {
                    RetrieverError::Config(format!(
                        "docstore at {} has no contexts; ingest documentation with `ds ingest` first",
                        store_dir.display()
                    ))
                })?,
        };
        debug!(dir = %store_dir.display(), %context_id, "LocalRetriever::open: ready");

        Ok(Self { store_dir, context_id })
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }
}

#[async_trait]
impl Retriever for LocalRetriever {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Chunk>, RetrieverError> {
        debug!(top_k = query.top_k, "search: called");
        let store_dir = self.store_dir.clone();
        let context_id = self.context_id.clone();
        let text = query.text.clone();
        let top_k = query.top_k;

        let ranked = tokio::task::spawn_blocking(move || {
            let store = DocStore::open(&store_dir)?;
            store.rank(&context_id, &text, top_k)
        })
        .await
        .map_err(|e| RetrieverError::Store(e.to_string()))?
        .map_err(|e| RetrieverError::Store(e.to_string()))?;

        Ok(ranked
            .into_iter()
            .map(|hit| {
                let mut chunk = Chunk::new(hit.id, hit.text);
                chunk.metadata.insert("source".to_string(), hit.source.into());
                if let Some(heading) = hit.heading {
                    chunk.metadata.insert("heading".to_string(), heading.into());
                }
                chunk.metadata.insert("score".to_string(), hit.score.into());
                chunk
            })
            .collect())
    }
}
