//! DocStore - on-disk documentation chunk store
//!
//! Ingests documentation files (markdown, text) into paragraph-aligned chunks
//! and answers keyword queries against them. ask-dbx uses it as an offline
//! stand-in for the managed vector-search index.
//!
//! # Architecture
//!
//! ```text
//! .docstore/
//! └── {context_id}/
//!     ├── index.jsonl      # chunk metadata
//!     └── chunks/
//!         ├── 0001.txt
//!         ├── 0002.txt
//!         └── ...
//! ```
//!
//! # Example
//!
//! ```ignore
//! use docstore::DocStore;
//!
//! let store = DocStore::open(".docstore")?;
//! let ctx_id = store.ingest(&["docs/**/*.md".into()], Default::default())?;
//! let hits = store.rank(&ctx_id, "create a scheduled job", 10)?;
//! println!("{}", hits[0].text);
//! ```

pub mod cli;
pub mod config;
mod store;

pub use store::{ChunkMeta, ContextId, ContextStats, DocStore, IngestOptions, RankedChunk, SearchMatch, SearchOptions};

/// Default chunk size in characters
pub const DEFAULT_CHUNK_SIZE: usize = 2000;

/// Query terms shorter than this are ignored by `rank`
pub const MIN_TERM_LEN: usize = 3;

/// Split a query into lowercase alphanumeric terms
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
        .map(str::to_lowercase)
        .filter(|token| token.chars().count() >= MIN_TERM_LEN)
        .collect()
}
