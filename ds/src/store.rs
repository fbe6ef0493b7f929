//! Core DocStore implementation

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::query_terms;

/// Unique identifier for a context (one ingestion run)
pub type ContextId = String;

/// Chunk number within a context (`0001`, `0002`, ...)
pub type ChunkId = String;

/// Metadata for a single chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub chunk_id: ChunkId,
    /// Source file path
    pub source: String,
    /// Nearest preceding markdown heading, if any
    #[serde(default)]
    pub heading: Option<String>,
    pub byte_start: u64,
    pub byte_end: u64,
    /// Creation timestamp (unix ms)
    pub created_at: i64,
}

impl ChunkMeta {
    /// Fully qualified id (`{context_id}/{chunk_id}`)
    pub fn qualified_id(&self, context_id: &str) -> String {
        format!("{}/{}", context_id, self.chunk_id)
    }
}

/// Options for ingesting content
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Soft upper bound on chunk size in bytes; a single oversized paragraph becomes its own chunk
    pub chunk_size: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            chunk_size: crate::DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Options for regex search
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub max_results: usize,
    pub case_insensitive: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: 10,
            case_insensitive: false,
        }
    }
}

/// A regex search match
#[derive(Debug, Clone)]
pub struct SearchMatch {
    pub chunk_id: ChunkId,
    /// Byte offset within chunk
    pub offset: usize,
    pub snippet: String,
}

/// A chunk scored against a keyword query
#[derive(Debug, Clone, PartialEq)]
pub struct RankedChunk {
    /// Fully qualified id (`{context_id}/{chunk_id}`)
    pub id: String,
    pub text: String,
    pub source: String,
    pub heading: Option<String>,
    pub score: f64,
}

/// Statistics for a context
#[derive(Debug, Clone)]
pub struct ContextStats {
    pub chunk_count: usize,
    pub total_bytes: u64,
    pub source_count: usize,
}

/// On-disk documentation chunk store
pub struct DocStore {
    base_path: PathBuf,
}

impl DocStore {
    /// Open or create a doc store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).context("Failed to create store directory")?;
        debug!(?base_path, "Opened doc store");
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Ingest files matching the given glob patterns into a new context
    pub fn ingest(&self, patterns: &[String], options: IngestOptions) -> Result<ContextId> {
        let context_id = Uuid::now_v7().to_string();
        let ctx_path = self.base_path.join(&context_id);
        let chunks_path = ctx_path.join("chunks");
        fs::create_dir_all(&chunks_path)?;

        let mut index_file = fs::File::create(ctx_path.join("index.jsonl"))?;
        let mut chunk_num = 0u32;

        for pattern in patterns {
            let paths = glob::glob(pattern).context(format!("Invalid glob pattern: {}", pattern))?;
            for entry in paths {
                let path = entry?;
                if path.is_file() {
                    chunk_num = self.ingest_file(&path, &chunks_path, &mut index_file, chunk_num, &options)?;
                }
            }
        }

        if chunk_num == 0 {
            warn!(context_id, ?patterns, "Ingestion matched no content");
        }
        info!(context_id, chunk_count = chunk_num, "Ingestion complete");
        Ok(context_id)
    }

    fn ingest_file(
        &self,
        path: &Path,
        chunks_path: &Path,
        index_file: &mut fs::File,
        mut chunk_num: u32,
        options: &IngestOptions,
    ) -> Result<u32> {
        let content = fs::read_to_string(path).context(format!("Failed to read file: {}", path.display()))?;
        let source = path.to_string_lossy().to_string();

        for piece in split_paragraphs(&content, options.chunk_size) {
            chunk_num += 1;
            let chunk_id = format!("{:04}", chunk_num);
            fs::write(chunks_path.join(format!("{}.txt", chunk_id)), piece.text)?;

            let meta = ChunkMeta {
                chunk_id,
                source: source.clone(),
                heading: piece.heading,
                byte_start: piece.start as u64,
                byte_end: piece.end as u64,
                created_at: chrono::Utc::now().timestamp_millis(),
            };
            writeln!(index_file, "{}", serde_json::to_string(&meta)?)?;
        }

        debug!(source, chunk_num, "Ingested file");
        Ok(chunk_num)
    }

    /// Read the chunk index of a context
    pub fn chunks(&self, context_id: &str) -> Result<Vec<ChunkMeta>> {
        let index_path = self.context_path(context_id)?.join("index.jsonl");
        let reader = BufReader::new(fs::File::open(&index_path)?);

        let mut metas = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            metas.push(serde_json::from_str(&line)?);
        }
        Ok(metas)
    }

    /// Search for a regex pattern within a context
    pub fn search(&self, context_id: &str, pattern: &str, options: SearchOptions) -> Result<Vec<SearchMatch>> {
        let chunks_path = self.context_path(context_id)?.join("chunks");
        let regex = regex::RegexBuilder::new(pattern)
            .case_insensitive(options.case_insensitive)
            .build()?;

        let mut matches = Vec::new();
        for meta in self.chunks(context_id)? {
            let content = fs::read_to_string(chunks_path.join(format!("{}.txt", meta.chunk_id)))?;
            for m in regex.find_iter(&content) {
                let start = floor_char_boundary(&content, m.start().saturating_sub(30));
                let end = ceil_char_boundary(&content, (m.end() + 30).min(content.len()));
                matches.push(SearchMatch {
                    chunk_id: meta.chunk_id.clone(),
                    offset: m.start(),
                    snippet: content[start..end].to_string(),
                });
                if matches.len() >= options.max_results {
                    return Ok(matches);
                }
            }
        }
        Ok(matches)
    }

    /// Score every chunk in a context against the query terms and return the best ones
    ///
    /// Score is the sum of term occurrences, with a bonus for terms appearing in the
    /// chunk's heading. Chunks with no matching term are omitted. Ties keep ingestion order.
    pub fn rank(&self, context_id: &str, query: &str, max_results: usize) -> Result<Vec<RankedChunk>> {
        debug!(context_id, query, max_results, "rank: called");
        let terms = query_terms(query);
        if terms.is_empty() || max_results == 0 {
            return Ok(Vec::new());
        }

        let chunks_path = self.context_path(context_id)?.join("chunks");
        let mut ranked = Vec::new();
        for meta in self.chunks(context_id)? {
            let text = fs::read_to_string(chunks_path.join(format!("{}.txt", meta.chunk_id)))?;
            let score = score_chunk(&text, meta.heading.as_deref(), &terms);
            if score > 0.0 {
                ranked.push(RankedChunk {
                    id: meta.qualified_id(context_id),
                    text,
                    source: meta.source,
                    heading: meta.heading,
                    score,
                });
            }
        }

        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(max_results);
        Ok(ranked)
    }

    /// Get the full content of a chunk by qualified id (`context_id/chunk_num`)
    pub fn get_chunk(&self, chunk_id: &str) -> Result<String> {
        let Some((context_id, chunk_num)) = chunk_id.split_once('/') else {
            return Err(eyre::eyre!("Chunk ID must include context: context_id/chunk_num"));
        };

        let chunk_path = self
            .base_path
            .join(context_id)
            .join("chunks")
            .join(format!("{}.txt", chunk_num));

        fs::read_to_string(&chunk_path).context(format!("Chunk not found: {}", chunk_id))
    }

    /// Get statistics for a context
    pub fn stats(&self, context_id: &str) -> Result<ContextStats> {
        let metas = self.chunks(context_id)?;
        let sources: HashSet<&str> = metas.iter().map(|m| m.source.as_str()).collect();

        Ok(ContextStats {
            chunk_count: metas.len(),
            total_bytes: metas.iter().map(|m| m.byte_end - m.byte_start).sum(),
            source_count: sources.len(),
        })
    }

    /// List all context ids, oldest first
    pub fn list_contexts(&self) -> Result<Vec<ContextId>> {
        let mut contexts = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            if entry.path().is_dir()
                && let Some(name) = entry.file_name().to_str()
            {
                contexts.push(name.to_string());
            }
        }
        // uuid v7 ids sort by creation time
        contexts.sort();
        Ok(contexts)
    }

    /// Most recently ingested context, if any
    pub fn latest_context(&self) -> Result<Option<ContextId>> {
        Ok(self.list_contexts()?.pop())
    }

    /// Delete a context and all its data
    pub fn delete(&self, context_id: &str) -> Result<()> {
        let ctx_path = self.base_path.join(context_id);
        if ctx_path.exists() {
            fs::remove_dir_all(&ctx_path)?;
            info!(context_id, "Deleted context");
        }
        Ok(())
    }

    fn context_path(&self, context_id: &str) -> Result<PathBuf> {
        let ctx_path = self.base_path.join(context_id);
        if !ctx_path.is_dir() {
            return Err(eyre::eyre!("Context not found: {}", context_id));
        }
        Ok(ctx_path)
    }
}

struct Piece {
    text: String,
    heading: Option<String>,
    start: usize,
    end: usize,
}

/// Group blank-line separated paragraphs into pieces of at most `max` bytes
fn split_paragraphs(content: &str, max: usize) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut heading: Option<String> = None;
    let mut current: Option<Piece> = None;

    let mut offset = 0usize;
    for para in content.split("\n\n") {
        let start = offset;
        offset += para.len() + 2;

        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }
        let end = start + para.len();

        if let Some(title) = trimmed.lines().next().and_then(|l| l.strip_prefix('#')) {
            // New section: flush so chunks never straddle headings
            if let Some(piece) = current.take() {
                pieces.push(piece);
            }
            heading = Some(title.trim_start_matches('#').trim().to_string());
        }

        match current.as_mut() {
            Some(piece) if piece.text.len() + trimmed.len() + 2 <= max => {
                piece.text.push_str("\n\n");
                piece.text.push_str(trimmed);
                piece.end = end;
            }
            _ => {
                if let Some(piece) = current.take() {
                    pieces.push(piece);
                }
                current = Some(Piece {
                    text: trimmed.to_string(),
                    heading: heading.clone(),
                    start,
                    end,
                });
            }
        }
    }

    if let Some(piece) = current {
        pieces.push(piece);
    }
    pieces
}

fn score_chunk(text: &str, heading: Option<&str>, terms: &[String]) -> f64 {
    let body = text.to_lowercase();
    let heading = heading.map(str::to_lowercase).unwrap_or_default();

    terms
        .iter()
        .map(|term| {
            let hits = body.matches(term.as_str()).count() as f64;
            let bonus = if heading.contains(term.as_str()) { 2.0 } else { 0.0 };
            hits + bonus
        })
        .sum()
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ingest_text(temp: &TempDir, name: &str, content: &str, chunk_size: usize) -> (DocStore, ContextId) {
        let store = DocStore::open(temp.path().join("store")).unwrap();
        let file = temp.path().join(name);
        fs::write(&file, content).unwrap();
        let ctx_id = store
            .ingest(&[file.to_string_lossy().to_string()], IngestOptions { chunk_size })
            .unwrap();
        (store, ctx_id)
    }

    #[test]
    fn test_ingest_and_search() {
        let temp = TempDir::new().unwrap();
        let (store, ctx_id) = ingest_text(&temp, "jobs.md", "Jobs run notebooks on a schedule.", 2000);

        let matches = store.search(&ctx_id, "notebooks", SearchOptions::default()).unwrap();
        assert_eq!(matches.len(), 1);
        assert!(matches[0].snippet.contains("notebooks"));
        assert_eq!(matches[0].chunk_id, "0001");
    }

    #[test]
    fn test_paragraph_chunking_respects_headings() {
        let temp = TempDir::new().unwrap();
        let doc = "# Jobs\n\nJobs run tasks.\n\nThey can be scheduled.\n\n## Clusters\n\nClusters provide compute.";
        let (store, ctx_id) = ingest_text(&temp, "doc.md", doc, 2000);

        let metas = store.chunks(&ctx_id).unwrap();
        assert_eq!(metas.len(), 2);
        assert_eq!(metas[0].heading.as_deref(), Some("Jobs"));
        assert_eq!(metas[1].heading.as_deref(), Some("Clusters"));

        let first = store.get_chunk(&metas[0].qualified_id(&ctx_id)).unwrap();
        assert!(first.contains("They can be scheduled."));
        assert!(!first.contains("Clusters provide"));
    }

    #[test]
    fn test_small_chunk_size_splits_paragraphs() {
        let temp = TempDir::new().unwrap();
        let (store, ctx_id) = ingest_text(&temp, "doc.txt", "alpha alpha\n\nbeta beta\n\ngamma gamma", 12);

        let stats = store.stats(&ctx_id).unwrap();
        assert_eq!(stats.chunk_count, 3);
        assert_eq!(stats.source_count, 1);
    }

    #[test]
    fn test_rank_orders_by_term_hits() {
        let temp = TempDir::new().unwrap();
        let doc = "# Workflows\n\nSchedule a job with a cron trigger.\n\n# Clusters\n\nClusters autoscale.\n\n# Jobs\n\nA job schedule uses cron syntax; each job run is logged.";
        let (store, ctx_id) = ingest_text(&temp, "doc.md", doc, 2000);

        let ranked = store.rank(&ctx_id, "nightly job schedule", 10).unwrap();
        assert_eq!(ranked.len(), 2);
        assert!(ranked[0].text.contains("cron syntax"));
        assert!(ranked[0].score > ranked[1].score);
        assert!(ranked[0].id.starts_with(&ctx_id));
    }

    #[test]
    fn test_rank_truncates_and_handles_empty_query() {
        let temp = TempDir::new().unwrap();
        let (store, ctx_id) = ingest_text(&temp, "doc.txt", "delta table\n\ndelta lake\n\ndelta sharing", 5);

        assert_eq!(store.rank(&ctx_id, "delta", 2).unwrap().len(), 2);
        assert!(store.rank(&ctx_id, "a an", 10).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_context_errors() {
        let temp = TempDir::new().unwrap();
        let store = DocStore::open(temp.path()).unwrap();
        assert!(store.rank("missing", "anything", 5).is_err());
        assert!(store.get_chunk("0001").is_err());
    }

    #[test]
    fn test_list_latest_and_delete() {
        let temp = TempDir::new().unwrap();
        let (store, first) = ingest_text(&temp, "a.txt", "first content", 2000);
        let file = temp.path().join("b.txt");
        fs::write(&file, "second content").unwrap();
        let second = store
            .ingest(&[file.to_string_lossy().to_string()], IngestOptions::default())
            .unwrap();

        assert_eq!(store.list_contexts().unwrap(), vec![first.clone(), second.clone()]);
        assert_eq!(store.latest_context().unwrap(), Some(second.clone()));

        store.delete(&second).unwrap();
        assert_eq!(store.list_contexts().unwrap(), vec![first]);
    }
}
