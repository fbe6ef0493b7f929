//! CLI argument parsing for docstore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ds")]
#[command(author, version, about = "Documentation chunk store for offline ask-dbx retrieval", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the store directory
    #[arg(long)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ingest documentation files into a new context
    Ingest {
        /// File paths or glob patterns to ingest
        #[arg(required = true)]
        paths: Vec<String>,

        /// Soft chunk size limit in bytes
        #[arg(short = 's', long)]
        chunk_size: Option<usize>,
    },

    /// Regex search within a context
    Search {
        #[arg(required = true)]
        context_id: String,

        /// Search pattern (regex)
        #[arg(required = true)]
        pattern: String,

        #[arg(short, long)]
        max_results: Option<usize>,

        #[arg(short = 'i', long)]
        ignore_case: bool,
    },

    /// Keyword-rank chunks against a natural language query
    Rank {
        #[arg(required = true)]
        context_id: String,

        #[arg(required = true)]
        query: String,

        #[arg(short = 'k', long, default_value = "10")]
        top_k: usize,
    },

    /// Display a chunk's content
    Cat {
        /// Qualified chunk id (context_id/chunk_num)
        #[arg(required = true)]
        chunk_id: String,
    },

    /// Show statistics for a context
    Stats {
        #[arg(required = true)]
        context_id: String,
    },

    /// List all contexts
    List,

    /// Delete a context
    Delete {
        #[arg(required = true)]
        context_id: String,
    },
}
