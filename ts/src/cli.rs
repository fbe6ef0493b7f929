//! CLI argument parsing for taskstore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "taskstore")]
#[command(author, version, about = "Inspect and edit the ask-dbx task state database", long_about = None)]
pub struct Cli {
    /// Path to the SQLite database (default: ~/.local/share/ask-dbx/state.db)
    #[arg(short, long)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List tasks
    List {
        /// Only show tasks in this state
        #[arg(short, long)]
        state: Option<String>,
    },

    /// Show one task
    Get {
        /// Task ID
        #[arg(required = true)]
        id: String,
    },

    /// Set a task's state (inserts the task if unknown)
    Set {
        /// Task ID
        #[arg(required = true)]
        id: String,

        /// New state
        #[arg(required = true)]
        state: String,
    },

    /// Delete a task row
    Delete {
        /// Task ID
        #[arg(required = true)]
        id: String,
    },
}
