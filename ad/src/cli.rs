//! CLI command definitions

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use eyre::{Context, Result, bail};
use tracing::debug;

use crate::domain::TaskState;

/// ask-dbx - plan Databricks work from requirements and documentation
#[derive(Parser)]
#[command(
    name = "ad",
    about = "Plan Databricks work from requirements, grounded in retrieved documentation",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the planning loop and print the resulting tasks
    Plan {
        /// Requirements text, or a path to a file containing them
        requirements: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Plan, then let the worker apply every task
    Run {
        /// Requirements text, or a path to a file containing them
        requirements: String,

        /// Show what the worker would do without recording any state
        #[arg(long)]
        dry_run: bool,
    },

    /// List recorded task states
    Tasks {
        /// Only tasks in this state (pending, complete)
        #[arg(short, long)]
        state: Option<TaskState>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the effective configuration as YAML
    ShowConfig,
}

/// Output format for plan/tasks
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

/// Location of the `ad` log file
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ask-dbx")
        .join("logs")
        .join("ask-dbx.log")
}

/// Read requirements from a file if `arg` names one, otherwise use it verbatim
pub fn load_requirements(arg: &str) -> Result<String> {
    let path = Path::new(arg);
    let text = if path.is_file() {
        debug!(path = %path.display(), "load_requirements: reading file");
        fs::read_to_string(path).context(format!("Failed to read requirements from {}", path.display()))?
    } else {
        arg.to_string()
    };

    let text = text.trim().to_string();
    if text.is_empty() {
        bail!("Requirements are empty");
    }
    Ok(text)
}
