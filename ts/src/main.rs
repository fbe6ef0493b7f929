use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;

use taskstore::Store;
use taskstore::cli::{Cli, Command};

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();
    Ok(())
}

fn format_ms(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let db_path = cli.db.unwrap_or_else(taskstore::default_db_path);
    info!("taskstore opening {}", db_path.display());

    let mut store = Store::open(&db_path).context(format!("Failed to open {}", db_path.display()))?;

    match cli.command {
        Command::List { state } => {
            let rows = store.list(state.as_deref())?;
            if rows.is_empty() {
                println!("No tasks found");
            }
            for row in rows {
                println!("{} {} {}", row.id.cyan(), row.state.yellow(), format_ms(row.updated_at).dimmed());
            }
        }
        Command::Get { id } => match store.get(&id)? {
            Some(row) => println!("{} {} {}", row.id.cyan(), row.state.yellow(), format_ms(row.updated_at)),
            None => println!("Task not found: {}", id),
        },
        Command::Set { id, state } => {
            let outcome = store.set_state(&id, &state)?;
            println!("{} {:?} {} -> {}", "✓".green(), outcome, id.cyan(), state);
        }
        Command::Delete { id } => {
            if store.delete(&id)? {
                println!("{} Deleted task: {}", "✓".green(), id);
            } else {
                println!("Task not found: {}", id);
            }
        }
    }

    Ok(())
}
