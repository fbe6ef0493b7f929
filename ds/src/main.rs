use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;

use docstore::cli::{Cli, Command};
use docstore::config::Config;
use docstore::{DocStore, IngestOptions, SearchOptions};

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    let store_path = cli.store.unwrap_or(config.store_path);
    info!("docstore starting at {}", store_path.display());

    let store = DocStore::open(&store_path)?;

    match cli.command {
        Command::Ingest { paths, chunk_size } => {
            let ctx_id = store.ingest(
                &paths,
                IngestOptions {
                    chunk_size: chunk_size.unwrap_or(config.default_chunk_size),
                },
            )?;
            let stats = store.stats(&ctx_id)?;
            println!(
                "{} Ingested {} chunks from {} files to context: {}",
                "✓".green(),
                stats.chunk_count,
                stats.source_count,
                ctx_id.cyan()
            );
        }
        Command::Search {
            context_id,
            pattern,
            max_results,
            ignore_case,
        } => {
            let matches = store.search(
                &context_id,
                &pattern,
                SearchOptions {
                    max_results: max_results.unwrap_or(10),
                    case_insensitive: ignore_case,
                },
            )?;
            for m in matches {
                println!("{}:{} {}", m.chunk_id.yellow(), m.offset.to_string().dimmed(), m.snippet);
            }
        }
        Command::Rank {
            context_id,
            query,
            top_k,
        } => {
            for hit in store.rank(&context_id, &query, top_k)? {
                let heading = hit.heading.as_deref().unwrap_or("-");
                println!("{} {:>6.1} {} ({})", hit.id.yellow(), hit.score, heading.bold(), hit.source.dimmed());
            }
        }
        Command::Cat { chunk_id } => {
            println!("{}", store.get_chunk(&chunk_id)?);
        }
        Command::Stats { context_id } => {
            let stats = store.stats(&context_id)?;
            println!("Context: {}", context_id.cyan());
            println!("  Chunks: {}", stats.chunk_count);
            println!("  Total bytes: {}", stats.total_bytes);
            println!("  Sources: {}", stats.source_count);
        }
        Command::List => {
            let contexts = store.list_contexts()?;
            if contexts.is_empty() {
                println!("No contexts found");
            } else {
                for ctx in contexts {
                    println!("{}", ctx);
                }
            }
        }
        Command::Delete { context_id } => {
            store.delete(&context_id)?;
            println!("{} Deleted context: {}", "✓".green(), context_id);
        }
    }

    Ok(())
}
