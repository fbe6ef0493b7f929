//! ask-dbx - CLI entry point

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result, bail};
use tracing::{debug, info};

use askdbx::cli::{Cli, Command, OutputFormat, get_log_path, load_requirements};
use askdbx::config::Config;
use askdbx::domain::TaskState;
use askdbx::gateway::LlmGateway;
use askdbx::llm::create_client;
use askdbx::planning::{PlanOutcome, PlanningController, Termination};
use askdbx::prompts::PromptLoader;
use askdbx::report::MarkdownReport;
use askdbx::retriever::create_retriever;
use askdbx::runlog::{RunEvent, RunLog};
use askdbx::state::StateManager;
use askdbx::worker::Worker;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file / AGENT_LOG_LEVEL > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Plan { requirements, format } => cmd_plan(&config, &requirements, format).await,
        Command::Run { requirements, dry_run } => cmd_run(&config, &requirements, dry_run).await,
        Command::Tasks { state, format } => cmd_tasks(&config, state, format).await,
        Command::ShowConfig => cmd_show_config(&config),
    }
}

fn build_controller(config: &Config) -> Result<PlanningController> {
    config.validate().context("Invalid configuration")?;

    let llm = create_client(&config.llm, config.databricks_host.as_deref()).context("Failed to create LLM client")?;
    let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let prompts = Arc::new(PromptLoader::new(root));
    let gateway = Arc::new(LlmGateway::new(llm, prompts, config.gateway.max_concurrency));
    let retriever = create_retriever(config).context("Failed to create retriever")?;

    Ok(PlanningController::new(gateway, retriever, config.planning.clone()))
}

/// Run the planning loop under the agent timeout, logging to a fresh run log
async fn plan(config: &Config, requirements_arg: &str) -> Result<(PlanOutcome, PathBuf)> {
    let controller = build_controller(config)?;
    let requirements = load_requirements(requirements_arg)?;

    let mut runlog = RunLog::create(&config.storage.runs_dir, &requirements).context("Failed to create run log")?;
    runlog.record(RunEvent::Started {
        requirements: requirements.clone(),
    });
    info!(run_id = %runlog.run_id(), "Planning run log created");

    let limit = Duration::from_secs(config.agent.timeout_secs);
    let result = tokio::time::timeout(limit, controller.run_observed(&requirements, &mut runlog)).await;

    match result {
        Ok(Ok(outcome)) => Ok((outcome, runlog.path().to_path_buf())),
        Ok(Err(e)) => {
            runlog.record(RunEvent::Failed { error: e.to_string() });
            let hint = if e.is_transient() { " (transient, retry may succeed)" } else { "" };
            Err(e).context(format!("Planning failed{}", hint))
        }
        Err(_) => {
            let msg = format!("Planning timed out after {}s", config.agent.timeout_secs);
            runlog.record(RunEvent::Failed { error: msg.clone() });
            bail!(msg)
        }
    }
}

fn print_outcome(outcome: &PlanOutcome, log_path: &std::path::Path) {
    let state = &outcome.state;
    let termination = match outcome.termination {
        Termination::Accepted => outcome.termination.to_string().green(),
        _ => outcome.termination.to_string().yellow(),
    };
    println!(
        "{} {} after {} iteration(s)",
        "Planning finished:".bold(),
        termination,
        state.iteration
    );
    println!(
        "  Verification: {}  Rating: {}/5  Documents: {}",
        state.verification,
        state.rating,
        state.documents.len()
    );
    println!("  Run log: {}", log_path.display());
    println!();

    for task in &outcome.tasks {
        println!("{} {}", "Task".bold(), task.id.cyan());
        println!("  {}", task.objective.replace('\n', "\n  "));
        for (i, step) in task.steps.iter().enumerate() {
            println!("    {}. {}", i + 1, step);
        }
        println!();
    }
}

async fn cmd_plan(config: &Config, requirements: &str, format: OutputFormat) -> Result<()> {
    debug!(?format, "cmd_plan: called");
    let (outcome, log_path) = plan(config, requirements).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        OutputFormat::Text => print_outcome(&outcome, &log_path),
    }
    Ok(())
}

async fn cmd_run(config: &Config, requirements: &str, dry_run: bool) -> Result<()> {
    debug!(dry_run, "cmd_run: called");
    let (outcome, log_path) = plan(config, requirements).await?;
    print_outcome(&outcome, &log_path);

    let state = StateManager::spawn(&config.storage.state_db_path).context("Failed to open state database")?;
    let report = MarkdownReport::open(&config.storage.markdown_path)?;
    let worker = Worker::new(state.clone(), report).with_dry_run(dry_run);

    let mut tasks = outcome.tasks;
    let summary = worker.process_all(&mut tasks).await?;
    state.shutdown().await?;

    if dry_run {
        println!("{} {} task(s) previewed, nothing recorded", "Dry run:".bold(), summary.previewed);
    } else {
        println!(
            "{} {} task(s) completed, report at {}",
            "Done:".bold().green(),
            summary.completed,
            config.storage.markdown_path.display()
        );
    }
    for (id, reason) in &summary.skipped {
        println!("  {} {} ({})", "skipped".yellow(), id, reason);
    }
    Ok(())
}

async fn cmd_tasks(config: &Config, state_filter: Option<TaskState>, format: OutputFormat) -> Result<()> {
    debug!(?state_filter, "cmd_tasks: called");
    let state = StateManager::spawn(&config.storage.state_db_path).context("Failed to open state database")?;
    let rows = state.list(state_filter).await?;
    state.shutdown().await?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No tasks recorded in {}", config.storage.state_db_path.display());
        return Ok(());
    }
    for row in rows {
        let updated = chrono::DateTime::from_timestamp_millis(row.updated_at)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        let state = if row.state == TaskState::Complete.as_str() {
            row.state.green()
        } else {
            row.state.yellow()
        };
        println!("{:<10} {}  {}", state, updated, row.id);
    }
    Ok(())
}

fn cmd_show_config(config: &Config) -> Result<()> {
    print!("{}", serde_yaml::to_string(config)?);
    Ok(())
}
