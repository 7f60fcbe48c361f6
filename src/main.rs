use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reagent::{
    completion::{CompletionClient, CompletionOptions, HttpCompletionClient},
    config::Config,
    memory::{MemoryStore, SqliteMemory},
    orchestrator::Orchestrator,
    policy::LlmPolicy,
    tools::ToolRegistry,
};

#[derive(Parser)]
#[command(name = "reagent", version, about = "Local reasoning agent loop")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask a question and print the reasoning steps as they happen
    Ask {
        /// The question to answer
        question: String,
        /// Suppress step-by-step output, print only the final answer
        #[arg(long)]
        quiet: bool,
    },
    /// List registered tools
    Tools,
    /// Print recent session traces from the trace log
    Traces {
        /// Maximum number of traces to print
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    info!(version = env!("CARGO_PKG_VERSION"), "reagent starting");

    match cli.command {
        Command::Ask { question, quiet } => ask(config, &question, quiet).await,
        Command::Tools => tools(config),
        Command::Traces { limit } => traces(config, limit).await,
    }
}

async fn ask(config: Config, question: &str, quiet: bool) -> anyhow::Result<()> {
    let memory = Arc::new(SqliteMemory::new(&config.database).await?);
    let client: Arc<dyn CompletionClient> =
        Arc::new(HttpCompletionClient::new(&config.completion, &config.request)?);
    let options = CompletionOptions::new(config.completion.temperature, config.completion.max_tokens);

    let registry = Arc::new(ToolRegistry::builtin(client.clone()));
    let policy = Arc::new(LlmPolicy::new(client.clone(), options.clone()));

    let mut orchestrator = Orchestrator::new(
        client,
        policy,
        registry,
        memory,
        options,
        config.reasoning.clone(),
        config.request.clone(),
    );

    // Stream steps to the terminal while the session runs.
    let printer = if quiet {
        None
    } else {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        orchestrator = orchestrator.with_step_listener(tx);
        Some(tokio::spawn(async move {
            while let Some(step) = rx.recv().await {
                println!("[{}] {}: {}", step.index, step.state, step.content);
            }
        }))
    };

    let outcome = orchestrator.answer(question).await?;

    // Dropping the orchestrator closes the step channel.
    drop(orchestrator);
    if let Some(handle) = printer {
        let _ = handle.await;
    }

    println!();
    if outcome.is_degraded() {
        println!("Final answer (degraded):");
    } else {
        println!("Final answer:");
    }
    println!("{}", outcome.answer);

    Ok(())
}

fn tools(config: Config) -> anyhow::Result<()> {
    let client: Arc<dyn CompletionClient> =
        Arc::new(HttpCompletionClient::new(&config.completion, &config.request)?);
    let registry = ToolRegistry::builtin(client);

    for spec in registry.catalog() {
        println!("{:<12} {}", spec.name, spec.description);
    }

    Ok(())
}

async fn traces(config: Config, limit: usize) -> anyhow::Result<()> {
    let memory = SqliteMemory::new(&config.database).await?;

    let records = memory.recent_traces(limit).await?;
    if records.is_empty() {
        println!("No traces recorded yet.");
        return Ok(());
    }

    for trace in records {
        println!(
            "{} [{}] {} ({} steps)",
            trace.created_at.to_rfc3339(),
            trace.outcome,
            trace.question,
            trace.steps.len()
        );
        for step in &trace.steps {
            println!("  [{}] {}: {}", step.index, step.state, step.content);
        }
        println!();
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        reagent::config::LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        reagent::config::LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
