mod config;
mod render;

use clap::{Parser, Subcommand};
use config::RecollectConfig;
use recollect_core::{Namespace, OperationResult};
use recollect_memory::{JsonlBackend, MemoryBackend, VectorMemoryService};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_RECENT: usize = 5;
const MAX_RECENT: usize = 20;

#[derive(Parser)]
#[command(name = "recollect", about = "Recollect: semantic memory for agents")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "recollect.toml")]
    config: PathBuf,

    /// Directory for memory files (overrides config)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Namespace (preset) to operate on
    #[arg(short, long)]
    namespace: String,

    /// Print the raw operation result as JSON
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a new memory
    Store {
        /// Text to remember
        text: String,
    },
    /// Search memories similar to a query
    Search {
        /// What to look for
        query: String,
    },
    /// List the most recent memories
    Recent {
        /// How many to show (1-20)
        limit: Option<usize>,
    },
    /// Remove every memory of the namespace
    Clear,
    /// Show namespace size
    Stats,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Print `result`, or turn a failed result into an error.
fn emit<T: Serialize>(
    result: OperationResult<T>,
    json: bool,
    text: impl FnOnce(&str, &T) -> String,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    if !result.success {
        anyhow::bail!(result.message);
    }
    if json {
        return Ok(());
    }
    if let Some(kind) = result.kind {
        eprintln!("warning ({kind:?}): {}", result.message);
    }
    match &result.payload {
        Some(payload) => println!("{}", text(&result.message, payload)),
        None => println!("{}", result.message),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = RecollectConfig::load(&cli.config).await?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    let namespace = Namespace::new(cli.namespace);
    let backend = JsonlBackend::new(config.memory_dir()).await?;
    info!(dir = %backend.dir().display(), namespace = %namespace, "Memory backend ready");
    let service = VectorMemoryService::new(Arc::new(backend) as Arc<dyn MemoryBackend>);

    match cli.command {
        Commands::Store { text } => {
            let memory = config.memory_for(&namespace)?;
            let result = service.store(&namespace, &text, &memory).await;
            emit(result, cli.json, render::stored)
        }
        Commands::Search { query } => {
            let memory = config.memory_for(&namespace)?;
            let result = service.search(&namespace, &query, &memory).await;
            let saved = service.flush(&namespace).await;
            if !saved.success {
                warn!(namespace = %namespace, error = %saved.message, "Access times not saved");
            }
            emit(result, cli.json, |message, hits| render::search(message, hits))
        }
        Commands::Recent { limit } => {
            let limit = limit.unwrap_or(DEFAULT_RECENT).clamp(1, MAX_RECENT);
            let result = service.list_recent(&namespace, limit).await;
            emit(result, cli.json, |message, records| {
                render::recent(message, records)
            })
        }
        Commands::Clear => {
            let result = service.clear(&namespace).await;
            emit(result, cli.json, |message, _| message.to_string())
        }
        Commands::Stats => {
            let result = service.stats(&namespace).await;
            emit(result, cli.json, render::stats)
        }
    }
}
