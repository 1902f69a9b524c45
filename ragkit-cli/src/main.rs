//! RagKit CLI: terminal interface for the RagKit Q&A pipeline.
//!
//! Provides batch subcommands and an interactive question loop.

mod commands;
mod repl;

use clap::Parser;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// RagKit: grounded answers over your own documents
#[derive(Parser, Debug)]
#[command(name = "ragkit", version, about, long_about = None)]
struct Cli {
    /// Workspace directory; relative paths in config resolve against it
    #[arg(short, long, global = true, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Subcommand (starts the interactive loop if omitted)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum Commands {
    /// Embed the corpus into the vector store, replacing the collection
    Ingest {
        /// Corpus JSON file (defaults to corpus.path)
        #[arg(long)]
        corpus: Option<PathBuf>,
    },
    /// Run the evaluation suite and save a scored report
    #[command(alias = "eval_test")]
    Eval {
        /// Cases evaluated at once (defaults to eval.concurrency)
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Answer one question and print the result as JSON
    Ask {
        /// The question
        question: String,
        /// Prompt version to use (defaults to the latest)
        #[arg(long)]
        prompt_version: Option<String>,
        /// Chat model override
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Show the passages retrieved for a query
    Retrieve {
        /// The query text
        query: String,
        /// Number of passages (defaults to retrieval.n_results)
        #[arg(short = 'n', long)]
        n_results: Option<usize>,
    },
    /// List registered prompts and their versions
    Prompts,
    /// Verify the API key is configured and accepted
    Check,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Write a default workspace config file
    Init,
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)));

    let log_dir = directories::ProjectDirs::from("dev", "ragkit", "ragkit")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "ragkit.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let mut config = ragkit_core::config::load_config(Some(&workspace), cli.config.as_deref())?;
    config.resolve_paths(&workspace);
    for warning in config.validate() {
        warn!("{}", warning);
    }

    match cli.command {
        Some(command) => commands::handle_command(command, config, &workspace).await,
        None => repl::run_interactive(config).await,
    }
}
