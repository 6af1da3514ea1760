//! mtjudge CLI: scores how well an LLM judge spots English to Catalan
//! mistranslations.

mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// mtjudge - evaluation harness for mistranslation judges
#[derive(Parser, Debug)]
#[command(name = "mtjudge", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./mtjudge.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Workspace directory
    #[arg(short, long, global = true, default_value = ".")]
    pub workspace: PathBuf,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score a judge against an annotated corpus and record the run
    Evaluate(RunArgs),
    /// Ask the judge about every pair in a corpus without scoring
    Infer(RunArgs),
    /// Render a run record collection as a Markdown table
    Report {
        /// Path to a stats_<n>.json collection
        path: PathBuf,
    },
    /// Build the evaluation dataset from an annotated corpus and references
    Dataset(DatasetArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Per-run overrides shared by `evaluate` and `infer`.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Prompt version, e.g. 2_1 (reads prompt-v2_1.txt)
    #[arg(short = 'p', long)]
    pub prompt_version: Option<String>,

    /// Maximum number of items; negative means all
    #[arg(short = 'm', long, allow_negative_numbers = true)]
    pub max: Option<i64>,

    /// Name of a configured judge backend
    #[arg(short = 'b', long)]
    pub backend: Option<String>,

    /// Model file for a local backend
    #[arg(long)]
    pub model_path: Option<PathBuf>,

    /// Corpus file (.tmx or .po)
    #[arg(short = 'i', long)]
    pub input: Option<PathBuf>,

    /// Directory for audit files and run records
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct DatasetArgs {
    /// Corpus whose units all carry annotated errors
    #[arg(long)]
    pub errors: PathBuf,

    /// Reference corpora sampled for error-free units (repeatable)
    #[arg(short = 'r', long = "reference")]
    pub references: Vec<PathBuf>,

    /// Units sampled from each reference corpus
    #[arg(long, default_value_t = 500)]
    pub per_reference_limit: usize,

    /// Total number of distinct source sentences
    #[arg(long, default_value_t = 1000)]
    pub cap: usize,

    /// Output TMX path; a PO copy is written next to it
    #[arg(short = 'o', long, default_value = "dataset/dataset.tmx")]
    pub output: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a default mtjudge.toml into the workspace
    Init,
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let config = mtjudge_core::load_config(Some(&workspace), cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    // Every judge call lands in the JSON log as well.
    let log_dir = config.logging.dir.clone();
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "mtjudge.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    commands::handle_command(cli.command, config, &workspace).await
}
