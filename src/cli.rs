//! CLI argument parsing for the provisioning sequence.
//!
//! The CLI only resolves inputs; the sequence itself lives in `sequencer`.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "provision",
    version,
    about = "Idempotent provisioning of organizations, projects, plans and subscriptions",
    after_help = "Commands:\n  run     Walk every stage, skipping stages already recorded in the cache\n  status  Summarize which stages the cache records as complete\n\nEnvironment:\n  PROVISION_BASE_URL  Base URL when --base-url is not given\n  PROVISION_CACHE     Cache path when --cache is not given\n  RUST_LOG            Log filter (overrides --verbose)\n\nExamples:\n  provision run\n  provision run --base-url https://admin.example.com/api --cache /tmp/data.json\n  provision status --json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    Status(StatusArgs),
}

/// Run command inputs.
#[derive(Parser, Debug)]
#[command(about = "Provision every stage not yet recorded in the cache")]
pub struct RunArgs {
    /// Cache file recording each stage's request and response
    #[arg(long, value_name = "PATH")]
    pub cache: Option<PathBuf>,

    /// API base URL that stage paths are appended to
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// JSON file overriding the default request bodies
    #[arg(long, value_name = "PATH")]
    pub payloads: Option<PathBuf>,

    /// Log each request at debug level
    #[arg(long)]
    pub verbose: bool,
}

/// Status command inputs.
#[derive(Parser, Debug)]
#[command(about = "Summarize cached stage results without network access")]
pub struct StatusArgs {
    /// Cache file recording each stage's request and response
    #[arg(long, value_name = "PATH")]
    pub cache: Option<PathBuf>,

    /// JSON file overriding the default request bodies (sets the feature count)
    #[arg(long, value_name = "PATH")]
    pub payloads: Option<PathBuf>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}
