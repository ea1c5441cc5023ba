use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod cache;
mod cli;
mod client;
mod config;
mod error;
mod sequencer;
mod stages;
mod status;

use cli::{Command, RootArgs, RunArgs, StatusArgs};
use client::HttpTransport;
use config::{resolve_cache_path, ProvisionConfig};
use sequencer::Sequencer;

fn main() -> Result<()> {
    let args = RootArgs::parse();
    let verbose = matches!(&args.command, Command::Run(run) if run.verbose);
    init_logging(verbose);

    match args.command {
        Command::Run(args) => cmd_run(args),
        Command::Status(args) => cmd_status(args),
    }
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn cmd_run(args: RunArgs) -> Result<()> {
    let config = ProvisionConfig::resolve(
        args.base_url.as_deref(),
        args.cache.as_deref(),
        args.payloads.as_deref(),
    )?;
    let cache_path = config.cache_path.clone();
    tracing::info!(
        base_url = %config.base_url,
        cache = %cache_path.display(),
        "starting provisioning run"
    );

    let cache = cache::load_cache(&cache_path);
    let mut sequencer = Sequencer::new(HttpTransport::new(), config);
    sequencer
        .run(cache)
        .with_context(|| {
            format!(
                "provisioning aborted; progress kept in {}",
                cache_path.display()
            )
        })?;

    tracing::info!(
        performed = sequencer.performed().len(),
        skipped = sequencer.skipped().len(),
        "provisioning complete"
    );
    Ok(())
}

fn cmd_status(args: StatusArgs) -> Result<()> {
    let cache_path = resolve_cache_path(
        args.cache.as_deref(),
        std::env::var_os(config::CACHE_PATH_ENV),
    );
    let payloads = match args.payloads.as_deref() {
        Some(path) => config::load_payloads(path)?,
        None => config::Payloads::default(),
    };
    let cache = cache::load_cache(&cache_path);
    let summary = status::build_status_summary(&cache, payloads.features.len());
    if args.json {
        let text = serde_json::to_string_pretty(&summary).context("serialize status summary")?;
        println!("{text}");
    } else {
        print!("{}", status::render_text(&summary));
    }
    Ok(())
}
