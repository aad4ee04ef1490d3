//! bifrostd: Bifrost stdio daemon.
//!
//! Serves every configured provider as `use_<name>` / `list_<name>_models`
//! tools over newline-delimited JSON-RPC on stdin/stdout. Logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use bifrost::{Bifrost, Config};

/// Bifrost daemon: LLM providers as protocol tools.
#[derive(Parser)]
#[command(name = "bifrostd")]
#[command(version = bifrost::PKG_VERSION)]
#[command(about = "Expose configured LLM providers as tools over stdio")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "BIFROST_CONFIG")]
    config: Option<PathBuf>,

    /// Health-check every provider, print the result, and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    // stdout carries the protocol, so logs must go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.server.log_level)),
        )
        .init();

    let build = bifrost::build_info();
    info!(version = %build, built_at = build.built_at, "bifrostd starting");
    let gateway = Bifrost::builder().config(config).build().await?;

    if args.check {
        let health = gateway.initialize_all().await;
        for (name, ok) in &health {
            println!("{name}: {}", if *ok { "ok" } else { "FAILED" });
        }
        let all_ok = health.values().all(|ok| *ok);
        return Ok(if all_ok {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let health = gateway.initialize_all().await;
    let ready = health.values().filter(|ok| **ok).count();
    info!(ready, total = health.len(), "providers checked");

    bifrost::server::serve_stdio(Arc::new(gateway)).await?;
    info!("stdin closed, shutting down");
    Ok(ExitCode::SUCCESS)
}
