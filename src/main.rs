//! Messej CLI
//!
//! Runs the daily digest pipeline once. Scheduling (cron or similar) is
//! external; two concurrent runs against the same state directory are not
//! supported.

use clap::Parser;
use messej::{MessejConfig, Pipeline};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Messej - daily digest email companion
#[derive(Parser, Debug)]
#[command(name = "messej")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// State directory holding memory, chat log and optional config.toml
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Path to the memory file
    #[arg(long)]
    memory_file: Option<PathBuf>,

    /// Path to the chat log file
    #[arg(long)]
    chat_log: Option<PathBuf>,

    /// Compose the digest but do not persist, send, or mark mail read
    #[arg(long)]
    dry_run: bool,

    /// Verbose output: show per-step debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let state_dir = match cli.state_dir {
        Some(dir) => dir,
        None => default_state_dir()?,
    };
    info!("Starting Messej digest run");
    info!("State directory: {:?}", state_dir);

    let mut config = MessejConfig::load(&state_dir).await?;
    if let Some(path) = cli.memory_file {
        config = config.with_memory_file(path);
    }
    if let Some(path) = cli.chat_log {
        config = config.with_chat_log_file(path);
    }

    let pipeline = Pipeline::new(config);
    let report = pipeline.run(cli.dry_run).await?;

    info!(
        "Digest '{}': {} replies processed, {} headlines, sent={}",
        report.subject, report.inbound, report.headlines, report.sent
    );
    Ok(())
}

/// Resolve the state directory: `MESSEJ_HOME`, else `~/.messej`.
fn default_state_dir() -> anyhow::Result<PathBuf> {
    if let Ok(dir) = std::env::var("MESSEJ_HOME") {
        return Ok(PathBuf::from(dir));
    }

    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
    Ok(home.join(".messej"))
}
