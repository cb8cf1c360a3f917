//! Command-line entry point for deploying artifacts to a remote drive.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use drivedeploy_deploy::{DeployEvent, Deployer, RetryPolicy, UploadConfig, UploadOutcome};
use drivedeploy_graph::{ReqwestTransport, StaticToken};
use drivedeploy_transfer::{DEFAULT_CHUNK_SIZE, SpeedCalculator};

/// Deploys a build artifact to a drive endpoint using resumable upload
/// sessions.
#[derive(Debug, Parser)]
#[command(name = "drivedeploy", version, about)]
struct Cli {
    /// Local artifact to deploy.
    artifact: PathBuf,

    /// Base URL of the target drive (service root + drive reference).
    #[arg(long, env = "DRIVEDEPLOY_DRIVE_URL")]
    drive_url: String,

    /// Remote item path; defaults to the artifact's file name.
    #[arg(long)]
    remote_path: Option<String>,

    /// Bearer token for the session-create call.
    #[arg(long, env = "DRIVEDEPLOY_TOKEN", hide_env_values = true)]
    token: String,

    /// Chunk size in bytes; must be a positive multiple of 320 KiB.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: u32,

    /// Per-network-call timeout in seconds.
    #[arg(long, default_value_t = 120)]
    call_timeout: u64,

    /// Maximum attempts per chunk and per session create.
    #[arg(long, default_value_t = 5)]
    max_attempts: u32,

    /// Refuse to deploy (build-tool offline mode).
    #[arg(long, env = "DRIVEDEPLOY_OFFLINE")]
    offline: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    if let Err(err) = run(Cli::parse()).await {
        error!("{err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if cli.offline {
        bail!("cannot deploy artifacts in offline mode");
    }

    let retry = RetryPolicy {
        max_attempts: cli.max_attempts,
        ..RetryPolicy::default()
    };
    let config = UploadConfig {
        max_chunk_size: cli.chunk_size,
        session_retry: retry,
        chunk_retry: retry,
        ..UploadConfig::default()
    };

    let transport = Arc::new(ReqwestTransport::with_timeout(
        Arc::new(StaticToken::new(cli.token.clone())),
        Duration::from_secs(cli.call_timeout),
    ));
    let mut deployer = Deployer::with_config(transport, cli.drive_url.clone(), config);

    let events = deployer.take_events().context("event channel taken")?;
    let progress = tokio::spawn(report_progress(events));

    info!(artifact = %cli.artifact.display(), "deploying via {}", cli.drive_url);
    let outcome = deployer
        .deploy_file(&cli.artifact, cli.remote_path.as_deref())
        .await;
    drop(deployer);
    let _ = progress.await;

    match outcome {
        UploadOutcome::Completed(item) => {
            info!(id = %item.id, name = %item.name, size = item.size, "artifact deployed");
            Ok(())
        }
        UploadOutcome::Failed(err) => Err(err.into()),
    }
}

/// Logs progress lines with speed and ETA until the deploy finishes.
async fn report_progress(mut events: tokio::sync::mpsc::Receiver<DeployEvent>) {
    let mut speed = SpeedCalculator::default();
    let mut last_done = 0u64;

    while let Some(event) = events.recv().await {
        match event {
            DeployEvent::Progress {
                bytes_done,
                total_bytes,
                ..
            } => {
                speed.record(bytes_done.saturating_sub(last_done));
                last_done = bytes_done;

                let percent = 100.0 * bytes_done as f64 / total_bytes as f64;
                let rate = speed.bytes_per_second() / (1024.0 * 1024.0);
                match speed.eta(total_bytes - bytes_done) {
                    Some(eta) => info!(
                        "{percent:5.1}% ({bytes_done}/{total_bytes} bytes, {rate:.2} MiB/s, ~{}s left)",
                        eta.as_secs()
                    ),
                    None => info!("{percent:5.1}% ({bytes_done}/{total_bytes} bytes)"),
                }
            }
            DeployEvent::Completed { item_path } => {
                info!("upload of {item_path} complete");
            }
            DeployEvent::Failed { item_path, error } => {
                error!("upload of {item_path} failed: {error}");
            }
        }
    }
}
