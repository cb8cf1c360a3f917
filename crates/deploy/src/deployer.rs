//! Local-input boundary: validate an artifact, open it, run the upload.
//!
//! This is the only component that touches local filesystem state. Remote
//! targeting is purely logical — the drive URL and item path never gain
//! local path semantics.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use drivedeploy_graph::transport::DriveTransport;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{DeployError, UploadOutcome};
use crate::orchestrator::UploadOrchestrator;
use crate::types::{DeployEvent, UploadConfig};

/// Deploys local artifacts to a remote drive.
///
/// One `Deployer` can run several uploads; each gets a fresh orchestrator
/// and shares only the transport and the cancellation token.
pub struct Deployer {
    transport: Arc<dyn DriveTransport>,
    drive_url: String,
    config: UploadConfig,
    cancel: CancellationToken,
    events_tx: mpsc::Sender<DeployEvent>,
    events_rx: Option<mpsc::Receiver<DeployEvent>>,
}

impl Deployer {
    /// Creates a deployer with default upload configuration.
    pub fn new(transport: Arc<dyn DriveTransport>, drive_url: impl Into<String>) -> Self {
        Self::with_config(transport, drive_url, UploadConfig::default())
    }

    /// Creates a deployer with explicit upload configuration.
    pub fn with_config(
        transport: Arc<dyn DriveTransport>,
        drive_url: impl Into<String>,
        config: UploadConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            transport,
            drive_url: drive_url.into(),
            config,
            cancel: CancellationToken::new(),
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    /// Takes the progress event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<DeployEvent>> {
        self.events_rx.take()
    }

    /// Returns a token that cancels in-flight uploads between chunks.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Uploads the file at `path`.
    ///
    /// The remote item path defaults to the file's own name at the drive
    /// root; `remote_path` overrides it. The file must exist, be a regular
    /// file, be readable, and be non-empty — all checked before any
    /// network traffic.
    pub async fn deploy_file(&self, path: &Path, remote_path: Option<&str>) -> UploadOutcome {
        let (file, total_len) = match open_artifact(path) {
            Ok(opened) => opened,
            Err(err) => return UploadOutcome::Failed(err),
        };

        let item_path = match remote_path {
            Some(explicit) => explicit.to_string(),
            None => match path.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => {
                    return UploadOutcome::Failed(DeployError::InvalidInput(format!(
                        "no file name in {}",
                        path.display()
                    )));
                }
            },
        };

        info!(
            artifact = %path.display(),
            item_path,
            total_len,
            "deploying artifact"
        );
        self.deploy(file, total_len, &item_path).await
    }

    /// Uploads an arbitrary readable source of exactly `total_len` bytes
    /// to `item_path`.
    pub async fn deploy<R>(&self, source: R, total_len: u64, item_path: &str) -> UploadOutcome
    where
        R: Read + Send + 'static,
    {
        let orchestrator = UploadOrchestrator::new(
            self.transport.clone(),
            &self.drive_url,
            self.config.clone(),
            self.cancel.clone(),
            self.events_tx.clone(),
        );
        orchestrator.run(source, total_len, item_path).await
    }
}

/// Validates and opens the artifact, returning the handle and exact length.
fn open_artifact(path: &Path) -> Result<(std::fs::File, u64), DeployError> {
    let meta = std::fs::metadata(path)
        .map_err(|e| DeployError::InvalidInput(format!("{}: {e}", path.display())))?;
    if !meta.is_file() {
        return Err(DeployError::InvalidInput(format!(
            "{} is not a regular file",
            path.display()
        )));
    }
    if meta.len() == 0 {
        return Err(DeployError::InvalidInput(format!(
            "{} is empty",
            path.display()
        )));
    }
    let file = std::fs::File::open(path)
        .map_err(|e| DeployError::InvalidInput(format!("{}: {e}", path.display())))?;
    Ok((file, meta.len()))
}
