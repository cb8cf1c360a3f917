//! Upload session lifecycle: create, transmit ranges, retry, finish.

use std::collections::VecDeque;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use drivedeploy_graph::range::{FatalReason, RangeResult, RangeUploader};
use drivedeploy_graph::session::SessionClient;
use drivedeploy_graph::transport::{DriveTransport, TransportError};
use drivedeploy_graph::types::{DriveItem, UploadSession};
use drivedeploy_graph::GraphError;
use drivedeploy_transfer::{Chunk, ChunkPlanner, ChunkReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{DeployError, UploadOutcome};
use crate::types::{DeployEvent, UploadConfig};

/// Lifecycle states of one upload, for logging and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadState {
    Created,
    SessionOpen,
    Uploading,
}

/// Result of one chunk's retry loop.
enum ChunkOutcome {
    Acked {
        next_expected_ranges: Vec<drivedeploy_transfer::ExpectedRange>,
        expiration: Option<chrono::DateTime<Utc>>,
    },
    Finished(DriveItem),
}

/// Drives a single upload end to end.
///
/// `run` consumes the orchestrator: once a terminal outcome is produced,
/// no further operations can be issued against the instance. One
/// orchestrator owns its session, plan, and chunk buffers exclusively;
/// independent uploads run concurrently with no shared state beyond the
/// transport's connection pool.
pub struct UploadOrchestrator {
    sessions: SessionClient,
    ranges: RangeUploader,
    config: UploadConfig,
    cancel: CancellationToken,
    events_tx: mpsc::Sender<DeployEvent>,
    state: UploadState,
}

impl UploadOrchestrator {
    /// Creates an orchestrator for one upload against `drive_url`.
    pub fn new(
        transport: Arc<dyn DriveTransport>,
        drive_url: &str,
        config: UploadConfig,
        cancel: CancellationToken,
        events_tx: mpsc::Sender<DeployEvent>,
    ) -> Self {
        Self {
            sessions: SessionClient::new(transport.clone(), drive_url),
            ranges: RangeUploader::new(transport),
            config,
            cancel,
            events_tx,
            state: UploadState::Created,
        }
    }

    /// Runs the whole upload and returns the single terminal outcome.
    ///
    /// `total_len` must be the exact byte length of `source`; the server
    /// validates every chunk's framing against it.
    pub async fn run<R>(mut self, source: R, total_len: u64, item_path: &str) -> UploadOutcome
    where
        R: Read + Send + 'static,
    {
        match self.drive(source, total_len, item_path).await {
            Ok(item) => {
                info!(item = %item.name, id = %item.id, "deploy completed");
                let _ = self
                    .events_tx
                    .send(DeployEvent::Completed {
                        item_path: item_path.to_string(),
                    })
                    .await;
                UploadOutcome::Completed(item)
            }
            Err(err) => {
                error!(item_path, error = %err, "deploy failed");
                let _ = self
                    .events_tx
                    .send(DeployEvent::Failed {
                        item_path: item_path.to_string(),
                        error: err.to_string(),
                    })
                    .await;
                UploadOutcome::Failed(err)
            }
        }
    }

    async fn drive<R>(
        &mut self,
        source: R,
        total_len: u64,
        item_path: &str,
    ) -> Result<DriveItem, DeployError>
    where
        R: Read + Send + 'static,
    {
        // Preconditions fail before any network call.
        if item_path.trim_matches('/').is_empty() {
            return Err(DeployError::InvalidInput("item path is empty".into()));
        }
        let planner = ChunkPlanner::with_alignment(self.config.max_chunk_size, self.config.alignment)
            .map_err(|e| DeployError::InvalidInput(e.to_string()))?;
        let plan = planner
            .plan(total_len)
            .map_err(|e| DeployError::InvalidInput(e.to_string()))?;

        let mut session = self.open_session(item_path).await?;
        self.state = UploadState::SessionOpen;
        debug!(item_path, total_len, chunks = plan.ranges().len(), "session open");

        // The session's outstanding set is authoritative: ranges it no
        // longer expects are never transmitted, even on a fresh session.
        let mut queue: VecDeque<_> = plan
            .remaining(&session.next_expected_ranges)
            .ranges()
            .to_vec()
            .into();
        let mut bytes_done: u64 =
            total_len - queue.iter().map(|r| r.length as u64).sum::<u64>();
        let mut reader = ChunkReader::new(source);
        self.state = UploadState::Uploading;

        while let Some(range) = queue.pop_front() {
            self.ensure_not_cancelled()?;

            // An expired session must never be operated on.
            if session.is_expired(Utc::now()) {
                return Err(DeployError::SessionExpired(
                    "session expiration passed before the upload finished".into(),
                ));
            }

            // The server may merge ranges after an ack; skip what it
            // already holds.
            if !session.next_expected_ranges.iter().any(|e| e.overlaps(&range)) {
                bytes_done += range.length as u64;
                self.emit_progress(item_path, bytes_done, total_len).await;
                continue;
            }

            let (returned, read) = tokio::task::spawn_blocking(move || {
                let chunk = reader.read_range(range);
                (reader, chunk)
            })
            .await
            .map_err(|e| DeployError::TransferFailed(format!("read task failed: {e}")))?;
            reader = returned;
            let chunk = read.map_err(|e| DeployError::TransferFailed(e.to_string()))?;

            match self.send_with_retry(&session, &chunk, total_len).await? {
                ChunkOutcome::Acked {
                    next_expected_ranges,
                    expiration,
                } => {
                    session = session.accept(next_expected_ranges, expiration);
                    bytes_done += chunk.range.length as u64;
                    self.emit_progress(item_path, bytes_done, total_len).await;
                }
                ChunkOutcome::Finished(item) => {
                    bytes_done += chunk.range.length as u64;
                    self.emit_progress(item_path, bytes_done, total_len).await;
                    return Ok(item);
                }
            }
        }

        // Every range went out (or was already held) yet no reply carried
        // the item metadata.
        Err(DeployError::TransferFailed(
            "server holds all ranges but never reported the finished item".into(),
        ))
    }

    /// Opens the session, retrying only transient failures.
    async fn open_session(&self, item_path: &str) -> Result<UploadSession, DeployError> {
        debug_assert_eq!(self.state, UploadState::Created);
        let policy = self.config.session_retry;
        let mut attempt: u32 = 1;
        loop {
            self.ensure_not_cancelled()?;
            match self.sessions.create_session(item_path).await {
                Ok(session) => return Ok(session),
                Err(err) if session_error_is_retryable(&err) && policy.allows_retry(attempt) => {
                    warn!(attempt, error = %err, "session creation failed, will retry");
                    self.backoff(policy.delay_for_attempt(attempt)).await?;
                    attempt += 1;
                }
                Err(err) => return Err(DeployError::SessionCreationFailed(err)),
            }
        }
    }

    /// Sends one chunk, retrying transient failures with backoff.
    ///
    /// Retries re-send the same buffered bytes for the same range. When the
    /// budget runs out, session expiry decides the terminal kind.
    async fn send_with_retry(
        &self,
        session: &UploadSession,
        chunk: &Chunk,
        total_len: u64,
    ) -> Result<ChunkOutcome, DeployError> {
        let policy = self.config.chunk_retry;
        let mut attempt: u32 = 1;
        loop {
            match self.ranges.send_range(session, chunk, total_len).await {
                RangeResult::Accepted {
                    next_expected_ranges,
                    expiration,
                } => {
                    return Ok(ChunkOutcome::Acked {
                        next_expected_ranges,
                        expiration,
                    });
                }
                RangeResult::Completed(item) => return Ok(ChunkOutcome::Finished(item)),
                RangeResult::Retryable(reason) => {
                    warn!(
                        offset = chunk.range.offset,
                        attempt,
                        %reason,
                        "chunk send failed"
                    );
                    if !policy.allows_retry(attempt) {
                        if session.is_expired(Utc::now()) {
                            return Err(DeployError::SessionExpired(format!(
                                "session lapsed while retrying chunk at offset {}: {reason}",
                                chunk.range.offset
                            )));
                        }
                        return Err(DeployError::TransferFailed(format!(
                            "chunk at offset {} failed after {attempt} attempts: {reason}",
                            chunk.range.offset
                        )));
                    }
                    self.backoff(policy.delay_for_attempt(attempt)).await?;
                    // Never retry blindly against a session that lapsed
                    // during the backoff sleep.
                    if session.is_expired(Utc::now()) {
                        return Err(DeployError::SessionExpired(format!(
                            "session lapsed while retrying chunk at offset {}",
                            chunk.range.offset
                        )));
                    }
                    attempt += 1;
                }
                RangeResult::Fatal(FatalReason::SessionGone { status, detail }) => {
                    return Err(DeployError::SessionExpired(format!(
                        "HTTP {status}: {detail}"
                    )));
                }
                RangeResult::Fatal(FatalReason::Rejected { status, detail }) => {
                    let prefix = status.map(|s| format!("HTTP {s}: ")).unwrap_or_default();
                    return Err(DeployError::TransferFailed(format!("{prefix}{detail}")));
                }
            }
        }
    }

    /// Sleeps for `delay`, aborting early on cancellation.
    async fn backoff(&self, delay: Duration) -> Result<(), DeployError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(DeployError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    fn ensure_not_cancelled(&self) -> Result<(), DeployError> {
        if self.cancel.is_cancelled() {
            Err(DeployError::Cancelled)
        } else {
            Ok(())
        }
    }

    async fn emit_progress(&self, item_path: &str, bytes_done: u64, total_bytes: u64) {
        let _ = self
            .events_tx
            .send(DeployEvent::Progress {
                item_path: item_path.to_string(),
                bytes_done,
                total_bytes,
            })
            .await;
    }
}

fn session_error_is_retryable(err: &GraphError) -> bool {
    match err {
        GraphError::Transport(TransportError::Timeout | TransportError::Connection(_)) => true,
        GraphError::SessionCreation { status, .. } => {
            matches!(status, 408 | 429) || *status >= 500
        }
        _ => false,
    }
}
