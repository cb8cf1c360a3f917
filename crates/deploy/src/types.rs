//! Configuration and progress events for the deploy flow.

use drivedeploy_transfer::DEFAULT_CHUNK_SIZE;

use crate::retry::RetryPolicy;

/// Tuning knobs for one upload.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Upper bound for each transmitted range. Must be a positive multiple
    /// of `alignment`.
    pub max_chunk_size: u32,
    /// Alignment unit the server mandates for non-final chunks.
    pub alignment: u32,
    /// Retry schedule for `createUploadSession` calls.
    pub session_retry: RetryPolicy,
    /// Retry schedule for each chunk PUT.
    pub chunk_retry: RetryPolicy,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_CHUNK_SIZE,
            alignment: drivedeploy_transfer::CHUNK_ALIGNMENT,
            session_retry: RetryPolicy::default(),
            chunk_retry: RetryPolicy::default(),
        }
    }
}

/// Progress event emitted while a deploy runs.
#[derive(Debug, Clone)]
pub enum DeployEvent {
    /// Bytes acknowledged so far, including server-held ranges skipped on
    /// resume.
    Progress {
        item_path: String,
        bytes_done: u64,
        total_bytes: u64,
    },
    /// The upload reached its terminal Completed state.
    Completed { item_path: String },
    /// The upload reached its terminal Failed state.
    Failed { item_path: String, error: String },
}

impl DeployEvent {
    /// Completion fraction in `[0.0, 1.0]` for progress events.
    pub fn fraction(&self) -> Option<f64> {
        match self {
            DeployEvent::Progress {
                bytes_done,
                total_bytes,
                ..
            } if *total_bytes > 0 => Some(*bytes_done as f64 / *total_bytes as f64),
            _ => None,
        }
    }
}
