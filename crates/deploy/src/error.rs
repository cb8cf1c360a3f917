//! Terminal outcomes and error kinds for a deploy invocation.

use drivedeploy_graph::{DriveItem, GraphError};

/// Why a deploy invocation failed.
///
/// Exactly one of these is produced per invocation; transient conditions
/// are retried internally and only surface here once their budget is spent.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Bad preconditions. Never retried and never reaches the network.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Session creation kept failing after the retry budget.
    #[error("could not create upload session: {0}")]
    SessionCreationFailed(#[source] GraphError),

    /// The remote session expired or disappeared mid-upload.
    #[error("upload session expired: {0}")]
    SessionExpired(String),

    /// A chunk was rejected outright or its retry budget ran out.
    #[error("transfer failed: {0}")]
    TransferFailed(String),

    /// The caller cancelled between chunks.
    #[error("cancelled")]
    Cancelled,
}

/// Terminal result of one deploy invocation.
#[derive(Debug)]
pub enum UploadOutcome {
    /// The item exists remotely; metadata as returned with the final chunk.
    Completed(DriveItem),
    /// The upload did not finish.
    Failed(DeployError),
}

impl UploadOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, UploadOutcome::Completed(_))
    }

    /// Converts into a `Result` for `?`-style call sites.
    pub fn into_result(self) -> Result<DriveItem, DeployError> {
        match self {
            UploadOutcome::Completed(item) => Ok(item),
            UploadOutcome::Failed(err) => Err(err),
        }
    }
}
