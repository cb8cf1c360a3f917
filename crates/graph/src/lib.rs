//! Client for the drive's resumable upload protocol.
//!
//! Two operations make up the protocol: `createUploadSession` opens a
//! server-side session for a target item path, and ranged `PUT`s against
//! the returned session URL move the payload one chunk at a time. This
//! crate implements both behind the [`DriveTransport`] seam so the protocol
//! logic is testable without a server.

pub mod range;
pub mod session;
pub mod token;
pub mod transport;
pub mod types;

pub use range::{FatalReason, RangeResult, RangeUploader};
pub use session::SessionClient;
pub use token::{StaticToken, TokenError, TokenProvider};
pub use transport::{ContentRange, DriveTransport, HttpReply, ReqwestTransport, TransportError};
pub use types::{DriveItem, UploadSession};

/// Errors produced by the drive client.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("item path is empty")]
    EmptyItemPath,

    #[error("session creation failed (HTTP {status}): {detail}")]
    SessionCreation { status: u16, detail: String },

    #[error("malformed server response: {0}")]
    MalformedResponse(String),

    #[error("unparseable expected range: {0:?}")]
    BadExpectedRange(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}
