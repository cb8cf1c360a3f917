//! Upload session creation.

use std::sync::Arc;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use tracing::debug;

use crate::GraphError;
use crate::transport::{DriveTransport, HttpReply};
use crate::types::{CreateSessionRequest, UploadSession, UploadableProperties};

/// Characters escaped inside item path segments.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Opens resumable upload sessions against a drive endpoint.
///
/// No retries happen here: a failed create surfaces verbatim and the
/// orchestrator decides whether the whole call is worth repeating.
pub struct SessionClient {
    transport: Arc<dyn DriveTransport>,
    drive_url: String,
}

impl SessionClient {
    /// Creates a client for the drive rooted at `drive_url`
    /// (service root + drive reference, no trailing slash).
    pub fn new(transport: Arc<dyn DriveTransport>, drive_url: impl Into<String>) -> Self {
        let mut drive_url = drive_url.into();
        while drive_url.ends_with('/') {
            drive_url.pop();
        }
        Self {
            transport,
            drive_url,
        }
    }

    /// Opens an upload session for `item_path`, relative to the drive root.
    ///
    /// The path is logical: forward-slash separated, no local filesystem
    /// semantics. Fails with [`GraphError::SessionCreation`] on any
    /// non-success status, carrying the status and server error body.
    pub async fn create_session(&self, item_path: &str) -> Result<UploadSession, GraphError> {
        let path = item_path.trim_matches('/');
        if path.is_empty() {
            return Err(GraphError::EmptyItemPath);
        }

        let url = format!(
            "{}/root:/{}:/createUploadSession",
            self.drive_url,
            encode_item_path(path)
        );
        let request = CreateSessionRequest {
            item: UploadableProperties {
                name: None,
                conflict_behavior: Some("replace".into()),
            },
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| GraphError::MalformedResponse(e.to_string()))?;

        debug!(url = %url, "creating upload session");
        let reply = self.transport.post_json(&url, &body).await?;

        if !reply.is_success() {
            return Err(GraphError::SessionCreation {
                status: reply.status,
                detail: server_detail(&reply),
            });
        }

        let parsed = reply
            .json()
            .map_err(|e| GraphError::MalformedResponse(format!("session body: {e}")))?;
        let session = UploadSession::from_response(parsed)?;
        debug!(
            expires = ?session.expiration,
            outstanding = session.next_expected_ranges.len(),
            "upload session created"
        );
        Ok(session)
    }
}

/// Extracts the server's error message, falling back to the raw body.
pub(crate) fn server_detail(reply: &HttpReply) -> String {
    match reply.json::<crate::types::DriveErrorResponse>() {
        Ok(envelope) => format!("{}: {}", envelope.error.code, envelope.error.message),
        Err(_) => reply.body_text(),
    }
}

fn encode_item_path(path: &str) -> String {
    path.split('/')
        .map(|seg| utf8_percent_encode(seg, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}
