//! Wire types for the drive upload endpoint.
//!
//! All wire structs use camelCase field names to match the server's JSON.
//! The client-side [`UploadSession`] snapshot is separate from the wire
//! form: ranges arrive as strings (`"26-"`, `"26-100"`) and are parsed once
//! at the protocol boundary.

use chrono::{DateTime, Utc};
use drivedeploy_transfer::ExpectedRange;
use serde::{Deserialize, Serialize};

use crate::GraphError;

/// Properties of the item to create, sent in the session-create body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadableProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        rename = "@microsoft.graph.conflictBehavior",
        skip_serializing_if = "Option::is_none"
    )]
    pub conflict_behavior: Option<String>,
}

/// Body of the `createUploadSession` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub item: UploadableProperties,
}

/// Body of a successful `createUploadSession` reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSessionResponse {
    pub upload_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_expected_ranges: Vec<String>,
}

/// Body of a `202 Accepted` chunk reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkAckResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_expected_ranges: Vec<String>,
}

/// Metadata of the created item, returned with the final chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    #[serde(default, rename = "eTag", skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

/// Standard error envelope returned by the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveErrorResponse {
    pub error: DriveErrorDetail,
}

/// Code and message inside the error envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveErrorDetail {
    pub code: String,
    pub message: String,
}

/// Client-side snapshot of a remote upload session.
///
/// The session is shared mutable state between client and server; this
/// snapshot is immutable and replaced wholesale via [`accept`] after each
/// acknowledged chunk, so progress observed by the orchestrator is always
/// server-authoritative.
///
/// [`accept`]: UploadSession::accept
#[derive(Debug, Clone, PartialEq)]
pub struct UploadSession {
    /// Pre-authenticated URL chunks are PUT against.
    pub upload_url: String,
    /// Instant after which the server may discard the session.
    pub expiration: Option<DateTime<Utc>>,
    /// Ranges the server still expects, ascending. Empty means complete.
    pub next_expected_ranges: Vec<ExpectedRange>,
}

impl UploadSession {
    /// Parses the wire reply into a session snapshot.
    pub fn from_response(body: UploadSessionResponse) -> Result<Self, GraphError> {
        Ok(Self {
            upload_url: body.upload_url,
            expiration: body.expiration_date_time,
            next_expected_ranges: parse_expected_ranges(&body.next_expected_ranges)?,
        })
    }

    /// True once the expiration instant has passed.
    ///
    /// Sessions without a reported expiration never expire client-side;
    /// the server still answers 404/410 once it forgets them.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_some_and(|exp| now > exp)
    }

    /// True when the server reports no outstanding ranges.
    pub fn is_complete(&self) -> bool {
        self.next_expected_ranges.is_empty()
    }

    /// Applies a chunk acknowledgement, returning the replacement snapshot.
    ///
    /// A missing expiration in the ack keeps the previous one; servers only
    /// send the field when they extend it.
    pub fn accept(
        &self,
        next_expected_ranges: Vec<ExpectedRange>,
        expiration: Option<DateTime<Utc>>,
    ) -> UploadSession {
        UploadSession {
            upload_url: self.upload_url.clone(),
            expiration: expiration.or(self.expiration),
            next_expected_ranges,
        }
    }
}

/// Parses one `nextExpectedRanges` entry.
///
/// Accepted forms: `"26-"` (open-ended) and `"26-100"` (inclusive end).
pub fn parse_expected_range(raw: &str) -> Result<ExpectedRange, GraphError> {
    let bad = || GraphError::BadExpectedRange(raw.to_string());

    let (start, end) = raw.split_once('-').ok_or_else(bad)?;
    let start: u64 = start.parse().map_err(|_| bad())?;
    let end = match end {
        "" => None,
        bounded => {
            let end: u64 = bounded.parse().map_err(|_| bad())?;
            if end < start {
                return Err(bad());
            }
            Some(end)
        }
    };
    Ok(ExpectedRange { start, end })
}

/// Parses the full `nextExpectedRanges` array.
pub fn parse_expected_ranges(raw: &[String]) -> Result<Vec<ExpectedRange>, GraphError> {
    raw.iter().map(|s| parse_expected_range(s)).collect()
}
