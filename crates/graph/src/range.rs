//! Per-chunk range transmission and response classification.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use drivedeploy_transfer::{Chunk, ExpectedRange};
use tracing::{debug, trace};

use crate::session::server_detail;
use crate::transport::{ContentRange, DriveTransport, TransportError};
use crate::types::{ChunkAckResponse, DriveItem, UploadSession, parse_expected_ranges};

/// Disposition of one chunk transmission.
#[derive(Debug)]
pub enum RangeResult {
    /// Server acknowledged the range and reports what remains; the session
    /// snapshot must be replaced before the next chunk goes out.
    Accepted {
        next_expected_ranges: Vec<ExpectedRange>,
        expiration: Option<DateTime<Utc>>,
    },
    /// Final range accepted; the item now exists remotely.
    Completed(DriveItem),
    /// Transient failure; the identical bytes may be re-sent after a
    /// backoff delay.
    Retryable(String),
    /// Unrecoverable failure; the upload must be aborted.
    Fatal(FatalReason),
}

/// Why a chunk transmission cannot be retried.
#[derive(Debug)]
pub enum FatalReason {
    /// The server no longer knows the session (HTTP 404/410).
    SessionGone { status: u16, detail: String },
    /// Any other non-retryable condition: client errors, malformed
    /// responses, local invariant violations.
    Rejected {
        status: Option<u16>,
        detail: String,
    },
}

/// Transmits single chunks against a session's upload URL.
pub struct RangeUploader {
    transport: Arc<dyn DriveTransport>,
}

impl RangeUploader {
    pub fn new(transport: Arc<dyn DriveTransport>) -> Self {
        Self { transport }
    }

    /// Sends one chunk and interprets the server's reply.
    ///
    /// `chunk.data` must hold exactly `chunk.range.length` bytes: the
    /// framing headers are derived from the range, and a mismatch between
    /// declared and actual bytes is a local invariant violation, reported
    /// Fatal and never silently retried.
    pub async fn send_range(
        &self,
        session: &UploadSession,
        chunk: &Chunk,
        total_len: u64,
    ) -> RangeResult {
        if chunk.data.len() != chunk.range.length as usize {
            return RangeResult::Fatal(FatalReason::Rejected {
                status: None,
                detail: format!(
                    "chunk buffer holds {} bytes but range declares {}",
                    chunk.data.len(),
                    chunk.range.length
                ),
            });
        }

        let framing = ContentRange {
            start: chunk.range.offset,
            last: chunk.range.last(),
            total: total_len,
        };
        trace!(range = %framing.header_value(), "sending chunk");

        let reply = match self
            .transport
            .put_range(&session.upload_url, framing, chunk.data.clone())
            .await
        {
            Ok(reply) => reply,
            Err(TransportError::Timeout) => {
                return RangeResult::Retryable("request timed out".into());
            }
            Err(TransportError::Connection(detail)) => {
                return RangeResult::Retryable(format!("connection failed: {detail}"));
            }
            Err(err) => {
                return RangeResult::Fatal(FatalReason::Rejected {
                    status: None,
                    detail: err.to_string(),
                });
            }
        };

        match reply.status {
            200 | 201 => match reply.json::<DriveItem>() {
                Ok(item) => {
                    debug!(item = %item.name, size = item.size, "upload completed");
                    RangeResult::Completed(item)
                }
                Err(e) => RangeResult::Fatal(FatalReason::Rejected {
                    status: Some(reply.status),
                    detail: format!("malformed item metadata: {e}"),
                }),
            },
            202 => match reply.json::<ChunkAckResponse>() {
                Ok(ack) => match parse_expected_ranges(&ack.next_expected_ranges) {
                    Ok(ranges) => RangeResult::Accepted {
                        next_expected_ranges: ranges,
                        expiration: ack.expiration_date_time,
                    },
                    Err(e) => RangeResult::Fatal(FatalReason::Rejected {
                        status: Some(202),
                        detail: e.to_string(),
                    }),
                },
                Err(e) => RangeResult::Fatal(FatalReason::Rejected {
                    status: Some(202),
                    detail: format!("malformed chunk ack: {e}"),
                }),
            },
            status @ (404 | 410) => RangeResult::Fatal(FatalReason::SessionGone {
                status,
                detail: server_detail(&reply),
            }),
            status @ (408 | 429) => {
                RangeResult::Retryable(format!("server asked to retry (HTTP {status})"))
            }
            status if status >= 500 => {
                RangeResult::Retryable(format!("server error (HTTP {status})"))
            }
            status => RangeResult::Fatal(FatalReason::Rejected {
                status: Some(status),
                detail: server_detail(&reply),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::HttpReply;
    use drivedeploy_transfer::ChunkRange;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    /// Scripted transport recording every PUT it sees.
    struct MockTransport {
        replies: Mutex<Vec<Result<HttpReply, TransportError>>>,
        puts: Mutex<Vec<(String, ContentRange, Vec<u8>)>>,
    }

    impl MockTransport {
        fn new(replies: Vec<Result<HttpReply, TransportError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                puts: Mutex::new(Vec::new()),
            }
        }
    }

    impl DriveTransport for MockTransport {
        fn post_json(
            &self,
            _url: &str,
            _body: &serde_json::Value,
        ) -> Pin<Box<dyn Future<Output = Result<HttpReply, TransportError>> + Send + '_>> {
            Box::pin(async { Err(TransportError::Other("unexpected POST".into())) })
        }

        fn put_range(
            &self,
            url: &str,
            range: ContentRange,
            body: Vec<u8>,
        ) -> Pin<Box<dyn Future<Output = Result<HttpReply, TransportError>> + Send + '_>> {
            self.puts
                .lock()
                .unwrap()
                .push((url.to_string(), range, body));
            Box::pin(async move {
                let mut replies = self.replies.lock().unwrap();
                if replies.is_empty() {
                    Err(TransportError::Other("no scripted reply".into()))
                } else {
                    replies.remove(0)
                }
            })
        }
    }

    fn session() -> UploadSession {
        UploadSession {
            upload_url: "https://up.example.com/session/abc".into(),
            expiration: None,
            next_expected_ranges: vec![ExpectedRange { start: 0, end: None }],
        }
    }

    fn chunk(offset: u64, data: &[u8]) -> Chunk {
        Chunk {
            range: ChunkRange {
                offset,
                length: data.len() as u32,
            },
            data: data.to_vec(),
        }
    }

    fn ack_reply(next: &str) -> HttpReply {
        HttpReply {
            status: 202,
            body: format!(r#"{{"nextExpectedRanges": ["{next}"]}}"#).into_bytes(),
        }
    }

    #[tokio::test]
    async fn accepted_carries_next_ranges_and_framing_is_exact() {
        let transport = Arc::new(MockTransport::new(vec![Ok(ack_reply("26-"))]));
        let uploader = RangeUploader::new(transport.clone());

        let result = uploader
            .send_range(&session(), &chunk(0, &[7u8; 26]), 128)
            .await;

        match result {
            RangeResult::Accepted {
                next_expected_ranges,
                ..
            } => {
                assert_eq!(
                    next_expected_ranges,
                    vec![ExpectedRange { start: 26, end: None }]
                );
            }
            other => panic!("expected Accepted, got {other:?}"),
        }

        let puts = transport.puts.lock().unwrap();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].0, "https://up.example.com/session/abc");
        assert_eq!(puts[0].1.header_value(), "bytes 0-25/128");
        assert_eq!(puts[0].2.len(), 26);
    }

    #[tokio::test]
    async fn final_chunk_completes_with_item_metadata() {
        let transport = Arc::new(MockTransport::new(vec![Ok(HttpReply {
            status: 201,
            body: br#"{"id": "item1", "name": "app.jar", "size": 128}"#.to_vec(),
        })]));
        let uploader = RangeUploader::new(transport);

        let result = uploader
            .send_range(&session(), &chunk(100, &[1u8; 28]), 128)
            .await;

        match result {
            RangeResult::Completed(item) => {
                assert_eq!(item.id, "item1");
                assert_eq!(item.size, 128);
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeouts_and_resets_are_retryable() {
        for err in [
            TransportError::Timeout,
            TransportError::Connection("reset by peer".into()),
        ] {
            let transport = Arc::new(MockTransport::new(vec![Err(err)]));
            let uploader = RangeUploader::new(transport);
            let result = uploader.send_range(&session(), &chunk(0, b"xy"), 2).await;
            assert!(matches!(result, RangeResult::Retryable(_)));
        }
    }

    #[tokio::test]
    async fn server_errors_are_retryable() {
        for status in [500u16, 502, 503, 429, 408] {
            let transport = Arc::new(MockTransport::new(vec![Ok(HttpReply {
                status,
                body: Vec::new(),
            })]));
            let uploader = RangeUploader::new(transport);
            let result = uploader.send_range(&session(), &chunk(0, b"xy"), 2).await;
            assert!(
                matches!(result, RangeResult::Retryable(_)),
                "HTTP {status} should be retryable"
            );
        }
    }

    #[tokio::test]
    async fn gone_session_is_fatal_with_session_gone() {
        for status in [404u16, 410] {
            let transport = Arc::new(MockTransport::new(vec![Ok(HttpReply {
                status,
                body: br#"{"error": {"code": "itemNotFound", "message": "gone"}}"#.to_vec(),
            })]));
            let uploader = RangeUploader::new(transport);
            let result = uploader.send_range(&session(), &chunk(0, b"xy"), 2).await;
            match result {
                RangeResult::Fatal(FatalReason::SessionGone { status: s, .. }) => {
                    assert_eq!(s, status);
                }
                other => panic!("expected SessionGone for {status}, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn client_errors_are_fatal() {
        for status in [400u16, 401, 403, 409, 416] {
            let transport = Arc::new(MockTransport::new(vec![Ok(HttpReply {
                status,
                body: Vec::new(),
            })]));
            let uploader = RangeUploader::new(transport);
            let result = uploader.send_range(&session(), &chunk(0, b"xy"), 2).await;
            assert!(
                matches!(result, RangeResult::Fatal(FatalReason::Rejected { .. })),
                "HTTP {status} should be fatal"
            );
        }
    }

    #[tokio::test]
    async fn length_mismatch_is_fatal_before_any_network() {
        let transport = Arc::new(MockTransport::new(vec![Ok(ack_reply("2-"))]));
        let uploader = RangeUploader::new(transport.clone());

        let bad = Chunk {
            range: ChunkRange { offset: 0, length: 4 },
            data: b"xy".to_vec(),
        };
        let result = uploader.send_range(&session(), &bad, 4).await;
        assert!(matches!(
            result,
            RangeResult::Fatal(FatalReason::Rejected { status: None, .. })
        ));
        assert!(transport.puts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_ack_is_fatal() {
        let transport = Arc::new(MockTransport::new(vec![Ok(HttpReply {
            status: 202,
            body: b"not json".to_vec(),
        })]));
        let uploader = RangeUploader::new(transport);
        let result = uploader.send_range(&session(), &chunk(0, b"xy"), 2).await;
        assert!(matches!(result, RangeResult::Fatal(_)));
    }

    #[tokio::test]
    async fn retry_resends_identical_bytes() {
        let transport = Arc::new(MockTransport::new(vec![
            Ok(HttpReply {
                status: 503,
                body: Vec::new(),
            }),
            Ok(ack_reply("26-")),
        ]));
        let uploader = RangeUploader::new(transport.clone());
        let c = chunk(0, &[42u8; 26]);

        let first = uploader.send_range(&session(), &c, 128).await;
        assert!(matches!(first, RangeResult::Retryable(_)));
        let second = uploader.send_range(&session(), &c, 128).await;
        assert!(matches!(second, RangeResult::Accepted { .. }));

        let puts = transport.puts.lock().unwrap();
        assert_eq!(puts.len(), 2);
        assert_eq!(puts[0].2, puts[1].2, "retried bytes must be identical");
        assert_eq!(puts[0].1, puts[1].1, "retried framing must be identical");
    }
}
