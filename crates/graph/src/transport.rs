//! HTTP transport seam for the drive protocol.
//!
//! `DriveTransport` is implemented over reqwest in production; tests
//! substitute scripted mocks. Using a trait keeps session and range logic
//! decoupled from the HTTP stack and testable without a server.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::token::TokenProvider;

/// Default per-call timeout for transport requests.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// `Content-Range` framing for one chunk request.
///
/// `last` is the inclusive end offset, matching the wire form
/// `bytes <start>-<last>/<total>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    pub last: u64,
    pub total: u64,
}

impl ContentRange {
    /// Number of payload bytes the header declares.
    pub fn byte_len(&self) -> u64 {
        self.last - self.start + 1
    }

    /// Renders the `Content-Range` header value.
    pub fn header_value(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.last, self.total)
    }
}

/// Status code and raw body of one HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as lossy UTF-8, for error details and logs.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserializes the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Errors raised below the HTTP status layer.
///
/// The split matters to callers: timeouts and connection failures are
/// transient and may be retried with identical bytes; anything else is not.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("no bearer token: {0}")]
    Token(#[from] crate::token::TokenError),

    #[error("transport error: {0}")]
    Other(String),
}

/// Abstract HTTP exchange used by [`SessionClient`] and [`RangeUploader`].
///
/// [`SessionClient`]: crate::session::SessionClient
/// [`RangeUploader`]: crate::range::RangeUploader
pub trait DriveTransport: Send + Sync {
    /// POSTs a JSON body with bearer auth and returns the raw reply.
    fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<HttpReply, TransportError>> + Send + '_>>;

    /// PUTs one chunk of payload bytes with `Content-Range` framing.
    ///
    /// No bearer token is attached: the session URL is pre-authenticated by
    /// the server when the session is created.
    fn put_range(
        &self,
        url: &str,
        range: ContentRange,
        body: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<HttpReply, TransportError>> + Send + '_>>;
}

/// Production transport over a shared reqwest client.
pub struct ReqwestTransport {
    http: reqwest::Client,
    token: Arc<dyn TokenProvider>,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Creates a transport with the default per-call timeout.
    pub fn new(token: Arc<dyn TokenProvider>) -> Self {
        Self::with_timeout(token, DEFAULT_CALL_TIMEOUT)
    }

    /// Creates a transport with an explicit per-call timeout.
    ///
    /// Timeouts are per network call; a whole-upload deadline is the
    /// caller's concern.
    pub fn with_timeout(token: Arc<dyn TokenProvider>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
            timeout,
        }
    }

    async fn execute(&self, req: reqwest::RequestBuilder) -> Result<HttpReply, TransportError> {
        let response = req.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(classify)?.to_vec();
        Ok(HttpReply { status, body })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connection(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

impl DriveTransport for ReqwestTransport {
    fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<HttpReply, TransportError>> + Send + '_>> {
        let url = url.to_string();
        let body = body.clone();
        Box::pin(async move {
            let token = self.token.bearer_token()?;
            let req = self
                .http
                .post(&url)
                .bearer_auth(token)
                .timeout(self.timeout)
                .json(&body);
            self.execute(req).await
        })
    }

    fn put_range(
        &self,
        url: &str,
        range: ContentRange,
        body: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<HttpReply, TransportError>> + Send + '_>> {
        let url = url.to_string();
        Box::pin(async move {
            let req = self
                .http
                .put(&url)
                .header(reqwest::header::CONTENT_LENGTH, body.len() as u64)
                .header(reqwest::header::CONTENT_RANGE, range.header_value())
                .timeout(self.timeout)
                .body(body);
            self.execute(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_range_header_format() {
        let r = ContentRange {
            start: 0,
            last: 25,
            total: 128,
        };
        assert_eq!(r.header_value(), "bytes 0-25/128");
        assert_eq!(r.byte_len(), 26);
    }

    #[test]
    fn content_range_final_chunk() {
        let r = ContentRange {
            start: 960_000,
            last: 999_999,
            total: 1_000_000,
        };
        assert_eq!(r.header_value(), "bytes 960000-999999/1000000");
        assert_eq!(r.byte_len(), 40_000);
    }

    #[test]
    fn reply_success_classification() {
        let ok = HttpReply {
            status: 202,
            body: Vec::new(),
        };
        assert!(ok.is_success());

        let not = HttpReply {
            status: 503,
            body: b"busy".to_vec(),
        };
        assert!(!not.is_success());
        assert_eq!(not.body_text(), "busy");
    }

    #[test]
    fn reply_json_parses_body() {
        #[derive(serde::Deserialize)]
        struct Probe {
            value: u32,
        }
        let reply = HttpReply {
            status: 200,
            body: br#"{"value": 7}"#.to_vec(),
        };
        assert_eq!(reply.json::<Probe>().unwrap().value, 7);
        assert!(
            HttpReply {
                status: 200,
                body: b"not json".to_vec()
            }
            .json::<Probe>()
            .is_err()
        );
    }
}
