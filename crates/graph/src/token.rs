//! Bearer-token acquisition seam.
//!
//! Token issuance and refresh live entirely outside this crate. The drive
//! client asks a `TokenProvider` for whatever credential is currently valid
//! before each session-create call; a rejected token surfaces as a fatal
//! HTTP 401, not as a retry.

/// Supplies a bearer token for outgoing drive calls.
pub trait TokenProvider: Send + Sync {
    fn bearer_token(&self) -> Result<String, TokenError>;
}

/// Errors from token acquisition.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("no credential available: {0}")]
    Unavailable(String),
}

/// A fixed, pre-acquired bearer token.
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl TokenProvider for StaticToken {
    fn bearer_token(&self) -> Result<String, TokenError> {
        if self.token.is_empty() {
            return Err(TokenError::Unavailable("empty static token".into()));
        }
        Ok(self.token.clone())
    }
}
