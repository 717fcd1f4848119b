//! The analysis conversation seam

use crate::analysis::session::Exchange;
use async_trait::async_trait;
use thiserror::Error;

/// Failure of one call to the analysis service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("quota exceeded: {0}")]
    Quota(String),

    #[error("service returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("response blocked: {0}")]
    Blocked(String),

    #[error("response contained no text")]
    EmptyResponse,

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ServiceError {
    /// Classifies a non-success HTTP status
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Auth(body),
            429 => Self::Quota(body),
            _ => Self::Http { status, body },
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// A stateless conversation endpoint
///
/// The caller owns the conversation: every call receives the exchanges that
/// make up the context so far plus the new message, so a session can be
/// persisted and replayed without hidden client-side state.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn send(&self, context: &[Exchange], message: &str) -> Result<String, ServiceError>;
}
