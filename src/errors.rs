//! Error types shared by the store, the session coordinator and the gateway.

use reqwest::StatusCode;
use thiserror::Error;

/// Failures of the credential store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("credential file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("credential file is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Why a session renewal did not produce a new access token.
///
/// Cloneable so a single failed renewal can be handed to every request
/// that was queued behind it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenewalError {
    #[error("no session to renew: refresh token is missing")]
    NoRefreshToken,
    #[error("renewal endpoint unreachable: {0}")]
    Transport(String),
    #[error("renewal endpoint rejected the refresh token with status {status}")]
    Rejected { status: u16 },
    #[error("renewal endpoint returned an unexpected body: {0}")]
    MalformedResponse(String),
    #[error("failed to persist renewed access token: {0}")]
    Store(String),
    #[error("renewal was abandoned before it completed")]
    Abandoned,
}

impl RenewalError {
    /// Abandonment says nothing about the refresh token, so it never ends the session.
    pub fn ends_session(&self) -> bool {
        !matches!(self, RenewalError::Abandoned)
    }
}

/// Errors surfaced to whoever issued a request through the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("session could not be renewed: {0}")]
    Renewal(#[from] RenewalError),
    #[error("request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid request url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("refusing to send to an absolute url: {0}")]
    AbsoluteUrl(String),
    #[error("failed to encode request body: {0}")]
    Encode(String),
    #[error("failed to decode response body: {0}")]
    Decode(String),
    #[error("credential store error: {0}")]
    Store(#[from] StoreError),
}

impl GatewayError {
    /// The HTTP status carried by a non-success response, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GatewayError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}
