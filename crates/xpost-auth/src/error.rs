//! Error types for OAuth authentication operations
//!
//! Protocol violations (`StateMismatch`, `MissingVerifier`) abort the flow and
//! must not be retried. Upstream rejections carry the HTTP status and body for
//! diagnosis.

/// Errors from OAuth authentication operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("state parameter mismatch - possible CSRF attack")]
    StateMismatch,

    #[error("no authorization in progress (PKCE verifier missing)")]
    MissingVerifier,

    #[error("token exchange failed ({status}): {body}")]
    TokenExchangeFailed { status: u16, body: String },

    #[error("token refresh failed ({status}): {body}")]
    RefreshFailed { status: u16, body: String },

    #[error("user info lookup failed ({status}): {body}")]
    UserInfoFailed { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Http(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
