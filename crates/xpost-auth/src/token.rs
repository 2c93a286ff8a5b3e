//! Token endpoint request building and response types
//!
//! The token endpoint takes a form-encoded body authenticated with
//! `Authorization: Basic base64(client_id:client_secret)` for both grant
//! types (authorization_code and refresh_token). The header builder lives
//! here so it can be tested without network I/O.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Build the `Authorization: Basic` header value for token endpoint calls.
pub fn basic_auth_header(client_id: &str, client_secret: &str) -> String {
    let credentials = STANDARD.encode(format!("{client_id}:{client_secret}"));
    format!("Basic {credentials}")
}

/// Response from the token endpoint for both exchange and refresh.
///
/// The platform does not always rotate the refresh token on refresh, so
/// `refresh_token` is optional; the caller falls back to the token it sent.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// An access/refresh token pair as persisted per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}
