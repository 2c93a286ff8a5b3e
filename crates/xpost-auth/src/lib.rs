//! X (Twitter) OAuth 2.0 authentication library
//!
//! Provides PKCE flow generation, the single-slot in-flight session store,
//! token exchange/refresh, and identity lookup for the autopost service. This
//! crate is a standalone library with no dependency on the service binary —
//! it can be tested and used independently.
//!
//! Authorization flow:
//! 1. Service calls `OAuthClient::begin_authorization()` and shows the URL
//! 2. User authorizes in a browser; the platform redirects to the callback
//! 3. Callback calls `OAuthClient::complete_authorization(code, state)`
//! 4. The returned `AuthorizedUser` is persisted by the credential store
//! 5. `OAuthClient::refresh()` obtains new tokens when a post hits a 401

pub mod client;
pub mod constants;
pub mod error;
pub mod pkce;
pub mod session;
pub mod token;

pub use client::{AuthorizedUser, OAuthClient, OAuthConfig, UserInfo};
pub use constants::*;
pub use error::{Error, Result};
pub use pkce::{build_authorization_url, compute_challenge, generate_verifier};
pub use session::{PkceSession, SessionSlot};
pub use token::{TokenPair, TokenResponse, basic_auth_header};
