//! Platform endpoint constants
//!
//! Default endpoints for the X (Twitter) v2 API. The base URLs are
//! configuration (overridable for tests against a local mock server); the
//! paths under them are fixed by the platform. The client id and secret are
//! operator configuration, never constants.

/// Default authorization page URL (browser-facing)
pub const DEFAULT_AUTHORIZE_URL: &str = "https://twitter.com/i/oauth2/authorize";

/// Default API base URL (token endpoint, identity lookup, publishing)
pub const DEFAULT_API_URL: &str = "https://api.twitter.com";

/// Token endpoint path for code exchange and token refresh
pub const TOKEN_PATH: &str = "/2/oauth2/token";

/// Identity lookup path (`GET`, Bearer auth)
pub const USERS_ME_PATH: &str = "/2/users/me";

/// Publish endpoint path (`POST`, Bearer auth, JSON body)
pub const TWEETS_PATH: &str = "/2/tweets";

/// OAuth scopes requested during authorization.
/// `offline.access` is required: without it the platform issues no refresh
/// token and expired users would have to re-authorize by hand.
pub const DEFAULT_SCOPES: &str = "tweet.read tweet.write users.read offline.access";
