//! The OAuth client: authorization flow, token refresh, identity lookup
//!
//! Owns the HTTP client, the endpoint configuration, and the single-slot
//! PKCE session. `begin_authorization` is purely local (no network);
//! `complete_authorization` validates the callback against the stored session
//! before any token exchange, and consumes the session on every path.

use common::Secret;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::constants::{TOKEN_PATH, USERS_ME_PATH};
use crate::error::{Error, Result};
use crate::pkce;
use crate::session::{PkceSession, SessionSlot};
use crate::token::{TokenPair, TokenResponse, basic_auth_header};

/// OAuth client configuration.
///
/// `authorize_url` and `api_url` default to the real platform but are plain
/// configuration so tests (and staging setups) can point at another host.
/// `redirect_uri` is this service's own callback endpoint and must match the
/// URI registered with the platform.
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub redirect_uri: String,
    pub authorize_url: String,
    pub api_url: String,
    pub scopes: String,
}

/// Identity returned by the platform's `users/me` lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    data: UserInfo,
}

/// Result of a completed authorization: the token pair plus the identity of
/// the user who authorized, ready for the credential store.
#[derive(Debug, Clone)]
pub struct AuthorizedUser {
    pub user_id: String,
    pub user_name: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// OAuth 2.0 + PKCE client for the X API.
pub struct OAuthClient {
    http: reqwest::Client,
    config: OAuthConfig,
    session: SessionSlot,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            config,
            session: SessionSlot::new(),
        }
    }

    /// Start an authorization: generate a fresh PKCE pair and state token,
    /// store them as the in-flight session (overwriting any prior one), and
    /// return the authorization URL to show the operator. No network call.
    pub fn begin_authorization(&self) -> String {
        let verifier = pkce::generate_verifier();
        let challenge = pkce::compute_challenge(&verifier);
        let state = uuid::Uuid::new_v4().to_string();

        let url = pkce::build_authorization_url(
            &self.config.authorize_url,
            &self.config.client_id,
            &self.config.redirect_uri,
            &self.config.scopes,
            &state,
            &challenge,
        );

        self.session.store(PkceSession { verifier, state });
        debug!("authorization started, PKCE session stored");
        url
    }

    /// Complete an authorization from the callback's `code` and `state`.
    ///
    /// The session is taken out of the slot before anything else, so the
    /// flow cannot be replayed whether this succeeds or fails. The state
    /// check happens before any token exchange.
    pub async fn complete_authorization(&self, code: &str, state: &str) -> Result<AuthorizedUser> {
        let session = self.session.take().ok_or(Error::MissingVerifier)?;

        if state != session.state {
            warn!("callback state does not match in-flight session");
            return Err(Error::StateMismatch);
        }

        let token = self.exchange_code(code, &session.verifier).await?;

        // The flow requests offline.access; a credential without a refresh
        // token could never be refreshed, so treat its absence as a failure.
        let refresh_token = token.refresh_token.ok_or_else(|| Error::TokenExchangeFailed {
            status: 200,
            body: "token response omitted refresh_token (offline.access not granted?)".into(),
        })?;

        let user = self.fetch_user_info(&token.access_token).await?;
        info!(user_id = %user.id, user_name = %user.username, "authorization completed");

        Ok(AuthorizedUser {
            user_id: user.id,
            user_name: user.username,
            access_token: token.access_token,
            refresh_token,
        })
    }

    /// Exchange an authorization code for tokens (PKCE step two).
    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<TokenResponse> {
        let response = self
            .http
            .post(format!("{}{}", self.config.api_url, TOKEN_PATH))
            .header(
                reqwest::header::AUTHORIZATION,
                basic_auth_header(&self.config.client_id, self.config.client_secret.expose()),
            )
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.config.client_id.as_str()),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("code_verifier", verifier),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(Error::TokenExchangeFailed {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| Error::TokenExchangeFailed {
                status: status.as_u16(),
                body: format!("invalid token response: {e}"),
            })
    }

    /// Refresh an access token using a refresh token.
    ///
    /// The returned pair keeps the input refresh token when the platform
    /// does not rotate it.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let response = self
            .http
            .post(format!("{}{}", self.config.api_url, TOKEN_PATH))
            .header(
                reqwest::header::AUTHORIZATION,
                basic_auth_header(&self.config.client_id, self.config.client_secret.expose()),
            )
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.config.client_id.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(Error::RefreshFailed {
                status: status.as_u16(),
                body,
            });
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| Error::RefreshFailed {
                status: status.as_u16(),
                body: format!("invalid refresh response: {e}"),
            })?;

        Ok(TokenPair {
            access_token: token.access_token,
            refresh_token: token
                .refresh_token
                .unwrap_or_else(|| refresh_token.to_string()),
        })
    }

    /// Check whether an access token is currently accepted by the platform.
    ///
    /// Performs the identity lookup; true iff it succeeds. Never errors:
    /// network failures and non-success statuses both yield false.
    pub async fn verify_access_token(&self, access_token: &str) -> bool {
        match self.fetch_user_info(access_token).await {
            Ok(user) => {
                debug!(user_id = %user.id, "access token verified");
                true
            }
            Err(e) => {
                debug!(error = %e, "access token verification failed");
                false
            }
        }
    }

    /// Fetch the authenticated user's identity via `GET /2/users/me`.
    async fn fetch_user_info(&self, access_token: &str) -> Result<UserInfo> {
        let response = self
            .http
            .get(format!("{}{}", self.config.api_url, USERS_ME_PATH))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::Http(format!("user info request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(Error::UserInfoFailed {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<UserInfoResponse>()
            .await
            .map(|r| r.data)
            .map_err(|e| Error::UserInfoFailed {
                status: status.as_u16(),
                body: format!("invalid user info response: {e}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use tokio::net::TcpListener;

    use crate::constants::{DEFAULT_AUTHORIZE_URL, DEFAULT_SCOPES};
    use crate::pkce::compute_challenge;

    /// Expected Basic header for client-123:secret-456.
    fn expected_basic() -> String {
        basic_auth_header("client-123", "secret-456")
    }

    fn test_client(api_url: &str) -> OAuthClient {
        OAuthClient::new(
            OAuthConfig {
                client_id: "client-123".into(),
                client_secret: Secret::new("secret-456".to_string()),
                redirect_uri: "https://example.com/callback".into(),
                authorize_url: DEFAULT_AUTHORIZE_URL.into(),
                api_url: api_url.into(),
                scopes: DEFAULT_SCOPES.into(),
            },
            reqwest::Client::new(),
        )
    }

    /// Extract a raw query parameter value from a URL.
    fn query_param(url: &str, key: &str) -> Option<String> {
        let (_, query) = url.split_once('?')?;
        query.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            (k == key).then(|| v.to_string())
        })
    }

    /// Serve the given router on an ephemeral local port.
    async fn start_mock_platform(app: Router) -> (String, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let url = format!("http://{addr}");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (url, handle)
    }

    /// Mock token + users/me endpoints for the happy authorization path.
    /// The token handler rejects requests missing the Basic header or the
    /// expected form fields, so a passing flow proves the request shape.
    fn happy_platform() -> Router {
        Router::new()
            .route(
                "/2/oauth2/token",
                post(|headers: HeaderMap, body: String| async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default();
                    if auth != expected_basic() {
                        return (StatusCode::UNAUTHORIZED, "bad basic auth".to_string());
                    }
                    if !body.contains("grant_type=authorization_code")
                        || !body.contains("code=auth-code")
                        || !body.contains("code_verifier=")
                        || !body.contains("redirect_uri=https%3A%2F%2Fexample.com%2Fcallback")
                    {
                        return (StatusCode::BAD_REQUEST, format!("bad form body: {body}"));
                    }
                    (
                        StatusCode::OK,
                        r#"{"access_token":"at_new","refresh_token":"rt_new"}"#.to_string(),
                    )
                }),
            )
            .route(
                "/2/users/me",
                get(|headers: HeaderMap| async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default();
                    if auth != "Bearer at_new" {
                        return (StatusCode::UNAUTHORIZED, "bad bearer".to_string());
                    }
                    (
                        StatusCode::OK,
                        r#"{"data":{"id":"12345","username":"poster","name":"Post Er"}}"#
                            .to_string(),
                    )
                }),
            )
    }

    #[test]
    fn begin_authorization_stores_matching_session() {
        let client = test_client("http://unused.invalid");
        let url = client.begin_authorization();

        let session = client.session.take().expect("session stored");
        assert_eq!(
            query_param(&url, "state").as_deref(),
            Some(session.state.as_str()),
            "state in URL must match the stored session"
        );
        assert_eq!(
            query_param(&url, "code_challenge").as_deref(),
            Some(compute_challenge(&session.verifier).as_str()),
            "challenge in URL must be base64url(SHA-256(stored verifier))"
        );
    }

    #[tokio::test]
    async fn complete_without_begin_is_missing_verifier() {
        let client = test_client("http://unused.invalid");
        let err = client
            .complete_authorization("auth-code", "some-state")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingVerifier), "got: {err:?}");
    }

    #[tokio::test]
    async fn second_begin_invalidates_first_session() {
        let client = test_client("http://unused.invalid");
        let first_url = client.begin_authorization();
        let first_state = query_param(&first_url, "state").unwrap();

        let _second_url = client.begin_authorization();

        let err = client
            .complete_authorization("auth-code", &first_state)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StateMismatch), "got: {err:?}");
    }

    #[tokio::test]
    async fn state_mismatch_precedes_exchange_and_clears_session() {
        // api_url points nowhere; the state check must fail before any
        // network call is attempted
        let client = test_client("http://127.0.0.1:9");
        let _url = client.begin_authorization();

        let err = client
            .complete_authorization("auth-code", "wrong-state")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StateMismatch), "got: {err:?}");

        // The failed completion consumed the session
        let err = client
            .complete_authorization("auth-code", "wrong-state")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingVerifier), "got: {err:?}");
    }

    #[tokio::test]
    async fn complete_authorization_returns_tokens_and_identity() {
        let (url, _server) = start_mock_platform(happy_platform()).await;
        let client = test_client(&url);

        let auth_url = client.begin_authorization();
        let state = query_param(&auth_url, "state").unwrap();

        let user = client
            .complete_authorization("auth-code", &state)
            .await
            .unwrap();
        assert_eq!(user.user_id, "12345");
        assert_eq!(user.user_name, "poster");
        assert_eq!(user.access_token, "at_new");
        assert_eq!(user.refresh_token, "rt_new");
    }

    #[tokio::test]
    async fn successful_completion_clears_session() {
        let (url, _server) = start_mock_platform(happy_platform()).await;
        let client = test_client(&url);

        let auth_url = client.begin_authorization();
        let state = query_param(&auth_url, "state").unwrap();

        client
            .complete_authorization("auth-code", &state)
            .await
            .unwrap();

        let err = client
            .complete_authorization("auth-code", &state)
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::MissingVerifier),
            "replaying the callback must fail: {err:?}"
        );
    }

    #[tokio::test]
    async fn failed_exchange_carries_status_and_body() {
        let app = Router::new().route(
            "/2/oauth2/token",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    r#"{"error":"invalid_grant"}"#.to_string(),
                )
            }),
        );
        let (url, _server) = start_mock_platform(app).await;
        let client = test_client(&url);

        let auth_url = client.begin_authorization();
        let state = query_param(&auth_url, "state").unwrap();

        let err = client
            .complete_authorization("bad-code", &state)
            .await
            .unwrap_err();
        match err {
            Error::TokenExchangeFailed { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("invalid_grant"), "got: {body}");
            }
            other => panic!("expected TokenExchangeFailed, got {other:?}"),
        }

        // Failure also consumed the session
        let err = client
            .complete_authorization("bad-code", &state)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingVerifier));
    }

    #[tokio::test]
    async fn exchange_without_refresh_token_is_an_error() {
        let app = Router::new().route(
            "/2/oauth2/token",
            post(|| async { (StatusCode::OK, r#"{"access_token":"at_only"}"#.to_string()) }),
        );
        let (url, _server) = start_mock_platform(app).await;
        let client = test_client(&url);

        let auth_url = client.begin_authorization();
        let state = query_param(&auth_url, "state").unwrap();

        let err = client
            .complete_authorization("auth-code", &state)
            .await
            .unwrap_err();
        match err {
            Error::TokenExchangeFailed { body, .. } => {
                assert!(body.contains("refresh_token"), "got: {body}");
            }
            other => panic!("expected TokenExchangeFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn user_info_failure_surfaces_after_exchange() {
        let app = Router::new()
            .route(
                "/2/oauth2/token",
                post(|| async {
                    (
                        StatusCode::OK,
                        r#"{"access_token":"at_new","refresh_token":"rt_new"}"#.to_string(),
                    )
                }),
            )
            .route(
                "/2/users/me",
                get(|| async { (StatusCode::FORBIDDEN, "forbidden".to_string()) }),
            );
        let (url, _server) = start_mock_platform(app).await;
        let client = test_client(&url);

        let auth_url = client.begin_authorization();
        let state = query_param(&auth_url, "state").unwrap();

        let err = client
            .complete_authorization("auth-code", &state)
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::UserInfoFailed { status: 403, .. }),
            "got: {err:?}"
        );
    }

    #[tokio::test]
    async fn refresh_returns_rotated_pair() {
        let app = Router::new().route(
            "/2/oauth2/token",
            post(|headers: HeaderMap, body: String| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                if auth != expected_basic() {
                    return (StatusCode::UNAUTHORIZED, "bad basic auth".to_string());
                }
                if !body.contains("grant_type=refresh_token") || !body.contains("refresh_token=rt_old")
                {
                    return (StatusCode::BAD_REQUEST, format!("bad form body: {body}"));
                }
                (
                    StatusCode::OK,
                    r#"{"access_token":"at_new","refresh_token":"rt_rotated"}"#.to_string(),
                )
            }),
        );
        let (url, _server) = start_mock_platform(app).await;
        let client = test_client(&url);

        let pair = client.refresh("rt_old").await.unwrap();
        assert_eq!(pair.access_token, "at_new");
        assert_eq!(pair.refresh_token, "rt_rotated");
    }

    #[tokio::test]
    async fn refresh_keeps_prior_token_when_response_omits_it() {
        let app = Router::new().route(
            "/2/oauth2/token",
            post(|| async { (StatusCode::OK, r#"{"access_token":"at_new"}"#.to_string()) }),
        );
        let (url, _server) = start_mock_platform(app).await;
        let client = test_client(&url);

        let pair = client.refresh("rt_keep").await.unwrap();
        assert_eq!(pair.access_token, "at_new");
        assert_eq!(
            pair.refresh_token, "rt_keep",
            "omitted refresh_token must fall back to the input token"
        );
    }

    #[tokio::test]
    async fn refresh_failure_carries_status_and_body() {
        let app = Router::new().route(
            "/2/oauth2/token",
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    r#"{"error":"invalid_token"}"#.to_string(),
                )
            }),
        );
        let (url, _server) = start_mock_platform(app).await;
        let client = test_client(&url);

        let err = client.refresh("rt_revoked").await.unwrap_err();
        match err {
            Error::RefreshFailed { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("invalid_token"), "got: {body}");
            }
            other => panic!("expected RefreshFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn verify_access_token_true_on_success() {
        let app = Router::new().route(
            "/2/users/me",
            get(|| async {
                (
                    StatusCode::OK,
                    r#"{"data":{"id":"1","username":"u","name":"n"}}"#.to_string(),
                )
            }),
        );
        let (url, _server) = start_mock_platform(app).await;
        let client = test_client(&url);

        assert!(client.verify_access_token("at_valid").await);
    }

    #[tokio::test]
    async fn verify_access_token_false_on_rejection() {
        let app = Router::new().route(
            "/2/users/me",
            get(|| async { (StatusCode::UNAUTHORIZED, "expired".to_string()) }),
        );
        let (url, _server) = start_mock_platform(app).await;
        let client = test_client(&url);

        assert!(!client.verify_access_token("at_expired").await);
    }

    #[tokio::test]
    async fn verify_access_token_false_on_network_error() {
        // Nothing listens here; the lookup must fail closed, not panic
        let client = test_client("http://127.0.0.1:9");
        assert!(!client.verify_access_token("at_any").await);
    }
}
