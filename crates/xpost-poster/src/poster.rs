//! Publish state machine and posting entry points
//!
//! A single publish attempt follows a bounded path: publish, and on a 401
//! refresh once, persist, retry once. There is no retry loop; the second
//! rejection is terminal and the user is flagged for re-authorization.

use std::sync::Arc;

use tracing::{debug, info, warn};

use xpost_auth::constants::TWEETS_PATH;
use xpost_auth::{OAuthClient, TokenPair};
use xpost_store::{Credential, Workbook};

/// Outcome of a posting attempt. Posting never propagates errors; every
/// fault ends up here as `success = false` with a diagnostic message.
#[derive(Debug, Clone)]
pub struct PostResult {
    pub success: bool,
    pub message: String,
    /// Platform id of the created post, on success
    pub post_id: Option<String>,
    /// Set when the attempt refreshed tokens (already persisted)
    pub new_tokens: Option<TokenPair>,
}

impl PostResult {
    fn success(message: impl Into<String>, post_id: Option<String>, new_tokens: Option<TokenPair>) -> Self {
        metrics::counter!("posts_total", "outcome" => "success").increment(1);
        Self {
            success: true,
            message: message.into(),
            post_id,
            new_tokens,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        metrics::counter!("posts_total", "outcome" => "failure").increment(1);
        Self {
            success: false,
            message: message.into(),
            post_id: None,
            new_tokens: None,
        }
    }
}

/// Classified response from one publish call.
enum PublishOutcome {
    /// 201 with the created post id (None if the body had no id)
    Created(Option<String>),
    /// 401: the access token was rejected, refresh may recover
    AuthRejected { status: u16, body: String },
    /// Any other non-success status: no retry
    Rejected { status: u16, body: String },
}

/// Publishes content as a specific user, refreshing expired tokens in-line.
pub struct Poster {
    http: reqwest::Client,
    api_url: String,
    auth: Arc<OAuthClient>,
    workbook: Arc<Workbook>,
}

impl Poster {
    pub fn new(
        api_url: String,
        auth: Arc<OAuthClient>,
        workbook: Arc<Workbook>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            http,
            api_url,
            auth,
            workbook,
        }
    }

    /// Publish `text` as `user_id`, refreshing on a 401 exactly once.
    ///
    /// On refresh the new pair is persisted to the workbook before the retry,
    /// and returned in `new_tokens`. All faults become failure results.
    pub async fn post(
        &self,
        access_token: &str,
        refresh_token: &str,
        text: &str,
        user_id: &str,
    ) -> PostResult {
        match self.publish(access_token, text).await {
            Ok(PublishOutcome::Created(post_id)) => {
                info!(user_id, post_id = post_id.as_deref().unwrap_or("<unknown>"), "post published");
                PostResult::success("post published", post_id, None)
            }
            Ok(PublishOutcome::AuthRejected { status, .. }) => {
                info!(user_id, status, "access token rejected, attempting refresh");
                self.refresh_and_retry(refresh_token, text, user_id).await
            }
            Ok(PublishOutcome::Rejected { status, body }) => {
                warn!(user_id, status, "publish rejected");
                PostResult::failure(format!("publish rejected ({status}): {body}"))
            }
            Err(msg) => {
                warn!(user_id, error = %msg, "publish request failed");
                PostResult::failure(msg)
            }
        }
    }

    /// The refresh-and-retry leg of the publish state machine.
    async fn refresh_and_retry(&self, refresh_token: &str, text: &str, user_id: &str) -> PostResult {
        let pair = match self.auth.refresh(refresh_token).await {
            Ok(pair) => {
                metrics::counter!("token_refreshes_total", "outcome" => "success").increment(1);
                pair
            }
            Err(e) => {
                metrics::counter!("token_refreshes_total", "outcome" => "failure").increment(1);
                warn!(user_id, error = %e, "token refresh failed, user needs re-authorization");
                return PostResult::failure(format!(
                    "token refresh failed, re-authorization required: {e}"
                ));
            }
        };

        // The pair is persisted before the retry; the retry result does not
        // change what is stored
        match self
            .workbook
            .update_tokens(
                user_id,
                pair.access_token.clone(),
                pair.refresh_token.clone(),
            )
            .await
        {
            Ok(true) => debug!(user_id, "refreshed tokens persisted"),
            Ok(false) => warn!(user_id, "no credential row to update after refresh"),
            Err(e) => warn!(user_id, error = %e, "failed to persist refreshed tokens"),
        }

        match self.publish(&pair.access_token, text).await {
            Ok(PublishOutcome::Created(post_id)) => {
                info!(user_id, post_id = post_id.as_deref().unwrap_or("<unknown>"), "post published after token refresh");
                PostResult::success("post published after token refresh", post_id, Some(pair))
            }
            Ok(PublishOutcome::AuthRejected { status, body })
            | Ok(PublishOutcome::Rejected { status, body }) => {
                warn!(user_id, status, "publish rejected after token refresh");
                PostResult::failure(format!(
                    "publish rejected after token refresh ({status}): {body}"
                ))
            }
            Err(msg) => {
                warn!(user_id, error = %msg, "publish retry failed");
                PostResult::failure(msg)
            }
        }
    }

    /// One publish call against the platform.
    async fn publish(&self, access_token: &str, text: &str) -> Result<PublishOutcome, String> {
        let response = self
            .http
            .post(format!("{}{}", self.api_url, TWEETS_PATH))
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| format!("publish request failed: {e}"))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        Ok(match status {
            201 => {
                let post_id = serde_json::from_str::<serde_json::Value>(&body)
                    .ok()
                    .and_then(|v| v["data"]["id"].as_str().map(str::to_string));
                PublishOutcome::Created(post_id)
            }
            401 => PublishOutcome::AuthRejected { status, body },
            _ => PublishOutcome::Rejected { status, body },
        })
    }

    /// Post one random entry from `channel` as `user_id`.
    ///
    /// Missing credentials and empty pools are failure results with a logged
    /// diagnostic, not errors.
    pub async fn post_random_for_user(&self, user_id: &str, channel: &str) -> PostResult {
        let user = match self.load_user(Some(user_id)).await {
            Ok(user) => user,
            Err(msg) => return PostResult::failure(msg),
        };
        self.post_content_for(&user, None, channel).await
    }

    /// Post one random entry from `channel` as the first stored user.
    ///
    /// Scheduled triggers run as the first user in the credentials table.
    pub async fn post_random_for_first_user(&self, channel: &str) -> PostResult {
        let user = match self.load_user(None).await {
            Ok(user) => user,
            Err(msg) => return PostResult::failure(msg),
        };
        self.post_content_for(&user, None, channel).await
    }

    /// Post as `user_id` with an optional literal text override; without one
    /// a random entry is drawn from `channel`.
    pub async fn post_for_user(
        &self,
        user_id: &str,
        custom_text: Option<&str>,
        channel: &str,
    ) -> PostResult {
        let user = match self.load_user(Some(user_id)).await {
            Ok(user) => user,
            Err(msg) => return PostResult::failure(msg),
        };
        self.post_content_for(&user, custom_text, channel).await
    }

    /// Resolve the posting text and delegate to `post`.
    async fn post_content_for(
        &self,
        user: &Credential,
        custom_text: Option<&str>,
        channel: &str,
    ) -> PostResult {
        let text = match custom_text {
            Some(text) => text.to_string(),
            None => match self.workbook.pick_random(channel).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(channel, error = %e, "no content to post");
                    return PostResult::failure(format!("no content to post: {e}"));
                }
            },
        };

        info!(user_name = %user.user_name, channel, "posting");
        self.post(&user.access_token, &user.refresh_token, &text, &user.user_id)
            .await
    }

    /// Load one user's credentials, or the first stored user's when `None`.
    ///
    /// A missing row (or a missing table) yields a diagnostic message the
    /// caller folds into its own failure shape.
    async fn load_user(&self, user_id: Option<&str>) -> Result<Credential, String> {
        let rows = match self.workbook.get_credentials(user_id).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "credential lookup failed");
                return Err(format!("credential lookup failed: {e}"));
            }
        };

        match rows.into_iter().next() {
            Some(user) => Ok(user),
            None => {
                let who = user_id.unwrap_or("<first user>");
                warn!(user_id = who, "no credentials stored");
                Err(format!("no credentials stored for {who}"))
            }
        }
    }

    /// Check a user's access token, refreshing and persisting once if it is
    /// no longer accepted. Returns final validity: true if the original token
    /// was valid or the refresh succeeded.
    pub async fn verify_and_refresh_token(&self, user_id: &str) -> bool {
        let user = match self.load_user(Some(user_id)).await {
            Ok(user) => user,
            Err(_) => return false,
        };

        if self.auth.verify_access_token(&user.access_token).await {
            debug!(user_id, "access token valid");
            return true;
        }

        info!(user_id, "access token invalid, attempting refresh");
        match self.auth.refresh(&user.refresh_token).await {
            Ok(pair) => {
                metrics::counter!("token_refreshes_total", "outcome" => "success").increment(1);
                match self
                    .workbook
                    .update_tokens(user_id, pair.access_token, pair.refresh_token)
                    .await
                {
                    Ok(_) => info!(user_id, "tokens refreshed and persisted"),
                    Err(e) => warn!(user_id, error = %e, "failed to persist refreshed tokens"),
                }
                true
            }
            Err(e) => {
                metrics::counter!("token_refreshes_total", "outcome" => "failure").increment(1);
                warn!(user_id, error = %e, "token refresh failed, user needs re-authorization");
                false
            }
        }
    }

    /// Run `verify_and_refresh_token` for every stored user.
    pub async fn verify_all_tokens(&self) -> Vec<(String, bool)> {
        let rows = match self.workbook.get_credentials(None).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "credential lookup failed");
                return Vec::new();
            }
        };

        let mut results = Vec::with_capacity(rows.len());
        for user in rows {
            let valid = self.verify_and_refresh_token(&user.user_id).await;
            info!(user_id = %user.user_id, user_name = %user.user_name, valid, "token checked");
            results.push((user.user_id, valid));
        }
        results
    }
}
