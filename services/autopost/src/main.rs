//! X Autopost service
//!
//! Single-binary Rust service that:
//! 1. Serves the OAuth 2.0 + PKCE callback (authorize, complete, store)
//! 2. Posts channel content as stored users via one-shot trigger flags
//! 3. Verifies and refreshes stored tokens on demand
//!
//! Scheduling lives outside the process: cron (or any equivalent) invokes
//! the binary with `--post-random <channel>` or `--post-user <id>`.

mod config;
mod metrics;
mod pages;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metrics_exporter_prometheus::PrometheusHandle;

use xpost_auth::{OAuthClient, OAuthConfig};
use xpost_poster::{PostResult, Poster};
use xpost_store::{Credential, Workbook};

use crate::config::Config;

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    auth: Arc<OAuthClient>,
    workbook: Arc<Workbook>,
    public_url: String,
    prometheus: PrometheusHandle,
}

/// Build the axum router with the callback route and shared state.
///
/// Applies a concurrency limit layer based on `max_connections`; the
/// callback surface is operator-facing and needs no more than that.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/", get(callback_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting x-autopost");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = flag_value(&args, "--config");

    let config_path = Config::resolve_path(cli_config_path.as_deref());
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        api_url = %config.oauth.api_url,
        workbook = %config.store.workbook_path.display(),
        "configuration loaded"
    );

    let workbook = Arc::new(
        Workbook::load(config.store.workbook_path.clone(), config.store.header_mode)
            .await
            .context("failed to open workbook")?,
    );

    let client_secret = config
        .oauth
        .client_secret
        .clone()
        .context("client secret not resolved")?;

    let http = reqwest::Client::new();
    let auth = Arc::new(OAuthClient::new(
        OAuthConfig {
            client_id: config.oauth.client_id.clone(),
            client_secret,
            redirect_uri: config.oauth.public_url.clone(),
            authorize_url: config.oauth.authorize_url.clone(),
            api_url: config.oauth.api_url.clone(),
            scopes: config.oauth.scopes.clone(),
        },
        http.clone(),
    ));
    let poster = Poster::new(
        config.oauth.api_url.clone(),
        auth.clone(),
        workbook.clone(),
        http,
    );

    // One-shot trigger modes: act, log the outcome, exit 0. A posting
    // failure must not look like a crash to the scheduler; configuration
    // errors above still exit non-zero.
    if let Some(channel) = flag_value(&args, "--post-random") {
        let result = poster.post_random_for_first_user(&channel).await;
        log_post_result(&result);
        return Ok(());
    }
    if let Some(user_id) = flag_value(&args, "--post-user") {
        let text = flag_value(&args, "--text");
        let channel = flag_value(&args, "--channel")
            .unwrap_or_else(|| config.store.default_channel.clone());
        let result = poster.post_for_user(&user_id, text.as_deref(), &channel).await;
        log_post_result(&result);
        return Ok(());
    }
    if args.iter().any(|a| a == "--verify-tokens") {
        for (user_id, valid) in poster.verify_all_tokens().await {
            info!(user_id, valid, "token status");
        }
        return Ok(());
    }

    // Default mode: serve the OAuth callback
    let app_state = AppState {
        auth,
        workbook,
        public_url: config.oauth.public_url.clone(),
        prometheus: prometheus_handle,
    };
    let app = build_router(app_state, config.server.max_connections);

    let listener = TcpListener::bind(config.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.server.listen_addr))?;

    info!(addr = %config.server.listen_addr, "accepting requests");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

/// Extract the value following a `--flag` argument.
fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

/// Log a posting outcome at the appropriate level.
fn log_post_result(result: &PostResult) {
    if result.success {
        info!(
            post_id = result.post_id.as_deref().unwrap_or("<unknown>"),
            refreshed = result.new_tokens.is_some(),
            "post completed"
        );
    } else {
        error!(message = %result.message, "post failed");
    }
}

/// Query parameters of the single GET callback route.
#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// The callback route, dispatching on query parameters:
/// - `code` + `state`: complete the authorization and store credentials
/// - `error`: the platform denied authorization, render the reason
/// - neither: landing page with the callback URL and a fresh authorization URL
async fn callback_handler(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Html<String> {
    if let Some(err) = params.error {
        warn!(error = %err, "authorization denied by platform");
        metrics::record_callback("denied");
        return Html(pages::auth_error_page(&format!(
            "authorization was denied: {err}"
        )));
    }

    match (params.code, params.state) {
        (Some(code), Some(callback_state)) => {
            metrics::record_callback("completion");
            match state.auth.complete_authorization(&code, &callback_state).await {
                Ok(user) => {
                    let credential = Credential {
                        user_id: user.user_id.clone(),
                        user_name: user.user_name.clone(),
                        access_token: user.access_token,
                        refresh_token: user.refresh_token,
                    };
                    if let Err(e) = state.workbook.upsert_credentials(credential).await {
                        error!(error = %e, "failed to store credentials");
                        metrics::record_auth_completion("store_failure");
                        return Html(pages::auth_error_page(&format!(
                            "credentials could not be stored: {e}"
                        )));
                    }
                    info!(
                        user_id = %user.user_id,
                        user_name = %user.user_name,
                        "user authorized and stored"
                    );
                    metrics::record_auth_completion("success");
                    Html(pages::success_page(&user.user_name))
                }
                Err(e) => {
                    warn!(error = %e, "authorization completion failed");
                    metrics::record_auth_completion("failure");
                    Html(pages::auth_error_page(&e.to_string()))
                }
            }
        }
        _ => {
            metrics::record_callback("landing");
            let auth_url = state.auth.begin_authorization();
            Html(pages::landing_page(&state.public_url, &auth_url))
        }
    }
}

/// Health endpoint: JSON with status and the number of authorized users.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let users_authorized = state
        .workbook
        .get_credentials(None)
        .await
        .map(|rows| rows.len())
        .unwrap_or(0);

    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        serde_json::json!({
            "status": "healthy",
            "users_authorized": users_authorized,
        })
        .to_string(),
    )
}

/// Prometheus metrics endpoint — returns metrics in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
