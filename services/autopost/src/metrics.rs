//! Prometheus metrics exposition
//!
//! Registers and exposes the service-level counters:
//!
//! - `callback_requests_total` (counter): label `kind` (landing, completion, denied)
//! - `auth_completions_total` (counter): label `outcome`
//!
//! The poster crate records `posts_total` and `token_refreshes_total` against
//! the same global recorder.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// The handle's `render()` method produces the Prometheus text exposition
/// format suitable for serving on a `/metrics` endpoint.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record a callback route hit with its dispatch kind.
pub fn record_callback(kind: &str) {
    metrics::counter!("callback_requests_total", "kind" => kind.to_string()).increment(1);
}

/// Record an authorization completion attempt.
pub fn record_auth_completion(outcome: &str) {
    metrics::counter!("auth_completions_total", "outcome" => outcome.to_string()).increment(1);
}
