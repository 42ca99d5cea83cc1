//! Prometheus recorder install and `/metrics` endpoint rendering.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at server startup before any metrics are recorded.
pub fn install_recorder() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants documenting the scrape surface. The counters are
// recorded inside steno-relay; the session gauge at the socket layer here.

/// Relay sessions started (counter).
pub const RELAY_SESSIONS_TOTAL: &str = "relay_sessions_total";
/// Terminal session failures (counter, labels: kind).
pub const RELAY_SESSION_FAILURES_TOTAL: &str = "relay_session_failures_total";
/// Audio bytes forwarded to the engine (counter).
pub const RELAY_AUDIO_BYTES_TOTAL: &str = "relay_audio_bytes_total";
/// Engine replies forwarded to clients (counter).
pub const RELAY_REPLIES_TOTAL: &str = "relay_replies_total";
/// Currently open relay sessions (gauge).
pub const RELAY_SESSIONS_ACTIVE: &str = "relay_sessions_active";
