//! Metrics collection and exposition.
//!
//! # Metrics
//! - `collatex_ws_connections_total` (counter): accepted WebSocket connections by `project_token`
//! - `collab_ws_sessions_active` (gauge): sessions currently open
//! - `collab_ws_rejections_total` (counter): refused upgrades by `reason`
//! - `collab_liveness_touch_failures_total` (counter): dropped liveness writes
//! - `collab_http_requests_total` (counter): HTTP responses by `method`, `status`
//!
//! # Design Decisions
//! - The recorder is owned by [`GatewayMetrics`] and injected, never installed globally
//! - Updates are atomic increments on the recorder's handles

use std::sync::Arc;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

use crate::project::RoomToken;

pub const WS_CONNECTIONS_TOTAL: &str = "collatex_ws_connections_total";
pub const WS_SESSIONS_ACTIVE: &str = "collab_ws_sessions_active";
pub const WS_REJECTIONS_TOTAL: &str = "collab_ws_rejections_total";
pub const LIVENESS_TOUCH_FAILURES_TOTAL: &str = "collab_liveness_touch_failures_total";
pub const HTTP_REQUESTS_TOTAL: &str = "collab_http_requests_total";

/// Process-wide metrics registry, cheap to clone.
#[derive(Clone)]
pub struct GatewayMetrics {
    recorder: Arc<PrometheusRecorder>,
    handle: PrometheusHandle,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let metrics = Self {
            recorder: Arc::new(recorder),
            handle,
        };
        metrics.describe();
        metrics
    }

    fn scoped<T>(&self, f: impl FnOnce() -> T) -> T {
        metrics::with_local_recorder(&*self.recorder, f)
    }

    fn describe(&self) {
        self.scoped(|| {
            metrics::describe_counter!(WS_CONNECTIONS_TOTAL, "Total websocket connections");
            metrics::describe_gauge!(WS_SESSIONS_ACTIVE, "Currently open websocket sessions");
            metrics::describe_counter!(WS_REJECTIONS_TOTAL, "Refused websocket upgrades");
            metrics::describe_counter!(
                LIVENESS_TOUCH_FAILURES_TOTAL,
                "Liveness updates that could not be written"
            );
            metrics::describe_counter!(HTTP_REQUESTS_TOTAL, "HTTP responses served");
        });
    }

    /// One accepted WebSocket connection for `room`.
    pub fn record_connection(&self, room: &RoomToken) {
        let token = room.to_string();
        self.scoped(|| {
            metrics::counter!(WS_CONNECTIONS_TOTAL, "project_token" => token).increment(1);
        });
    }

    pub fn session_opened(&self) {
        self.scoped(|| metrics::gauge!(WS_SESSIONS_ACTIVE).increment(1.0));
    }

    pub fn session_closed(&self) {
        self.scoped(|| metrics::gauge!(WS_SESSIONS_ACTIVE).decrement(1.0));
    }

    pub fn record_rejection(&self, reason: &'static str) {
        self.scoped(|| {
            metrics::counter!(WS_REJECTIONS_TOTAL, "reason" => reason).increment(1);
        });
    }

    pub fn record_touch_failure(&self) {
        self.scoped(|| metrics::counter!(LIVENESS_TOUCH_FAILURES_TOTAL).increment(1));
    }

    pub fn record_request(&self, method: &str, status: u16) {
        let method = method.to_string();
        let status = status.to_string();
        self.scoped(|| {
            metrics::counter!(HTTP_REQUESTS_TOTAL, "method" => method, "status" => status)
                .increment(1);
        });
    }

    /// Prometheus text exposition of every metric.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(rendered: &str, series: &str) -> Option<f64> {
        rendered
            .lines()
            .find_map(|line| line.strip_prefix(series)?.trim().parse().ok())
    }

    #[test]
    fn connection_counter_is_per_token() {
        let metrics = GatewayMetrics::new();
        let a = RoomToken::parse("ab12").unwrap();
        let b = RoomToken::parse("cd34").unwrap();

        metrics.record_connection(&a);
        metrics.record_connection(&a);
        metrics.record_connection(&b);

        let out = metrics.render();
        assert_eq!(sample(&out, r#"collatex_ws_connections_total{project_token="ab12"}"#), Some(2.0));
        assert_eq!(sample(&out, r#"collatex_ws_connections_total{project_token="cd34"}"#), Some(1.0));
    }

    #[test]
    fn registries_are_independent() {
        let one = GatewayMetrics::new();
        let two = GatewayMetrics::new();
        one.record_connection(&RoomToken::parse("ab12").unwrap());

        assert!(!two.render().contains("ab12"));
    }

    #[test]
    fn concurrent_increments_accumulate() {
        let metrics = GatewayMetrics::new();
        let room = RoomToken::parse("busy").unwrap();

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..100 {
                        metrics.record_connection(&room);
                    }
                });
            }
        });

        assert_eq!(
            sample(&metrics.render(), r#"collatex_ws_connections_total{project_token="busy"}"#),
            Some(800.0)
        );
    }

    #[test]
    fn session_gauge_tracks_open_sessions() {
        let metrics = GatewayMetrics::new();
        metrics.session_opened();
        metrics.session_opened();
        metrics.session_closed();
        assert_eq!(sample(&metrics.render(), "collab_ws_sessions_active"), Some(1.0));
    }
}
