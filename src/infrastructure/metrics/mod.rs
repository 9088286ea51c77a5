//! Prometheus Metrics Module
//!
//! # Metrics Collected
//! - HTTP request counts by method, path, and status
//! - HTTP request latency histograms
//! - Active gateway sessions
//! - Gateway events delivered, by event name
//! - Client events received, by event name and outcome
//! - Messages persisted, by entry point

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

const NAMESPACE: &str = "campus_chat";

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// HTTP request counter - tracks total requests by method, path, and status code
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests").namespace(NAMESPACE),
        &["method", "path", "status"],
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric")
});

/// HTTP request latency histogram - tracks request duration in seconds
pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
    HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        )
        .namespace(NAMESPACE)
        .buckets(buckets),
        &["method", "path"],
    )
    .expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric")
});

/// Authenticated gateway sessions on this instance
pub static GATEWAY_SESSIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new(
            "gateway_sessions_active",
            "Number of authenticated WebSocket sessions",
        )
        .namespace(NAMESPACE),
    )
    .expect("Failed to create GATEWAY_SESSIONS_ACTIVE metric")
});

/// Events written to local sessions
pub static GATEWAY_EVENTS_DELIVERED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "gateway_events_delivered_total",
            "Server events delivered to local sessions",
        )
        .namespace(NAMESPACE),
        &["event"],
    )
    .expect("Failed to create GATEWAY_EVENTS_DELIVERED_TOTAL metric")
});

/// Frames received from clients
pub static GATEWAY_CLIENT_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("gateway_client_events_total", "Client events received").namespace(NAMESPACE),
        &["event", "outcome"],
    )
    .expect("Failed to create GATEWAY_CLIENT_EVENTS_TOTAL metric")
});

/// Messages stored, labelled by the surface that accepted them
pub static MESSAGES_SENT_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("messages_sent_total", "Messages persisted").namespace(NAMESPACE),
        &["via"],
    )
    .expect("Failed to create MESSAGES_SENT_TOTAL metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("Failed to register HTTP_REQUESTS_TOTAL");
    registry
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");
    registry
        .register(Box::new(GATEWAY_SESSIONS_ACTIVE.clone()))
        .expect("Failed to register GATEWAY_SESSIONS_ACTIVE");
    registry
        .register(Box::new(GATEWAY_EVENTS_DELIVERED_TOTAL.clone()))
        .expect("Failed to register GATEWAY_EVENTS_DELIVERED_TOTAL");
    registry
        .register(Box::new(GATEWAY_CLIENT_EVENTS_TOTAL.clone()))
        .expect("Failed to register GATEWAY_CLIENT_EVENTS_TOTAL");
    registry
        .register(Box::new(MESSAGES_SENT_TOTAL.clone()))
        .expect("Failed to register MESSAGES_SENT_TOTAL");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to record HTTP request metrics
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

pub fn set_gateway_sessions(count: usize) {
    GATEWAY_SESSIONS_ACTIVE.set(count as i64);
}

pub fn record_event_delivered(event: &str, recipients: usize) {
    if recipients > 0 {
        GATEWAY_EVENTS_DELIVERED_TOTAL
            .with_label_values(&[event])
            .inc_by(recipients as u64);
    }
}

pub fn record_client_event(event: &str, ok: bool) {
    GATEWAY_CLIENT_EVENTS_TOTAL
        .with_label_values(&[event, if ok { "ok" } else { "error" }])
        .inc();
}

/// `via` is `"gateway"` or `"http"`.
pub fn record_message_sent(via: &str) {
    MESSAGES_SENT_TOTAL.with_label_values(&[via]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        let _ = &*REGISTRY;
        let _ = &*GATEWAY_SESSIONS_ACTIVE;
        let _ = &*GATEWAY_EVENTS_DELIVERED_TOTAL;
    }

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/health", 200, 0.001);
        let metrics = gather_metrics();
        assert!(metrics.contains("campus_chat_http_requests_total"));
    }

    #[test]
    fn test_record_gateway_events() {
        record_event_delivered("message:new", 3);
        record_client_event("room:join", false);
        let metrics = gather_metrics();
        assert!(metrics.contains("campus_chat_gateway_events_delivered_total"));
        assert!(metrics.contains("outcome=\"error\""));
    }
}
