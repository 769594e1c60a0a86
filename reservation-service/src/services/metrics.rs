use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

static METRICS: OnceLock<Metrics> = OnceLock::new();

struct Metrics {
    registry: Registry,
    http_requests: IntCounterVec,
    http_duration: HistogramVec,
    reservations_created: IntCounterVec,
    reservation_rejections: IntCounterVec,
    oauth_handshakes: IntCounterVec,
}

impl Metrics {
    fn build() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests = IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP requests by route and status"),
            &["method", "path", "status"],
        )?;
        let http_duration = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request latency by route",
            ),
            &["method", "path"],
        )?;
        let reservations_created = IntCounterVec::new(
            Opts::new(
                "reservations_created_total",
                "Reservations created by derived status",
            ),
            &["status"],
        )?;
        let reservation_rejections = IntCounterVec::new(
            Opts::new(
                "reservation_rejections_total",
                "Rejected reservation requests by reason",
            ),
            &["reason"],
        )?;
        let oauth_handshakes = IntCounterVec::new(
            Opts::new(
                "oauth_handshakes_total",
                "OAuth handshake steps by outcome",
            ),
            &["step", "outcome"],
        )?;

        registry.register(Box::new(http_requests.clone()))?;
        registry.register(Box::new(http_duration.clone()))?;
        registry.register(Box::new(reservations_created.clone()))?;
        registry.register(Box::new(reservation_rejections.clone()))?;
        registry.register(Box::new(oauth_handshakes.clone()))?;

        Ok(Self {
            registry,
            http_requests,
            http_duration,
            reservations_created,
            reservation_rejections,
            oauth_handshakes,
        })
    }
}

/// Build the process registry. Later calls are no-ops.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if METRICS.get().is_some() {
        return Ok(());
    }
    let metrics = Metrics::build()?;
    // a concurrent initialiser may have won; either registry is fine
    let _ = METRICS.set(metrics);
    Ok(())
}

/// Prometheus text exposition of every registered metric.
pub fn get_metrics() -> String {
    let Some(metrics) = METRICS.get() else {
        return "# Metrics registry not initialized\n".to_string();
    };

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metrics.registry.gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_http_request(method: &str, path: &str, status: u16, seconds: f64) {
    if let Some(metrics) = METRICS.get() {
        metrics
            .http_requests
            .with_label_values(&[method, path, &status.to_string()])
            .inc();
        metrics
            .http_duration
            .with_label_values(&[method, path])
            .observe(seconds);
    }
}

pub fn record_reservation_created(status: &str) {
    if let Some(metrics) = METRICS.get() {
        metrics.reservations_created.with_label_values(&[status]).inc();
    }
}

pub fn record_reservation_rejected(reason: &str) {
    if let Some(metrics) = METRICS.get() {
        metrics
            .reservation_rejections
            .with_label_values(&[reason])
            .inc();
    }
}

pub fn record_handshake(step: &str, outcome: &str) {
    if let Some(metrics) = METRICS.get() {
        metrics
            .oauth_handshakes
            .with_label_values(&[step, outcome])
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposition_lists_recorded_series() {
        init_metrics().unwrap();
        init_metrics().unwrap();
        record_reservation_created("pending");
        record_handshake("request_token", "ok");

        let text = get_metrics();
        assert!(text.contains("reservations_created_total{status=\"pending\"}"));
        assert!(text.contains("oauth_handshakes_total"));
    }
}
