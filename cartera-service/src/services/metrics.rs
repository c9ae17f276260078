//! Prometheus metrics for cartera-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

/// Counter for HTTP requests by method, route and status.
pub static HTTP_REQUESTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "cartera_http_requests_total",
        "Total number of HTTP requests",
        &["method", "route", "status"]
    )
    .expect("Failed to register HTTP_REQUESTS")
});

/// Histogram for HTTP request duration by method and route.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "cartera_http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "route"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to register HTTP_REQUEST_DURATION")
});

/// Histogram for database query duration.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "cartera_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Counter for bookkeeping events (invoice created, payment recorded, ...).
pub static BOOKKEEPING_EVENTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "cartera_bookkeeping_events_total",
        "Total number of invoices, payments and batches registered",
        &["event"]
    )
    .expect("Failed to register BOOKKEEPING_EVENTS")
});

/// Counter for receipt emails by kind and outcome.
pub static RECEIPTS_SENT: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "cartera_receipts_total",
        "Total number of receipt emails attempted",
        &["kind", "outcome"]
    )
    .expect("Failed to register RECEIPTS_SENT")
});

/// Counter for supplier confirmations by kind.
pub static CONFIRMATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "cartera_confirmations_total",
        "Total number of supplier confirmation link visits",
        &["kind", "outcome"]
    )
    .expect("Failed to register CONFIRMATIONS")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&HTTP_REQUESTS);
    Lazy::force(&HTTP_REQUEST_DURATION);
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&BOOKKEEPING_EVENTS);
    Lazy::force(&RECEIPTS_SENT);
    Lazy::force(&CONFIRMATIONS);
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> Result<String, anyhow::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn record_http_request(method: &str, route: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS
        .with_label_values(&[method, route, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION
        .with_label_values(&[method, route])
        .observe(duration_secs);
}

pub fn record_event(event: &str) {
    BOOKKEEPING_EVENTS.with_label_values(&[event]).inc();
}

pub fn record_receipt(kind: &str, outcome: &str) {
    RECEIPTS_SENT.with_label_values(&[kind, outcome]).inc();
}

pub fn record_confirmation(kind: &str, outcome: &str) {
    CONFIRMATIONS.with_label_values(&[kind, outcome]).inc();
}
