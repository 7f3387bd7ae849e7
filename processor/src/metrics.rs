//! Prometheus metrics for rivulet

use crate::error::{ProcessorError, Result};
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, HistogramVec, TextEncoder, register_counter,
    register_counter_vec, register_gauge, register_histogram_vec,
};
use std::sync::OnceLock;
use std::time::Duration;

/// Global metrics instance
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// All rivulet metrics
pub struct Metrics {
    // ─────────────────────────────────────────────────────────────────────────
    // Event counters
    // ─────────────────────────────────────────────────────────────────────────
    /// Events accepted into the input queue (by stream)
    pub events_received: CounterVec,

    /// Events (or pairs) dropped (by reason)
    pub events_dropped: CounterVec,

    // ─────────────────────────────────────────────────────────────────────────
    // Output
    // ─────────────────────────────────────────────────────────────────────────
    /// Dispatch attempts (by kind = publish|invoke, outcome = ok|error)
    pub dispatch_total: CounterVec,

    /// Dispatch duration in seconds (by kind)
    pub dispatch_duration_seconds: HistogramVec,

    // ─────────────────────────────────────────────────────────────────────────
    // Joiner
    // ─────────────────────────────────────────────────────────────────────────
    /// Closed windows (by outcome = emitted|empty|no_match|error)
    pub windows_total: CounterVec,

    /// Pairs that passed the join filter
    pub join_pairs_matched: Counter,

    // ─────────────────────────────────────────────────────────────────────────
    // Queues
    // ─────────────────────────────────────────────────────────────────────────
    /// Events waiting in the input queue
    pub input_queue_depth: Gauge,
}

impl Metrics {
    /// Initialize metrics (call once at startup)
    ///
    /// Returns error if metric registration fails.
    pub fn init() -> Result<&'static Metrics> {
        if let Some(metrics) = METRICS.get() {
            return Ok(metrics);
        }

        let metrics = Metrics {
            events_received: register_counter_vec!(
                "rivulet_events_received_total",
                "Total events accepted for processing",
                &["stream"]
            )
            .map_err(|e| ProcessorError::Metrics(format!("events_received: {e}")))?,

            events_dropped: register_counter_vec!(
                "rivulet_events_dropped_total",
                "Total events or pairs dropped",
                &["reason"]
            )
            .map_err(|e| ProcessorError::Metrics(format!("events_dropped: {e}")))?,

            dispatch_total: register_counter_vec!(
                "rivulet_dispatch_total",
                "Total output dispatch attempts",
                &["kind", "outcome"]
            )
            .map_err(|e| ProcessorError::Metrics(format!("dispatch_total: {e}")))?,

            dispatch_duration_seconds: register_histogram_vec!(
                "rivulet_dispatch_duration_seconds",
                "Time spent in a single publish or invoke",
                &["kind"],
                // Buckets: 1ms to 10s
                vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]
            )
            .map_err(|e| ProcessorError::Metrics(format!("dispatch_duration_seconds: {e}")))?,

            windows_total: register_counter_vec!(
                "rivulet_windows_total",
                "Total join windows closed",
                &["outcome"]
            )
            .map_err(|e| ProcessorError::Metrics(format!("windows_total: {e}")))?,

            join_pairs_matched: register_counter!(
                "rivulet_join_pairs_matched_total",
                "Total event pairs that passed the join filter"
            )
            .map_err(|e| ProcessorError::Metrics(format!("join_pairs_matched: {e}")))?,

            input_queue_depth: register_gauge!(
                "rivulet_input_queue_depth",
                "Events waiting in the input queue"
            )
            .map_err(|e| ProcessorError::Metrics(format!("input_queue_depth: {e}")))?,
        };

        // Set the metrics (only succeeds once)
        let _ = METRICS.set(metrics);

        METRICS
            .get()
            .ok_or_else(|| ProcessorError::Metrics("Failed to initialize metrics".to_string()))
    }

    /// Get the global metrics instance
    ///
    /// Returns None if metrics haven't been initialized yet.
    pub fn get() -> Option<&'static Metrics> {
        METRICS.get()
    }

    pub fn record_received(&self, stream: &str) {
        self.events_received.with_label_values(&[stream]).inc();
    }

    pub fn record_dropped(&self, reason: &str, count: u64) {
        self.events_dropped
            .with_label_values(&[reason])
            .inc_by(count as f64);
    }

    /// Record one publish/invoke attempt
    pub fn record_dispatch(&self, kind: &str, ok: bool, duration: Duration) {
        let outcome = if ok { "ok" } else { "error" };
        self.dispatch_total.with_label_values(&[kind, outcome]).inc();
        self.dispatch_duration_seconds
            .with_label_values(&[kind])
            .observe(duration.as_secs_f64());
    }

    pub fn record_window(&self, outcome: &str) {
        self.windows_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_pairs_matched(&self, count: usize) {
        self.join_pairs_matched.inc_by(count as f64);
    }

    pub fn set_queue_depth(&self, depth: usize) {
        self.input_queue_depth.set(depth as f64);
    }
}

/// Gather all metrics and encode as Prometheus text format
///
/// Returns the metrics as a String, ready to be served via HTTP.
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_ok() {
        String::from_utf8(buffer).unwrap_or_default()
    } else {
        String::new()
    }
}

// Recording helpers: no-ops until `Metrics::init` has run.

pub fn try_record_received(stream: &str) {
    if let Some(m) = Metrics::get() {
        m.record_received(stream);
    }
}

pub fn try_record_dropped(reason: &str, count: u64) {
    if let Some(m) = Metrics::get() {
        m.record_dropped(reason, count);
    }
}

pub fn try_record_dispatch(kind: &str, ok: bool, duration: Duration) {
    if let Some(m) = Metrics::get() {
        m.record_dispatch(kind, ok, duration);
    }
}

pub fn try_record_window(outcome: &str) {
    if let Some(m) = Metrics::get() {
        m.record_window(outcome);
    }
}

pub fn try_record_pairs_matched(count: usize) {
    if let Some(m) = Metrics::get() {
        m.record_pairs_matched(count);
    }
}

pub fn try_set_queue_depth(depth: usize) {
    if let Some(m) = Metrics::get() {
        m.set_queue_depth(depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_init_is_idempotent() {
        // Another test may have initialized already
        let first = Metrics::init();
        let second = Metrics::init();
        if let (Ok(a), Ok(b)) = (first, second) {
            assert!(std::ptr::eq(a, b));
        }
    }

    #[test]
    fn test_recording_shows_up_in_gather() {
        let _ = Metrics::init();
        if let Some(metrics) = Metrics::get() {
            metrics.record_received("orders");
            metrics.record_dropped("filtered", 2);
            metrics.record_dispatch("invoke", true, Duration::from_millis(3));
            metrics.record_window("emitted");
            metrics.record_pairs_matched(4);
            metrics.set_queue_depth(7);

            let text = gather();
            assert!(text.contains("rivulet_events_received_total"));
            assert!(text.contains("rivulet_dispatch_total"));
            assert!(text.contains("rivulet_join_pairs_matched_total"));
        }
    }

    #[test]
    fn test_try_helpers_never_panic() {
        try_record_received("orders");
        try_record_dropped("eval_error", 1);
        try_record_dispatch("publish", false, Duration::ZERO);
        try_record_window("empty");
        try_record_pairs_matched(0);
        try_set_queue_depth(0);
    }
}
