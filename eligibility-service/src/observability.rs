use std::{collections::HashMap, sync::Mutex};

use tracing_subscriber::EnvFilter;

// ── Ingestion ───────────────────────────────────────────────────

/// Counter: envelopes taken off a topic. Labels: topic.
pub const ENVELOPES_RECEIVED_TOTAL: &str = "eligibility_envelopes_received_total";

/// Counter: envelopes without an inner payload, skipped on purpose. Labels: topic.
pub const ENVELOPES_SKIPPED_TOTAL: &str = "eligibility_envelopes_skipped_total";

/// Counter: envelopes whose payload could not be decoded. Labels: topic.
pub const ENVELOPES_MALFORMED_TOTAL: &str = "eligibility_envelopes_malformed_total";

/// Counter: decoded events of a type this service does not act on. Labels: topic.
pub const EVENTS_UNHANDLED_TOTAL: &str = "eligibility_events_unhandled_total";

/// Counter: batches that failed and were handed back for redelivery. Labels: topic.
pub const BATCHES_FAILED_TOTAL: &str = "eligibility_batches_failed_total";

/// Counter: `POST /ingest/{topic}` requests for a known topic. Labels: topic.
pub const HTTP_INGEST_REQUESTS_TOTAL: &str = "eligibility_http_ingest_requests_total";

/// Counter: HTTP batches answered with an error status. Labels: topic.
pub const HTTP_INGEST_FAILED_TOTAL: &str = "eligibility_http_ingest_failed_total";

/// Counter: backfill lines that are not an envelope. Labels: source.
pub const BACKFILL_PARSE_ERRORS_TOTAL: &str = "eligibility_backfill_parse_errors_total";

// ── Evaluation ──────────────────────────────────────────────────

/// Counter: evaluation runs started. Labels: entry.
pub const EVALUATIONS_TOTAL: &str = "eligibility_evaluations_total";

/// Counter: evaluation runs that returned an error. Labels: entry.
pub const EVALUATION_FAILURES_TOTAL: &str = "eligibility_evaluation_failures_total";

/// Counter: downstream events published. Labels: topic.
pub const EVENTS_PUBLISHED_TOTAL: &str = "eligibility_events_published_total";

/// Counter: downstream publishes that failed after retries. Labels: topic.
pub const PUBLISH_FAILURES_TOTAL: &str = "eligibility_publish_failures_total";

/// Counter: bulk run items by outcome. Labels: outcome.
pub const BULK_ITEMS_TOTAL: &str = "eligibility_bulk_items_total";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("eligibility_service=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Counter capability handed to each component at construction.
pub trait Metrics: Send + Sync {
    fn increment(&self, name: &'static str, label: (&'static str, &str));
}

/// Forwards to the process-wide `metrics` recorder (Prometheus in production).
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusMetrics;

impl Metrics for PrometheusMetrics {
    fn increment(&self, name: &'static str, (key, value): (&'static str, &str)) {
        metrics::counter!(name, key => value.to_string()).increment(1);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn increment(&self, _name: &'static str, _label: (&'static str, &str)) {}
}

/// Keeps counts in memory so tests can assert on them.
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    counts: Mutex<HashMap<(&'static str, String), u64>>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count for one metric and label value.
    pub fn count(&self, name: &'static str, label_value: &str) -> u64 {
        self.counts
            .lock()
            .map(|counts| counts.get(&(name, label_value.to_string())).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Count for one metric across all label values.
    pub fn total(&self, name: &'static str) -> u64 {
        self.counts
            .lock()
            .map(|counts| {
                counts
                    .iter()
                    .filter(|((n, _), _)| *n == name)
                    .map(|(_, v)| *v)
                    .sum()
            })
            .unwrap_or(0)
    }
}

impl Metrics for RecordingMetrics {
    fn increment(&self, name: &'static str, (_, value): (&'static str, &str)) {
        if let Ok(mut counts) = self.counts.lock() {
            *counts.entry((name, value.to_string())).or_insert(0) += 1;
        }
    }
}
