use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;
use std::time::Duration;

// Latencies are recorded in microseconds.
const LATENCY_SIGFIG: u8 = 3;
// A fallback query slower than a minute is clamped; the histogram stays small.
const MAX_LATENCY_US: u64 = 60 * 1_000_000;

/// Thread-safe registry of database fallback queries issued by the cache layer.
///
/// Every read-through miss that reaches the database is recorded under the name of the cache
/// operation that issued it, with its latency and its outcome.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    inner: Mutex<HashMap<&'static str, QueryMetrics>>,
}

#[derive(Debug)]
struct QueryMetrics {
    query_count: u64,
    empty_count: u64,
    error_count: u64,
    latency_us: Option<Histogram<u64>>,
}

fn new_histogram() -> Option<Histogram<u64>> {
    static HISTOGRAM_ERROR_LOGGED: OnceLock<()> = OnceLock::new();

    match Histogram::<u64>::new_with_bounds(1, MAX_LATENCY_US, LATENCY_SIGFIG) {
        Ok(hist) => Some(hist),
        Err(err) => {
            if HISTOGRAM_ERROR_LOGGED.set(()).is_ok() {
                tracing::debug!(
                    target: "mapi.metrics",
                    error = %err,
                    "failed to construct latency histogram; latencies will not be recorded"
                );
            }
            None
        }
    }
}

impl QueryMetrics {
    fn new() -> Self {
        Self {
            query_count: 0,
            empty_count: 0,
            error_count: 0,
            latency_us: new_histogram(),
        }
    }
}

/// How a fallback query ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    /// At least one row came back.
    Found,
    /// The query succeeded without rows.
    Empty,
    /// The query or row validation failed.
    Failed,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed fallback query for `operation`.
    pub fn record_query(&self, operation: &'static str, duration: Duration, outcome: QueryOutcome) {
        static RECORD_ERROR_LOGGED: OnceLock<()> = OnceLock::new();

        let micros = duration.as_micros().min(u128::from(MAX_LATENCY_US)) as u64;
        let micros = micros.max(1);

        let mut inner = self.inner.lock();
        let metrics = inner.entry(operation).or_insert_with(QueryMetrics::new);
        metrics.query_count = metrics.query_count.saturating_add(1);
        match outcome {
            QueryOutcome::Found => {}
            QueryOutcome::Empty => metrics.empty_count = metrics.empty_count.saturating_add(1),
            QueryOutcome::Failed => metrics.error_count = metrics.error_count.saturating_add(1),
        }
        if let Some(hist) = metrics.latency_us.as_mut() {
            if let Err(err) = hist.record(micros) {
                if RECORD_ERROR_LOGGED.set(()).is_ok() {
                    tracing::debug!(
                        target: "mapi.metrics",
                        operation,
                        micros,
                        error = %err,
                        "failed to record latency sample"
                    );
                }
            }
        }
    }

    /// Snapshot suitable for export to a telemetry collector.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock();

        let mut operations = BTreeMap::new();
        let mut totals = OperationSnapshot::default();
        let mut total_hist = new_histogram();

        for (operation, metrics) in inner.iter() {
            totals.query_count = totals.query_count.saturating_add(metrics.query_count);
            totals.empty_count = totals.empty_count.saturating_add(metrics.empty_count);
            totals.error_count = totals.error_count.saturating_add(metrics.error_count);
            if let (Some(total), Some(hist)) = (total_hist.as_mut(), metrics.latency_us.as_ref()) {
                if total.add(hist).is_err() {
                    tracing::debug!(
                        target: "mapi.metrics",
                        operation,
                        "failed to merge latency histogram into totals"
                    );
                }
            }

            operations.insert(
                (*operation).to_string(),
                OperationSnapshot {
                    query_count: metrics.query_count,
                    empty_count: metrics.empty_count,
                    error_count: metrics.error_count,
                    latency_us: latency_summary(metrics.latency_us.as_ref()),
                },
            );
        }
        totals.latency_us = latency_summary(total_hist.as_ref());

        MetricsSnapshot { totals, operations }
    }
}

fn latency_summary(hist: Option<&Histogram<u64>>) -> LatencySummary {
    match hist {
        Some(hist) if !hist.is_empty() => LatencySummary {
            p50_us: hist.value_at_quantile(0.50),
            p95_us: hist.value_at_quantile(0.95),
            max_us: hist.max(),
        },
        _ => LatencySummary::default(),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub totals: OperationSnapshot,
    pub operations: BTreeMap<String, OperationSnapshot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSnapshot {
    pub query_count: u64,
    pub empty_count: u64,
    pub error_count: u64,
    pub latency_us: LatencySummary,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencySummary {
    pub p50_us: u64,
    pub p95_us: u64,
    pub max_us: u64,
}
