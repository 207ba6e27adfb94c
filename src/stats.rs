//! Statistics reduction over a fully populated latency ledger.
//!
//! Pure functions of their input: reducing the same ledger twice yields
//! identical reports.

use crate::ledger::{LatencyLedger, TaskStatus};
use crate::report::BenchmarkReport;
use std::time::Duration;

const NS_PER_MS: f64 = 1_000_000.0;

/// Nearest-rank percentile over a sorted sample: the element at index
/// `round((n - 1) * p)` clamped to `[0, n - 1]`, without interpolation.
/// Reference runs depend on exactly this arithmetic.
pub fn nearest_rank(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let n = sorted.len();
    let index = ((n - 1) as f64 * p).round() as usize;
    sorted[index.min(n - 1)]
}

pub fn mean(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: u128 = values.iter().map(|&v| u128::from(v)).sum();
    sum as f64 / values.len() as f64
}

/// Reduces a ledger and the scenario wall time into a report. Expects every
/// slot to be written; callers enforce that with the completion latch.
pub fn reduce(name: &str, wall: Duration, ledger: &LatencyLedger) -> BenchmarkReport {
    let mut nanos = ledger.latencies_ns();
    nanos.sort_unstable();

    let tasks = ledger.len();
    let wall_ms = wall.as_millis().min(u128::from(u64::MAX)) as u64;
    let throughput = tasks as f64 * 1000.0 / wall_ms.max(1) as f64;

    BenchmarkReport {
        name: name.to_string(),
        tasks,
        wall_ms,
        throughput_tasks_per_sec: throughput,
        avg_ms: mean(&nanos) / NS_PER_MS,
        p50_ms: nearest_rank(&nanos, 0.50) as f64 / NS_PER_MS,
        p95_ms: nearest_rank(&nanos, 0.95) as f64 / NS_PER_MS,
        p99_ms: nearest_rank(&nanos, 0.99) as f64 / NS_PER_MS,
        failed: ledger.status_count(TaskStatus::Failed),
        cancelled: ledger.status_count(TaskStatus::Cancelled),
    }
}
