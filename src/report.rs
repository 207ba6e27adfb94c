//! Report types and the stable console format.

use crate::config::BenchConfig;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// Summary statistics for one completed scenario. Immutable once computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkReport {
    pub name: String,
    pub tasks: usize,
    pub wall_ms: u64,
    pub throughput_tasks_per_sec: f64,
    pub avg_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub failed: usize,
    pub cancelled: usize,
}

impl BenchmarkReport {
    /// The one-line console format. Test harnesses scrape this, so it is a
    /// stable contract: latencies with 3 decimals, throughput with 1.
    pub fn summary_line(&self) -> String {
        format!(
            "{} -> wall={} ms, throughput={:.1} tasks/s, avg={:.3} ms, p50={:.3} ms, p95={:.3} ms, p99={:.3} ms",
            self.name,
            self.wall_ms,
            self.throughput_tasks_per_sec,
            self.avg_ms,
            self.p50_ms,
            self.p95_ms,
            self.p99_ms
        )
    }
}

/// Terminal result of one scenario. Failures keep the same line prefix as
/// successes so scraping stays uniform.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScenarioOutcome {
    Completed(BenchmarkReport),
    Failed { name: String, reason: String },
}

impl ScenarioOutcome {
    pub fn name(&self) -> &str {
        match self {
            Self::Completed(report) => &report.name,
            Self::Failed { name, .. } => name,
        }
    }

    pub fn line(&self) -> String {
        match self {
            Self::Completed(report) => report.summary_line(),
            Self::Failed { name, reason } => format!("{name} -> FAILED: {reason}"),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// The whole run, saved as JSON when `--output` is given.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub config: BenchConfig,
    pub scenarios: Vec<ScenarioOutcome>,
}

impl RunReport {
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write run report to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> BenchmarkReport {
        BenchmarkReport {
            name: "IO-PerTask".to_string(),
            tasks: 100,
            wall_ms: 17,
            throughput_tasks_per_sec: 5882.352_941_176_471,
            avg_ms: 10.234_567,
            p50_ms: 10.1,
            p95_ms: 12.55,
            p99_ms: 13.999_4,
            failed: 0,
            cancelled: 0,
        }
    }

    #[test]
    fn summary_line_matches_the_stable_format() {
        assert_eq!(
            report().summary_line(),
            "IO-PerTask -> wall=17 ms, throughput=5882.4 tasks/s, avg=10.235 ms, p50=10.100 ms, p95=12.550 ms, p99=13.999 ms"
        );
    }

    #[test]
    fn failed_outcome_keeps_the_name_prefix() {
        let outcome = ScenarioOutcome::Failed {
            name: "CPU-BoundedPool".to_string(),
            reason: "completion wait timed out".to_string(),
        };
        assert_eq!(
            outcome.line(),
            "CPU-BoundedPool -> FAILED: completion wait timed out"
        );
        assert!(outcome.is_failure());
        assert_eq!(outcome.name(), "CPU-BoundedPool");
    }

    #[test]
    fn run_report_round_trips_through_json_file() {
        let run = RunReport {
            config: BenchConfig::default(),
            scenarios: vec![ScenarioOutcome::Completed(report())],
        };
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("report.json");
        run.save_json(&path).expect("save");
        let raw = std::fs::read_to_string(&path).expect("read back");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
        assert_eq!(value["scenarios"][0]["outcome"], "completed");
        assert_eq!(value["scenarios"][0]["name"], "IO-PerTask");
    }
}
