//! Scenario orchestration: submission, timing, completion, reduction.

use crate::backend::{Backend, BackendError, BackendKind};
use crate::ledger::{LatencyLedger, TaskSample};
use crate::report::BenchmarkReport;
use crate::stats;
use crate::sync::CountdownLatch;
use crate::workload::WorkloadSpec;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Upper bound on backend drain after a scenario ends, regardless of how it
/// ended. Cancelled sleepers wake immediately, so an orderly drain finishes
/// well inside this.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

const PROGRESS_POLL: Duration = Duration::from_millis(200);

/// One named comparison run: a workload, a backend, and a completion timeout.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub spec: WorkloadSpec,
    pub backend: BackendKind,
    pub timeout: Duration,
}

impl Scenario {
    pub fn new(
        name: impl Into<String>,
        spec: WorkloadSpec,
        backend: BackendKind,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            spec,
            backend,
            timeout,
        }
    }
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("completion wait timed out after {timeout:?} with {remaining} tasks outstanding")]
    Timeout { timeout: Duration, remaining: usize },
    #[error("backend failed to drain on shutdown: {0}")]
    Shutdown(#[source] BackendError),
}

/// Runs one scenario to a terminal state and reduces its ledger.
///
/// The backend is launched for this run only and is drained on every exit
/// path. The report is computed strictly after the completion latch reaches
/// zero, so every task's ledger write happens-before the reducer's read.
pub fn run_scenario(scenario: &Scenario) -> Result<BenchmarkReport, ScenarioError> {
    let tasks = scenario.spec.tasks;
    let ledger = Arc::new(LatencyLedger::new(tasks));
    let latch = Arc::new(CountdownLatch::new(tasks));
    let backend = scenario.backend.launch()?;
    tracing::debug!(
        name = %scenario.name,
        backend = %scenario.backend,
        tasks,
        "scenario started"
    );

    let wall_start = Instant::now();
    if let Err(err) = submit_all(&backend, scenario.spec, &ledger, &latch) {
        abandon(backend, &scenario.name);
        return Err(err.into());
    }

    if !wait_for_completion(&latch, tasks, scenario.timeout) {
        let remaining = latch.remaining();
        abandon(backend, &scenario.name);
        return Err(ScenarioError::Timeout {
            timeout: scenario.timeout,
            remaining,
        });
    }
    let wall = wall_start.elapsed();

    backend
        .shutdown(SHUTDOWN_GRACE)
        .map_err(ScenarioError::Shutdown)?;
    debug_assert!(ledger.is_complete(), "latch released with unwritten slots");

    let report = stats::reduce(&scenario.name, wall, &ledger);
    if report.failed > 0 || report.cancelled > 0 {
        tracing::warn!(
            name = %scenario.name,
            failed = report.failed,
            cancelled = report.cancelled,
            "scenario finished with non-completed tasks"
        );
    }
    Ok(report)
}

/// Submits one wrapped unit per task index. The wrapper records a
/// high-resolution start, runs the panic-safe task body, records the elapsed
/// time into the task's own ledger slot, and signals the latch; the body
/// never returns without a recorded sample, so the wrapper covers every exit
/// path.
fn submit_all(
    backend: &Backend,
    spec: WorkloadSpec,
    ledger: &Arc<LatencyLedger>,
    latch: &Arc<CountdownLatch>,
) -> Result<(), BackendError> {
    match backend {
        Backend::Pool(pool) => {
            let cancel = pool.cancel_handle();
            for index in 0..spec.tasks {
                let ledger = Arc::clone(ledger);
                let latch = Arc::clone(latch);
                let cancel = Arc::clone(&cancel);
                pool.spawn(Box::new(move || {
                    let start = Instant::now();
                    let status = spec.run_blocking(index, &cancel);
                    ledger.record(
                        index,
                        TaskSample {
                            elapsed: start.elapsed(),
                            status,
                        },
                    );
                    latch.count_down();
                }))?;
            }
        }
        Backend::PerTask(per_task) => {
            for index in 0..spec.tasks {
                let ledger = Arc::clone(ledger);
                let latch = Arc::clone(latch);
                let token = per_task.cancel_token();
                per_task.spawn(async move {
                    let start = Instant::now();
                    let status = spec.run_async(index, token).await;
                    ledger.record(
                        index,
                        TaskSample {
                            elapsed: start.elapsed(),
                            status,
                        },
                    );
                    latch.count_down();
                })?;
            }
        }
    }
    Ok(())
}

/// Waits for the latch with a progress bar, polling so the bar can track
/// completions. Returns whether the count reached zero before the timeout.
fn wait_for_completion(latch: &CountdownLatch, tasks: usize, timeout: Duration) -> bool {
    let progress = ProgressBar::new(tasks as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tasks")
    {
        progress.set_style(style.progress_chars("=>-"));
    }

    let deadline = Instant::now() + timeout;
    let completed = loop {
        progress.set_position((tasks - latch.remaining()) as u64);
        let now = Instant::now();
        if now >= deadline {
            break false;
        }
        let slice = PROGRESS_POLL.min(deadline - now);
        if latch.wait_timeout(slice) {
            break true;
        }
    };
    progress.finish_and_clear();
    completed
}

/// Best-effort teardown after a failed run: wake sleepers, then drain.
fn abandon(backend: Backend, name: &str) {
    backend.cancel();
    if let Err(err) = backend.shutdown(SHUTDOWN_GRACE) {
        tracing::warn!(scenario = name, error = %err, "backend drain failed; resources detached");
    }
}
