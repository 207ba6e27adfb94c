//! Synthetic task generators.
//!
//! A [`WorkloadSpec`] describes one scenario's tasks; each backend interprets
//! it in its own execution model. The thread-pool backend runs the blocking
//! interpretation (a real `sleep` that parks the worker), while the per-task
//! backend runs the async interpretation (a timer future that yields the
//! carrier thread). The CPU task is identical in both: it never suspends.

use crate::ledger::TaskStatus;
use crate::sync::CancelFlag;
use serde::Serialize;
use std::hint::black_box;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkloadKind {
    /// Blocking-sleep task simulating network or file I/O.
    Io { sleep_ms: u64 },
    /// Math-loop task simulating computation-heavy work.
    Cpu { iterations: u64 },
}

/// Deterministic fault injection: makes exactly one task panic so the
/// failure-containment path can be exercised end to end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FaultPlan {
    pub panic_on: Option<usize>,
}

impl FaultPlan {
    fn trip(&self, index: usize) {
        if self.panic_on == Some(index) {
            panic!("injected fault in task {index}");
        }
    }
}

/// Immutable description of one scenario's synthetic work. Built once from
/// configuration and copied into every task.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct WorkloadSpec {
    pub tasks: usize,
    pub kind: WorkloadKind,
    #[serde(skip_serializing_if = "is_no_fault")]
    pub fault: FaultPlan,
}

fn is_no_fault(fault: &FaultPlan) -> bool {
    fault.panic_on.is_none()
}

impl WorkloadSpec {
    pub fn io(tasks: usize, sleep_ms: u64) -> Self {
        Self {
            tasks,
            kind: WorkloadKind::Io { sleep_ms },
            fault: FaultPlan::default(),
        }
    }

    pub fn cpu(tasks: usize, iterations: u64) -> Self {
        Self {
            tasks,
            kind: WorkloadKind::Cpu { iterations },
            fault: FaultPlan::default(),
        }
    }

    pub fn with_fault(mut self, fault: FaultPlan) -> Self {
        self.fault = fault;
        self
    }

    /// Blocking interpretation, run on a pool worker thread. Panics are
    /// captured here so the caller can always record a sample and signal
    /// completion.
    pub fn run_blocking(self, index: usize, cancel: &CancelFlag) -> TaskStatus {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.fault.trip(index);
            match self.kind {
                WorkloadKind::Io { sleep_ms } => {
                    if cancel.sleep(Duration::from_millis(sleep_ms)) {
                        TaskStatus::Completed
                    } else {
                        TaskStatus::Cancelled
                    }
                }
                WorkloadKind::Cpu { iterations } => {
                    black_box(cpu_task(index, iterations));
                    TaskStatus::Completed
                }
            }
        }));
        outcome.unwrap_or(TaskStatus::Failed)
    }

    /// Async interpretation, run as one lightweight task on the carrier
    /// runtime. The sleep is a timer future raced against cancellation; the
    /// CPU loop holds the carrier thread for its full duration.
    pub async fn run_async(self, index: usize, cancel: CancellationToken) -> TaskStatus {
        if panic::catch_unwind(|| self.fault.trip(index)).is_err() {
            return TaskStatus::Failed;
        }
        match self.kind {
            WorkloadKind::Io { sleep_ms } => {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(sleep_ms)) => TaskStatus::Completed,
                    _ = cancel.cancelled() => TaskStatus::Cancelled,
                }
            }
            WorkloadKind::Cpu { iterations } => {
                match panic::catch_unwind(|| black_box(cpu_task(index, iterations))) {
                    Ok(_) => TaskStatus::Completed,
                    Err(_) => TaskStatus::Failed,
                }
            }
        }
    }
}

/// Closed-form math loop. The non-linear transform and the renormalization
/// keep the value data-dependent so the optimizer cannot collapse the loop;
/// the result is additionally passed through `black_box` by callers.
pub fn cpu_task(seed: usize, iterations: u64) -> f64 {
    let mut x = seed as f64 * 0.123_456_789;
    for _ in 0..iterations {
        x = x.sin() * x.cos() + x.abs().sqrt() + 1.000_001;
        if x > 1e6 {
            x /= 10.0;
        }
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn cpu_task_is_deterministic_per_seed() {
        assert_eq!(cpu_task(7, 10_000), cpu_task(7, 10_000));
        assert_ne!(cpu_task(7, 10_000), cpu_task(8, 10_000));
    }

    #[test]
    fn cpu_task_stays_finite() {
        assert!(cpu_task(123, 100_000).is_finite());
    }

    #[test]
    fn blocking_io_task_completes_and_cancels() {
        let spec = WorkloadSpec::io(1, 10);
        let flag = CancelFlag::new();
        assert_eq!(spec.run_blocking(0, &flag), TaskStatus::Completed);

        let spec = WorkloadSpec::io(1, 60_000);
        flag.cancel();
        let start = Instant::now();
        assert_eq!(spec.run_blocking(0, &flag), TaskStatus::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn injected_fault_is_reported_as_failed() {
        let spec = WorkloadSpec::cpu(4, 100).with_fault(FaultPlan { panic_on: Some(2) });
        let flag = CancelFlag::new();
        assert_eq!(spec.run_blocking(2, &flag), TaskStatus::Failed);
        assert_eq!(spec.run_blocking(1, &flag), TaskStatus::Completed);
    }

    #[tokio::test]
    async fn async_io_task_observes_cancellation() {
        let spec = WorkloadSpec::io(1, 60_000);
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(spec.run_async(0, token).await, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn async_fault_is_reported_as_failed() {
        let spec = WorkloadSpec::cpu(4, 100).with_fault(FaultPlan { panic_on: Some(0) });
        let token = CancellationToken::new();
        assert_eq!(spec.run_async(0, token.clone()).await, TaskStatus::Failed);
        assert_eq!(spec.run_async(1, token).await, TaskStatus::Completed);
    }
}
