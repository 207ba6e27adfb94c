//! Per-task latency recording.

use serde::Serialize;
use std::sync::OnceLock;
use std::time::Duration;

/// Terminal state of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskStatus {
    /// Ran its full body.
    Completed,
    /// Panicked inside the body; captured by the submission wrapper.
    Failed,
    /// Interrupted by cancellation before the body finished.
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TaskSample {
    pub elapsed: Duration,
    pub status: TaskStatus,
}

/// One slot per task index, written exactly once by the task that owns the
/// index and read only after every task has signalled completion. The slots
/// partition the array, so no lock is needed; `OnceLock` enforces the
/// write-once discipline.
pub struct LatencyLedger {
    slots: Vec<OnceLock<TaskSample>>,
}

impl LatencyLedger {
    pub fn new(tasks: usize) -> Self {
        Self {
            slots: (0..tasks).map(|_| OnceLock::new()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn record(&self, index: usize, sample: TaskSample) {
        match self.slots.get(index) {
            Some(slot) => {
                if slot.set(sample).is_err() {
                    tracing::warn!(index, "duplicate ledger write ignored");
                }
            }
            None => tracing::warn!(index, len = self.len(), "out-of-range ledger write ignored"),
        }
    }

    pub fn get(&self, index: usize) -> Option<&TaskSample> {
        self.slots.get(index).and_then(OnceLock::get)
    }

    /// Number of slots that have been written.
    pub fn written(&self) -> usize {
        self.slots.iter().filter(|slot| slot.get().is_some()).count()
    }

    /// Whether every slot has been written.
    pub fn is_complete(&self) -> bool {
        self.written() == self.len()
    }

    pub fn samples(&self) -> impl Iterator<Item = &TaskSample> {
        self.slots.iter().filter_map(OnceLock::get)
    }

    /// Latencies of the written slots in nanoseconds, in index order.
    pub fn latencies_ns(&self) -> Vec<u64> {
        self.samples()
            .map(|sample| u64::try_from(sample.elapsed.as_nanos()).unwrap_or(u64::MAX))
            .collect()
    }

    pub fn status_count(&self, status: TaskStatus) -> usize {
        self.samples().filter(|sample| sample.status == status).count()
    }
}
