//! Execution backends.
//!
//! Two interchangeable strategies for running a scenario's tasks: a
//! fixed-size pool of OS threads draining a shared queue, and one lightweight
//! task per submission on a shared multi-threaded carrier runtime. A backend
//! is launched for a single benchmark run and torn down before the next one;
//! shutdown consumes the backend, so the type system rejects submissions once
//! teardown has begun.

use crate::sync::CancelFlag;
use serde::Serialize;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("worker count must be greater than zero")]
    InvalidConfig,
    #[error("backend is shutting down; submission rejected")]
    ShuttingDown,
    #[error("backend failed to drain within {0:?}")]
    DrainTimeout(Duration),
    #[error("backend drain failed: {0}")]
    Drain(#[source] std::io::Error),
    #[error("failed to launch backend: {0}")]
    Launch(#[from] std::io::Error),
}

/// The closed set of backend strategies a scenario can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum BackendKind {
    /// Fixed worker count; excess tasks queue until a worker frees up.
    BoundedPool { workers: usize },
    /// One lightweight task per submission; no concurrency ceiling.
    PerTaskUnbounded,
}

impl BackendKind {
    pub fn launch(&self) -> Result<Backend, BackendError> {
        match *self {
            Self::BoundedPool { workers } => {
                Ok(Backend::Pool(ThreadPoolBackend::new(workers)?))
            }
            Self::PerTaskUnbounded => Ok(Backend::PerTask(TokioBackend::new()?)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BoundedPool { workers } => write!(f, "bounded-pool({workers})"),
            Self::PerTaskUnbounded => write!(f, "per-task-unbounded"),
        }
    }
}

pub enum Backend {
    Pool(ThreadPoolBackend),
    PerTask(TokioBackend),
}

impl Backend {
    /// Requests prompt termination of in-flight sleeping tasks. Queued tasks
    /// still run, but observe the cancellation immediately.
    pub fn cancel(&self) {
        match self {
            Self::Pool(pool) => pool.cancel(),
            Self::PerTask(tasks) => tasks.cancel(),
        }
    }

    /// Drains all accepted work, blocking until in-flight tasks finish or
    /// `timeout` elapses. On timeout the backend's resources are detached
    /// rather than leaked into the next scenario.
    pub fn shutdown(self, timeout: Duration) -> Result<(), BackendError> {
        match self {
            Self::Pool(pool) => pool.shutdown(timeout),
            Self::PerTask(tasks) => tasks.shutdown(timeout),
        }
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size OS-thread pool over a shared FIFO queue. At most `workers`
/// jobs run concurrently; accepted jobs are never dropped.
pub struct ThreadPoolBackend {
    sender: Option<crossbeam_channel::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    cancel: Arc<CancelFlag>,
}

impl ThreadPoolBackend {
    pub fn new(workers: usize) -> Result<Self, BackendError> {
        if workers == 0 {
            return Err(BackendError::InvalidConfig);
        }
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let mut handles = Vec::with_capacity(workers);
        for i in 0..workers {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("taskbench-worker-{i}"))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        // Scenario wrappers capture panics themselves; this
                        // keeps the worker alive for raw jobs that do not.
                        let _ = panic::catch_unwind(AssertUnwindSafe(job));
                    }
                })?;
            handles.push(handle);
        }
        Ok(Self {
            sender: Some(sender),
            workers: handles,
            cancel: Arc::new(CancelFlag::new()),
        })
    }

    pub fn spawn(&self, job: Job) -> Result<(), BackendError> {
        match &self.sender {
            Some(sender) => sender.send(job).map_err(|_| BackendError::ShuttingDown),
            None => Err(BackendError::ShuttingDown),
        }
    }

    /// Cancellation handle observed by blocking sleeps running on this pool.
    pub fn cancel_handle(&self) -> Arc<CancelFlag> {
        Arc::clone(&self.cancel)
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Disconnects the queue so workers drain remaining jobs and exit, then
    /// joins them. The join runs on a watcher thread so the drain can be
    /// bounded by `timeout`; on timeout the workers are detached.
    pub fn shutdown(mut self, timeout: Duration) -> Result<(), BackendError> {
        self.sender.take();
        let workers = std::mem::take(&mut self.workers);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
        let watcher = thread::Builder::new()
            .name("taskbench-drain".to_string())
            .spawn(move || {
                for handle in workers {
                    let _ = handle.join();
                }
                let _ = done_tx.send(());
            })
            .map_err(BackendError::Drain)?;
        match done_rx.recv_timeout(timeout) {
            Ok(()) => {
                let _ = watcher.join();
                Ok(())
            }
            Err(_) => Err(BackendError::DrainTimeout(timeout)),
        }
    }
}

/// One tokio task per submission, multiplexed onto a multi-threaded carrier
/// runtime owned by this backend. Concurrency is limited only by memory and
/// the workload's actual blocking behavior.
pub struct TokioBackend {
    runtime: Runtime,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl TokioBackend {
    pub fn new() -> Result<Self, BackendError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_time()
            .thread_name("taskbench-carrier")
            .build()?;
        Ok(Self {
            runtime,
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn spawn<F>(&self, future: F) -> Result<(), BackendError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.tracker.is_closed() {
            return Err(BackendError::ShuttingDown);
        }
        let _ = self.tracker.spawn_on(future, self.runtime.handle());
        Ok(())
    }

    /// Cancellation token observed by async sleeps running on this backend.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Closes the tracker and waits for every spawned task to finish. On
    /// drain timeout the remaining tasks are cancelled and the runtime is
    /// shut down in the background.
    pub fn shutdown(self, timeout: Duration) -> Result<(), BackendError> {
        let Self {
            runtime,
            tracker,
            cancel,
        } = self;
        tracker.close();
        let drained =
            runtime.block_on(async { tokio::time::timeout(timeout, tracker.wait()).await.is_ok() });
        if drained {
            drop(runtime);
            Ok(())
        } else {
            cancel.cancel();
            runtime.shutdown_background();
            Err(BackendError::DrainTimeout(timeout))
        }
    }
}
