//! Backend-level concurrency and containment properties.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use taskbench::backend::{ThreadPoolBackend, TokioBackend};
use taskbench::ledger::{LatencyLedger, TaskSample, TaskStatus};
use taskbench::sync::CountdownLatch;
use taskbench::workload::WorkloadSpec;

/// Tracks the high-water mark of simultaneously in-flight tasks.
#[derive(Default)]
struct InFlightGauge {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl InFlightGauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    fn high_water(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

#[test]
fn bounded_pool_never_exceeds_worker_count() {
    let pool = ThreadPoolBackend::new(4).expect("pool");
    let gauge = Arc::new(InFlightGauge::default());
    let latch = Arc::new(CountdownLatch::new(16));

    for _ in 0..16 {
        let gauge = Arc::clone(&gauge);
        let latch = Arc::clone(&latch);
        pool.spawn(Box::new(move || {
            gauge.enter();
            std::thread::sleep(Duration::from_millis(25));
            gauge.exit();
            latch.count_down();
        }))
        .expect("spawn");
    }

    assert!(latch.wait_timeout(Duration::from_secs(30)));
    pool.shutdown(Duration::from_secs(10)).expect("drain");
    assert!(
        gauge.high_water() <= 4,
        "observed {} concurrent tasks on a 4-worker pool",
        gauge.high_water()
    );
}

#[test]
fn per_task_backend_has_no_concurrency_ceiling() {
    let backend = TokioBackend::new().expect("runtime");
    let gauge = Arc::new(InFlightGauge::default());
    let latch = Arc::new(CountdownLatch::new(20));
    // Every task must be in flight at once for anyone to pass the barrier.
    let barrier = Arc::new(tokio::sync::Barrier::new(20));

    for _ in 0..20 {
        let gauge = Arc::clone(&gauge);
        let latch = Arc::clone(&latch);
        let barrier = Arc::clone(&barrier);
        backend
            .spawn(async move {
                gauge.enter();
                barrier.wait().await;
                gauge.exit();
                latch.count_down();
            })
            .expect("spawn");
    }

    assert!(latch.wait_timeout(Duration::from_secs(30)));
    backend.shutdown(Duration::from_secs(10)).expect("drain");
    assert!(
        gauge.high_water() >= 5,
        "observed only {} concurrent tasks on the unbounded backend",
        gauge.high_water()
    );
}

#[test]
fn panicking_job_does_not_kill_pool_workers() {
    let pool = ThreadPoolBackend::new(2).expect("pool");
    let latch = Arc::new(CountdownLatch::new(8));

    pool.spawn(Box::new(|| panic!("boom"))).expect("spawn");
    for _ in 0..8 {
        let latch = Arc::clone(&latch);
        pool.spawn(Box::new(move || latch.count_down()))
            .expect("spawn");
    }

    assert!(latch.wait_timeout(Duration::from_secs(10)));
    pool.shutdown(Duration::from_secs(10)).expect("drain");
}

#[test]
fn cancelled_sleepers_record_interruption_not_completion() {
    let pool = ThreadPoolBackend::new(2).expect("pool");
    let spec = WorkloadSpec::io(2, 60_000);
    let ledger = Arc::new(LatencyLedger::new(2));
    let latch = Arc::new(CountdownLatch::new(2));
    let cancel = pool.cancel_handle();

    for index in 0..2 {
        let ledger = Arc::clone(&ledger);
        let latch = Arc::clone(&latch);
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
        }))
        .expect("spawn");
    }

    std::thread::sleep(Duration::from_millis(100));
    pool.cancel();
    assert!(latch.wait_timeout(Duration::from_secs(10)));
    pool.shutdown(Duration::from_secs(10)).expect("drain");

    assert!(ledger.is_complete());
    for sample in ledger.samples() {
        assert_eq!(sample.status, TaskStatus::Cancelled);
        assert!(
            sample.elapsed < Duration::from_secs(30),
            "cancellation was not prompt: {:?}",
            sample.elapsed
        );
    }
}

#[test]
fn per_task_cancel_interrupts_async_sleepers() {
    let backend = TokioBackend::new().expect("runtime");
    let spec = WorkloadSpec::io(4, 60_000);
    let ledger = Arc::new(LatencyLedger::new(4));
    let latch = Arc::new(CountdownLatch::new(4));

    for index in 0..4 {
        let ledger = Arc::clone(&ledger);
        let latch = Arc::clone(&latch);
        let token = backend.cancel_token();
        backend
            .spawn(async move {
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
            })
            .expect("spawn");
    }

    std::thread::sleep(Duration::from_millis(100));
    backend.cancel();
    assert!(latch.wait_timeout(Duration::from_secs(10)));
    backend.shutdown(Duration::from_secs(10)).expect("drain");

    assert_eq!(ledger.status_count(TaskStatus::Cancelled), 4);
}
