//! Micro-benchmark harness contrasting a bounded OS-thread pool against
//! per-task lightweight tasks on a shared carrier runtime, under synthetic
//! I/O-bound (blocking sleep) and CPU-bound (math loop) workloads.
//!
//! A scenario submits N tasks to one backend, records each task's latency in
//! a write-once ledger, waits on a completion latch, and reduces the ledger
//! into wall time, throughput, and nearest-rank latency percentiles.

pub mod backend;
pub mod config;
pub mod ledger;
pub mod report;
pub mod runner;
pub mod stats;
pub mod sync;
pub mod workload;
