//! Benchmark configuration.
//!
//! Built once at startup from defaults, then adjusted by `key=value` tokens
//! applied in order. The resulting struct is immutable for the rest of the
//! run; scenarios receive it by reference. Malformed values and unknown keys
//! are ignored, never fatal.

use serde::Serialize;
use std::cmp::min;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IoConfig {
    pub tasks: usize,
    pub sleep_ms: u64,
    pub pool_threads: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CpuConfig {
    pub tasks: usize,
    pub iterations: u64,
    pub pool_threads: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BenchConfig {
    pub io: IoConfig,
    pub cpu: CpuConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        let cpus = num_cpus::get();
        Self {
            io: IoConfig {
                tasks: 10_000,
                sleep_ms: 10,
                pool_threads: min(200, cpus * 20),
            },
            cpu: CpuConfig {
                tasks: 10_000,
                iterations: 50_000,
                pool_threads: cpus,
            },
        }
    }
}

impl BenchConfig {
    /// Applies `key=value` tokens in the order given. Tokens without `=`,
    /// unrecognized keys, and malformed or zero counts leave the previous
    /// value in place.
    pub fn apply_args<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            let arg = arg.as_ref();
            let Some((key, value)) = arg.split_once('=') else {
                tracing::debug!(token = arg, "ignoring argument without '='");
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            match key {
                "io.tasks" => apply_count(&mut self.io.tasks, key, value),
                "io.sleepMs" => apply_value(&mut self.io.sleep_ms, key, value),
                "io.platformThreads" => apply_count(&mut self.io.pool_threads, key, value),
                "cpu.tasks" => apply_count(&mut self.cpu.tasks, key, value),
                "cpu.iters" => apply_value(&mut self.cpu.iterations, key, value),
                "cpu.platformThreads" => apply_count(&mut self.cpu.pool_threads, key, value),
                "preset" => self.apply_preset(value),
                _ => tracing::debug!(key, "ignoring unrecognized configuration key"),
            }
        }
    }

    /// Named bundles overriding the individual numeric keys.
    fn apply_preset(&mut self, name: &str) {
        let cpus = num_cpus::get();
        match name {
            "io-fast" => {
                self.io = IoConfig {
                    tasks: 5_000,
                    sleep_ms: 5,
                    pool_threads: min(100, cpus * 10),
                };
            }
            "io-heavy" => {
                self.io = IoConfig {
                    tasks: 50_000,
                    sleep_ms: 20,
                    pool_threads: min(400, cpus * 30),
                };
            }
            "cpu-light" => {
                self.cpu = CpuConfig {
                    tasks: 5_000,
                    iterations: 20_000,
                    pool_threads: cpus,
                };
            }
            "cpu-heavy" => {
                self.cpu = CpuConfig {
                    tasks: 20_000,
                    iterations: 100_000,
                    pool_threads: cpus,
                };
            }
            other => {
                tracing::warn!(preset = other, "unknown preset; keeping current configuration");
            }
        }
    }
}

// Task and worker counts must stay positive; a zero would deadlock or
// produce an empty ledger.
fn apply_count(slot: &mut usize, key: &str, value: &str) {
    match value.parse::<usize>() {
        Ok(parsed) if parsed > 0 => *slot = parsed,
        _ => tracing::debug!(key, value, "ignoring malformed numeric value"),
    }
}

// Intensities (sleep millis, iteration counts) may legitimately be zero.
fn apply_value(slot: &mut u64, key: &str, value: &str) {
    match value.parse::<u64>() {
        Ok(parsed) => *slot = parsed,
        Err(_) => tracing::debug!(key, value, "ignoring malformed numeric value"),
    }
}
