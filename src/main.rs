//! Benchmark CLI: runs the fixed scenario sequence and prints one report
//! line per scenario. A failing scenario never aborts the remaining ones.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use taskbench::backend::BackendKind;
use taskbench::config::BenchConfig;
use taskbench::report::{RunReport, ScenarioOutcome};
use taskbench::runner::{self, Scenario};
use taskbench::workload::WorkloadSpec;

const WARMUP_TASKS: usize = 1_000;
const WARMUP_SLEEP_MS: u64 = 1;
const WARMUP_CPU_ITERATIONS: u64 = 5_000;

#[derive(Parser)]
#[command(name = "taskbench")]
#[command(
    about = "Bounded thread pool vs per-task concurrency benchmark",
    long_about = None
)]
struct Cli {
    /// key=value overrides applied in order: io.tasks, io.sleepMs,
    /// io.platformThreads, cpu.tasks, cpu.iters, cpu.platformThreads, preset
    /// (io-fast | io-heavy | cpu-light | cpu-heavy)
    params: Vec<String>,

    /// Per-scenario completion timeout in seconds; exceeding it fails the
    /// scenario
    #[arg(long, default_value_t = 300)]
    timeout_secs: u64,

    /// Skip the warmup scenarios
    #[arg(long)]
    skip_warmup: bool,

    /// Output file for the full run report (JSON format)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = BenchConfig::default();
    config.apply_args(&cli.params);
    let timeout = Duration::from_secs(cli.timeout_secs);

    println!("=== Environment ===");
    println!("OS:   {} {}", std::env::consts::OS, std::env::consts::ARCH);
    println!("CPUs: {}", num_cpus::get());
    println!();
    println!("=== Config ===");
    println!(
        "IO:  tasks={}, sleepMs={}, platformThreads={}",
        config.io.tasks, config.io.sleep_ms, config.io.pool_threads
    );
    println!(
        "CPU: tasks={}, iterations={}, platformThreads={}",
        config.cpu.tasks, config.cpu.iterations, config.cpu.pool_threads
    );
    println!();

    let mut outcomes = Vec::new();

    if !cli.skip_warmup {
        run_and_print(
            Scenario::new(
                "WARMUP-IO",
                WorkloadSpec::io(WARMUP_TASKS, WARMUP_SLEEP_MS),
                BackendKind::PerTaskUnbounded,
                timeout,
            ),
            &mut outcomes,
        );
        run_and_print(
            Scenario::new(
                "WARMUP-CPU",
                WorkloadSpec::cpu(WARMUP_TASKS, WARMUP_CPU_ITERATIONS),
                BackendKind::PerTaskUnbounded,
                timeout,
            ),
            &mut outcomes,
        );
        println!();
    }

    println!("=== IO-bound workload (sleep) ===");
    let io_spec = WorkloadSpec::io(config.io.tasks, config.io.sleep_ms);
    run_and_print(
        Scenario::new(
            "IO-BoundedPool",
            io_spec,
            BackendKind::BoundedPool {
                workers: config.io.pool_threads,
            },
            timeout,
        ),
        &mut outcomes,
    );
    run_and_print(
        Scenario::new("IO-PerTask", io_spec, BackendKind::PerTaskUnbounded, timeout),
        &mut outcomes,
    );
    println!();

    println!("=== CPU-bound workload (math loop) ===");
    let cpu_spec = WorkloadSpec::cpu(config.cpu.tasks, config.cpu.iterations);
    run_and_print(
        Scenario::new(
            "CPU-BoundedPool",
            cpu_spec,
            BackendKind::BoundedPool {
                workers: config.cpu.pool_threads,
            },
            timeout,
        ),
        &mut outcomes,
    );
    run_and_print(
        Scenario::new("CPU-PerTask", cpu_spec, BackendKind::PerTaskUnbounded, timeout),
        &mut outcomes,
    );

    let failures = outcomes.iter().filter(|o| o.is_failure()).count();
    if failures > 0 {
        tracing::warn!(failures, "run finished with failed scenarios");
    }

    if let Some(path) = cli.output {
        let run = RunReport {
            config,
            scenarios: outcomes,
        };
        run.save_json(&path)?;
        tracing::info!(path = %path.display(), "run report saved");
    }

    Ok(())
}

fn run_and_print(scenario: Scenario, outcomes: &mut Vec<ScenarioOutcome>) {
    let outcome = match runner::run_scenario(&scenario) {
        Ok(report) => ScenarioOutcome::Completed(report),
        Err(err) => ScenarioOutcome::Failed {
            name: scenario.name.clone(),
            reason: err.to_string(),
        },
    };
    println!("{}", outcome.line());
    outcomes.push(outcome);
}
