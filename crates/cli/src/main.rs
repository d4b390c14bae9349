mod cli;
mod config;
mod workload;

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};

use jobsys_scheduler::{JobSystem, MetricsSnapshot};

use crate::cli::CliArgs;
use crate::workload::WorkloadSpec;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let config = config::resolve(&args)?;
    let system = JobSystem::new(config).context("failed to start job system")?;

    let spec = WorkloadSpec {
        jobs: args.jobs,
        not_ready_every: args.not_ready_every,
        chain_every: args.chain_every,
        chain_length: args.chain_length,
        spin: Duration::from_micros(args.spin_us),
    };

    let started = Instant::now();
    let tally = workload::submit(&system, &spec);
    let outstanding = tally.wait(Duration::from_secs(args.timeout_secs));
    let elapsed = started.elapsed();

    let snapshot = system.metrics();
    system.shutdown().context("job system did not shut down cleanly")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_summary(&snapshot, elapsed);
    }

    if outstanding > 0 {
        warn!(outstanding, "workload did not drain before the timeout");
        bail!("{outstanding} jobs still outstanding after {}s", args.timeout_secs);
    }
    info!(elapsed_ms = elapsed.as_millis() as u64, "soak complete");
    Ok(())
}

fn print_summary(snapshot: &MetricsSnapshot, elapsed: Duration) {
    let m = &snapshot.metrics;
    println!(
        "workers={} tiers={} elapsed={:.3}s",
        snapshot.workers,
        m.tiers.len(),
        elapsed.as_secs_f64()
    );
    println!(
        "{:>4} {:>10} {:>10} {:>10} {:>12}",
        "tier", "admitted", "executed", "demoted", "avg_exec_us"
    );
    for (tier, t) in m.tiers.iter().enumerate() {
        println!(
            "{:>4} {:>10} {:>10} {:>10} {:>12.1}",
            tier,
            t.admitted,
            t.executed,
            t.demoted,
            t.avg_execute_duration.as_secs_f64() * 1e6
        );
    }
    println!(
        "completed={} rescheduled={} important={} downgraded={} faulted={} discarded={} rejected={}",
        m.completed,
        m.rescheduled,
        m.rescheduled_important,
        m.important_downgraded,
        m.faulted,
        m.discarded,
        m.rejected
    );
}
