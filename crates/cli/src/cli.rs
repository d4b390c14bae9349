use clap::Parser;

/// Soak driver for the jobsys scheduler.
///
/// Floods a job system with a mixed workload across every priority tier,
/// waits for it to drain, and prints the scheduler metrics.
#[derive(Parser, Debug)]
#[command(name = "jobsys-soak", version, about)]
pub struct CliArgs {
    /// Path to a scheduler TOML config (defaults plus JOBSYS_* env when omitted).
    #[arg(long, env = "JOBSYS_CONFIG")]
    pub config: Option<String>,

    /// Total jobs to submit.
    #[arg(long, default_value_t = 10_000)]
    pub jobs: usize,

    /// Worker thread override (0 = available parallelism).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Priority tier count override.
    #[arg(long)]
    pub levels: Option<usize>,

    /// Every Nth job starts not ready and waits on a latch (0 disables).
    #[arg(long, default_value_t = 7)]
    pub not_ready_every: usize,

    /// Every Nth job reschedules itself `chain_length` times (0 disables).
    #[arg(long, default_value_t = 11)]
    pub chain_every: usize,

    /// Re-executions per chain job.
    #[arg(long, default_value_t = 3)]
    pub chain_length: u32,

    /// Busy-work per execution, in microseconds.
    #[arg(long, default_value_t = 20)]
    pub spin_us: u64,

    /// Give up waiting for the workload after this many seconds.
    #[arg(long, default_value_t = 60)]
    pub timeout_secs: u64,

    /// Print the metrics snapshot as JSON.
    #[arg(long)]
    pub json: bool,
}
