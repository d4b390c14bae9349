use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use jobsys_scheduler::{CompletionPolicy, Job, JobContext, JobSystem};

/// Counts outstanding jobs and wakes the driver when they reach zero.
pub struct Tally {
    remaining: Mutex<usize>,
    drained: Condvar,
}

impl Tally {
    pub fn new(expected: usize) -> Arc<Self> {
        Arc::new(Self {
            remaining: Mutex::new(expected),
            drained: Condvar::new(),
        })
    }

    pub fn finish_one(&self) {
        let mut remaining = self.remaining.lock().unwrap_or_else(PoisonError::into_inner);
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            self.drained.notify_all();
        }
    }

    /// Wait for every job to finish. Returns how many are still outstanding.
    pub fn wait(&self, timeout: Duration) -> usize {
        let guard = self.remaining.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .drained
            .wait_timeout_while(guard, timeout, |remaining| *remaining > 0)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

fn spin(duration: Duration) {
    let start = Instant::now();
    while start.elapsed() < duration {
        std::hint::spin_loop();
    }
}

/// Plain CPU-bound job.
struct SpinJob {
    spin: Duration,
    tally: Arc<Tally>,
}

impl Job for SpinJob {
    fn name(&self) -> &str {
        "spin"
    }

    fn execute(&mut self, _ctx: &JobContext<'_>) -> CompletionPolicy {
        spin(self.spin);
        self.tally.finish_one();
        CompletionPolicy::Complete
    }
}

/// Not ready until its latch is opened by a later job.
struct LatchedJob {
    latch: Arc<AtomicBool>,
    spin: Duration,
    tally: Arc<Tally>,
}

impl Job for LatchedJob {
    fn name(&self) -> &str {
        "latched"
    }

    fn ready_for_execution(&self) -> bool {
        self.latch.load(Ordering::Acquire)
    }

    fn execute(&mut self, ctx: &JobContext<'_>) -> CompletionPolicy {
        debug!(job = %ctx.job_id(), tier = ctx.tier(), "latched job released");
        spin(self.spin);
        self.tally.finish_one();
        CompletionPolicy::Complete
    }
}

/// Re-executes itself `remaining` times, alternating normal and important
/// reschedules.
struct ChainJob {
    remaining: u32,
    spin: Duration,
    tally: Arc<Tally>,
}

impl Job for ChainJob {
    fn name(&self) -> &str {
        "chain"
    }

    fn execute(&mut self, _ctx: &JobContext<'_>) -> CompletionPolicy {
        spin(self.spin);
        if self.remaining == 0 {
            self.tally.finish_one();
            return CompletionPolicy::Complete;
        }
        self.remaining -= 1;
        if self.remaining % 2 == 0 {
            CompletionPolicy::RescheduleImportant
        } else {
            CompletionPolicy::Reschedule
        }
    }
}

/// Shape of the synthetic workload.
#[derive(Debug, Clone)]
pub struct WorkloadSpec {
    pub jobs: usize,
    pub not_ready_every: usize,
    pub chain_every: usize,
    pub chain_length: u32,
    pub spin: Duration,
}

fn every(n: usize, i: usize) -> bool {
    n != 0 && i % n == n - 1
}

/// Submit the workload round-robin across every tier. Each latched job is
/// opened by a fire-and-forget closure on the lowest tier.
pub fn submit(system: &JobSystem, spec: &WorkloadSpec) -> Arc<Tally> {
    let levels = system.priority_levels();
    let tally = Tally::new(spec.jobs);
    let submitter = system.submitter();
    let mut latched = 0usize;
    let mut chains = 0usize;

    for i in 0..spec.jobs {
        let tier = i % levels;
        if every(spec.not_ready_every, i) {
            let latch = Arc::new(AtomicBool::new(false));
            submitter.submit(
                LatchedJob {
                    latch: Arc::clone(&latch),
                    spin: spec.spin,
                    tally: Arc::clone(&tally),
                },
                tier,
            );
            submitter.submit_fn(move || latch.store(true, Ordering::Release), levels - 1);
            latched += 1;
        } else if every(spec.chain_every, i) {
            submitter.submit(
                ChainJob {
                    remaining: spec.chain_length,
                    spin: spec.spin,
                    tally: Arc::clone(&tally),
                },
                tier,
            );
            chains += 1;
        } else {
            submitter.submit(
                SpinJob {
                    spin: spec.spin,
                    tally: Arc::clone(&tally),
                },
                tier,
            );
        }
    }

    info!(jobs = spec.jobs, latched, chains, levels, "workload submitted");
    tally
}

#[cfg(test)]
mod tests {
    use jobsys_scheduler::SchedulerConfig;

    use super::*;

    #[test]
    fn every_selects_last_of_each_group() {
        let picked: Vec<usize> = (0..10).filter(|&i| every(3, i)).collect();
        assert_eq!(picked, vec![2, 5, 8]);
        assert!(!(0..10).any(|i| every(0, i)));
    }

    #[test]
    fn small_workload_drains() {
        let system = JobSystem::new(SchedulerConfig {
            worker_threads: 2,
            ..Default::default()
        })
        .unwrap();
        let spec = WorkloadSpec {
            jobs: 200,
            not_ready_every: 5,
            chain_every: 7,
            chain_length: 3,
            spin: Duration::from_micros(1),
        };

        let tally = submit(&system, &spec);
        assert_eq!(tally.wait(Duration::from_secs(10)), 0);

        let snapshot = system.metrics();
        // 200 workload jobs plus one latch opener per latched job
        assert!(snapshot.metrics.executed() >= 240);
        system.shutdown().unwrap();
    }
}
