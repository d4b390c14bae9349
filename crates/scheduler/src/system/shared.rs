use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockWriteGuard};

use tracing::{info, trace, warn};

use crate::config::SchedulerConfig;
use crate::job::JobId;
use crate::metrics::SchedulerMetrics;
use crate::priority::{Cursor, SelectionSequence};
use crate::queue::{QueuedJob, TierQueues};

/// Where an admission lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    /// Tail of the given tier (clamped to the lowest tier).
    Back(usize),
    /// Head of tier 0.
    Front,
}

/// Everything guarded by the single scheduler mutex.
pub(crate) struct QueueState {
    pub(crate) tiers: TierQueues,
    pub(crate) running: bool,
}

/// State shared by the [`JobSystem`](super::JobSystem), its workers and every
/// [`Submitter`](super::Submitter).
pub(crate) struct Shared {
    state: Mutex<QueueState>,
    available: Condvar,
    pub(crate) sequence: SelectionSequence,
    pub(crate) config: SchedulerConfig,
    metrics: RwLock<SchedulerMetrics>,
    next_id: AtomicU64,
}

impl Shared {
    pub(crate) fn new(config: SchedulerConfig) -> Self {
        let levels = config.priority_levels.max(1);
        Self {
            state: Mutex::new(QueueState {
                tiers: TierQueues::new(levels),
                running: true,
            }),
            available: Condvar::new(),
            sequence: SelectionSequence::new(levels),
            metrics: RwLock::new(SchedulerMetrics::new(levels)),
            config,
            next_id: AtomicU64::new(1),
        }
    }

    // Job code never runs under these locks, so a poisoned guard still
    // holds consistent data.
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn metrics_mut(&self) -> RwLockWriteGuard<'_, SchedulerMetrics> {
        self.metrics.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn metrics(&self) -> SchedulerMetrics {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn levels(&self) -> usize {
        self.sequence.levels()
    }

    pub(crate) fn lowest_tier(&self) -> usize {
        self.levels() - 1
    }

    pub(crate) fn next_id(&self) -> JobId {
        JobId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn is_running(&self) -> bool {
        self.lock_state().running
    }

    pub(crate) fn pending(&self) -> Vec<usize> {
        self.lock_state().tiers.depths()
    }

    /// Push a job and wake one worker. Returns `false` if shutdown has begun,
    /// in which case the job is dropped without running.
    pub(crate) fn admit(&self, entry: QueuedJob, placement: Placement) -> bool {
        let tier = match placement {
            Placement::Back(tier) => tier.min(self.lowest_tier()),
            Placement::Front => 0,
        };

        let mut state = self.lock_state();
        if !state.running {
            drop(state);
            warn!(
                job = %entry.id,
                name = entry.job.name(),
                "admission after shutdown, dropping job"
            );
            self.metrics_mut().rejected += 1;
            // dropped outside the lock: a job's Drop may submit again
            drop(entry);
            return false;
        }

        trace!(job = %entry.id, tier, ?placement, "job admitted");
        match placement {
            Placement::Back(_) => state.tiers.push_back(tier, entry),
            Placement::Front => state.tiers.push_front(0, entry),
        }
        // counted before a worker can pop it, so `admitted >= executed` per tier
        self.metrics_mut().record_admission(tier);
        drop(state);

        self.available.notify_one();
        true
    }

    /// Block until a job is available or the scheduler stops.
    ///
    /// Returns the tier the job was popped from alongside the job, so a
    /// demotion is computed from where the job actually was.
    pub(crate) fn next_job(&self, cursor: &mut Cursor) -> Option<(usize, QueuedJob)> {
        let mut state = self.lock_state();
        loop {
            if !state.running {
                return None;
            }
            if let Some(found) = state.tiers.pop_next(&self.sequence, cursor) {
                return Some(found);
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Clear the running flag and wake every worker. Does not wait.
    pub(crate) fn stop(&self) {
        let was_running = {
            let mut state = self.lock_state();
            std::mem::replace(&mut state.running, false)
        };
        if was_running {
            info!("job system shutdown requested");
        }
        self.available.notify_all();
    }

    /// Remove and drop every queued job. Returns how many were dropped.
    pub(crate) fn discard_pending(&self) -> usize {
        let leftover = self.lock_state().tiers.drain_all();
        let count = leftover.len();
        if count > 0 {
            self.metrics_mut().discarded += count as u64;
        }
        drop(leftover);
        count
    }
}
