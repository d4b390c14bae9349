use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::job::CompletionPolicy;

/// Counters for a single priority tier.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TierMetrics {
    /// Jobs pushed into this tier (fresh, rescheduled or demoted).
    pub admitted: u64,
    /// Jobs executed after being dequeued from this tier.
    pub executed: u64,
    /// Not-ready jobs dequeued from this tier and pushed one tier down.
    pub demoted: u64,
    /// Rolling mean of `execute` wall time.
    pub avg_execute_duration: Duration,
}

/// Scheduler operational metrics.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerMetrics {
    pub tiers: Vec<TierMetrics>,
    pub completed: u64,
    pub rescheduled: u64,
    pub rescheduled_important: u64,
    /// Important re-admissions sent to the back of tier 0 by the streak limit.
    pub important_downgraded: u64,
    /// Jobs that panicked under `FaultPolicy::Isolate`.
    pub faulted: u64,
    /// Jobs still queued when the scheduler was torn down.
    pub discarded: u64,
    /// Admissions dropped because shutdown had already started.
    pub rejected: u64,
    pub last_execution: Option<DateTime<Utc>>,
}

impl SchedulerMetrics {
    pub fn new(levels: usize) -> Self {
        Self {
            tiers: vec![TierMetrics::default(); levels.max(1)],
            completed: 0,
            rescheduled: 0,
            rescheduled_important: 0,
            important_downgraded: 0,
            faulted: 0,
            discarded: 0,
            rejected: 0,
            last_execution: None,
        }
    }

    pub fn record_admission(&mut self, tier: usize) {
        if let Some(t) = self.tiers.get_mut(tier) {
            t.admitted += 1;
        }
    }

    pub fn record_demotion(&mut self, from_tier: usize) {
        if let Some(t) = self.tiers.get_mut(from_tier) {
            t.demoted += 1;
        }
    }

    /// Record one `execute` call on a job dequeued from `tier`.
    pub fn record_execution(&mut self, tier: usize, duration: Duration) {
        self.last_execution = Some(Utc::now());
        let Some(t) = self.tiers.get_mut(tier) else {
            return;
        };
        t.executed += 1;

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        t.avg_execute_duration = if t.executed == 1 {
            duration
        } else {
            let prev_nanos = t.avg_execute_duration.as_nanos() as f64;
            let cur_nanos = duration.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / t.executed as f64;
            Duration::from_nanos(avg_nanos as u64)
        };
    }

    pub fn record_outcome(&mut self, policy: CompletionPolicy) {
        match policy {
            CompletionPolicy::Complete => self.completed += 1,
            CompletionPolicy::Reschedule => self.rescheduled += 1,
            CompletionPolicy::RescheduleImportant => self.rescheduled_important += 1,
        }
    }

    pub fn executed(&self) -> u64 {
        self.tiers.iter().map(|t| t.executed).sum()
    }

    pub fn demoted(&self) -> u64 {
        self.tiers.iter().map(|t| t.demoted).sum()
    }
}

/// Point-in-time view returned by [`JobSystem::metrics`](crate::JobSystem::metrics).
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub taken_at: DateTime<Utc>,
    pub workers: usize,
    /// Queue depth per tier at the time of the snapshot.
    pub pending: Vec<usize>,
    #[serde(flatten)]
    pub metrics: SchedulerMetrics,
}

impl MetricsSnapshot {
    pub fn total_pending(&self) -> usize {
        self.pending.iter().sum()
    }
}
