use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, trace};

use crate::config::FaultPolicy;
use crate::job::{CompletionPolicy, Job, JobContext};
use crate::priority::Cursor;
use crate::queue::QueuedJob;

use super::shared::{Placement, Shared};
use super::submitter::Submitter;

/// One worker thread's loop state. Every worker runs the same loop.
pub(crate) struct Worker {
    index: usize,
    shared: Arc<Shared>,
    submitter: Submitter,
    cursor: Cursor,
}

impl Worker {
    pub(crate) fn new(shared: Arc<Shared>, index: usize) -> Self {
        Self {
            index,
            submitter: Submitter {
                shared: Arc::clone(&shared),
            },
            shared,
            cursor: Cursor::default(),
        }
    }

    /// Fetch, check readiness, execute, route. Returns once shutdown is observed.
    pub(crate) fn run(mut self) {
        debug!(worker = self.index, "worker started");
        while let Some((tier, entry)) = self.shared.next_job(&mut self.cursor) {
            self.process(tier, entry);
        }
        debug!(worker = self.index, "worker stopped");
    }

    fn process(&self, tier: usize, mut entry: QueuedJob) {
        let Some(ready) = self.guarded(&mut entry, "readiness check", |job| {
            job.ready_for_execution()
        }) else {
            return;
        };
        if !ready {
            self.demote(tier, entry);
            return;
        }

        let started = Instant::now();
        let Some(policy) = self.execute(tier, &mut entry) else {
            return;
        };
        {
            let mut metrics = self.shared.metrics_mut();
            metrics.record_execution(tier, started.elapsed());
            metrics.record_outcome(policy);
        }

        match policy {
            CompletionPolicy::Complete => {
                trace!(worker = self.index, job = %entry.id, "job complete");
            }
            CompletionPolicy::Reschedule => {
                entry.important_streak = 0;
                self.shared.admit(entry, Placement::Back(0));
            }
            CompletionPolicy::RescheduleImportant => self.reschedule_important(entry),
        }
    }

    /// Not ready: push one tier below where the job was found.
    fn demote(&self, tier: usize, mut entry: QueuedJob) {
        let lowest = self.shared.lowest_tier();
        let target = (tier + 1).min(lowest);
        debug!(
            worker = self.index,
            job = %entry.id,
            name = entry.job.name(),
            from = tier,
            to = target,
            "job not ready, demoting"
        );
        entry.important_streak = 0;
        if self.shared.admit(entry, Placement::Back(target)) {
            self.shared.metrics_mut().record_demotion(tier);
        }

        if tier == lowest {
            let backoff = self.shared.config.parked_backoff();
            if !backoff.is_zero() {
                std::thread::sleep(backoff);
            }
        }
    }

    fn reschedule_important(&self, mut entry: QueuedJob) {
        entry.important_streak += 1;
        let limit = self.shared.config.important_streak_limit;
        if limit != 0 && entry.important_streak > limit {
            debug!(
                worker = self.index,
                job = %entry.id,
                streak = entry.important_streak,
                "important streak exhausted, requeueing at back of tier 0"
            );
            entry.important_streak = 0;
            self.shared.metrics_mut().important_downgraded += 1;
            self.shared.admit(entry, Placement::Back(0));
        } else {
            self.shared.admit(entry, Placement::Front);
        }
    }

    /// Run the job outside any lock. `None` means it panicked and was
    /// isolated.
    fn execute(&self, tier: usize, entry: &mut QueuedJob) -> Option<CompletionPolicy> {
        let ctx = JobContext {
            submitter: &self.submitter,
            id: entry.id,
            tier,
            worker: self.index,
        };
        self.guarded(entry, "execute", |job| job.execute(&ctx))
    }

    /// Call into job code under the configured [`FaultPolicy`].
    ///
    /// Under `Abort` a panic never returns. Under `Isolate` the panic is
    /// logged and counted, and the caller drops the job on `None`.
    fn guarded<T>(
        &self,
        entry: &mut QueuedJob,
        stage: &'static str,
        f: impl FnOnce(&mut Box<dyn Job>) -> T,
    ) -> Option<T> {
        let job = &mut entry.job;
        let payload = match panic::catch_unwind(AssertUnwindSafe(|| f(job))) {
            Ok(value) => return Some(value),
            Err(payload) => payload,
        };

        let message = panic_message(payload.as_ref());
        match self.shared.config.fault_policy {
            FaultPolicy::Abort => {
                error!(
                    worker = self.index,
                    job = %entry.id,
                    stage,
                    panic = %message,
                    "job panicked, aborting"
                );
                std::process::abort();
            }
            FaultPolicy::Isolate => {
                error!(
                    worker = self.index,
                    job = %entry.id,
                    stage,
                    panic = %message,
                    "job panicked, dropping it"
                );
                self.shared.metrics_mut().faulted += 1;
                None
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".into()
    }
}
