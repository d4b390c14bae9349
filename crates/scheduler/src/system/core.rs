use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::Utc;
use tracing::{error, info};

use crate::config::SchedulerConfig;
use crate::error::JobSystemError;
use crate::job::{Job, JobId};
use crate::metrics::MetricsSnapshot;
use crate::priority::Priority;

use super::shared::Shared;
use super::submitter::Submitter;
use super::worker::Worker;

/// The job system. Owns the worker threads and the priority tiers.
///
/// Workers start in [`JobSystem::new`]; dropping the system stops them,
/// joins them and drops every job that was still queued.
pub struct JobSystem {
    shared: Arc<Shared>,
    submitter: Submitter,
    workers: Vec<JoinHandle<()>>,
    torn_down: bool,
}

impl JobSystem {
    /// Validate `config` and spawn every worker.
    pub fn new(config: SchedulerConfig) -> Result<Self, JobSystemError> {
        config.validate()?;
        let num_workers = config.resolved_worker_threads();
        let prefix = config.thread_name_prefix.clone();
        let shared = Arc::new(Shared::new(config));

        let mut workers = Vec::with_capacity(num_workers);
        for index in 0..num_workers {
            let worker = Worker::new(Arc::clone(&shared), index);
            let spawned = thread::Builder::new()
                .name(format!("{prefix}-{index}"))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(source) => {
                    error!(worker = index, error = %source, "failed to spawn worker");
                    shared.stop();
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(JobSystemError::Spawn { index, source });
                }
            }
        }

        info!(
            workers = num_workers,
            levels = shared.levels(),
            sequence = ?shared.sequence.as_slice(),
            "job system started"
        );

        Ok(Self {
            submitter: Submitter {
                shared: Arc::clone(&shared),
            },
            shared,
            workers,
            torn_down: false,
        })
    }

    /// Start with [`SchedulerConfig::default`].
    pub fn with_defaults() -> Result<Self, JobSystemError> {
        Self::new(SchedulerConfig::default())
    }

    /// A cloneable admission handle for producers.
    pub fn submitter(&self) -> Submitter {
        self.submitter.clone()
    }

    pub fn submit<J>(&self, job: J, priority: impl Into<Priority>) -> JobId
    where
        J: Job + 'static,
    {
        self.submitter.submit(job, priority)
    }

    pub fn submit_boxed(&self, job: Box<dyn Job>, priority: impl Into<Priority>) -> JobId {
        self.submitter.submit_boxed(job, priority)
    }

    pub fn submit_important<J>(&self, job: J) -> JobId
    where
        J: Job + 'static,
    {
        self.submitter.submit_important(job)
    }

    pub fn submit_important_boxed(&self, job: Box<dyn Job>) -> JobId {
        self.submitter.submit_important_boxed(job)
    }

    pub fn submit_fn<F>(&self, f: F, priority: impl Into<Priority>) -> JobId
    where
        F: FnOnce() + Send + 'static,
    {
        self.submitter.submit_fn(f, priority)
    }

    /// Signal every worker to stop after its current job. Does not block.
    ///
    /// Jobs still queued are never executed; they are dropped when the
    /// system is torn down.
    pub fn finish_remaining(&self) {
        self.shared.stop();
    }

    /// Stop, join every worker and drop leftover jobs.
    ///
    /// Reports the first worker that terminated by panicking.
    pub fn shutdown(mut self) -> Result<(), JobSystemError> {
        self.teardown()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn priority_levels(&self) -> usize {
        self.shared.levels()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Queue depth per tier.
    pub fn pending(&self) -> Vec<usize> {
        self.shared.pending()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            taken_at: Utc::now(),
            workers: self.workers.len(),
            pending: self.shared.pending(),
            metrics: self.shared.metrics(),
        }
    }

    fn teardown(&mut self) -> Result<(), JobSystemError> {
        if std::mem::replace(&mut self.torn_down, true) {
            return Ok(());
        }
        self.shared.stop();

        let mut panicked = None;
        for (index, handle) in self.workers.drain(..).enumerate() {
            if handle.join().is_err() {
                error!(worker = index, "worker terminated by panic");
                panicked.get_or_insert(index);
            }
        }

        let discarded = self.shared.discard_pending();
        if discarded > 0 {
            info!(discarded, "dropped queued jobs at shutdown");
        }
        info!("job system stopped");

        match panicked {
            Some(index) => Err(JobSystemError::WorkerPanicked(index)),
            None => Ok(()),
        }
    }
}

impl Drop for JobSystem {
    fn drop(&mut self) {
        // errors were already logged
        let _ = self.teardown();
    }
}

impl std::fmt::Debug for JobSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSystem")
            .field("workers", &self.workers.len())
            .field("priority_levels", &self.shared.levels())
            .field("torn_down", &self.torn_down)
            .finish()
    }
}
