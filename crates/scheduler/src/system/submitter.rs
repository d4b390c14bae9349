use std::sync::Arc;

use crate::job::{FnJob, Job, JobId};
use crate::priority::Priority;
use crate::queue::QueuedJob;

use super::shared::{Placement, Shared};

/// Cloneable admission handle.
///
/// Producers and running jobs hold one of these instead of the
/// [`JobSystem`](super::JobSystem) itself. Every `submit*` call takes
/// ownership of the job; the returned [`JobId`] is for log correlation only.
#[derive(Clone)]
pub struct Submitter {
    pub(crate) shared: Arc<Shared>,
}

impl Submitter {
    /// Admit `job` at the back of `priority`, clamped to the lowest tier.
    pub fn submit<J>(&self, job: J, priority: impl Into<Priority>) -> JobId
    where
        J: Job + 'static,
    {
        self.submit_boxed(Box::new(job), priority)
    }

    pub fn submit_boxed(&self, job: Box<dyn Job>, priority: impl Into<Priority>) -> JobId {
        let tier = priority.into().clamped(self.shared.levels());
        self.admit(job, Placement::Back(tier))
    }

    /// Admit `job` at the front of tier 0, ahead of everything already queued there.
    pub fn submit_important<J>(&self, job: J) -> JobId
    where
        J: Job + 'static,
    {
        self.submit_important_boxed(Box::new(job))
    }

    pub fn submit_important_boxed(&self, job: Box<dyn Job>) -> JobId {
        self.admit(job, Placement::Front)
    }

    /// Fire-and-forget: run `f` once on some worker.
    pub fn submit_fn<F>(&self, f: F, priority: impl Into<Priority>) -> JobId
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(FnJob::new(f), priority)
    }

    pub fn priority_levels(&self) -> usize {
        self.shared.levels()
    }

    /// `false` once shutdown has been requested.
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Queue depth per tier.
    pub fn pending(&self) -> Vec<usize> {
        self.shared.pending()
    }

    fn admit(&self, job: Box<dyn Job>, placement: Placement) -> JobId {
        let id = self.shared.next_id();
        self.shared.admit(QueuedJob::new(id, job), placement);
        id
    }
}

impl std::fmt::Debug for Submitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Submitter")
            .field("priority_levels", &self.shared.levels())
            .finish_non_exhaustive()
    }
}
