use crate::system::Submitter;

/// What the scheduler does with a job after one `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionPolicy {
    /// Done. The job is dropped.
    Complete,
    /// Run again: re-admitted at the back of tier 0.
    Reschedule,
    /// Run again soon: re-admitted at the front of tier 0.
    RescheduleImportant,
}

/// Diagnostic identifier assigned at first admission.
///
/// Used in log fields only; it carries no ordering meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub(crate) u64);

impl JobId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A unit of work the [`JobSystem`](crate::JobSystem) can run.
///
/// Jobs are exclusively owned: the producer hands over a `Box<dyn Job>` and
/// from then on the job lives in exactly one queue or on exactly one worker.
/// Successive executions of the same job may happen on different threads.
pub trait Job: Send {
    /// Human-readable name for logging.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Whether the job can make progress now.
    ///
    /// A job that is not ready is demoted one tier instead of executed.
    /// Must not have side effects the job relies on.
    fn ready_for_execution(&self) -> bool {
        true
    }

    /// Do the work. Runs without any scheduler lock held.
    fn execute(&mut self, ctx: &JobContext<'_>) -> CompletionPolicy;
}

/// The scheduler as seen from inside [`Job::execute`].
pub struct JobContext<'a> {
    pub(crate) submitter: &'a Submitter,
    pub(crate) id: JobId,
    pub(crate) tier: usize,
    pub(crate) worker: usize,
}

impl<'a> JobContext<'a> {
    /// Handle for admitting follow-up jobs into the same scheduler.
    pub fn submitter(&self) -> &'a Submitter {
        self.submitter
    }

    pub fn job_id(&self) -> JobId {
        self.id
    }

    /// Tier this job was dequeued from for the current execution.
    pub fn tier(&self) -> usize {
        self.tier
    }

    /// Index of the executing worker thread.
    pub fn worker(&self) -> usize {
        self.worker
    }
}

/// Runs a closure once and completes. Backs [`Submitter::submit_fn`].
pub struct FnJob<F> {
    name: &'static str,
    f: Option<F>,
}

impl<F> FnJob<F>
where
    F: FnOnce() + Send,
{
    pub fn new(f: F) -> Self {
        Self {
            name: "fn-job",
            f: Some(f),
        }
    }

    pub fn named(name: &'static str, f: F) -> Self {
        Self { name, f: Some(f) }
    }
}

impl<F> Job for FnJob<F>
where
    F: FnOnce() + Send,
{
    fn name(&self) -> &str {
        self.name
    }

    fn execute(&mut self, _ctx: &JobContext<'_>) -> CompletionPolicy {
        if let Some(f) = self.f.take() {
            f();
        }
        CompletionPolicy::Complete
    }
}
