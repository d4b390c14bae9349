//! Priority-aware job scheduler.
//!
//! A fixed pool of worker threads pulls [`Job`]s from P priority tiers using
//! a weighted round-robin [`SelectionSequence`]. Jobs that are not ready are
//! demoted one tier instead of executed, and a job can ask to run again
//! (normally or ahead of its tier) through its [`CompletionPolicy`].

pub mod config;
pub mod error;
pub mod job;
pub mod metrics;
pub mod priority;
mod queue;
pub mod system;

pub use config::{FaultPolicy, SchedulerConfig, MAX_PRIORITY_LEVELS};
pub use error::JobSystemError;
pub use job::{CompletionPolicy, FnJob, Job, JobContext, JobId};
pub use metrics::{MetricsSnapshot, SchedulerMetrics, TierMetrics};
pub use priority::{Cursor, Priority, SelectionSequence};
pub use system::{JobSystem, Submitter};
