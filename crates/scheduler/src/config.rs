use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::JobSystemError;

/// Upper bound on tier count. The selection sequence grows as P(P+1)/2.
pub const MAX_PRIORITY_LEVELS: usize = 16;

/// What a worker does when a job panics inside `execute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultPolicy {
    /// Log the panic and abort the process.
    #[default]
    Abort,
    /// Catch the panic, log it, drop the job and keep the worker running.
    Isolate,
}

impl std::str::FromStr for FaultPolicy {
    type Err = JobSystemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "isolate" => Ok(Self::Isolate),
            other => Err(JobSystemError::Config(format!(
                "invalid fault policy '{other}', expected 'abort' or 'isolate'"
            ))),
        }
    }
}

/// Job system configuration, typically parsed from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Number of worker threads. 0 = available parallelism.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// Number of priority tiers. Tier 0 is the highest.
    #[serde(default = "default_priority_levels")]
    pub priority_levels: usize,
    /// Worker threads are named `{prefix}-{index}`.
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
    /// Consecutive important re-admissions allowed before a job is sent to
    /// the back of tier 0 instead. 0 = unlimited.
    #[serde(default = "default_important_streak_limit")]
    pub important_streak_limit: u32,
    /// Pause after re-parking a not-ready job on the lowest tier, in microseconds.
    #[serde(default = "default_parked_backoff_us")]
    pub parked_backoff_us: u64,
    /// Panic handling for job execution.
    #[serde(default)]
    pub fault_policy: FaultPolicy,
}

fn default_worker_threads() -> usize { 0 }
fn default_priority_levels() -> usize { 4 }
fn default_thread_name_prefix() -> String { "jobsys-worker".into() }
fn default_important_streak_limit() -> u32 { 16 }
fn default_parked_backoff_us() -> u64 { 50 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            priority_levels: default_priority_levels(),
            thread_name_prefix: default_thread_name_prefix(),
            important_streak_limit: default_important_streak_limit(),
            parked_backoff_us: default_parked_backoff_us(),
            fault_policy: FaultPolicy::default(),
        }
    }
}

impl SchedulerConfig {
    /// Parse config from a TOML string, apply `JOBSYS_*` overrides and validate.
    pub fn from_toml(toml_str: &str) -> Result<Self, JobSystemError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, JobSystemError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Defaults plus environment overrides, validated.
    pub fn from_env() -> Result<Self, JobSystemError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve worker thread count (0 means use available parallelism).
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.worker_threads
        }
    }

    pub fn parked_backoff(&self) -> Duration {
        Duration::from_micros(self.parked_backoff_us)
    }

    pub fn validate(&self) -> Result<(), JobSystemError> {
        if self.priority_levels == 0 || self.priority_levels > MAX_PRIORITY_LEVELS {
            return Err(JobSystemError::Config(format!(
                "priority_levels must be between 1 and {MAX_PRIORITY_LEVELS}, got {}",
                self.priority_levels
            )));
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err(JobSystemError::Config(
                "thread_name_prefix must not be empty".into(),
            ));
        }
        Ok(())
    }

    // ── Environment variable overrides ──────────────────────────────

    /// Apply environment variable overrides.
    ///
    /// Convention: `JOBSYS_KEY` overrides `key`, e.g.
    /// `JOBSYS_WORKER_THREADS` -> `worker_threads`.
    pub fn apply_env_overrides(&mut self) -> Result<(), JobSystemError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub(crate) fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), JobSystemError> {
        if let Some(v) = lookup("JOBSYS_WORKER_THREADS") {
            self.worker_threads = parse_override("JOBSYS_WORKER_THREADS", &v)?;
        }
        if let Some(v) = lookup("JOBSYS_PRIORITY_LEVELS") {
            self.priority_levels = parse_override("JOBSYS_PRIORITY_LEVELS", &v)?;
        }
        if let Some(v) = lookup("JOBSYS_THREAD_NAME_PREFIX") {
            self.thread_name_prefix = v;
        }
        if let Some(v) = lookup("JOBSYS_IMPORTANT_STREAK_LIMIT") {
            self.important_streak_limit = parse_override("JOBSYS_IMPORTANT_STREAK_LIMIT", &v)?;
        }
        if let Some(v) = lookup("JOBSYS_PARKED_BACKOFF_US") {
            self.parked_backoff_us = parse_override("JOBSYS_PARKED_BACKOFF_US", &v)?;
        }
        if let Some(v) = lookup("JOBSYS_FAULT_POLICY") {
            self.fault_policy = v.parse()?;
        }
        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, JobSystemError> {
    value
        .trim()
        .parse()
        .map_err(|_| JobSystemError::Config(format!("{key}: cannot parse '{value}'")))
}
