//! Worker pool, admission and shutdown.
//!
//! Split into focused submodules:
//! - `core`: JobSystem struct, construction, accessors and teardown
//! - `shared`: the mutex-guarded tiers, condition variable and metrics
//! - `submitter`: the cloneable admission handle
//! - `worker`: the per-thread fetch/check/execute/route loop

mod core;
mod shared;
mod submitter;
mod worker;
#[cfg(test)]
mod tests;

pub use self::core::JobSystem;
pub use self::submitter::Submitter;
