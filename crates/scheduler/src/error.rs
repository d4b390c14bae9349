use thiserror::Error;

/// Errors raised while building or tearing down a [`JobSystem`](crate::JobSystem).
///
/// Admission and shutdown signalling never fail; everything here happens
/// at construction or at the final join.
#[derive(Debug, Error)]
pub enum JobSystemError {
    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("failed to spawn worker {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("worker {0} panicked")]
    WorkerPanicked(usize),
}
