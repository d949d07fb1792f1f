use thiserror::Error;

/// Timer error types covering configuration, expiry failures, and loop startup.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TimerError {
    /// Configuration rejected before any loop started.
    #[error("configuration error: {0}")]
    Config(String),

    /// The expiry action returned an error or panicked.
    #[error("expiry action failed: {0}")]
    Expiry(String),

    /// A loop thread could not be created.
    #[error("failed to spawn {thread} thread: {reason}")]
    Spawn {
        /// Name of the thread that failed to start.
        thread: String,
        /// OS-level reason.
        reason: String,
    },

    /// The dispatcher refused or lost a repeating source.
    #[error("dispatcher error: {0}")]
    Dispatch(String),

    /// A loop thread panicked and could not be joined cleanly.
    #[error("{0} thread panicked")]
    ThreadPanicked(String),
}

/// Convenience type alias for timer operations.
pub type TimerResult<T> = Result<T, TimerError>;
