use thiserror::Error;

/// Failure to set up process logging.
#[derive(Debug, Error)]
pub enum LoggerError {
    /// `SLUICE_LOG_FORMAT` or the config named a format we do not know.
    #[error("unknown log format `{0}`, expected text, json or journald")]
    InvalidFormat(String),
    /// Journald output needs Linux and the `journald` feature.
    #[error("journald output is unavailable in this build")]
    JournaldUnavailable,
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
    /// The output backend refused to start.
    #[error("{backend} logger failed to start: {reason}")]
    Backend {
        backend: &'static str,
        reason: String,
    },
    /// Level or `RUST_LOG` directives that do not parse as a filter.
    #[error("invalid log filter `{0}`")]
    InvalidFilter(String),
}
