use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("core error: {0}")]
    Core(#[from] sluice_core::CoreError),
}
