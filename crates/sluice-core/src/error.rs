use sluice_model::{SpecError, TaskId};
use thiserror::Error;

/// Failure reported by a [`crate::ControlPlane`] transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlPlaneError {
    #[error("network error: {0}")]
    Network(String),

    #[error("control plane returned an error (http {status}): {message}")]
    Remote { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ControlPlaneError {
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid job: {0}")]
    InvalidJob(#[from] SpecError),

    #[error("failed to encode submission: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("submission failed: {0}")]
    Submit(#[source] ControlPlaneError),

    #[error("status check for {task_id} failed: {source}")]
    Poll {
        task_id: TaskId,
        #[source]
        source: ControlPlaneError,
    },

    #[error("job log lookup for {task_id} failed: {source}")]
    Log {
        task_id: TaskId,
        #[source]
        source: ControlPlaneError,
    },

    #[error("cancelled")]
    Cancelled,

    #[error("poll loop stopped unexpectedly: {0}")]
    Join(String),
}

impl CoreError {
    /// Transport error underneath this failure, if any.
    pub fn transport(&self) -> Option<&ControlPlaneError> {
        match self {
            CoreError::Submit(e) => Some(e),
            CoreError::Poll { source, .. } | CoreError::Log { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CoreError::Cancelled)
    }
}
