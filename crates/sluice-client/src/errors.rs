use sluice_core::ControlPlaneError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("http request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("invalid header {0}")]
    InvalidHeader(String),

    #[error("failed to parse response: {source}, body: {body}")]
    Decode {
        #[source]
        source: serde_json::Error,
        body: String,
    },
}

impl From<ClientError> for ControlPlaneError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Decode { .. } => ControlPlaneError::InvalidResponse(err.to_string()),
            other => ControlPlaneError::Network(other.to_string()),
        }
    }
}
