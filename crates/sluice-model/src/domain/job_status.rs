use serde::{Deserialize, Serialize};

use crate::TaskId;

/// One observation of a job's remote status.
///
/// `raw_state` is kept verbatim; classification happens in the engine so that
/// states this crate has never heard of still round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub task_id: TaskId,
    /// State string exactly as reported by the control plane.
    pub raw_state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    /// Location of the exported file (exports only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_artifact: Option<String>,
}

impl JobStatus {
    pub fn new(task_id: TaskId, raw_state: impl Into<String>) -> Self {
        Self {
            task_id,
            raw_state: raw_state.into(),
            started_at: None,
            finished_at: None,
            output_artifact: None,
        }
    }

    pub fn with_started_at(mut self, at: impl Into<String>) -> Self {
        self.started_at = Some(at.into());
        self
    }

    pub fn with_finished_at(mut self, at: impl Into<String>) -> Self {
        self.finished_at = Some(at.into());
        self
    }

    pub fn with_output_artifact(mut self, url: impl Into<String>) -> Self {
        self.output_artifact = Some(url.into());
        self
    }
}
