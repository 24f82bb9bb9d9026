//! Request and record shapes exchanged with the control plane.

use serde::{Deserialize, Serialize};

use crate::{JobKind, JobSpec, JobStatus, TaskId};

/// Submission payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub kind: JobKind,
    pub source_params: serde_json::Value,
    pub dest_params: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_ref: Option<String>,
}

impl SubmitRequest {
    pub fn from_spec(spec: &JobSpec) -> Result<Self, serde_json::Error> {
        let (source_params, dest_params) = match spec {
            JobSpec::Import {
                source,
                destination,
            } => (
                serde_json::to_value(source)?,
                serde_json::to_value(destination)?,
            ),
            JobSpec::Export {
                source,
                destination,
            } => (
                serde_json::to_value(source)?,
                serde_json::to_value(destination)?,
            ),
        };

        Ok(Self {
            kind: spec.kind(),
            source_params,
            dest_params,
            credential_ref: spec.credential_ref().map(str::to_string),
        })
    }
}

/// Acknowledged submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitAck {
    pub task_id: TaskId,
    /// Response body as received, for callers that need fields this crate ignores.
    pub raw: serde_json::Value,
}

/// Status record of an export job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportStatusRecord {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_artifact: Option<String>,
}

impl ExportStatusRecord {
    pub fn into_status(self, task_id: TaskId) -> JobStatus {
        JobStatus {
            task_id,
            raw_state: self.state,
            started_at: self.started,
            finished_at: self.finished,
            output_artifact: self.output_artifact,
        }
    }
}

/// One entry of the recent import jobs listing of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJobRecord {
    pub task_id: TaskId,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<String>,
}

impl ImportJobRecord {
    pub fn into_status(self) -> JobStatus {
        JobStatus {
            task_id: self.task_id,
            raw_state: self.state,
            started_at: self.started,
            finished_at: self.finished,
            output_artifact: None,
        }
    }
}
