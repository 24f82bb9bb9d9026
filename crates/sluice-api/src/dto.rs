use serde::{Deserialize, Serialize};
use sluice_model::{
    AggregateResult, DeferredTaskHandle, JobGroup, JobSpec, JobStatus, ResolvedJob, ResumeContext,
    TaskId,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobRequest {
    pub spec: JobSpec,
    #[serde(default)]
    pub defer: bool,
}

/// Result of [`crate::ApiHandler::submit_job`].
///
/// Deferred submissions carry `task_id` and `resume_context`. Synchronous ones add
/// `result` on success or `error` otherwise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_context: Option<ResumeContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmitJobResponse {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollJobRequest {
    pub task_id: TaskId,
    pub resume_context: ResumeContext,
}

impl From<PollJobRequest> for DeferredTaskHandle {
    fn from(req: PollJobRequest) -> Self {
        DeferredTaskHandle {
            task_id: req.task_id,
            resume_context: req.resume_context,
        }
    }
}

impl From<DeferredTaskHandle> for PollJobRequest {
    fn from(handle: DeferredTaskHandle) -> Self {
        Self {
            task_id: handle.task_id,
            resume_context: handle.resume_context,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollJobResponse {
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub jobs: Vec<JobSpec>,
}

/// One job of a finished batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub task_id: TaskId,
    pub group: JobGroup,
    /// `succeeded`, `failed` or `exhausted`.
    pub outcome: String,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ResolvedJob> for BatchItem {
    fn from(resolved: &ResolvedJob) -> Self {
        Self {
            task_id: resolved.job.task_id.clone(),
            group: resolved.job.spec.group(),
            outcome: resolved.outcome.label().to_string(),
            attempts: resolved.outcome.attempts(),
            status: resolved.outcome.status().cloned(),
            error: resolved.outcome.error_message(),
        }
    }
}

/// Batch summary. `error` is `"<failed> / <total> jobs failed"` when any job failed,
/// or the reason the batch could not run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub total_passed: usize,
    pub total_failed: usize,
    pub passed: Vec<BatchItem>,
    pub failed: Vec<BatchItem>,
    pub error: Option<String>,
}

impl BatchResponse {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

impl From<&AggregateResult> for BatchResponse {
    fn from(result: &AggregateResult) -> Self {
        Self {
            total_passed: result.total_passed,
            total_failed: result.total_failed,
            passed: result.passed.iter().map(BatchItem::from).collect(),
            failed: result.failed.iter().map(BatchItem::from).collect(),
            error: result.error(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_request_defaults_to_sync() {
        let req: SubmitJobRequest = serde_json::from_value(serde_json::json!({
            "spec": {
                "kind": "export",
                "source": {"type": "query", "query": "SELECT 1"},
                "destination": {}
            }
        }))
        .unwrap();

        assert!(!req.defer);
        assert_eq!(req.spec.group(), JobGroup::QueryExport);
    }

    #[test]
    fn deferred_response_serializes_handle_fields_only() {
        let response = SubmitJobResponse {
            task_id: Some(TaskId::from("imp-1")),
            resume_context: Some(ResumeContext::import("acme", "crm")),
            ..SubmitJobResponse::default()
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["taskId"], "imp-1");
        assert_eq!(json["resumeContext"]["kind"], "import");
        assert_eq!(json["resumeContext"]["namespace"], "acme");
        assert!(json.get("result").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn batch_response_keeps_null_error() {
        let json = serde_json::to_value(BatchResponse::from(&AggregateResult::new())).unwrap();

        assert_eq!(json["totalPassed"], 0);
        assert_eq!(json["totalFailed"], 0);
        assert!(json["error"].is_null());
    }

    #[test]
    fn poll_request_round_trips_through_handle() {
        let handle = DeferredTaskHandle::export("e-1");
        let req = PollJobRequest::from(handle.clone());
        assert_eq!(DeferredTaskHandle::from(req), handle);
    }
}
