use std::sync::Arc;

use async_trait::async_trait;
use sluice_core::{BatchExecution, ControlPlane, CoreError, ExecuteOptions, Execution, JobEngine};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    dto::{
        BatchRequest, BatchResponse, PollJobRequest, PollJobResponse, SubmitJobRequest,
        SubmitJobResponse,
    },
    error::ApiError,
    handler::ApiHandler,
};

/// Adapter that bridges a [`JobEngine`] to [`ApiHandler`].
///
/// Cancelling the token stops every wait started through this adapter.
pub struct EngineAdapter<C> {
    engine: Arc<JobEngine<C>>,
    cancel: CancellationToken,
}

impl<C> EngineAdapter<C>
where
    C: ControlPlane,
{
    pub fn new(engine: Arc<JobEngine<C>>) -> Self {
        Self {
            engine,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Splits core errors into request rejections and failures reported in the body.
fn reportable(err: CoreError) -> Result<String, ApiError> {
    match err {
        CoreError::InvalidJob(e) => Err(ApiError::InvalidRequest(e.to_string())),
        CoreError::Cancelled => Err(ApiError::Core(CoreError::Cancelled)),
        other => {
            warn!(error = %other, "job call failed");
            Ok(other.to_string())
        }
    }
}

#[async_trait]
impl<C> ApiHandler for EngineAdapter<C>
where
    C: ControlPlane,
{
    async fn submit_job(&self, req: SubmitJobRequest) -> Result<SubmitJobResponse, ApiError> {
        let options = ExecuteOptions { defer: req.defer };
        let execution = match self.engine.execute(req.spec, options, &self.cancel).await {
            Ok(execution) => execution,
            Err(e) => return reportable(e).map(SubmitJobResponse::failed),
        };

        Ok(match execution {
            Execution::Deferred(handle) => SubmitJobResponse {
                task_id: Some(handle.task_id),
                resume_context: Some(handle.resume_context),
                ..SubmitJobResponse::default()
            },
            Execution::Completed(report) => SubmitJobResponse {
                result: report.response().cloned(),
                error: report.error(),
                resume_context: Some(report.job.spec.resume_context()),
                task_id: Some(report.job.task_id),
            },
        })
    }

    async fn poll_job(&self, req: PollJobRequest) -> Result<PollJobResponse, ApiError> {
        if req.task_id.is_empty() {
            return Err(ApiError::InvalidRequest("task id is empty".into()));
        }

        match self.engine.poll(req.into()).await {
            Ok(report) => Ok(PollJobResponse {
                completed: report.completed,
                result: report.response,
                error: report.error,
            }),
            Err(e) => reportable(e).map(|error| PollJobResponse {
                completed: false,
                result: None,
                error: Some(error),
            }),
        }
    }

    async fn submit_batch(&self, req: BatchRequest) -> Result<BatchResponse, ApiError> {
        match self
            .engine
            .execute_batch(req.jobs, ExecuteOptions::default(), &self.cancel)
            .await
        {
            Ok(BatchExecution::Completed(result)) => Ok(BatchResponse::from(&result)),
            Ok(BatchExecution::Deferred(_)) => Err(ApiError::InvalidRequest(
                "batch was deferred by a synchronous call".into(),
            )),
            Err(e) => reportable(e).map(BatchResponse::failed),
        }
    }

    async fn job_log(&self, req: PollJobRequest) -> Result<Option<String>, ApiError> {
        self.engine
            .job_log(&req.into())
            .await
            .map_err(ApiError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::{
        ControlPlaneError,
        testing::{Reply, ScriptedControlPlane, import_record, import_spec, query_export, table_export},
    };
    use sluice_model::{DeferredTaskHandle, ExportDestination, ExportSource, JobSpec, ResumeContext, TaskId};

    fn adapter(plane: &Arc<ScriptedControlPlane>) -> EngineAdapter<ScriptedControlPlane> {
        EngineAdapter::new(Arc::new(JobEngine::new(Arc::clone(plane))))
    }

    #[tokio::test(start_paused = true)]
    async fn sync_submit_returns_result() {
        let plane = Arc::new(ScriptedControlPlane::new().with_task_ids(["e-1"]));
        plane.script_export(
            "e-1",
            vec![
                Reply::state("PENDING"),
                Reply::State {
                    state: "SUCCESS".into(),
                    output_artifact: Some("s3://out.parquet".into()),
                },
            ],
        );

        let response = adapter(&plane)
            .submit_job(SubmitJobRequest {
                spec: query_export("SELECT 1"),
                defer: false,
            })
            .await
            .unwrap();

        assert_eq!(response.task_id, Some(TaskId::from("e-1")));
        assert!(response.error.is_none());
        assert_eq!(
            response.result.unwrap().output_artifact.as_deref(),
            Some("s3://out.parquet")
        );
    }

    #[tokio::test]
    async fn remote_submit_error_lands_in_body() {
        let plane = Arc::new(ScriptedControlPlane::new());
        plane.fail_submissions(ControlPlaneError::remote(400, "unknown plugin"));

        let response = adapter(&plane)
            .submit_job(SubmitJobRequest {
                spec: import_spec("acme", "crm"),
                defer: true,
            })
            .await
            .unwrap();

        assert!(response.task_id.is_none());
        assert!(response.error.unwrap().contains("unknown plugin"));
    }

    #[tokio::test]
    async fn invalid_spec_is_rejected() {
        let plane = Arc::new(ScriptedControlPlane::new());
        let spec = JobSpec::Export {
            source: ExportSource::Query {
                query: "  ".into(),
                vdb_id: None,
            },
            destination: ExportDestination::default(),
        };

        let err = adapter(&plane)
            .submit_job(SubmitJobRequest { spec, defer: false })
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn deferred_submit_then_poll() {
        let plane = Arc::new(ScriptedControlPlane::new().with_task_ids(["imp-1"]));
        plane.script_import_listing(
            "acme",
            "crm",
            vec![
                Ok(vec![import_record("imp-1", "STARTED")]),
                Ok(vec![import_record("imp-1", "REJECTED")]),
            ],
        );
        let adapter = adapter(&plane);

        let submitted = adapter
            .submit_job(SubmitJobRequest {
                spec: import_spec("acme", "crm"),
                defer: true,
            })
            .await
            .unwrap();
        let req = PollJobRequest {
            task_id: submitted.task_id.unwrap(),
            resume_context: submitted.resume_context.unwrap(),
        };

        let first = adapter.poll_job(req.clone()).await.unwrap();
        let second = adapter.poll_job(req).await.unwrap();

        assert_eq!(first, PollJobResponse::default());
        assert!(second.completed);
        assert!(second.result.is_none());
        assert!(second.error.unwrap().contains("REJECTED"));
    }

    #[tokio::test]
    async fn poll_transport_error_is_reported() {
        let plane = Arc::new(ScriptedControlPlane::new());
        plane.script_export(
            "e-1",
            vec![Reply::Error(ControlPlaneError::Network("timeout".into()))],
        );

        let response = adapter(&plane)
            .poll_job(DeferredTaskHandle::export("e-1").into())
            .await
            .unwrap();

        assert!(!response.completed);
        assert!(response.error.unwrap().contains("timeout"));
    }

    #[tokio::test]
    async fn poll_with_empty_id_is_rejected() {
        let plane = Arc::new(ScriptedControlPlane::new());
        let err = adapter(&plane)
            .poll_job(PollJobRequest {
                task_id: TaskId::from(""),
                resume_context: ResumeContext::Export,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn batch_reports_partial_failure() {
        let plane = Arc::new(ScriptedControlPlane::new().with_task_ids(["a", "b"]));
        plane.script_export("a", vec![Reply::state("FAILURE")]);
        plane.script_export("b", vec![Reply::state("STARTED"), Reply::state("SUCCESS")]);

        let response = adapter(&plane)
            .submit_batch(BatchRequest {
                jobs: vec![
                    table_export("acme", "sales", "orders"),
                    query_export("SELECT 1"),
                ],
            })
            .await
            .unwrap();

        assert_eq!(response.total_passed, 1);
        assert_eq!(response.total_failed, 1);
        assert_eq!(response.error.as_deref(), Some("1 / 2 jobs failed"));
        assert_eq!(response.failed[0].task_id.as_str(), "a");
        assert_eq!(response.failed[0].outcome, "failed");
    }

    #[tokio::test]
    async fn cancelled_adapter_returns_error() {
        let plane = Arc::new(ScriptedControlPlane::new());
        plane.script_export("task-1", vec![Reply::state("PENDING")]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let adapter = adapter(&plane).with_cancel(cancel);

        let err = adapter
            .submit_job(SubmitJobRequest {
                spec: query_export("SELECT 1"),
                defer: false,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Core(CoreError::Cancelled)));
        assert!(plane.submissions().is_empty());
    }

    #[tokio::test]
    async fn job_log_for_import() {
        let plane = Arc::new(ScriptedControlPlane::new());
        plane.set_import_log("acme", "crm", "imp-1", "https://logs/imp-1");

        let url = adapter(&plane)
            .job_log(PollJobRequest {
                task_id: TaskId::from("imp-1"),
                resume_context: ResumeContext::import("acme", "crm"),
            })
            .await
            .unwrap();

        assert_eq!(url.as_deref(), Some("https://logs/imp-1"));
    }
}
