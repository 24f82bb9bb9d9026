use async_trait::async_trait;

use crate::{
    dto::{
        BatchRequest, BatchResponse, PollJobRequest, PollJobResponse, SubmitJobRequest,
        SubmitJobResponse,
    },
    error::ApiError,
};

/// Job orchestration API handler.
///
/// Remote and transport failures are reported inside the responses. `Err` is
/// reserved for requests that cannot be accepted at all and for cancellation.
#[async_trait]
pub trait ApiHandler: Send + Sync + 'static {
    /// Submit one job; wait for it unless `defer` is set.
    async fn submit_job(&self, req: SubmitJobRequest) -> Result<SubmitJobResponse, ApiError>;

    /// Check a deferred job once.
    async fn poll_job(&self, req: PollJobRequest) -> Result<PollJobResponse, ApiError>;

    /// Submit a batch and wait for every job.
    async fn submit_batch(&self, req: BatchRequest) -> Result<BatchResponse, ApiError>;

    /// Log location of an import job.
    async fn job_log(&self, req: PollJobRequest) -> Result<Option<String>, ApiError>;
}
