use std::sync::Arc;

use async_trait::async_trait;
use sluice_model::{ExportStatusRecord, ImportJobRecord, SubmitAck, SubmitRequest, TaskId};

use crate::error::ControlPlaneError;

/// Transport to the control plane.
///
/// Implementations are shared by every poll loop of an engine, so each call must
/// be either an idempotent read or a single independent write.
#[async_trait]
pub trait ControlPlane: Send + Sync + 'static {
    /// Submit one job.
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitAck, ControlPlaneError>;

    /// Look an export job up by id. `Ok(None)` when the control plane does not know it (yet).
    async fn export_status(
        &self,
        task_id: &TaskId,
    ) -> Result<Option<ExportStatusRecord>, ControlPlaneError>;

    /// List the most recent import jobs of a repository, newest first, at most `limit` of them.
    async fn recent_imports(
        &self,
        namespace: &str,
        repository: &str,
        limit: usize,
    ) -> Result<Vec<ImportJobRecord>, ControlPlaneError>;

    /// Log location of one import job.
    async fn import_log(
        &self,
        namespace: &str,
        repository: &str,
        task_id: &TaskId,
    ) -> Result<Option<String>, ControlPlaneError>;
}

#[async_trait]
impl<T> ControlPlane for Arc<T>
where
    T: ControlPlane + ?Sized,
{
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitAck, ControlPlaneError> {
        (**self).submit(request).await
    }

    async fn export_status(
        &self,
        task_id: &TaskId,
    ) -> Result<Option<ExportStatusRecord>, ControlPlaneError> {
        (**self).export_status(task_id).await
    }

    async fn recent_imports(
        &self,
        namespace: &str,
        repository: &str,
        limit: usize,
    ) -> Result<Vec<ImportJobRecord>, ControlPlaneError> {
        (**self).recent_imports(namespace, repository, limit).await
    }

    async fn import_log(
        &self,
        namespace: &str,
        repository: &str,
        task_id: &TaskId,
    ) -> Result<Option<String>, ControlPlaneError> {
        (**self).import_log(namespace, repository, task_id).await
    }
}
