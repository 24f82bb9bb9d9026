use std::sync::Arc;

use sluice_model::{DeferredTaskHandle, JobStatus, ResumeContext, TaskId};
use tracing::{instrument, trace};

use crate::{control_plane::ControlPlane, error::ControlPlaneError};

/// How many recent import jobs the control plane lists per repository.
///
/// Import status is only reachable through this listing. A job pushed out of it by
/// newer submissions to the same repository can no longer be seen and keeps
/// classifying as unresolved until the polling budget runs out.
pub const RECENT_IMPORTS_WINDOW: usize = 10;

/// Reads the current status of one job from the control plane.
pub struct StatusFetcher<C> {
    plane: Arc<C>,
    import_window: usize,
}

impl<C> Clone for StatusFetcher<C> {
    fn clone(&self) -> Self {
        Self {
            plane: Arc::clone(&self.plane),
            import_window: self.import_window,
        }
    }
}

impl<C> StatusFetcher<C>
where
    C: ControlPlane,
{
    pub fn new(plane: Arc<C>) -> Self {
        Self {
            plane,
            import_window: RECENT_IMPORTS_WINDOW,
        }
    }

    pub fn with_import_window(mut self, window: usize) -> Self {
        self.import_window = window;
        self
    }

    /// Fetch the status recorded for `handle`.
    ///
    /// `Ok(None)` means the control plane has nothing for this task (yet); that is not an error.
    #[instrument(level = "trace", skip(self, handle), fields(task_id = %handle.task_id))]
    pub async fn fetch(
        &self,
        handle: &DeferredTaskHandle,
    ) -> Result<Option<JobStatus>, ControlPlaneError> {
        match &handle.resume_context {
            ResumeContext::Export => self.fetch_export(&handle.task_id).await,
            ResumeContext::Import {
                namespace,
                repository,
            } => {
                self.fetch_import(namespace, repository, &handle.task_id)
                    .await
            }
        }
    }

    /// Log location of an import job; exports have none.
    pub async fn log_url(
        &self,
        handle: &DeferredTaskHandle,
    ) -> Result<Option<String>, ControlPlaneError> {
        match &handle.resume_context {
            ResumeContext::Export => Ok(None),
            ResumeContext::Import {
                namespace,
                repository,
            } => {
                self.plane
                    .import_log(namespace, repository, &handle.task_id)
                    .await
            }
        }
    }

    async fn fetch_export(&self, task_id: &TaskId) -> Result<Option<JobStatus>, ControlPlaneError> {
        let record = self.plane.export_status(task_id).await?;
        Ok(record.map(|r| r.into_status(task_id.clone())))
    }

    async fn fetch_import(
        &self,
        namespace: &str,
        repository: &str,
        task_id: &TaskId,
    ) -> Result<Option<JobStatus>, ControlPlaneError> {
        let recent = self
            .plane
            .recent_imports(namespace, repository, self.import_window)
            .await?;
        trace!(listed = recent.len(), "recent import jobs listed");

        // The window holds even when the server ignores the limit.
        Ok(recent
            .into_iter()
            .take(self.import_window)
            .find(|record| &record.task_id == task_id)
            .map(|record| record.into_status()))
    }
}
