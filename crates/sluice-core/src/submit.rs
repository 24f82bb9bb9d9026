use std::sync::Arc;

use sluice_model::{DeferredTaskHandle, Job, JobSpec, SubmitRequest};
use tracing::{debug, instrument, warn};

use crate::{
    control_plane::ControlPlane,
    error::{ControlPlaneError, CoreError},
    events::{EngineEvent, EventBus, EventKind},
};

/// Accepted submission.
#[derive(Debug, Clone)]
pub struct Submission {
    pub job: Job,
    /// Body the control plane answered with.
    pub raw_response: serde_json::Value,
}

impl Submission {
    pub fn handle(&self) -> DeferredTaskHandle {
        self.job.handle()
    }
}

/// Sends job parameters to the control plane.
pub struct Submitter<C> {
    plane: Arc<C>,
    bus: EventBus,
}

impl<C> Submitter<C>
where
    C: ControlPlane,
{
    pub fn new(plane: Arc<C>) -> Self {
        Self {
            plane,
            bus: EventBus::default(),
        }
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    /// Validate and submit one job. Errors are returned as-is, nothing is retried.
    #[instrument(level = "debug", skip(self, spec), fields(group = spec.group().as_str()))]
    pub async fn submit(&self, spec: JobSpec) -> Result<Submission, CoreError> {
        spec.validate()?;
        let request = SubmitRequest::from_spec(&spec)?;

        let ack = match self.plane.submit(&request).await {
            Ok(ack) if ack.task_id.is_empty() => {
                return Err(self.failed(
                    &spec,
                    ControlPlaneError::InvalidResponse("empty task id".into()),
                ));
            }
            Ok(ack) => ack,
            Err(e) => return Err(self.failed(&spec, e)),
        };

        let job = Job::new(ack.task_id, spec);
        debug!(task_id = %job.task_id, "job accepted by control plane");
        self.bus
            .emit(EngineEvent::new(EventKind::Submitted).with_task(&job.task_id, job.kind));

        Ok(Submission {
            job,
            raw_response: ack.raw,
        })
    }

    fn failed(&self, spec: &JobSpec, error: ControlPlaneError) -> CoreError {
        warn!(error = %error, "submission rejected");
        let mut event = EngineEvent::new(EventKind::SubmitFailed).with_reason(&error);
        event.job_kind = Some(spec.kind());
        self.bus.emit(event);
        CoreError::Submit(error)
    }
}
