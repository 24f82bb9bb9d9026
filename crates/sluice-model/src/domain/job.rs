use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::{DeferredTaskHandle, JobKind, JobSpec, TaskId};

/// A job accepted by the control plane.
///
/// Created once the submission returns a task id and never mutated afterwards.
/// Progress is tracked separately through [`crate::JobStatus`] observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Identifier assigned by the control plane.
    pub task_id: TaskId,
    /// Import or export.
    pub kind: JobKind,
    /// Source and destination parameters the job was submitted with.
    pub spec: JobSpec,
    /// When the submission was acknowledged.
    #[serde(with = "time_serde")]
    pub submitted_at: SystemTime,
}

impl Job {
    pub fn new(task_id: TaskId, spec: JobSpec) -> Self {
        Self {
            task_id,
            kind: spec.kind(),
            spec,
            submitted_at: SystemTime::now(),
        }
    }

    /// Build the resumable handle for this job.
    pub fn handle(&self) -> DeferredTaskHandle {
        DeferredTaskHandle {
            task_id: self.task_id.clone(),
            resume_context: self.spec.resume_context(),
        }
    }
}

mod time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .map_err(serde::ser::Error::custom)?;
        (since_epoch.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExportDestination, ExportSource, ResumeContext};

    fn query_export() -> JobSpec {
        JobSpec::Export {
            source: ExportSource::Query {
                query: "SELECT 1".to_string(),
                vdb_id: None,
            },
            destination: ExportDestination::default(),
        }
    }

    #[test]
    fn kind_follows_spec() {
        let job = Job::new(TaskId::from("t-1"), query_export());
        assert_eq!(job.kind, JobKind::Export);
    }

    #[test]
    fn handle_for_export_has_empty_context() {
        let job = Job::new(TaskId::from("t-1"), query_export());
        let handle = job.handle();

        assert_eq!(handle.task_id, job.task_id);
        assert_eq!(handle.resume_context, ResumeContext::Export);
    }

    #[test]
    fn submitted_at_survives_serialization_at_millisecond_precision() {
        let job = Job::new(TaskId::from("t-1"), query_export());

        let json = serde_json::to_string(&job).unwrap();
        let back: Job = serde_json::from_str(&json).unwrap();

        let delta = job
            .submitted_at
            .duration_since(back.submitted_at)
            .unwrap_or_default();
        assert!(delta.as_millis() < 1);
        assert_eq!(back.task_id, job.task_id);
        assert_eq!(back.spec, job.spec);
    }
}
