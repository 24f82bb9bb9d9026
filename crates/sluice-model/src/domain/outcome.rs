use serde::{Deserialize, Serialize};

use crate::JobStatus;

/// Terminal result of driving one job to completion.
///
/// `Exhausted` never comes from the control plane: it is declared locally when
/// the polling budget runs out while the job still looks unresolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum JobOutcome {
    Succeeded { status: JobStatus, attempts: u32 },
    Failed { status: JobStatus, attempts: u32 },
    Exhausted {
        attempts: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last: Option<JobStatus>,
    },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }

    /// Number of status observations it took to reach this outcome.
    pub fn attempts(&self) -> u32 {
        match self {
            JobOutcome::Succeeded { attempts, .. }
            | JobOutcome::Failed { attempts, .. }
            | JobOutcome::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// Last status seen for the job, if it was ever visible.
    pub fn status(&self) -> Option<&JobStatus> {
        match self {
            JobOutcome::Succeeded { status, .. } | JobOutcome::Failed { status, .. } => {
                Some(status)
            }
            JobOutcome::Exhausted { last, .. } => last.as_ref(),
        }
    }

    /// Short label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            JobOutcome::Succeeded { .. } => "succeeded",
            JobOutcome::Failed { .. } => "failed",
            JobOutcome::Exhausted { .. } => "exhausted",
        }
    }

    /// Human readable reason for a non-successful outcome.
    pub fn error_message(&self) -> Option<String> {
        match self {
            JobOutcome::Succeeded { .. } => None,
            JobOutcome::Failed { status, .. } => Some(format!(
                "job {} failed with remote state {}",
                status.task_id, status.raw_state
            )),
            JobOutcome::Exhausted { attempts, .. } => Some(format!(
                "job still unresolved after {attempts} status checks"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TaskId;

    #[test]
    fn exhausted_has_no_status_until_seen() {
        let outcome = JobOutcome::Exhausted {
            attempts: 357,
            last: None,
        };
        assert!(outcome.status().is_none());
        assert_eq!(outcome.attempts(), 357);
        assert_eq!(outcome.label(), "exhausted");
        assert!(!outcome.is_success());
    }

    #[test]
    fn failure_message_names_remote_state() {
        let outcome = JobOutcome::Failed {
            status: JobStatus::new(TaskId::from("t-9"), "REVOKED"),
            attempts: 2,
        };
        let msg = outcome.error_message().unwrap();
        assert!(msg.contains("t-9"));
        assert!(msg.contains("REVOKED"));
    }

    #[test]
    fn tagged_serialization() {
        let outcome = JobOutcome::Succeeded {
            status: JobStatus::new(TaskId::from("t"), "SUCCESS"),
            attempts: 1,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "succeeded");
        assert_eq!(json["attempts"], 1);
    }
}
