use sluice_model::Verdict;

use super::{JobPhase, JobState};
use crate::events::{EngineEvent, EventKind, Subscribe};

/// Keeps a [`JobState`] in sync with engine events.
pub struct StateSubscriber {
    state: JobState,
}

impl StateSubscriber {
    pub fn new(state: JobState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }
}

impl Subscribe for StateSubscriber {
    fn on_event(&self, event: &EngineEvent) {
        let (Some(task_id), Some(kind)) = (&event.task_id, event.job_kind) else {
            return;
        };

        match event.kind {
            EventKind::Submitted => self.state.track(task_id.clone(), kind),
            EventKind::PollAttempt => {
                self.state
                    .record_attempt(task_id, kind, event.attempt.unwrap_or_default());
            }
            EventKind::Resolved => {
                if let Some(state) = &event.state {
                    self.state.record_state(task_id, state);
                }
                match event.verdict {
                    Some(Verdict::Succeeded) => {
                        self.state.resolve(task_id, JobPhase::Succeeded, None)
                    }
                    _ => {
                        let error = event
                            .state
                            .as_ref()
                            .map(|state| format!("failed with remote state {state}"));
                        self.state.resolve(task_id, JobPhase::Failed, error);
                    }
                }
            }
            EventKind::Exhausted => {
                if let Some(state) = &event.state {
                    self.state.record_state(task_id, state);
                }
                self.state.resolve(
                    task_id,
                    JobPhase::Exhausted,
                    Some("attempt budget exhausted".into()),
                );
            }
            EventKind::PollFailed => self.state.interrupt(task_id, event.reason.clone()),
            EventKind::Cancelled => {
                self.state
                    .interrupt(task_id, Some("polling cancelled".into()));
            }
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "state"
    }
}
