mod subscriber;
pub use subscriber::StateSubscriber;

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::SystemTime,
};

use sluice_model::{JobKind, TaskId};

/// Where a tracked job is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobPhase {
    Submitted,
    Polling,
    /// Polling stopped on a transport error or cancellation. The remote job is
    /// not known to be finished and a later check may still resolve it.
    Interrupted,
    Succeeded,
    Failed,
    Exhausted,
}

impl JobPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobPhase::Succeeded | JobPhase::Failed | JobPhase::Exhausted
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Submitted => "submitted",
            JobPhase::Polling => "polling",
            JobPhase::Interrupted => "interrupted",
            JobPhase::Succeeded => "succeeded",
            JobPhase::Failed => "failed",
            JobPhase::Exhausted => "exhausted",
        }
    }
}

/// Snapshot of one tracked job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub task_id: TaskId,
    pub kind: JobKind,
    pub phase: JobPhase,
    /// Status checks issued so far.
    pub attempts: u32,
    /// Raw remote state of the last observation.
    pub last_state: Option<String>,
    pub error: Option<String>,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

/// In-memory job ledger.
///
/// A record that reached a terminal phase is frozen: later updates for the same
/// task are ignored.
#[derive(Clone, Default)]
pub struct JobState {
    inner: Arc<RwLock<HashMap<TaskId, JobRecord>>>,
}

impl JobState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a job. Re-registering a known task keeps its record.
    pub fn track(&self, task_id: TaskId, kind: JobKind) {
        let now = SystemTime::now();
        self.write().entry(task_id.clone()).or_insert(JobRecord {
            task_id,
            kind,
            phase: JobPhase::Submitted,
            attempts: 0,
            last_state: None,
            error: None,
            created_at: now,
            updated_at: now,
        });
    }

    /// Record a status check; unknown tasks are registered on the fly.
    pub fn record_attempt(&self, task_id: &TaskId, kind: JobKind, attempt: u32) {
        self.track(task_id.clone(), kind);
        self.update(task_id, |record| {
            record.phase = JobPhase::Polling;
            record.attempts = record.attempts.max(attempt);
        });
    }

    pub fn record_state(&self, task_id: &TaskId, state: &str) {
        self.update(task_id, |record| {
            record.last_state = Some(state.to_string());
        });
    }

    /// Move a job to a terminal phase. The error of an earlier interruption is replaced.
    pub fn resolve(&self, task_id: &TaskId, phase: JobPhase, error: Option<String>) {
        self.update(task_id, |record| {
            record.phase = phase;
            record.error = error;
        });
    }

    /// Note that polling stopped without a verdict. The record stays open.
    pub fn interrupt(&self, task_id: &TaskId, reason: Option<String>) {
        self.update(task_id, |record| {
            record.phase = JobPhase::Interrupted;
            record.error = reason;
        });
    }

    pub fn get(&self, task_id: &TaskId) -> Option<JobRecord> {
        self.read().get(task_id).cloned()
    }

    pub fn list_all(&self) -> Vec<JobRecord> {
        self.read().values().cloned().collect()
    }

    pub fn list_by_phase(&self, phase: JobPhase) -> Vec<JobRecord> {
        self.read()
            .values()
            .filter(|record| record.phase == phase)
            .cloned()
            .collect()
    }

    /// Jobs that are still being polled or waiting for their first check.
    pub fn in_progress(&self) -> usize {
        self.read()
            .values()
            .filter(|record| matches!(record.phase, JobPhase::Submitted | JobPhase::Polling))
            .count()
    }

    pub fn remove(&self, task_id: &TaskId) -> Option<JobRecord> {
        self.write().remove(task_id)
    }

    fn update(&self, task_id: &TaskId, apply: impl FnOnce(&mut JobRecord)) {
        let mut inner = self.write();
        if let Some(record) = inner.get_mut(task_id)
            && !record.phase.is_terminal()
        {
            apply(record);
            record.updated_at = SystemTime::now();
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TaskId, JobRecord>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TaskId, JobRecord>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_and_get() {
        let state = JobState::new();
        let id = TaskId::from("e-1");

        state.track(id.clone(), JobKind::Export);

        let record = state.get(&id).unwrap();
        assert_eq!(record.phase, JobPhase::Submitted);
        assert_eq!(record.attempts, 0);
        assert_eq!(state.in_progress(), 1);
    }

    #[test]
    fn attempts_move_job_to_polling() {
        let state = JobState::new();
        let id = TaskId::from("e-1");

        state.record_attempt(&id, JobKind::Export, 1);
        state.record_state(&id, "PENDING");
        state.record_attempt(&id, JobKind::Export, 2);

        let record = state.get(&id).unwrap();
        assert_eq!(record.phase, JobPhase::Polling);
        assert_eq!(record.attempts, 2);
        assert_eq!(record.last_state.as_deref(), Some("PENDING"));
    }

    #[test]
    fn terminal_record_is_frozen() {
        let state = JobState::new();
        let id = TaskId::from("e-1");

        state.record_attempt(&id, JobKind::Export, 1);
        state.record_state(&id, "SUCCESS");
        state.resolve(&id, JobPhase::Succeeded, None);

        state.record_attempt(&id, JobKind::Export, 2);
        state.record_state(&id, "PENDING");
        state.resolve(&id, JobPhase::Failed, Some("late".into()));

        let record = state.get(&id).unwrap();
        assert_eq!(record.phase, JobPhase::Succeeded);
        assert_eq!(record.attempts, 1);
        assert_eq!(record.last_state.as_deref(), Some("SUCCESS"));
        assert!(record.error.is_none());
    }

    #[test]
    fn list_by_phase_filters() {
        let state = JobState::new();
        state.track(TaskId::from("a"), JobKind::Export);
        state.track(TaskId::from("b"), JobKind::Import);
        state.resolve(&TaskId::from("b"), JobPhase::Exhausted, Some("budget spent".into()));

        assert_eq!(state.list_by_phase(JobPhase::Submitted).len(), 1);
        assert_eq!(state.list_by_phase(JobPhase::Exhausted)[0].task_id.as_str(), "b");
        assert_eq!(state.list_all().len(), 2);
        assert_eq!(state.in_progress(), 1);
    }

    #[test]
    fn interrupted_job_can_still_resolve() {
        let state = JobState::new();
        let id = TaskId::from("e-1");

        state.record_attempt(&id, JobKind::Export, 1);
        state.interrupt(&id, Some("connection reset".into()));
        assert_eq!(state.get(&id).unwrap().phase, JobPhase::Interrupted);
        assert_eq!(state.in_progress(), 0);

        state.record_attempt(&id, JobKind::Export, 2);
        assert_eq!(state.get(&id).unwrap().phase, JobPhase::Polling);
        state.resolve(&id, JobPhase::Succeeded, None);

        let record = state.get(&id).unwrap();
        assert_eq!(record.phase, JobPhase::Succeeded);
        assert!(record.error.is_none());
    }

    #[test]
    fn remove_forgets_job() {
        let state = JobState::new();
        let id = TaskId::from("a");
        state.track(id.clone(), JobKind::Export);

        assert!(state.remove(&id).is_some());
        assert!(state.get(&id).is_none());
    }
}
