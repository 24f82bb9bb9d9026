//! Lifecycle events published by the engine.
//!
//! Subscribers are called inline from the poll loops, so `on_event` must not block.

use std::{fmt, sync::Arc};

use sluice_model::{JobKind, TaskId, Verdict};

use crate::fanout::BatchId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // submission
    Submitted,
    SubmitFailed,

    // polling
    PollAttempt,
    NotYetVisible,
    BackoffScheduled,
    PollFailed,

    // terminal
    Resolved,
    Exhausted,
    Cancelled,

    // batch
    BatchStarted,
    BatchFinished,
}

/// One engine event. Fields are filled in depending on the kind.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    pub kind: EventKind,
    pub task_id: Option<TaskId>,
    pub job_kind: Option<JobKind>,
    pub batch: Option<BatchId>,
    pub attempt: Option<u32>,
    pub delay_ms: Option<u64>,
    pub elapsed_ms: Option<u64>,
    /// Raw remote state of the last observation.
    pub state: Option<String>,
    pub verdict: Option<Verdict>,
    pub reason: Option<String>,
    /// Batch size.
    pub total: Option<usize>,
    pub passed: Option<usize>,
    pub failed: Option<usize>,
}

impl EngineEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            task_id: None,
            job_kind: None,
            batch: None,
            attempt: None,
            delay_ms: None,
            elapsed_ms: None,
            state: None,
            verdict: None,
            reason: None,
            total: None,
            passed: None,
            failed: None,
        }
    }

    pub fn with_task(mut self, task_id: &TaskId, kind: JobKind) -> Self {
        self.task_id = Some(task_id.clone());
        self.job_kind = Some(kind);
        self
    }

    pub fn with_batch(mut self, batch: Option<BatchId>) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }

    pub fn with_elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = Some(elapsed_ms);
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_verdict(mut self, verdict: Verdict) -> Self {
        self.verdict = Some(verdict);
        self
    }

    pub fn with_reason(mut self, reason: impl fmt::Display) -> Self {
        self.reason = Some(reason.to_string());
        self
    }

    pub fn with_total(mut self, total: usize) -> Self {
        self.total = Some(total);
        self
    }

    pub fn with_counts(mut self, passed: usize, failed: usize) -> Self {
        self.total = Some(passed + failed);
        self.passed = Some(passed);
        self.failed = Some(failed);
        self
    }
}

/// Receiver of engine events.
pub trait Subscribe: Send + Sync + 'static {
    fn on_event(&self, event: &EngineEvent);

    fn name(&self) -> &'static str;
}

/// Cheap-to-clone fan-out of events to every registered subscriber.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<[Arc<dyn Subscribe>]>,
}

impl EventBus {
    pub fn new(subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        Self {
            subscribers: subscribers.into(),
        }
    }

    pub fn emit(&self, event: EngineEvent) {
        for sub in self.subscribers.iter() {
            sub.on_event(&event);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.subscribers.iter().map(|s| s.name()).collect()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.names())
            .finish()
    }
}
