use std::borrow::Borrow;

use sluice_core::{EngineEvent, EventKind};
use tracing::{debug, info, trace, warn};

/// Read accessors over an [`EngineEvent`] with log-friendly fallbacks.
pub trait View {
    fn kind(&self) -> EventKind;
    fn as_task(&self) -> &str;
    fn as_job_kind(&self) -> &'static str;
    fn as_reason(&self) -> &str;
    fn as_state(&self) -> &str;
    fn as_batch(&self) -> String;
    fn attempt(&self) -> u32;
    fn delay_ms(&self) -> u64;
    fn elapsed_ms(&self) -> u64;
    fn total(&self) -> usize;
    fn passed(&self) -> usize;
    fn failed(&self) -> usize;
}

impl<T> View for T
where
    T: Borrow<EngineEvent>,
{
    #[inline]
    fn kind(&self) -> EventKind {
        self.borrow().kind
    }
    #[inline]
    fn as_task(&self) -> &str {
        self.borrow()
            .task_id
            .as_ref()
            .map(|id| id.as_str())
            .unwrap_or("unknown")
    }
    #[inline]
    fn as_job_kind(&self) -> &'static str {
        self.borrow()
            .job_kind
            .map(|k| k.as_str())
            .unwrap_or("unknown")
    }
    #[inline]
    fn as_reason(&self) -> &str {
        self.borrow().reason.as_deref().unwrap_or("unknown")
    }
    #[inline]
    fn as_state(&self) -> &str {
        self.borrow().state.as_deref().unwrap_or("unknown")
    }
    fn as_batch(&self) -> String {
        self.borrow()
            .batch
            .map(|b| b.to_string())
            .unwrap_or_else(|| "-".to_string())
    }
    #[inline]
    fn attempt(&self) -> u32 {
        self.borrow().attempt.unwrap_or(0)
    }
    #[inline]
    fn delay_ms(&self) -> u64 {
        self.borrow().delay_ms.unwrap_or(0)
    }
    #[inline]
    fn elapsed_ms(&self) -> u64 {
        self.borrow().elapsed_ms.unwrap_or(0)
    }
    #[inline]
    fn total(&self) -> usize {
        self.borrow().total.unwrap_or(0)
    }
    #[inline]
    fn passed(&self) -> usize {
        self.borrow().passed.unwrap_or(0)
    }
    #[inline]
    fn failed(&self) -> usize {
        self.borrow().failed.unwrap_or(0)
    }
}

#[inline]
pub fn message_for(kind: EventKind) -> &'static str {
    match kind {
        // submission
        EventKind::Submitted => "job accepted by control plane",
        EventKind::SubmitFailed => "job submission rejected",

        // polling
        EventKind::PollAttempt => "checking job status",
        EventKind::NotYetVisible => "job not visible yet; treated as unresolved",
        EventKind::BackoffScheduled => "next status check scheduled",
        EventKind::PollFailed => "status check failed; polling stopped",

        // terminal
        EventKind::Resolved => "job reached a terminal state",
        EventKind::Exhausted => "job still unresolved after the attempt budget",
        EventKind::Cancelled => "polling cancelled",

        // batch
        EventKind::BatchStarted => "batch started",
        EventKind::BatchFinished => "batch finished",
    }
}

pub fn log_event<E: View>(e: E) {
    let msg = message_for(e.kind());

    match e.kind() {
        // submission
        EventKind::Submitted => info!(task = e.as_task(), kind = e.as_job_kind(), "{msg}"),
        EventKind::SubmitFailed => {
            warn!(kind = e.as_job_kind(), reason = e.as_reason(), "{msg}")
        }

        // polling
        EventKind::PollAttempt => trace!(task = e.as_task(), attempt = e.attempt(), "{msg}"),
        EventKind::NotYetVisible => debug!(task = e.as_task(), attempt = e.attempt(), "{msg}"),
        EventKind::BackoffScheduled => debug!(
            task = e.as_task(),
            attempt = e.attempt(),
            delay_ms = e.delay_ms(),
            "{msg}"
        ),
        EventKind::PollFailed => warn!(
            task = e.as_task(),
            attempt = e.attempt(),
            reason = e.as_reason(),
            "{msg}"
        ),

        // terminal
        EventKind::Resolved => info!(
            task = e.as_task(),
            kind = e.as_job_kind(),
            state = e.as_state(),
            attempts = e.attempt(),
            elapsed_ms = e.elapsed_ms(),
            "{msg}"
        ),
        EventKind::Exhausted => warn!(
            task = e.as_task(),
            kind = e.as_job_kind(),
            attempts = e.attempt(),
            elapsed_ms = e.elapsed_ms(),
            "{msg}"
        ),
        EventKind::Cancelled => debug!(task = e.as_task(), attempt = e.attempt(), "{msg}"),

        // batch
        EventKind::BatchStarted => info!(
            batch = %e.as_batch(),
            size = e.total(),
            "{msg}"
        ),
        EventKind::BatchFinished => info!(
            batch = %e.as_batch(),
            passed = e.passed(),
            failed = e.failed(),
            "{msg}"
        ),
    }
}
