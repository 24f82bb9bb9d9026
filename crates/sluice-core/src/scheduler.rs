use std::time::Duration;

use sluice_model::{DeferredTaskHandle, JobOutcome, JobStatus, PollPolicy, Verdict};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use crate::{
    classify::classify,
    control_plane::ControlPlane,
    error::CoreError,
    events::{EngineEvent, EventBus, EventKind},
    fanout::BatchId,
    fetch::StatusFetcher,
};

/// Result of one status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Still unresolved; check again after the delay.
    Continue(Duration),
    /// Terminal.
    Stop(JobOutcome),
}

/// Drives one job to a terminal outcome.
///
/// Owns its attempt counter and last observation; nothing is shared between
/// schedulers except the transport behind the fetcher. Checks of the same job are
/// strictly sequential.
pub struct RetryScheduler<C> {
    fetcher: StatusFetcher<C>,
    handle: DeferredTaskHandle,
    policy: PollPolicy,
    bus: EventBus,
    batch: Option<BatchId>,
    attempt: u32,
    last: Option<JobStatus>,
}

impl<C> RetryScheduler<C>
where
    C: ControlPlane,
{
    pub fn new(fetcher: StatusFetcher<C>, handle: DeferredTaskHandle, policy: PollPolicy) -> Self {
        Self {
            fetcher,
            handle,
            policy,
            bus: EventBus::default(),
            batch: None,
            attempt: 0,
            last: None,
        }
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn in_batch(mut self, batch: BatchId) -> Self {
        self.batch = Some(batch);
        self
    }

    /// Number of status checks issued so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn handle(&self) -> &DeferredTaskHandle {
        &self.handle
    }

    /// Issue one status check and decide what comes next.
    pub async fn step(&mut self) -> Result<Step, CoreError> {
        self.attempt += 1;
        self.emit(EngineEvent::new(EventKind::PollAttempt).with_attempt(self.attempt));

        let observed = match self.fetcher.fetch(&self.handle).await {
            Ok(observed) => observed,
            Err(source) => {
                warn!(attempt = self.attempt, error = %source, "status check failed");
                self.emit(
                    EngineEvent::new(EventKind::PollFailed)
                        .with_attempt(self.attempt)
                        .with_reason(&source),
                );
                return Err(CoreError::Poll {
                    task_id: self.handle.task_id.clone(),
                    source,
                });
            }
        };

        let verdict = match observed {
            Some(status) => {
                let verdict = classify(&status.raw_state);
                trace!(state = %status.raw_state, verdict = verdict.as_str(), "status observed");
                self.last = Some(status);
                verdict
            }
            None => {
                self.emit(EngineEvent::new(EventKind::NotYetVisible).with_attempt(self.attempt));
                Verdict::Unresolved
            }
        };

        Ok(self.decide(verdict))
    }

    fn decide(&self, verdict: Verdict) -> Step {
        let attempts = self.attempt;
        match (verdict, &self.last) {
            (Verdict::Succeeded, Some(status)) => Step::Stop(JobOutcome::Succeeded {
                status: status.clone(),
                attempts,
            }),
            (Verdict::Failed, Some(status)) => Step::Stop(JobOutcome::Failed {
                status: status.clone(),
                attempts,
            }),
            _ if self.policy.should_retry(attempts) => {
                Step::Continue(self.policy.backoff.delay_for_attempt(attempts))
            }
            _ => Step::Stop(JobOutcome::Exhausted {
                attempts,
                last: self.last.clone(),
            }),
        }
    }

    /// Poll until terminal, the budget is spent, or `cancel` fires.
    #[instrument(
        level = "debug",
        skip(self, cancel),
        fields(task_id = %self.handle.task_id, kind = self.handle.kind().as_str())
    )]
    pub async fn run(mut self, cancel: &CancellationToken) -> Result<JobOutcome, CoreError> {
        let started = Instant::now();

        loop {
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                step = self.step() => Some(step),
            };
            let Some(step) = step else {
                return Err(self.cancelled());
            };

            match step? {
                Step::Stop(outcome) => {
                    self.finished(&outcome, Some(started.elapsed()));
                    return Ok(outcome);
                }
                Step::Continue(delay) => {
                    trace!(attempt = self.attempt, delay_ms = delay.as_millis() as u64, "next check scheduled");
                    self.emit(
                        EngineEvent::new(EventKind::BackoffScheduled)
                            .with_attempt(self.attempt)
                            .with_delay_ms(delay.as_millis() as u64),
                    );

                    let slept = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => false,
                        _ = tokio::time::sleep(delay) => true,
                    };
                    if !slept {
                        return Err(self.cancelled());
                    }
                }
            }
        }
    }

    /// Publish the terminal event for `outcome`.
    ///
    /// `elapsed` is the time spent waiting in this process; single polls have none.
    pub(crate) fn finished(&self, outcome: &JobOutcome, elapsed: Option<Duration>) {
        let elapsed_ms = elapsed.map(|e| e.as_millis() as u64);
        let mut event = match outcome {
            JobOutcome::Exhausted { .. } => EngineEvent::new(EventKind::Exhausted),
            JobOutcome::Succeeded { .. } => {
                EngineEvent::new(EventKind::Resolved).with_verdict(Verdict::Succeeded)
            }
            JobOutcome::Failed { .. } => {
                EngineEvent::new(EventKind::Resolved).with_verdict(Verdict::Failed)
            }
        }
        .with_attempt(outcome.attempts());

        if let Some(ms) = elapsed_ms {
            event = event.with_elapsed_ms(ms);
        }
        if let Some(status) = outcome.status() {
            event = event.with_state(status.raw_state.clone());
        }
        debug!(
            outcome = outcome.label(),
            attempts = outcome.attempts(),
            elapsed_ms,
            "job resolved"
        );
        self.emit(event);
    }

    fn cancelled(&self) -> CoreError {
        debug!(attempt = self.attempt, "polling cancelled");
        self.emit(EngineEvent::new(EventKind::Cancelled).with_attempt(self.attempt));
        CoreError::Cancelled
    }

    fn emit(&self, event: EngineEvent) {
        self.bus.emit(
            event
                .with_task(&self.handle.task_id, self.handle.kind())
                .with_batch(self.batch),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ControlPlaneError,
        testing::{EventLog, Reply, ScriptedControlPlane, import_record},
    };
    use sluice_model::{DEFAULT_MAX_ATTEMPTS, ResumeContext};
    use std::sync::Arc;

    fn scheduler(
        plane: &Arc<ScriptedControlPlane>,
        handle: DeferredTaskHandle,
    ) -> RetryScheduler<ScriptedControlPlane> {
        RetryScheduler::new(
            StatusFetcher::new(Arc::clone(plane)),
            handle,
            PollPolicy::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn resolves_after_pending_and_started() {
        let plane = Arc::new(ScriptedControlPlane::new());
        plane.script_export(
            "e-1",
            vec![
                Reply::state("PENDING"),
                Reply::state("STARTED"),
                Reply::State {
                    state: "SUCCESS".into(),
                    output_artifact: Some("s3://bucket/e-1.csv".into()),
                },
            ],
        );

        let outcome = scheduler(&plane, DeferredTaskHandle::export("e-1"))
            .run(&CancellationToken::new())
            .await
            .unwrap();

        match outcome {
            JobOutcome::Succeeded { status, attempts } => {
                assert_eq!(attempts, 3);
                assert_eq!(status.output_artifact.as_deref(), Some("s3://bucket/e-1.csv"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(plane.status_calls("e-1"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_doubles_until_ceiling() {
        let plane = Arc::new(ScriptedControlPlane::new());
        plane.script_export("e-1", vec![Reply::state("PENDING")]);
        let events = Arc::new(EventLog::default());
        let policy = PollPolicy::default().with_max_attempts(9);

        let outcome = RetryScheduler::new(
            StatusFetcher::new(Arc::clone(&plane)),
            DeferredTaskHandle::export("e-1"),
            policy,
        )
        .with_bus(events.bus())
        .run(&CancellationToken::new())
        .await
        .unwrap();

        assert!(matches!(outcome, JobOutcome::Exhausted { attempts: 9, .. }));
        assert_eq!(
            events.delays(),
            vec![500, 1_000, 2_000, 4_000, 8_000, 10_000, 10_000, 10_000]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_default_attempt_budget() {
        let plane = Arc::new(ScriptedControlPlane::new());
        plane.script_export("e-1", vec![Reply::state("STARTED")]);
        let started = Instant::now();

        let outcome = scheduler(&plane, DeferredTaskHandle::export("e-1"))
            .run(&CancellationToken::new())
            .await
            .unwrap();

        match outcome {
            JobOutcome::Exhausted { attempts, last } => {
                assert_eq!(attempts, DEFAULT_MAX_ATTEMPTS);
                assert_eq!(last.unwrap().raw_state, "STARTED");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(plane.status_calls("e-1"), 357);
        assert!(started.elapsed() <= Duration::from_secs(3_600));
    }

    #[tokio::test(start_paused = true)]
    async fn remote_failure_stops_immediately() {
        let plane = Arc::new(ScriptedControlPlane::new());
        plane.script_export("e-1", vec![Reply::state("PENDING"), Reply::state("REVOKED")]);

        let outcome = scheduler(&plane, DeferredTaskHandle::export("e-1"))
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(outcome, JobOutcome::Failed { attempts: 2, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn remote_retry_state_is_a_failure_not_a_retry() {
        let plane = Arc::new(ScriptedControlPlane::new());
        plane.script_export("e-1", vec![Reply::state("RETRY")]);

        let outcome = scheduler(&plane, DeferredTaskHandle::export("e-1"))
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(outcome, JobOutcome::Failed { attempts: 1, .. }));
        assert_eq!(plane.status_calls("e-1"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unrecognized_state_keeps_polling() {
        let plane = Arc::new(ScriptedControlPlane::new());
        plane.script_export("e-1", vec![Reply::state("WEIRD_STATE"), Reply::state("SUCCESS")]);

        let outcome = scheduler(&plane, DeferredTaskHandle::export("e-1"))
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(outcome, JobOutcome::Succeeded { attempts: 2, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn import_missing_from_listing_is_retried() {
        let plane = Arc::new(ScriptedControlPlane::new());
        let crowded: Vec<_> = (0..10)
            .map(|i| import_record(&format!("newer-{i}"), "STARTED"))
            .collect();
        plane.script_import_listing(
            "acme",
            "sales",
            vec![Ok(crowded), Ok(vec![import_record("imp-1", "SUCCESS")])],
        );
        let events = Arc::new(EventLog::default());
        let handle = DeferredTaskHandle::new("imp-1", ResumeContext::import("acme", "sales"));

        let outcome = scheduler(&plane, handle)
            .with_bus(events.bus())
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(outcome, JobOutcome::Succeeded { attempts: 2, .. }));
        assert_eq!(events.count(EventKind::NotYetVisible), 1);
        assert_eq!(events.count(EventKind::BackoffScheduled), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_during_poll_is_not_retried() {
        let plane = Arc::new(ScriptedControlPlane::new());
        plane.script_export(
            "e-1",
            vec![
                Reply::state("PENDING"),
                Reply::Error(ControlPlaneError::Network("connection reset".into())),
                Reply::state("SUCCESS"),
            ],
        );

        let err = scheduler(&plane, DeferredTaskHandle::export("e-1"))
            .run(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Poll { .. }));
        assert_eq!(plane.status_calls("e-1"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_further_checks() {
        let plane = Arc::new(ScriptedControlPlane::new());
        plane.script_export("e-1", vec![Reply::state("PENDING")]);
        let cancel = CancellationToken::new();

        let task = {
            let plane = Arc::clone(&plane);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                scheduler(&plane, DeferredTaskHandle::export("e-1"))
                    .run(&cancel)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(1_600)).await;
        cancel.cancel();
        let err = task.await.unwrap().unwrap_err();

        assert!(err.is_cancelled());
        let calls = plane.status_calls("e-1");
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(plane.status_calls("e-1"), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn step_reports_continue_with_first_delay() {
        let plane = Arc::new(ScriptedControlPlane::new());
        plane.script_export("e-1", vec![Reply::state("PENDING")]);
        let mut scheduler = scheduler(&plane, DeferredTaskHandle::export("e-1"));

        let step = scheduler.step().await.unwrap();

        assert_eq!(step, Step::Continue(Duration::from_millis(500)));
        assert_eq!(scheduler.attempt(), 1);
    }
}
