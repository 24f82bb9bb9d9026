use std::{collections::BTreeMap, fmt, sync::Arc};

use sluice_model::{AggregateResult, Job, JobGroup, JobOutcome, PollPolicy, ResolvedJob};
use tokio::{sync::Semaphore, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    control_plane::ControlPlane,
    error::CoreError,
    events::{EngineEvent, EventBus, EventKind},
    fetch::StatusFetcher,
    scheduler::RetryScheduler,
};

/// Correlation id of one fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchId(Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Runs one [`RetryScheduler`] per job concurrently and partitions the outcomes.
///
/// Without `max_in_flight` every job is polled at once, which is the expected
/// mode for the batch sizes this engine sees; very large batches should set a cap.
pub struct FanOut<C> {
    fetcher: StatusFetcher<C>,
    policy: PollPolicy,
    bus: EventBus,
    max_in_flight: Option<usize>,
}

impl<C> FanOut<C>
where
    C: ControlPlane,
{
    pub fn new(fetcher: StatusFetcher<C>, policy: PollPolicy) -> Self {
        Self {
            fetcher,
            policy,
            bus: EventBus::default(),
            max_in_flight: None,
        }
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: Option<usize>) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    /// Drive every job to a terminal outcome.
    ///
    /// Failed and exhausted jobs land in `failed`; that is not an error. A status
    /// check failure or a cancellation aborts the whole batch and discards what was
    /// collected so far.
    #[instrument(level = "debug", skip_all, fields(batch = tracing::field::Empty, size = jobs.len()))]
    pub async fn run(
        &self,
        jobs: Vec<Job>,
        cancel: &CancellationToken,
    ) -> Result<AggregateResult, CoreError> {
        let batch = BatchId::new();
        tracing::Span::current().record("batch", tracing::field::display(batch));

        let groups = partition(&jobs);
        info!(size = jobs.len(), ?groups, "batch started");
        self.bus.emit(
            EngineEvent::new(EventKind::BatchStarted)
                .with_batch(Some(batch))
                .with_total(jobs.len()),
        );

        let guard = cancel.child_token();
        let limiter = self.max_in_flight.map(|n| Arc::new(Semaphore::new(n.max(1))));
        let mut set = JoinSet::new();

        for job in jobs {
            let scheduler =
                RetryScheduler::new(self.fetcher.clone(), job.handle(), self.policy)
                    .with_bus(self.bus.clone())
                    .in_batch(batch);
            let token = guard.clone();
            let limiter = limiter.clone();

            set.spawn(async move {
                let _permit = match limiter {
                    Some(sem) => tokio::select! {
                        biased;
                        _ = token.cancelled() => return (job, Err(CoreError::Cancelled)),
                        permit = sem.acquire_owned() => match permit {
                            Ok(permit) => Some(permit),
                            Err(_) => return (job, Err(CoreError::Cancelled)),
                        },
                    },
                    None => None,
                };
                let outcome = scheduler.run(&token).await;
                (job, outcome)
            });
        }

        let mut result = AggregateResult::new();
        while let Some(joined) = set.join_next().await {
            let (job, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    abort(&guard, &mut set);
                    return Err(CoreError::Join(e.to_string()));
                }
            };
            match outcome {
                Ok(outcome) => {
                    debug!(task_id = %job.task_id, outcome = outcome.label(), "batch member resolved");
                    result.record(ResolvedJob { job, outcome });
                }
                Err(e) => {
                    debug!(task_id = %job.task_id, error = %e, "batch aborted");
                    abort(&guard, &mut set);
                    return Err(e);
                }
            }
        }

        info!(
            passed = result.total_passed,
            failed = result.total_failed,
            "batch finished"
        );
        self.bus.emit(
            EngineEvent::new(EventKind::BatchFinished)
                .with_batch(Some(batch))
                .with_counts(result.total_passed, result.total_failed),
        );
        Ok(result)
    }
}

fn abort(guard: &CancellationToken, set: &mut JoinSet<(Job, Result<JobOutcome, CoreError>)>) {
    guard.cancel();
    set.abort_all();
}

fn partition(jobs: &[Job]) -> BTreeMap<JobGroup, usize> {
    let mut groups = BTreeMap::new();
    for job in jobs {
        *groups.entry(job.spec.group()).or_default() += 1;
    }
    groups
}
