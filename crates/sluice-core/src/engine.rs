use std::sync::Arc;

use sluice_model::{
    AggregateResult, DeferredTaskHandle, Job, JobOutcome, JobSpec, JobStatus, PollPolicy,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::{
    control_plane::ControlPlane,
    error::CoreError,
    events::{EventBus, Subscribe},
    fanout::FanOut,
    fetch::{RECENT_IMPORTS_WINDOW, StatusFetcher},
    scheduler::{RetryScheduler, Step},
    submit::{Submission, Submitter},
};

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub policy: PollPolicy,
    /// Cap on concurrently polled jobs in a batch. `None` polls every job at once.
    pub max_in_flight: Option<usize>,
    /// Size of the recent import jobs listing requested per status check.
    pub recent_import_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            policy: PollPolicy::default(),
            max_in_flight: None,
            recent_import_window: RECENT_IMPORTS_WINDOW,
        }
    }
}

impl EngineConfig {
    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = Some(max_in_flight);
        self
    }

    pub fn with_recent_import_window(mut self, window: usize) -> Self {
        self.recent_import_window = window;
        self
    }
}

/// How [`JobEngine::execute`] hands results back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Return a resumable handle right after submission instead of waiting.
    pub defer: bool,
}

impl ExecuteOptions {
    pub fn deferred() -> Self {
        Self { defer: true }
    }
}

/// Synchronous result of one job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub job: Job,
    pub outcome: JobOutcome,
}

impl JobReport {
    /// Final status of a successful job.
    pub fn response(&self) -> Option<&JobStatus> {
        match &self.outcome {
            JobOutcome::Succeeded { status, .. } => Some(status),
            _ => None,
        }
    }

    /// Set for remote failures and exhausted budgets.
    pub fn error(&self) -> Option<String> {
        self.outcome.error_message()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    Completed(JobReport),
    Deferred(DeferredTaskHandle),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchExecution {
    Completed(AggregateResult),
    /// Submitted jobs, to be resumed with [`JobEngine::wait_all`] or polled one by one.
    Deferred(Vec<Job>),
}

/// Result of a single status check on a deferred job.
#[derive(Debug, Clone, PartialEq)]
pub struct PollReport {
    /// The job reached a terminal state.
    pub completed: bool,
    /// Final status of a successful job.
    pub response: Option<JobStatus>,
    /// Why a completed job failed.
    pub error: Option<String>,
}

impl PollReport {
    fn pending() -> Self {
        Self {
            completed: false,
            response: None,
            error: None,
        }
    }
}

/// Submits jobs and drives them to completion, either inline or from a handle.
///
/// Waiting and single polls go through the same fetcher and classifier, so both
/// modes reach the same verdict for the same status history.
pub struct JobEngine<C> {
    plane: Arc<C>,
    config: EngineConfig,
    bus: EventBus,
}

impl<C> JobEngine<C>
where
    C: ControlPlane,
{
    pub fn new(plane: Arc<C>) -> Self {
        Self {
            plane,
            config: EngineConfig::default(),
            bus: EventBus::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.bus = EventBus::new(subscribers);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Submit one job without waiting for it.
    pub async fn submit(&self, spec: JobSpec) -> Result<Submission, CoreError> {
        self.submitter().submit(spec).await
    }

    /// Submit one job and either wait for its outcome or hand back a resumable handle.
    #[instrument(level = "debug", skip(self, spec, cancel), fields(defer = options.defer))]
    pub async fn execute(
        &self,
        spec: JobSpec,
        options: ExecuteOptions,
        cancel: &CancellationToken,
    ) -> Result<Execution, CoreError> {
        let submission = self.submit_until(&self.submitter(), spec, cancel).await?;
        if options.defer {
            debug!(task_id = %submission.job.task_id, "returning deferred handle");
            return Ok(Execution::Deferred(submission.handle()));
        }

        let outcome = self.wait(submission.handle(), cancel).await?;
        Ok(Execution::Completed(JobReport {
            job: submission.job,
            outcome,
        }))
    }

    /// Submit every job, then fan out or hand the jobs back.
    ///
    /// A rejected submission aborts the call; jobs already accepted keep running
    /// remotely and are not reported.
    #[instrument(level = "debug", skip(self, specs, cancel), fields(size = specs.len(), defer = options.defer))]
    pub async fn execute_batch(
        &self,
        specs: Vec<JobSpec>,
        options: ExecuteOptions,
        cancel: &CancellationToken,
    ) -> Result<BatchExecution, CoreError> {
        let submitter = self.submitter();
        let mut jobs = Vec::with_capacity(specs.len());
        for spec in specs {
            jobs.push(self.submit_until(&submitter, spec, cancel).await?.job);
        }
        info!(submitted = jobs.len(), "batch submitted");

        if options.defer {
            return Ok(BatchExecution::Deferred(jobs));
        }
        self.wait_all(jobs, cancel)
            .await
            .map(BatchExecution::Completed)
    }

    /// Poll a job until it is terminal or the attempt budget runs out.
    pub async fn wait(
        &self,
        handle: DeferredTaskHandle,
        cancel: &CancellationToken,
    ) -> Result<JobOutcome, CoreError> {
        RetryScheduler::new(self.fetcher(), handle, self.config.policy)
            .with_bus(self.bus.clone())
            .run(cancel)
            .await
    }

    /// Wait for every job concurrently.
    pub async fn wait_all(
        &self,
        jobs: Vec<Job>,
        cancel: &CancellationToken,
    ) -> Result<AggregateResult, CoreError> {
        FanOut::new(self.fetcher(), self.config.policy)
            .with_bus(self.bus.clone())
            .with_max_in_flight(self.config.max_in_flight)
            .run(jobs, cancel)
            .await
    }

    /// One status check, no waiting. The caller owns the polling cadence.
    #[instrument(level = "debug", skip(self, handle), fields(task_id = %handle.task_id))]
    pub async fn poll(&self, handle: DeferredTaskHandle) -> Result<PollReport, CoreError> {
        let policy = self.config.policy.with_max_attempts(u32::MAX);
        let mut scheduler =
            RetryScheduler::new(self.fetcher(), handle, policy).with_bus(self.bus.clone());

        let outcome = match scheduler.step().await? {
            Step::Continue(_) => return Ok(PollReport::pending()),
            Step::Stop(JobOutcome::Exhausted { .. }) => return Ok(PollReport::pending()),
            Step::Stop(outcome) => outcome,
        };
        scheduler.finished(&outcome, None);

        let error = outcome.error_message();
        let response = match outcome {
            JobOutcome::Succeeded { status, .. } => Some(status),
            _ => None,
        };
        Ok(PollReport {
            completed: true,
            response,
            error,
        })
    }

    /// Log location of an import job. Always `None` for exports.
    pub async fn job_log(&self, handle: &DeferredTaskHandle) -> Result<Option<String>, CoreError> {
        self.fetcher()
            .log_url(handle)
            .await
            .map_err(|source| CoreError::Log {
                task_id: handle.task_id.clone(),
                source,
            })
    }

    /// Submit unless `cancel` fires first. A cancelled call sends nothing further.
    async fn submit_until(
        &self,
        submitter: &Submitter<C>,
        spec: JobSpec,
        cancel: &CancellationToken,
    ) -> Result<Submission, CoreError> {
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("submission cancelled");
                Err(CoreError::Cancelled)
            }
            submitted = submitter.submit(spec) => submitted,
        }
    }

    fn fetcher(&self) -> StatusFetcher<C> {
        StatusFetcher::new(Arc::clone(&self.plane))
            .with_import_window(self.config.recent_import_window)
    }

    fn submitter(&self) -> Submitter<C> {
        Submitter::new(Arc::clone(&self.plane)).with_bus(self.bus.clone())
    }
}
