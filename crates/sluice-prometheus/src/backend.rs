use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, proto::MetricFamily};
use sluice_core::{EngineEvent, EventKind, Subscribe};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to register metric: {0}")]
    Register(#[from] prometheus::Error),
}

/// Job engine metrics kept in a private [`Registry`].
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    submitted: IntCounterVec,
    resolved: IntCounterVec,
    polls: IntCounterVec,
    poll_errors: IntCounterVec,
    wait_seconds: HistogramVec,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        Self::with_registry(Registry::new())
    }

    /// Register the metrics on an existing registry.
    pub fn with_registry(registry: Registry) -> Result<Self, MetricsError> {
        let submitted = IntCounterVec::new(
            Opts::new("sluice_jobs_submitted_total", "Jobs accepted by the control plane"),
            &["kind"],
        )?;
        let resolved = IntCounterVec::new(
            Opts::new(
                "sluice_jobs_resolved_total",
                "Jobs that reached a terminal outcome",
            ),
            &["kind", "outcome"],
        )?;
        let polls = IntCounterVec::new(
            Opts::new("sluice_status_polls_total", "Status checks issued"),
            &["kind"],
        )?;
        let poll_errors = IntCounterVec::new(
            Opts::new("sluice_poll_errors_total", "Status checks that failed in transport"),
            &["kind"],
        )?;
        let wait_seconds = HistogramVec::new(
            HistogramOpts::new(
                "sluice_job_wait_seconds",
                "Time from first status check to terminal outcome",
            )
            .buckets(vec![
                1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1_800.0, 3_600.0,
            ]),
            &["kind"],
        )?;

        registry.register(Box::new(submitted.clone()))?;
        registry.register(Box::new(resolved.clone()))?;
        registry.register(Box::new(polls.clone()))?;
        registry.register(Box::new(poll_errors.clone()))?;
        registry.register(Box::new(wait_seconds.clone()))?;

        Ok(Self {
            registry,
            submitted,
            resolved,
            polls,
            poll_errors,
            wait_seconds,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    fn observe_wait(&self, kind: &str, event: &EngineEvent) {
        if let Some(ms) = event.elapsed_ms {
            self.wait_seconds
                .with_label_values(&[kind])
                .observe(ms as f64 / 1_000.0);
        }
    }
}

impl Subscribe for PrometheusMetrics {
    fn on_event(&self, event: &EngineEvent) {
        let kind = event.job_kind.map(|k| k.as_str()).unwrap_or("unknown");

        match event.kind {
            EventKind::Submitted => self.submitted.with_label_values(&[kind]).inc(),
            EventKind::PollAttempt => self.polls.with_label_values(&[kind]).inc(),
            EventKind::PollFailed => self.poll_errors.with_label_values(&[kind]).inc(),
            EventKind::Resolved => {
                let outcome = event.verdict.map(|v| v.as_str()).unwrap_or("unknown");
                self.resolved.with_label_values(&[kind, outcome]).inc();
                self.observe_wait(kind, event);
            }
            EventKind::Exhausted => {
                self.resolved.with_label_values(&[kind, "exhausted"]).inc();
                self.observe_wait(kind, event);
            }
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "prometheus"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Encoder, TextEncoder};
    use sluice_model::{JobKind, TaskId, Verdict};

    fn task_event(kind: EventKind) -> EngineEvent {
        EngineEvent::new(kind).with_task(&TaskId::from("e-1"), JobKind::Export)
    }

    #[test]
    fn counts_job_lifecycle() {
        let metrics = PrometheusMetrics::new().unwrap();

        metrics.on_event(&task_event(EventKind::Submitted));
        metrics.on_event(&task_event(EventKind::PollAttempt).with_attempt(1));
        metrics.on_event(&task_event(EventKind::PollAttempt).with_attempt(2));
        metrics.on_event(
            &task_event(EventKind::Resolved)
                .with_verdict(Verdict::Succeeded)
                .with_elapsed_ms(1_500),
        );

        assert_eq!(metrics.submitted.with_label_values(&["export"]).get(), 1);
        assert_eq!(metrics.polls.with_label_values(&["export"]).get(), 2);
        assert_eq!(
            metrics
                .resolved
                .with_label_values(&["export", "succeeded"])
                .get(),
            1
        );
        let wait = metrics.wait_seconds.with_label_values(&["export"]);
        assert_eq!(wait.get_sample_count(), 1);
        assert!((wait.get_sample_sum() - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn exhausted_is_its_own_outcome() {
        let metrics = PrometheusMetrics::new().unwrap();

        metrics.on_event(&task_event(EventKind::Exhausted).with_elapsed_ms(3_500_000));

        assert_eq!(
            metrics
                .resolved
                .with_label_values(&["export", "exhausted"])
                .get(),
            1
        );
    }

    #[test]
    fn gather_exposes_registered_families() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.on_event(&task_event(EventKind::PollFailed).with_reason("reset"));

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metrics.gather(), &mut buffer)
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains(r#"sluice_poll_errors_total{kind="export"} 1"#));
    }

    #[test]
    fn same_registry_twice_is_rejected() {
        let registry = Registry::new();
        PrometheusMetrics::with_registry(registry.clone()).unwrap();

        assert!(PrometheusMetrics::with_registry(registry).is_err());
    }
}
