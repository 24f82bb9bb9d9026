//! In-memory control plane and event recorder for tests.
//!
//! Enabled for this crate's own tests and, through the `testing` feature, for
//! downstream crates that drive a [`crate::JobEngine`] without a network.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use sluice_model::{
    ExportDestination, ExportSource, ExportStatusRecord, ImportDestination, ImportJobRecord,
    ImportSource, JobSpec, SubmitAck, SubmitRequest, TaskId,
};

use crate::{
    control_plane::ControlPlane,
    error::ControlPlaneError,
    events::{EngineEvent, EventBus, EventKind, Subscribe},
};

/// Scripted answer to one export status lookup.
#[derive(Debug, Clone)]
pub enum Reply {
    State {
        state: String,
        output_artifact: Option<String>,
    },
    Missing,
    Error(ControlPlaneError),
}

impl Reply {
    pub fn state(state: impl Into<String>) -> Self {
        Reply::State {
            state: state.into(),
            output_artifact: None,
        }
    }
}

type Listing = Result<Vec<ImportJobRecord>, ControlPlaneError>;

/// Replays queued answers; the last one repeats forever.
#[derive(Debug)]
struct Script<T> {
    queue: VecDeque<T>,
}

impl<T: Clone> Script<T> {
    fn new(items: Vec<T>) -> Self {
        Self {
            queue: items.into(),
        }
    }

    fn next(&mut self) -> Option<T> {
        if self.queue.len() > 1 {
            self.queue.pop_front()
        } else {
            self.queue.front().cloned()
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    task_ids: VecDeque<String>,
    issued: usize,
    submit_error: Option<ControlPlaneError>,
    submissions: Vec<SubmitRequest>,

    exports: HashMap<String, Script<Reply>>,
    listings: HashMap<(String, String), Script<Listing>>,
    logs: HashMap<(String, String, String), String>,

    status_calls: HashMap<String, usize>,
    listing_limits: HashMap<(String, String), Vec<usize>>,
    unbounded_listings: bool,

    in_flight: usize,
    peak: usize,
    in_flight_per_key: HashMap<String, usize>,
    peak_per_key: HashMap<String, usize>,
}

/// [`ControlPlane`] that answers from scripts registered up front.
///
/// Unscripted exports are not found and unscripted repositories list no imports.
/// Every status call yields once to the runtime, so concurrent callers overlap
/// and the peak number of in-flight calls can be observed.
#[derive(Debug, Default)]
pub struct ScriptedControlPlane {
    inner: Mutex<Inner>,
}

impl ScriptedControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Task ids handed out to submissions, in order. Once used up ids fall back to `task-{n}`.
    pub fn with_task_ids<'a>(self, ids: impl IntoIterator<Item = &'a str>) -> Self {
        self.lock()
            .task_ids
            .extend(ids.into_iter().map(str::to_string));
        self
    }

    /// Answer import listings in full, ignoring the requested limit.
    pub fn with_unbounded_listings(self) -> Self {
        self.lock().unbounded_listings = true;
        self
    }

    pub fn script_export(&self, task_id: &str, replies: Vec<Reply>) {
        self.lock()
            .exports
            .insert(task_id.to_string(), Script::new(replies));
    }

    pub fn script_import_listing(&self, namespace: &str, repository: &str, listings: Vec<Listing>) {
        self.lock().listings.insert(
            (namespace.to_string(), repository.to_string()),
            Script::new(listings),
        );
    }

    pub fn set_import_log(&self, namespace: &str, repository: &str, task_id: &str, url: &str) {
        self.lock().logs.insert(
            (
                namespace.to_string(),
                repository.to_string(),
                task_id.to_string(),
            ),
            url.to_string(),
        );
    }

    /// Every following submission fails with `error`.
    pub fn fail_submissions(&self, error: ControlPlaneError) {
        self.lock().submit_error = Some(error);
    }

    pub fn submissions(&self) -> Vec<SubmitRequest> {
        self.lock().submissions.clone()
    }

    /// Number of export status lookups issued for `task_id`.
    pub fn status_calls(&self, task_id: &str) -> usize {
        self.lock().status_calls.get(task_id).copied().unwrap_or(0)
    }

    /// `limit` of every listing request issued for a repository.
    pub fn listing_limits(&self, namespace: &str, repository: &str) -> Vec<usize> {
        self.lock()
            .listing_limits
            .get(&(namespace.to_string(), repository.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Highest number of status calls that were in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.lock().peak
    }

    /// Highest number of concurrent status calls for one export.
    pub fn peak_in_flight_for(&self, task_id: &str) -> usize {
        self.lock().peak_per_key.get(task_id).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn in_flight<T>(&self, key: &str, answer: T) -> T {
        {
            let mut inner = self.lock();
            inner.in_flight += 1;
            inner.peak = inner.peak.max(inner.in_flight);
            let current = inner.in_flight_per_key.entry(key.to_string()).or_default();
            *current += 1;
            let current = *current;
            let peak = inner.peak_per_key.entry(key.to_string()).or_default();
            *peak = (*peak).max(current);
        }

        tokio::task::yield_now().await;

        let mut inner = self.lock();
        inner.in_flight -= 1;
        if let Some(current) = inner.in_flight_per_key.get_mut(key) {
            *current -= 1;
        }
        answer
    }
}

#[async_trait]
impl ControlPlane for ScriptedControlPlane {
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitAck, ControlPlaneError> {
        let mut inner = self.lock();
        if let Some(error) = inner.submit_error.clone() {
            return Err(error);
        }
        inner.submissions.push(request.clone());
        inner.issued += 1;
        let id = match inner.task_ids.pop_front() {
            Some(id) => id,
            None => format!("task-{}", inner.issued),
        };

        Ok(SubmitAck {
            task_id: TaskId::from(id.as_str()),
            raw: serde_json::json!({ "taskId": id }),
        })
    }

    async fn export_status(
        &self,
        task_id: &TaskId,
    ) -> Result<Option<ExportStatusRecord>, ControlPlaneError> {
        let reply = {
            let mut inner = self.lock();
            *inner
                .status_calls
                .entry(task_id.as_str().to_string())
                .or_default() += 1;
            inner
                .exports
                .get_mut(task_id.as_str())
                .and_then(Script::next)
        };

        let answer = match reply {
            None | Some(Reply::Missing) => Ok(None),
            Some(Reply::Error(e)) => Err(e),
            Some(Reply::State {
                state,
                output_artifact,
            }) => Ok(Some(ExportStatusRecord {
                state,
                started: None,
                finished: None,
                output_artifact,
            })),
        };
        self.in_flight(task_id.as_str(), answer).await
    }

    async fn recent_imports(
        &self,
        namespace: &str,
        repository: &str,
        limit: usize,
    ) -> Result<Vec<ImportJobRecord>, ControlPlaneError> {
        let key = (namespace.to_string(), repository.to_string());
        let (listing, unbounded) = {
            let mut inner = self.lock();
            inner
                .listing_limits
                .entry(key.clone())
                .or_default()
                .push(limit);
            let unbounded = inner.unbounded_listings;
            (inner.listings.get_mut(&key).and_then(Script::next), unbounded)
        };

        let answer = listing
            .unwrap_or_else(|| Ok(Vec::new()))
            .map(|mut records| {
                if !unbounded {
                    records.truncate(limit);
                }
                records
            });
        self.in_flight(&format!("{namespace}/{repository}"), answer)
            .await
    }

    async fn import_log(
        &self,
        namespace: &str,
        repository: &str,
        task_id: &TaskId,
    ) -> Result<Option<String>, ControlPlaneError> {
        Ok(self
            .lock()
            .logs
            .get(&(
                namespace.to_string(),
                repository.to_string(),
                task_id.as_str().to_string(),
            ))
            .cloned())
    }
}

/// Subscriber that keeps every event it sees.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<EngineEvent>>,
}

impl EventLog {
    pub fn bus(self: &Arc<Self>) -> EventBus {
        EventBus::new(vec![Arc::clone(self) as Arc<dyn Subscribe>])
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events().iter().filter(|e| e.kind == kind).count()
    }

    /// Delays announced by backoff events, in order.
    pub fn delays(&self) -> Vec<u64> {
        self.events()
            .iter()
            .filter(|e| e.kind == EventKind::BackoffScheduled)
            .filter_map(|e| e.delay_ms)
            .collect()
    }
}

impl Subscribe for EventLog {
    fn on_event(&self, event: &EngineEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }

    fn name(&self) -> &'static str {
        "event-log"
    }
}

pub fn import_record(task_id: &str, state: &str) -> ImportJobRecord {
    ImportJobRecord {
        task_id: TaskId::from(task_id),
        state: state.to_string(),
        started: None,
        finished: None,
    }
}

pub fn import_spec(namespace: &str, repository: &str) -> JobSpec {
    JobSpec::Import {
        source: ImportSource {
            plugin: "csv".into(),
            params: serde_json::json!({ "url": "https://example.com/data.csv" }),
            credential_ref: None,
        },
        destination: ImportDestination {
            namespace: namespace.into(),
            repository: repository.into(),
            tables: Vec::new(),
        },
    }
}

pub fn table_export(namespace: &str, repository: &str, table: &str) -> JobSpec {
    JobSpec::Export {
        source: ExportSource::Table {
            namespace: namespace.into(),
            repository: repository.into(),
            table: table.into(),
            tag: None,
        },
        destination: ExportDestination::default(),
    }
}

pub fn query_export(query: &str) -> JobSpec {
    JobSpec::Export {
        source: ExportSource::Query {
            query: query.into(),
            vdb_id: None,
        },
        destination: ExportDestination::default(),
    }
}
