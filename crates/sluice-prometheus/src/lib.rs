//! Prometheus metrics for the sluice job engine.
//!
//! [`PrometheusMetrics`] is an engine event subscriber; register it on a
//! [`sluice_core::JobEngine`] and expose [`PrometheusMetrics::gather`] from your own
//! HTTP server.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use sluice_core::Subscribe;
//! use sluice_prometheus::{Encoder, PrometheusMetrics, TextEncoder};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = Arc::new(PrometheusMetrics::new()?);
//! let subscribers = vec![metrics.clone() as Arc<dyn Subscribe>];
//! // JobEngine::new(plane).with_subscribers(subscribers)
//! # drop(subscribers);
//!
//! let mut buffer = Vec::new();
//! TextEncoder::new().encode(&metrics.gather(), &mut buffer)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `sluice_jobs_submitted_total{kind}` - Counter
//! - `sluice_jobs_resolved_total{kind, outcome}` - Counter
//! - `sluice_status_polls_total{kind}` - Counter
//! - `sluice_poll_errors_total{kind}` - Counter
//! - `sluice_job_wait_seconds{kind}` - Histogram
//!
//! This crate does NOT provide an HTTP server for `/metrics`.

mod backend;
pub use backend::{MetricsError, PrometheusMetrics};

pub use prometheus::{Encoder, Registry, TextEncoder};
