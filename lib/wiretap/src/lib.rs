//! Non-invasive metrics middleware for HTTP clients.
//!
//! wiretap wraps a request doer (anything that turns a [`Request`] into a
//! [`Response`]) with Tower layers that observe it without changing its call
//! shape:
//!
//! - [`middleware::InFlightLayer`] tracks concurrent requests on a gauge.
//! - [`middleware::OutcomeCounterLayer`] counts responses by status class and method.
//! - [`middleware::LifecycleTraceLayer`] observes how long each connection phase
//!   (DNS, dial, TLS, first response byte, ...) took after the call started.
//!
//! Collectors are owned by the application and shared through an `Arc`. Their
//! label schema is checked once, when a layer is built.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use wiretap::prelude::*;
//! use wiretap::collectors::{MetricsCounter, MetricsGauge, MetricsObserver};
//!
//! let client = HyperClient::builder()
//!     .with_in_flight(Arc::new(MetricsGauge::new("client_in_flight_requests", "In-flight requests.")))
//!     .with_outcome_counter(Arc::new(MetricsCounter::outcome("client_api_requests_total", "Requests.")))
//!     .with_lifecycle_trace(Arc::new(MetricsObserver::lifecycle("client_trace_seconds", "Trace latencies.")))
//!     .build();
//!
//! let response = client.get("https://example.com/").await?;
//! ```

mod client;
pub mod collectors;
mod config;
mod connector;
mod doer;
mod lifecycle;
pub mod middleware;
pub mod prelude;

pub use client::{BoxedService, HyperClient, HyperClientBuilder, ServiceFuture};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use doer::{DoerFn, RequestDoer, doer_fn};

// Re-export tower for middleware composition
pub use tower;

// Re-export core types
pub use wiretap_core::{
    ClientTrace, Counter, Desc, Describe, Error, Gauge, HttpClient, HttpClientExt, LabelPair,
    Method, Observer, Request, RequestBuilder, Response, Result, Sample, SchemaError, TraceEvent,
    TraceEventKind, check_labels, check_single_label,
};

// Re-export http types for status codes and headers
pub use wiretap_core::{StatusCode, header};

pub use url;
