//! Tower middleware layers for the wiretap HTTP client.
//!
//! Every layer wraps a request doer and returns a doer with the same call shape.
//! Layers added to [`HyperClientBuilder`](crate::HyperClientBuilder) are applied in
//! order: the first added is the outermost and sees each request first.
//!
//! # Available Layers
//!
//! - [`InFlightLayer`] - tracks in-flight requests on a [`Gauge`](crate::Gauge)
//! - [`OutcomeCounterLayer`] - counts responses by status class and method on a
//!   [`Counter`](crate::Counter)
//! - [`LifecycleTraceLayer`] - observes lifecycle event latencies on an
//!   [`Observer`](crate::Observer)
//! - [`LoggingLayer`] - logs requests/responses using `tracing`
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use wiretap::HyperClient;
//! use wiretap::middleware::{InFlightLayer, OutcomeCounterLayer};
//!
//! let client = HyperClient::builder()
//!     .layer(InFlightLayer::new(Arc::clone(&in_flight)))
//!     .layer(OutcomeCounterLayer::try_new(Arc::clone(&requests))?)
//!     .with_logging()
//!     .build();
//! ```

mod in_flight;
mod lifecycle_trace;
mod logging;
mod outcome_counter;

pub use in_flight::{InFlight, InFlightLayer};
pub use lifecycle_trace::{LifecycleTrace, LifecycleTraceLayer};
pub use logging::{LogLevel, Logging, LoggingLayer};
pub use outcome_counter::{OutcomeCounter, OutcomeCounterLayer};

// Re-export tower types for convenience
pub use tower::{Layer, ServiceBuilder};
