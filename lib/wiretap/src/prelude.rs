//! Prelude module for convenient imports.
//!
//! ```ignore
//! use wiretap::prelude::*;
//! ```

pub use crate::middleware::{InFlightLayer, LifecycleTraceLayer, LoggingLayer, OutcomeCounterLayer};
pub use crate::{
    ClientConfig, ClientTrace, Counter, Describe, Error, Gauge, HttpClient, HttpClientExt,
    HyperClient, Method, Observer, Request, RequestBuilder, Response, Result, SchemaError,
    TraceEvent, doer_fn,
};
