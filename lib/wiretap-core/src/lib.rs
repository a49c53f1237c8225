//! Core types and traits for wiretap HTTP client instrumentation.
//!
//! This crate provides the foundational types used by wiretap:
//! - [`Method`], [`Request`], [`Response`] - the request/response pair a doer exchanges
//! - [`Error`] and [`Result`] - request failures
//! - [`HttpClient`] - the "issue a request, get a response" capability
//! - [`ClientTrace`] and [`TraceEvent`] - lifecycle listeners carried by a request
//! - [`Describe`], [`Observer`], [`Counter`], [`Gauge`] - the collector view middleware relies on
//! - [`check_single_label`] and [`check_labels`] - label schema validation
//! - [`SchemaError`] - wiring mistakes found while building middleware

mod client;
mod collector;
mod error;
mod method;
pub mod prelude;
mod request;
mod response;
mod schema;
mod trace;

pub use client::{HttpClient, HttpClientExt};
pub use collector::{Counter, Desc, Describe, Gauge, LabelPair, Observer, Sample};
pub use error::{Error, Result, SchemaError};
pub use method::Method;
pub use request::{Request, RequestBuilder};
pub use response::Response;
pub use schema::{check_labels, check_single_label};
pub use trace::{ClientTrace, TraceEvent, TraceEventKind};

// Re-export http crate types for status codes and headers
pub use http::{Extensions, StatusCode, header};
