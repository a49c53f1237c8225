//! Prelude module for convenient imports.
//!
//! ```ignore
//! use wiretap_core::prelude::*;
//! ```

pub use crate::{
    ClientTrace, Counter, Describe, Error, Gauge, HttpClient, HttpClientExt, Method, Observer,
    Request, RequestBuilder, Response, Result, SchemaError, TraceEvent,
};
