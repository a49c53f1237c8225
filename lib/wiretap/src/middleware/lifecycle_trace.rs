//! Lifecycle latency tracing.
//!
//! Each request gets a [`ClientTrace`] whose listener observes, for every
//! lifecycle event, the seconds elapsed since the middleware was called. The
//! observation is keyed by the event name (`DNSStart`, `GotConn`, ...), so the
//! observer must be partitioned by the single label `event`.
//!
//! `ConnectDone` and `TLSHandshakeDone` events carrying an error are skipped.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use bytes::Bytes;
use tower::{Layer, Service};
use wiretap_core::{ClientTrace, Observer, SchemaError, TraceEvent, TraceEventKind, check_single_label};

use crate::{Error, Request, Response, Result};

const LABEL_EVENT: &str = "event";

/// Layer that observes lifecycle event latencies on a shared [`Observer`].
pub struct LifecycleTraceLayer<O: ?Sized> {
    observer: Arc<O>,
}

impl<O: Observer + ?Sized + 'static> LifecycleTraceLayer<O> {
    /// Create a layer reporting to `observer`.
    ///
    /// # Panics
    ///
    /// Panics with the [`SchemaError`] message if `observer` is not partitioned
    /// by the single label `event`.
    pub fn new(observer: Arc<O>) -> Self {
        Self::try_new(observer).unwrap_or_else(|err| panic!("{err}"))
    }

    /// Create a layer reporting to `observer`, returning schema errors.
    pub fn try_new(observer: Arc<O>) -> std::result::Result<Self, SchemaError> {
        check_single_label(&*observer, LABEL_EVENT)?;
        Ok(Self { observer })
    }
}

impl<O: ?Sized> Clone for LifecycleTraceLayer<O> {
    fn clone(&self) -> Self {
        Self {
            observer: Arc::clone(&self.observer),
        }
    }
}

impl<O: ?Sized> fmt::Debug for LifecycleTraceLayer<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleTraceLayer").finish_non_exhaustive()
    }
}

impl<S, O: ?Sized> Layer<S> for LifecycleTraceLayer<O> {
    type Service = LifecycleTrace<S, O>;

    fn layer(&self, inner: S) -> Self::Service {
        LifecycleTrace {
            inner,
            observer: Arc::clone(&self.observer),
        }
    }
}

/// Service that attaches a latency-observing [`ClientTrace`] to each request.
pub struct LifecycleTrace<S, O: ?Sized> {
    inner: S,
    observer: Arc<O>,
}

impl<S: Clone, O: ?Sized> Clone for LifecycleTrace<S, O> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            observer: Arc::clone(&self.observer),
        }
    }
}

impl<S: fmt::Debug, O: ?Sized> fmt::Debug for LifecycleTrace<S, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleTrace")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<S, O> Service<Request<Bytes>> for LifecycleTrace<S, O>
where
    S: Service<Request<Bytes>, Response = Response<Bytes>, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
    O: Observer + ?Sized + 'static,
{
    type Response = Response<Bytes>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Bytes>) -> Self::Future {
        let start = Instant::now();
        let observer = Arc::clone(&self.observer);

        ClientTrace::new(move |event| {
            if is_failed_step(event) {
                return;
            }
            observer.observe(&[event.kind().as_str()], start.elapsed().as_secs_f64());
        })
        .install(&mut request);

        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(request).await })
    }
}

fn is_failed_step(event: &TraceEvent) -> bool {
    matches!(
        event.kind(),
        TraceEventKind::ConnectDone | TraceEventKind::TlsHandshakeDone
    ) && event.error().is_some()
}
