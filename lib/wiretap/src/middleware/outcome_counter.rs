//! Completed-request counting by status class and method.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use tower::{Layer, Service};
use wiretap_core::{Counter, SchemaError, check_labels};

use crate::{Error, Request, Response, Result};

const LABEL_CODE: &str = "code";
const LABEL_METHOD: &str = "method";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Code,
    Method,
}

/// Layer that counts successful round trips on a shared [`Counter`].
///
/// The counter must be partitioned by exactly the labels `code` and `method`, in
/// any order. `code` receives the status class (`2xx`, `4xx`, ...) and `method`
/// the upper-case method name. Requests that fail without a response are not
/// counted.
pub struct OutcomeCounterLayer<C: ?Sized> {
    counter: Arc<C>,
    slots: Arc<[Slot]>,
}

impl<C: Counter + ?Sized> OutcomeCounterLayer<C> {
    /// Create a layer reporting to `counter`.
    ///
    /// # Panics
    ///
    /// Panics with the [`SchemaError`] message if `counter` is not partitioned by
    /// exactly `code` and `method`.
    pub fn new(counter: Arc<C>) -> Self {
        Self::try_new(counter).unwrap_or_else(|err| panic!("{err}"))
    }

    /// Create a layer reporting to `counter`, returning schema errors.
    pub fn try_new(counter: Arc<C>) -> std::result::Result<Self, SchemaError> {
        let slots = check_labels(&*counter, &[LABEL_CODE, LABEL_METHOD])?
            .iter()
            .map(|name| {
                if name == LABEL_CODE {
                    Slot::Code
                } else {
                    Slot::Method
                }
            })
            .collect();

        Ok(Self { counter, slots })
    }
}

impl<C: ?Sized> Clone for OutcomeCounterLayer<C> {
    fn clone(&self) -> Self {
        Self {
            counter: Arc::clone(&self.counter),
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<C: ?Sized> fmt::Debug for OutcomeCounterLayer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutcomeCounterLayer")
            .field("slots", &self.slots)
            .finish_non_exhaustive()
    }
}

impl<S, C: ?Sized> Layer<S> for OutcomeCounterLayer<C> {
    type Service = OutcomeCounter<S, C>;

    fn layer(&self, inner: S) -> Self::Service {
        OutcomeCounter {
            inner,
            counter: Arc::clone(&self.counter),
            slots: Arc::clone(&self.slots),
        }
    }
}

/// Service that counts successful round trips.
pub struct OutcomeCounter<S, C: ?Sized> {
    inner: S,
    counter: Arc<C>,
    slots: Arc<[Slot]>,
}

impl<S: Clone, C: ?Sized> Clone for OutcomeCounter<S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            counter: Arc::clone(&self.counter),
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<S: fmt::Debug, C: ?Sized> fmt::Debug for OutcomeCounter<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutcomeCounter")
            .field("inner", &self.inner)
            .field("slots", &self.slots)
            .finish_non_exhaustive()
    }
}

impl<S, C> Service<Request<Bytes>> for OutcomeCounter<S, C>
where
    S: Service<Request<Bytes>, Response = Response<Bytes>, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
    C: Counter + ?Sized + 'static,
{
    type Response = Response<Bytes>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        let method = request.method();
        let counter = Arc::clone(&self.counter);
        let slots = Arc::clone(&self.slots);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let response = inner.call(request).await?;

            let values: Vec<&str> = slots
                .iter()
                .map(|slot| match slot {
                    Slot::Code => response.status_class(),
                    Slot::Method => method.as_str(),
                })
                .collect();
            counter.increment(&values);

            Ok(response)
        })
    }
}
