//! In-flight request tracking.
//!
//! The gauge is incremented when a request is handed to the inner doer and
//! decremented when the call completes, whether it succeeded, failed, or its
//! future was dropped before completion.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use tower::{Layer, Service};
use wiretap_core::Gauge;

use crate::{Error, Request, Response, Result};

/// Layer that tracks in-flight requests on a shared [`Gauge`].
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use wiretap::middleware::InFlightLayer;
///
/// let gauge = Arc::new(MetricsGauge::new("client_in_flight_requests", "In-flight requests."));
/// let service = InFlightLayer::new(gauge).layer(client);
/// ```
pub struct InFlightLayer<G: ?Sized> {
    gauge: Arc<G>,
}

impl<G: ?Sized> InFlightLayer<G> {
    /// Create a layer reporting to `gauge`.
    pub fn new(gauge: Arc<G>) -> Self {
        Self { gauge }
    }
}

impl<G: ?Sized> Clone for InFlightLayer<G> {
    fn clone(&self) -> Self {
        Self {
            gauge: Arc::clone(&self.gauge),
        }
    }
}

impl<G: ?Sized> fmt::Debug for InFlightLayer<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlightLayer").finish_non_exhaustive()
    }
}

impl<S, G: ?Sized> Layer<S> for InFlightLayer<G> {
    type Service = InFlight<S, G>;

    fn layer(&self, inner: S) -> Self::Service {
        InFlight {
            inner,
            gauge: Arc::clone(&self.gauge),
        }
    }
}

/// Service that tracks in-flight requests.
pub struct InFlight<S, G: ?Sized> {
    inner: S,
    gauge: Arc<G>,
}

impl<S: Clone, G: ?Sized> Clone for InFlight<S, G> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            gauge: Arc::clone(&self.gauge),
        }
    }
}

impl<S: fmt::Debug, G: ?Sized> fmt::Debug for InFlight<S, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlight")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<S, G> Service<Request<Bytes>> for InFlight<S, G>
where
    S: Service<Request<Bytes>, Response = Response<Bytes>, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
    G: Gauge + ?Sized + 'static,
{
    type Response = Response<Bytes>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        let guard = InFlightGuard::enter(Arc::clone(&self.gauge));
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let _guard = guard;
            inner.call(request).await
        })
    }
}

/// Holds one unit of the gauge until dropped.
struct InFlightGuard<G: Gauge + ?Sized> {
    gauge: Arc<G>,
}

impl<G: Gauge + ?Sized> InFlightGuard<G> {
    fn enter(gauge: Arc<G>) -> Self {
        gauge.increment();
        Self { gauge }
    }
}

impl<G: Gauge + ?Sized> Drop for InFlightGuard<G> {
    fn drop(&mut self) {
        self.gauge.decrement();
    }
}
