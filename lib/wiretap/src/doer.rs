//! Decorator composition.
//!
//! A request doer is anything that turns a [`Request`] into a [`Response`]: the
//! [`HyperClient`](crate::HyperClient), a middleware service wrapping another doer,
//! or a plain async function lifted with [`doer_fn`]. Middleware layers take a doer
//! and return a doer with the same call shape, so stacks are built by repeated
//! wrapping; the outermost wrapper sees the request first and the result last.

use std::fmt;
use std::future::Future;
use std::task::{Context, Poll};

use bytes::Bytes;
use tower_service::Service;

use crate::{Error, HttpClient, Request, Response, Result};

/// Any cloneable service that executes requests.
///
/// Implemented for every matching [`Service`]; it only names the bounds the
/// middleware layers require of the doer they wrap.
pub trait RequestDoer:
    Service<Request<Bytes>, Response = Response<Bytes>, Error = Error, Future: Send>
    + Clone
    + Send
    + 'static
{
}

impl<S> RequestDoer for S where
    S: Service<Request<Bytes>, Response = Response<Bytes>, Error = Error, Future: Send>
        + Clone
        + Send
        + 'static
{
}

/// Lift an async function into a request doer.
///
/// # Example
///
/// ```ignore
/// use wiretap::{Response, doer_fn};
///
/// let doer = doer_fn(|_request| async {
///     Ok(Response::new(204, Default::default(), bytes::Bytes::new()))
/// });
/// ```
pub fn doer_fn<F, Fut>(f: F) -> DoerFn<F>
where
    F: Fn(Request<Bytes>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Response<Bytes>>> + Send + 'static,
{
    DoerFn { f }
}

/// Request doer backed by an async function. Created by [`doer_fn`].
#[derive(Clone, Copy)]
pub struct DoerFn<F> {
    f: F,
}

impl<F> fmt::Debug for DoerFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DoerFn")
            .field("f", &std::any::type_name::<F>())
            .finish()
    }
}

impl<F, Fut> Service<Request<Bytes>> for DoerFn<F>
where
    F: Fn(Request<Bytes>) -> Fut,
    Fut: Future<Output = Result<Response<Bytes>>>,
{
    type Response = Response<Bytes>;
    type Error = Error;
    type Future = Fut;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        (self.f)(request)
    }
}

impl<F, Fut> HttpClient for DoerFn<F>
where
    F: Fn(Request<Bytes>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response<Bytes>>> + Send,
{
    fn execute(&self, request: Request<Bytes>) -> impl Future<Output = Result<Response<Bytes>>> + Send {
        (self.f)(request)
    }
}
