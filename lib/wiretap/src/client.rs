//! HTTP client implementation using hyper-util.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::{
    client::legacy::{
        Client,
        connect::{CaptureConnection, capture_connection},
    },
    rt::TokioExecutor,
};
use tower::Layer;
use tower::util::BoxCloneService;
use tower_service::Service;
use wiretap_core::{ClientTrace, Counter, Gauge, Observer, TraceEvent};

use crate::{
    Error, Request, Response, Result,
    config::{ClientConfig, ClientConfigBuilder},
    connector::{TracedConnector, https_connector},
    lifecycle::{TraceContext, TracedBody},
    middleware::{InFlightLayer, LifecycleTraceLayer, LoggingLayer, OutcomeCounterLayer},
};

/// Type-erased service for middleware composition.
///
/// This type allows storing and composing arbitrary Tower layers without
/// exposing complex generic types to users.
pub type BoxedService = BoxCloneService<Request<Bytes>, Response<Bytes>, Error>;

/// Future type for Tower Service implementation.
pub type ServiceFuture = Pin<Box<dyn Future<Output = Result<Response<Bytes>>> + Send + 'static>>;

type HyperInner = Client<TracedConnector, TracedBody>;

/// Thread-safe wrapper for `BoxedService`.
///
/// This wrapper uses a Mutex to make the service Sync, which is required
/// by the `HttpClient` trait.
#[derive(Clone)]
struct SyncService {
    inner: Arc<Mutex<BoxedService>>,
}

impl SyncService {
    fn new(service: BoxedService) -> Self {
        Self {
            inner: Arc::new(Mutex::new(service)),
        }
    }

    fn call(&self, request: Request<Bytes>) -> ServiceFuture {
        // Lock, clone the service, and release the lock immediately
        let mut service = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();

        Box::pin(async move { service.call(request).await })
    }
}

/// Raw HTTP client using hyper-util (internal implementation).
///
/// A request carrying a [`ClientTrace`] is executed inside its own trace scope so
/// the resolver, connectors and body can report lifecycle events for it.
#[derive(Clone)]
struct RawHyperClient {
    inner: HyperInner,
    config: ClientConfig,
}

impl RawHyperClient {
    fn new(config: ClientConfig) -> Self {
        let connector = https_connector(&config);

        let inner = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_idle_per_host)
            .build(connector);

        Self { inner, config }
    }

    /// Build a hyper request from a wiretap request.
    fn build_hyper_request(
        request: Request<Bytes>,
        trace: Option<Arc<TraceContext>>,
    ) -> Result<http::Request<TracedBody>> {
        let (method, url, headers, body, extensions) = request.into_parts();

        let mut builder = http::Request::builder()
            .method(http::Method::from(method))
            .uri(url.as_str());

        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let body = TracedBody::new(body.map_or_else(Full::default, Full::new), trace);
        let mut http_request = builder
            .body(body)
            .map_err(|e| Error::invalid_request(e.to_string()))?;

        *http_request.extensions_mut() = extensions;

        Ok(http_request)
    }

    /// Extract response headers as a `HashMap`.
    fn extract_headers(headers: &http::HeaderMap) -> HashMap<String, String> {
        headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect()
    }

    async fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        match request.extensions().get::<ClientTrace>().cloned() {
            Some(trace) => {
                let trace = TraceContext::new(trace);
                Arc::clone(&trace).scope(self.send(request, Some(trace))).await
            }
            None => self.send(request, None).await,
        }
    }

    async fn send(
        &self,
        request: Request<Bytes>,
        trace: Option<Arc<TraceContext>>,
    ) -> Result<Response<Bytes>> {
        let mut hyper_request = Self::build_hyper_request(request, trace.clone())?;
        let capture = trace
            .as_ref()
            .map(|_| capture_connection(&mut hyper_request));
        let requesting = self.inner.request(hyper_request);

        let pending = async {
            match (&trace, capture) {
                (Some(trace), Some(capture)) => Self::traced(requesting, capture, trace).await,
                _ => requesting.await,
            }
        };

        let response = tokio::time::timeout(self.config.timeout, pending)
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(Self::map_hyper_error)?;

        let status = response.status().as_u16();
        let response_headers = Self::extract_headers(response.headers());

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::connection(e.to_string()))?
            .to_bytes();

        Ok(Response::new(status, response_headers, body))
    }

    /// Await a pending request, reporting `GotConn`, the held `WroteRequest` and
    /// `GotFirstResponseByte`, in that order.
    async fn traced<T, E>(
        pending: impl Future<Output = std::result::Result<T, E>>,
        mut capture: CaptureConnection,
        trace: &TraceContext,
    ) -> std::result::Result<T, E> {
        let mut pending = std::pin::pin!(pending);

        let early = tokio::select! {
            biased;
            _ = async { capture.wait_for_connection_metadata().await.is_some() } => None,
            response = &mut pending => Some(response),
        };

        let connected = capture.connection_metadata().is_some();
        if connected {
            trace.emit(TraceEvent::GotConn {
                reused: !trace.dialed(),
            });
            trace.release_written();
        }

        let response = match early {
            Some(response) => response,
            None => pending.await,
        };

        if response.is_ok() {
            trace.release_written();
            trace.emit(TraceEvent::GotFirstResponseByte);
        }
        response
    }

    #[allow(clippy::needless_pass_by_value)]
    fn map_hyper_error(err: hyper_util::client::legacy::Error) -> Error {
        let msg = err.to_string();

        if err.is_connect() {
            return Error::connection(msg);
        }

        if msg.contains("ssl") || msg.contains("tls") || msg.contains("certificate") {
            return Error::tls(msg);
        }

        Error::connection(msg)
    }
}

impl Service<Request<Bytes>> for RawHyperClient {
    type Response = Response<Bytes>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send + 'static>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        let client = self.clone();
        Box::pin(async move { client.execute(request).await })
    }
}

/// HTTP client using hyper-util with connection pooling, TLS, lifecycle tracing
/// and middleware support.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use wiretap::HyperClient;
/// use wiretap::collectors::{MetricsCounter, MetricsGauge, MetricsObserver};
///
/// let client = HyperClient::builder()
///     .with_in_flight(Arc::new(MetricsGauge::new("client_in_flight_requests", "In-flight requests.")))
///     .with_outcome_counter(Arc::new(MetricsCounter::outcome("client_api_requests_total", "Requests.")))
///     .with_lifecycle_trace(Arc::new(MetricsObserver::lifecycle("client_trace_seconds", "Trace.")))
///     .build();
/// ```
#[derive(Clone)]
pub struct HyperClient {
    service: SyncService,
    config: ClientConfig,
}

impl std::fmt::Debug for HyperClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HyperClient {
    /// Create a new client with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration (no middleware).
    #[must_use]
    pub fn with_config(config: ClientConfig) -> Self {
        let raw = RawHyperClient::new(config.clone());
        Self::with_service(BoxCloneService::new(raw), config)
    }

    fn with_service(service: BoxedService, config: ClientConfig) -> Self {
        Self {
            service: SyncService::new(service),
            config,
        }
    }

    /// Create a new client builder.
    #[must_use]
    pub fn builder() -> HyperClientBuilder {
        HyperClientBuilder::default()
    }

    /// Get the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl Default for HyperClient {
    fn default() -> Self {
        Self::new()
    }
}

impl wiretap_core::HttpClient for HyperClient {
    async fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        self.service.call(request).await
    }
}

impl Service<Request<Bytes>> for HyperClient {
    type Response = Response<Bytes>;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        // SyncService is always ready (the underlying service is polled when called)
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        self.service.call(request)
    }
}

/// Builder for [`HyperClient`].
///
/// Layers are applied in order: the first added is the outermost, so it sees
/// each request first and each result last.
#[derive(Default)]
pub struct HyperClientBuilder {
    config: ClientConfigBuilder,
    layers: Vec<Arc<dyn Fn(BoxedService) -> BoxedService + Send + Sync>>,
}

impl std::fmt::Debug for HyperClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperClientBuilder")
            .field("config", &self.config)
            .field("layers_count", &self.layers.len())
            .finish()
    }
}

impl HyperClientBuilder {
    /// Set the request timeout (applied at the connection level, not middleware).
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.timeout(timeout);
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.connect_timeout(timeout);
        self
    }

    /// Set the maximum idle connections per host.
    #[must_use]
    pub fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.config = self.config.pool_idle_per_host(count);
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.pool_idle_timeout(timeout);
        self
    }

    /// Add a Tower layer to the client.
    ///
    /// Layers are applied in order: first added = outermost (processes requests first).
    #[must_use]
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<BoxedService> + Send + Sync + 'static,
        L::Service: Service<Request<Bytes>, Response = Response<Bytes>, Error = Error>
            + Clone
            + Send
            + 'static,
        <L::Service as Service<Request<Bytes>>>::Future: Send,
    {
        self.layers.push(Arc::new(move |service| {
            BoxCloneService::new(layer.layer(service))
        }));
        self
    }

    /// Alias for [`HyperClientBuilder::layer`].
    #[must_use]
    pub fn with<L>(self, layer: L) -> Self
    where
        L: Layer<BoxedService> + Send + Sync + 'static,
        L::Service: Service<Request<Bytes>, Response = Response<Bytes>, Error = Error>
            + Clone
            + Send
            + 'static,
        <L::Service as Service<Request<Bytes>>>::Future: Send,
    {
        self.layer(layer)
    }

    /// Track in-flight requests on `gauge`.
    #[must_use]
    pub fn with_in_flight<G>(self, gauge: Arc<G>) -> Self
    where
        G: Gauge + ?Sized + 'static,
    {
        self.layer(InFlightLayer::new(gauge))
    }

    /// Count completed requests on `counter`, partitioned by `code` and `method`.
    ///
    /// # Panics
    ///
    /// Panics if `counter` is not partitioned by exactly `code` and `method`.
    /// Use [`OutcomeCounterLayer::try_new`] with [`HyperClientBuilder::layer`] to
    /// handle the error instead.
    #[must_use]
    pub fn with_outcome_counter<C>(self, counter: Arc<C>) -> Self
    where
        C: Counter + ?Sized + 'static,
    {
        self.layer(OutcomeCounterLayer::new(counter))
    }

    /// Observe lifecycle event latencies on `observer`, partitioned by `event`.
    ///
    /// # Panics
    ///
    /// Panics if `observer` is not partitioned by the single label `event`.
    /// Use [`LifecycleTraceLayer::try_new`] with [`HyperClientBuilder::layer`] to
    /// handle the error instead.
    #[must_use]
    pub fn with_lifecycle_trace<O>(self, observer: Arc<O>) -> Self
    where
        O: Observer + ?Sized + 'static,
    {
        self.layer(LifecycleTraceLayer::new(observer))
    }

    /// Add request/response logging.
    #[must_use]
    pub fn with_logging(self) -> Self {
        self.layer(LoggingLayer::new())
    }

    /// Add debug-level logging, lifecycle events included.
    #[must_use]
    pub fn with_debug_logging(self) -> Self {
        self.layer(LoggingLayer::debug())
    }

    /// Build the client with all configured middleware.
    #[must_use]
    pub fn build(self) -> HyperClient {
        let config = self.config.build();
        let mut service: BoxedService = BoxCloneService::new(RawHyperClient::new(config.clone()));

        // Wrap in reverse so the first layer added ends up outermost
        for layer_fn in self.layers.into_iter().rev() {
            service = layer_fn(service);
        }

        HyperClient::with_service(service, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_default() {
        let client = HyperClient::new();
        assert_eq!(client.config().timeout, Duration::from_secs(30));
    }

    #[test]
    fn client_builder() {
        let client = HyperClient::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(2))
            .pool_idle_per_host(16)
            .build();

        assert_eq!(client.config().timeout, Duration::from_secs(60));
        assert_eq!(client.config().connect_timeout, Duration::from_secs(2));
        assert_eq!(client.config().pool_idle_per_host, 16);
    }

    #[test]
    fn builder_counts_layers() {
        let builder = HyperClient::builder().with_logging().with_debug_logging();
        let debug = format!("{builder:?}");
        assert!(debug.contains("layers_count: 2"), "{debug}");
    }

    #[test]
    fn client_is_debug() {
        let client = HyperClient::new();
        let debug = format!("{client:?}");
        assert!(debug.contains("HyperClient"));
    }
}
