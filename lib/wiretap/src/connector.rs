//! HTTPS connector using rustls, instrumented for lifecycle events.
//!
//! The stack is `TraceConnector(Tls)` over the rustls `HttpsConnector`, over
//! `TraceConnector(Dial)` over an `HttpConnector` resolving through
//! [`TracingResolver`]. Each layer reports to the [`TraceContext`] of the request
//! that started the connection, captured when hyper calls it.

use std::fmt;
use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::task::{Context, Poll};

use http::Uri;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::connect::dns::{GaiResolver, Name};
use tower_service::Service;
use tracing::debug;
use wiretap_core::{TraceEvent, TraceEventKind};

use crate::config::ClientConfig;
use crate::lifecycle::TraceContext;

/// The connector used by [`crate::HyperClient`].
pub(crate) type TracedConnector =
    TraceConnector<HttpsConnector<TraceConnector<HttpConnector<TracingResolver>>>>;

/// Create an HTTPS connector with rustls.
///
/// This connector supports both HTTP/1.1 and HTTP/2, with TLS enabled
/// using the Mozilla root certificates.
#[must_use]
pub(crate) fn https_connector(config: &ClientConfig) -> TracedConnector {
    let mut http = HttpConnector::new_with_resolver(TracingResolver::new());
    http.enforce_http(false);
    http.set_connect_timeout(Some(config.connect_timeout));

    let root_store: rustls::RootCertStore =
        webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();

    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    let https = HttpsConnectorBuilder::new()
        .with_tls_config(tls_config)
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .wrap_connector(TraceConnector::dial(http));

    TraceConnector::tls(https)
}

/// DNS resolver reporting `DNSStart`, `DNSDone`, and the `ConnectStart` that follows.
#[derive(Clone)]
pub(crate) struct TracingResolver {
    inner: GaiResolver,
}

impl TracingResolver {
    fn new() -> Self {
        Self {
            inner: GaiResolver::new(),
        }
    }
}

impl fmt::Debug for TracingResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracingResolver").finish_non_exhaustive()
    }
}

impl Service<Name> for TracingResolver {
    type Response = std::vec::IntoIter<SocketAddr>;
    type Error = io::Error;
    type Future = Pin<Box<dyn Future<Output = io::Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, name: Name) -> Self::Future {
        let trace = TraceContext::current();
        if let Some(trace) = &trace {
            trace.emit(TraceEvent::DnsStart {
                host: name.as_str().to_string(),
            });
        }

        let resolving = self.inner.call(name);
        Box::pin(async move {
            let resolved = resolving.await.map(Iterator::collect::<Vec<_>>);

            if let Some(trace) = trace {
                match &resolved {
                    Ok(addrs) => {
                        trace.emit(TraceEvent::DnsDone {
                            addrs: addrs.clone(),
                            error: None,
                        });
                        if let Some(first) = addrs.first() {
                            let addr = SocketAddr::new(first.ip(), trace.dial_port());
                            trace.emit(TraceEvent::ConnectStart {
                                addr: addr.to_string(),
                            });
                        }
                    }
                    Err(err) => trace.emit(TraceEvent::DnsDone {
                        addrs: Vec::new(),
                        error: Some(err.to_string()),
                    }),
                }
            }

            resolved.map(Vec::into_iter)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// TCP dial.
    Dial,
    /// TLS over an established stream.
    Tls,
}

/// Connector wrapper reporting the dial or TLS stage of a connection.
#[derive(Debug, Clone)]
pub(crate) struct TraceConnector<S> {
    inner: S,
    stage: Stage,
}

impl<S> TraceConnector<S> {
    const fn dial(inner: S) -> Self {
        Self {
            inner,
            stage: Stage::Dial,
        }
    }

    const fn tls(inner: S) -> Self {
        Self {
            inner,
            stage: Stage::Tls,
        }
    }
}

impl<S> Service<Uri> for TraceConnector<S>
where
    S: Service<Uri> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Error: fmt::Display + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), S::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let trace = TraceContext::current();
        let stage = self.stage;
        let https = uri.scheme_str() == Some("https");
        let addr = authority(&uri);

        if let (Some(trace), Stage::Dial) = (&trace, stage) {
            trace.mark_dialed(port(&uri));
            if is_ip_literal(&uri) {
                trace.emit(TraceEvent::ConnectStart { addr: addr.clone() });
            }
        }

        let connecting = self.inner.call(uri);
        Box::pin(async move {
            let connected = connecting.await;
            let error = connected.as_ref().err().map(ToString::to_string);
            if let Some(err) = &error {
                debug!(%addr, ?stage, error = %err, "connection stage failed");
            }

            if let Some(trace) = trace {
                report(&trace, stage, https, addr, error);
            }
            connected
        })
    }
}

fn report(trace: &TraceContext, stage: Stage, https: bool, addr: String, error: Option<String>) {
    match stage {
        Stage::Dial => {
            let dialed = error.is_none();
            trace.emit(TraceEvent::ConnectDone { addr, error });
            if https && dialed {
                trace.emit(TraceEvent::TlsHandshakeStart);
            }
        }
        // A failed dial surfaces here too; only a started handshake is reported.
        Stage::Tls if https && trace.has_fired(TraceEventKind::TlsHandshakeStart) => {
            trace.emit(TraceEvent::TlsHandshakeDone { error });
        }
        Stage::Tls => {}
    }
}

fn port(uri: &Uri) -> u16 {
    uri.port_u16()
        .unwrap_or(if uri.scheme_str() == Some("https") { 443 } else { 80 })
}

fn host(uri: &Uri) -> &str {
    uri.host()
        .unwrap_or_default()
        .trim_start_matches('[')
        .trim_end_matches(']')
}

fn is_ip_literal(uri: &Uri) -> bool {
    host(uri).parse::<IpAddr>().is_ok()
}

fn authority(uri: &Uri) -> String {
    match host(uri).parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port(uri)).to_string(),
        Err(_) => format!("{}:{}", host(uri), port(uri)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_connector() {
        let _connector = https_connector(&ClientConfig::default());
    }

    #[test]
    fn authority_defaults_port_by_scheme() {
        let plain: Uri = "http://example.com/a".parse().expect("uri");
        let secure: Uri = "https://example.com/a".parse().expect("uri");
        let explicit: Uri = "http://127.0.0.1:8080/".parse().expect("uri");

        assert_eq!(authority(&plain), "example.com:80");
        assert_eq!(authority(&secure), "example.com:443");
        assert_eq!(authority(&explicit), "127.0.0.1:8080");
    }

    #[test]
    fn detects_ip_literals() {
        let v4: Uri = "http://10.0.0.1/".parse().expect("uri");
        let v6: Uri = "http://[::1]:9000/".parse().expect("uri");
        let name: Uri = "http://localhost/".parse().expect("uri");

        assert!(is_ip_literal(&v4));
        assert!(is_ip_literal(&v6));
        assert!(!is_ip_literal(&name));
        assert_eq!(authority(&v6), "[::1]:9000");
    }
}
