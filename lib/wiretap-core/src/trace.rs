//! Request lifecycle listeners.
//!
//! A [`ClientTrace`] travels in the request extensions. Transports that know how to
//! report connection phases look it up and call it with a [`TraceEvent`] as each phase
//! happens; transports that don't simply ignore it.
//!
//! Listeners are plain synchronous calls made from whatever task drives the transport
//! work, so they must be cheap and must not block.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use derive_more::Display;

use crate::Request;

/// A point in the low-level execution of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// Host name resolution is about to start.
    DnsStart {
        /// Host being resolved.
        host: String,
    },
    /// Host name resolution finished.
    DnsDone {
        /// Resolved addresses, empty on failure.
        addrs: Vec<SocketAddr>,
        /// Resolution error, if any.
        error: Option<String>,
    },
    /// A new connection is being dialed.
    ConnectStart {
        /// Address being dialed (`ip:port`, or `host:port` before resolution).
        addr: String,
    },
    /// Dialing finished.
    ConnectDone {
        /// Address that was dialed.
        addr: String,
        /// Dial error, if any.
        error: Option<String>,
    },
    /// A connection was handed to the request.
    GotConn {
        /// The connection came from the idle pool rather than a fresh dial.
        reused: bool,
    },
    /// The response head arrived.
    GotFirstResponseByte,
    /// The TLS handshake is about to start.
    TlsHandshakeStart,
    /// The TLS handshake finished.
    TlsHandshakeDone {
        /// Handshake error, if any.
        error: Option<String>,
    },
    /// The request, body included, was fully handed to the connection.
    WroteRequest,
}

impl TraceEvent {
    /// The kind of this event.
    #[must_use]
    pub const fn kind(&self) -> TraceEventKind {
        match self {
            Self::DnsStart { .. } => TraceEventKind::DnsStart,
            Self::DnsDone { .. } => TraceEventKind::DnsDone,
            Self::ConnectStart { .. } => TraceEventKind::ConnectStart,
            Self::ConnectDone { .. } => TraceEventKind::ConnectDone,
            Self::GotConn { .. } => TraceEventKind::GotConn,
            Self::GotFirstResponseByte => TraceEventKind::GotFirstResponseByte,
            Self::TlsHandshakeStart => TraceEventKind::TlsHandshakeStart,
            Self::TlsHandshakeDone { .. } => TraceEventKind::TlsHandshakeDone,
            Self::WroteRequest => TraceEventKind::WroteRequest,
        }
    }

    /// The error carried by a completion event, if it reports one.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::DnsDone { error, .. }
            | Self::ConnectDone { error, .. }
            | Self::TlsHandshakeDone { error } => error.as_deref(),
            _ => None,
        }
    }
}

/// Event kinds, named as they appear in the `event` metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TraceEventKind {
    /// See [`TraceEvent::DnsStart`].
    #[display("DNSStart")]
    DnsStart,
    /// See [`TraceEvent::DnsDone`].
    #[display("DNSDone")]
    DnsDone,
    /// See [`TraceEvent::ConnectStart`].
    #[display("ConnectStart")]
    ConnectStart,
    /// See [`TraceEvent::ConnectDone`].
    #[display("ConnectDone")]
    ConnectDone,
    /// See [`TraceEvent::GotConn`].
    #[display("GotConn")]
    GotConn,
    /// See [`TraceEvent::GotFirstResponseByte`].
    #[display("GotFirstResponseByte")]
    GotFirstResponseByte,
    /// See [`TraceEvent::TlsHandshakeStart`].
    #[display("TLSHandshakeStart")]
    TlsHandshakeStart,
    /// See [`TraceEvent::TlsHandshakeDone`].
    #[display("TLSHandshakeDone")]
    TlsHandshakeDone,
    /// See [`TraceEvent::WroteRequest`].
    #[display("WroteRequest")]
    WroteRequest,
}

impl TraceEventKind {
    /// Label value for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DnsStart => "DNSStart",
            Self::DnsDone => "DNSDone",
            Self::ConnectStart => "ConnectStart",
            Self::ConnectDone => "ConnectDone",
            Self::GotConn => "GotConn",
            Self::GotFirstResponseByte => "GotFirstResponseByte",
            Self::TlsHandshakeStart => "TLSHandshakeStart",
            Self::TlsHandshakeDone => "TLSHandshakeDone",
            Self::WroteRequest => "WroteRequest",
        }
    }

    /// Single-bit mask for this kind, for at-most-once bookkeeping.
    #[must_use]
    pub const fn mask(self) -> u16 {
        1 << (self as u16)
    }
}

type Listener = dyn Fn(&TraceEvent) + Send + Sync;

/// A set of lifecycle listeners attached to a request.
///
/// # Example
///
/// ```
/// use wiretap_core::{ClientTrace, Method, Request, TraceEvent};
/// use bytes::Bytes;
///
/// let mut request = Request::<Bytes>::builder(Method::Get, "http://localhost/".parse().unwrap())
///     .build();
///
/// ClientTrace::new(|event: &TraceEvent| {
///     let _ = event.kind();
/// })
/// .install(&mut request);
///
/// assert!(request.extensions().get::<ClientTrace>().is_some());
/// ```
#[derive(Clone)]
pub struct ClientTrace {
    listeners: Vec<Arc<Listener>>,
}

impl ClientTrace {
    /// Create a trace with a single listener.
    pub fn new<F>(listener: F) -> Self
    where
        F: Fn(&TraceEvent) + Send + Sync + 'static,
    {
        Self {
            listeners: vec![Arc::new(listener)],
        }
    }

    /// Combine two traces: `self`'s listeners run first, then `other`'s.
    #[must_use]
    pub fn then(mut self, other: Self) -> Self {
        self.listeners.extend(other.listeners);
        self
    }

    /// Attach this trace to a request, composing with any trace already there.
    pub fn install<B>(self, request: &mut Request<B>) {
        let extensions = request.extensions_mut();
        let trace = match extensions.remove::<Self>() {
            Some(existing) => self.then(existing),
            None => self,
        };
        extensions.insert(trace);
    }

    /// Deliver an event to every listener.
    pub fn emit(&self, event: &TraceEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }
}

impl fmt::Debug for ClientTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientTrace")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
