//! Delivery of lifecycle events inside the hyper transport.
//!
//! The [`ClientTrace`] found on a request is wrapped in a [`TraceContext`] and scoped
//! to the request future with a task-local. The resolver and connectors, which hyper
//! drives without any reference to the request, look the context up from there.
//! Each event kind reaches the listeners at most once per request, and
//! `WroteRequest` is held back until `GotConn` has been reported.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use http_body_util::Full;
use wiretap_core::{ClientTrace, TraceEvent, TraceEventKind};

tokio::task_local! {
    static ACTIVE: Arc<TraceContext>;
}

/// Per-request trace state.
#[derive(Debug)]
pub(crate) struct TraceContext {
    trace: ClientTrace,
    fired: AtomicU16,
    written: AtomicBool,
    dialed: AtomicBool,
    dial_port: AtomicU16,
}

impl TraceContext {
    pub(crate) fn new(trace: ClientTrace) -> Arc<Self> {
        Arc::new(Self {
            trace,
            fired: AtomicU16::new(0),
            written: AtomicBool::new(false),
            dialed: AtomicBool::new(false),
            dial_port: AtomicU16::new(0),
        })
    }

    /// Context of the request driving the current task, if it is traced.
    pub(crate) fn current() -> Option<Arc<Self>> {
        ACTIVE.try_with(Arc::clone).ok()
    }

    /// Run `fut` with this context visible to [`TraceContext::current`].
    pub(crate) async fn scope<F: Future>(self: Arc<Self>, fut: F) -> F::Output {
        ACTIVE.scope(self, fut).await
    }

    pub(crate) fn emit(&self, event: TraceEvent) {
        let mask = event.kind().mask();
        if self.fired.fetch_or(mask, Ordering::SeqCst) & mask == 0 {
            self.trace.emit(&event);
        }
    }

    pub(crate) fn has_fired(&self, kind: TraceEventKind) -> bool {
        self.fired.load(Ordering::SeqCst) & kind.mask() != 0
    }

    /// The request body has been handed over in full.
    ///
    /// hyper may finish with the body before the connection is reported, so
    /// `WroteRequest` waits for `GotConn`.
    pub(crate) fn wrote_request(&self) {
        self.written.store(true, Ordering::SeqCst);
        if self.has_fired(TraceEventKind::GotConn) {
            self.release_written();
        }
    }

    /// Report a `WroteRequest` held by [`TraceContext::wrote_request`], if any.
    pub(crate) fn release_written(&self) {
        if self.written.swap(false, Ordering::SeqCst) {
            self.emit(TraceEvent::WroteRequest);
        }
    }

    pub(crate) fn mark_dialed(&self, port: u16) {
        self.dial_port.store(port, Ordering::Release);
        self.dialed.store(true, Ordering::Release);
    }

    pub(crate) fn dialed(&self) -> bool {
        self.dialed.load(Ordering::Acquire)
    }

    pub(crate) fn dial_port(&self) -> u16 {
        self.dial_port.load(Ordering::Acquire)
    }
}

/// Request body reporting [`TraceEvent::WroteRequest`] once it reaches end of stream.
#[derive(Debug)]
pub(crate) struct TracedBody {
    inner: Full<Bytes>,
    trace: Option<Arc<TraceContext>>,
}

impl TracedBody {
    pub(crate) fn new(inner: Full<Bytes>, trace: Option<Arc<TraceContext>>) -> Self {
        Self { inner, trace }
    }

    fn wrote(&self) {
        if let Some(trace) = &self.trace {
            trace.wrote_request();
        }
    }
}

impl Body for TracedBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        if matches!(polled, Poll::Ready(None)) || this.inner.is_end_stream() {
            this.wrote();
        }
        polled
    }

    // hyper asks before writing the head; an empty body is complete at that point.
    fn is_end_stream(&self) -> bool {
        let end = self.inner.is_end_stream();
        if end {
            self.wrote();
        }
        end
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use http_body_util::BodyExt;

    use super::*;

    fn recorded() -> (ClientTrace, Arc<Mutex<Vec<TraceEventKind>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let trace = ClientTrace::new(move |event| sink.lock().expect("lock").push(event.kind()));
        (trace, seen)
    }

    #[test]
    fn emit_is_at_most_once_per_kind() {
        let (trace, seen) = recorded();
        let ctx = TraceContext::new(trace);

        ctx.emit(TraceEvent::DnsStart {
            host: "example.com".to_string(),
        });
        ctx.emit(TraceEvent::DnsStart {
            host: "example.com".to_string(),
        });
        ctx.emit(TraceEvent::GotFirstResponseByte);

        assert_eq!(
            *seen.lock().expect("lock"),
            vec![TraceEventKind::DnsStart, TraceEventKind::GotFirstResponseByte]
        );
        assert!(ctx.has_fired(TraceEventKind::DnsStart));
        assert!(!ctx.has_fired(TraceEventKind::DnsDone));
    }

    #[tokio::test]
    async fn current_is_scoped_to_the_request() {
        let (trace, _) = recorded();
        let ctx = TraceContext::new(trace);

        assert!(TraceContext::current().is_none());
        let inside = Arc::clone(&ctx)
            .scope(async { TraceContext::current().is_some() })
            .await;
        assert!(inside);
        assert!(TraceContext::current().is_none());
    }

    #[tokio::test]
    async fn body_reports_wrote_request_after_last_frame() {
        let (trace, seen) = recorded();
        let ctx = TraceContext::new(trace);
        ctx.emit(TraceEvent::GotConn { reused: false });

        let body = TracedBody::new(Full::new(Bytes::from_static(b"payload")), Some(ctx));
        assert!(!body.is_end_stream());
        assert_eq!(*seen.lock().expect("lock"), vec![TraceEventKind::GotConn]);

        let collected = body.collect().await.expect("infallible").to_bytes();
        assert_eq!(collected.as_ref(), b"payload");
        assert_eq!(
            *seen.lock().expect("lock"),
            vec![TraceEventKind::GotConn, TraceEventKind::WroteRequest]
        );
    }

    #[test]
    fn empty_body_waits_for_got_conn() {
        let (trace, seen) = recorded();
        let ctx = TraceContext::new(trace);
        let body = TracedBody::new(Full::default(), Some(Arc::clone(&ctx)));

        assert!(body.is_end_stream());
        assert!(seen.lock().expect("lock").is_empty());

        ctx.emit(TraceEvent::GotConn { reused: true });
        ctx.release_written();
        assert!(body.is_end_stream());
        ctx.release_written();

        assert_eq!(
            *seen.lock().expect("lock"),
            vec![TraceEventKind::GotConn, TraceEventKind::WroteRequest]
        );
    }

    #[test]
    fn nothing_is_released_before_the_body_is_written() {
        let (trace, seen) = recorded();
        let ctx = TraceContext::new(trace);

        ctx.emit(TraceEvent::GotConn { reused: false });
        ctx.release_written();

        assert_eq!(*seen.lock().expect("lock"), vec![TraceEventKind::GotConn]);
    }
}
