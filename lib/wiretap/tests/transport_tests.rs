//! Lifecycle events reported by the hyper transport, against wiremock servers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};
use wiretap::{
    ClientTrace, HttpClient, HyperClient, Method, Request, TraceEvent, TraceEventKind,
};

type Recorded = Arc<Mutex<Vec<TraceEvent>>>;

fn traced_request(url: &str) -> (Request, Recorded) {
    let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&recorded);

    let mut request = Request::builder(Method::Get, url::Url::parse(url).expect("url")).build();
    ClientTrace::new(move |event| sink.lock().expect("lock").push(event.clone())).install(&mut request);

    (request, recorded)
}

fn kinds(recorded: &Recorded) -> Vec<TraceEventKind> {
    recorded
        .lock()
        .expect("lock")
        .iter()
        .map(TraceEvent::kind)
        .collect()
}

fn position(kinds: &[TraceEventKind], kind: TraceEventKind) -> usize {
    kinds
        .iter()
        .position(|k| *k == kind)
        .unwrap_or_else(|| panic!("{kind} not reported in {kinds:?}"))
}

/// `GotConn`, then `WroteRequest`, then `GotFirstResponseByte` as the last event.
fn assert_exchange_order(kinds: &[TraceEventKind]) {
    let got_conn = position(kinds, TraceEventKind::GotConn);
    let wrote = position(kinds, TraceEventKind::WroteRequest);
    let first_byte = position(kinds, TraceEventKind::GotFirstResponseByte);

    assert!(got_conn < wrote, "GotConn after WroteRequest in {kinds:?}");
    assert!(wrote < first_byte, "WroteRequest after GotFirstResponseByte in {kinds:?}");
    assert_eq!(first_byte, kinds.len() - 1, "{kinds:?}");
}

async fn hello_server() -> MockServer {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/hello"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&mock_server)
        .await;

    mock_server
}

#[tokio::test]
async fn test_ip_literal_reports_connection_events() {
    let mock_server = hello_server().await;
    let client = HyperClient::new();

    let (request, recorded) = traced_request(&format!("{}/hello", mock_server.uri()));
    let response = client.execute(request).await.expect("response");
    assert_eq!(response.status(), 200);

    let kinds = kinds(&recorded);
    for expected in [
        TraceEventKind::ConnectStart,
        TraceEventKind::ConnectDone,
        TraceEventKind::GotConn,
        TraceEventKind::WroteRequest,
        TraceEventKind::GotFirstResponseByte,
    ] {
        assert_eq!(
            kinds.iter().filter(|k| **k == expected).count(),
            1,
            "{expected} in {kinds:?}"
        );
    }
    for absent in [
        TraceEventKind::DnsStart,
        TraceEventKind::DnsDone,
        TraceEventKind::TlsHandshakeStart,
        TraceEventKind::TlsHandshakeDone,
    ] {
        assert!(!kinds.contains(&absent), "{absent} in {kinds:?}");
    }

    assert!(position(&kinds, TraceEventKind::ConnectStart) < position(&kinds, TraceEventKind::ConnectDone));
    assert!(position(&kinds, TraceEventKind::ConnectDone) < position(&kinds, TraceEventKind::GotConn));
    assert_exchange_order(&kinds);

    let events = recorded.lock().expect("lock").clone();
    let address = mock_server.address().to_string();
    assert!(events.contains(&TraceEvent::ConnectStart {
        addr: address.clone()
    }));
    assert!(events.contains(&TraceEvent::ConnectDone {
        addr: address,
        error: None,
    }));
    assert!(events.contains(&TraceEvent::GotConn { reused: false }));
}

#[tokio::test]
async fn test_pooled_connection_is_reported_as_reused() {
    let mock_server = hello_server().await;
    let client = HyperClient::new();
    let url = format!("{}/hello", mock_server.uri());

    let (first, _) = traced_request(&url);
    client.execute(first).await.expect("response");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let (second, recorded) = traced_request(&url);
    client.execute(second).await.expect("response");

    let events = recorded.lock().expect("lock").clone();
    assert!(events.contains(&TraceEvent::GotConn { reused: true }), "{events:?}");

    let kinds = kinds(&recorded);
    assert!(!kinds.contains(&TraceEventKind::ConnectStart));
    assert_exchange_order(&kinds);
}

#[tokio::test]
async fn test_request_body_is_written_after_connection() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&mock_server)
        .await;

    let client = HyperClient::new();
    let url = format!("{}/ingest", mock_server.uri());

    for _ in 0..2 {
        let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&recorded);
        let mut request = Request::builder(Method::Post, url::Url::parse(&url).expect("url"))
            .body(bytes::Bytes::from_static(b"sample=1"))
            .build();
        ClientTrace::new(move |event| sink.lock().expect("lock").push(event.clone())).install(&mut request);

        let response = client.execute(request).await.expect("response");
        assert_eq!(response.status(), 202);
        assert_exchange_order(&kinds(&recorded));

        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn test_host_name_reports_dns_events() {
    let mock_server = hello_server().await;
    let client = HyperClient::new();
    let port = mock_server.address().port();

    let (request, recorded) = traced_request(&format!("http://localhost:{port}/hello"));
    let response = client.execute(request).await.expect("response");
    assert_eq!(response.status(), 200);

    let kinds = kinds(&recorded);
    assert_eq!(kinds.first(), Some(&TraceEventKind::DnsStart));
    assert!(position(&kinds, TraceEventKind::DnsDone) < position(&kinds, TraceEventKind::ConnectStart));

    let events = recorded.lock().expect("lock").clone();
    assert!(events.contains(&TraceEvent::DnsStart {
        host: "localhost".to_string()
    }));
    assert!(events.iter().any(|event| matches!(
        event,
        TraceEvent::DnsDone { addrs, error: None } if !addrs.is_empty()
    )));
}

#[tokio::test]
async fn test_refused_connection_reports_failed_dial() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    };
    let client = HyperClient::new();

    let (request, recorded) = traced_request(&format!("http://127.0.0.1:{port}/"));
    let result = client.execute(request).await;
    assert!(result.is_err());

    let events = recorded.lock().expect("lock").clone();
    assert!(events.iter().any(|event| matches!(
        event,
        TraceEvent::ConnectDone { error: Some(_), .. }
    )));
    assert!(!kinds(&recorded).contains(&TraceEventKind::GotFirstResponseByte));
}

#[tokio::test]
async fn test_tls_against_plaintext_reports_failed_handshake() {
    let mock_server = hello_server().await;
    let client = HyperClient::builder().timeout(Duration::from_secs(5)).build();
    let address = mock_server.address();

    let (request, recorded) = traced_request(&format!("https://{address}/hello"));
    let result = client.execute(request).await;
    assert!(result.is_err());

    let kinds = kinds(&recorded);
    assert!(position(&kinds, TraceEventKind::ConnectDone) < position(&kinds, TraceEventKind::TlsHandshakeStart));
    let events = recorded.lock().expect("lock").clone();
    assert!(events.iter().any(|event| matches!(
        event,
        TraceEvent::TlsHandshakeDone { error: Some(_) }
    )));
}

#[tokio::test]
async fn test_untraced_request_is_unaffected() {
    let mock_server = hello_server().await;
    let client = HyperClient::new();

    let url = url::Url::parse(&format!("{}/hello", mock_server.uri())).expect("url");
    let response = client
        .execute(Request::builder(Method::Get, url).build())
        .await
        .expect("response");

    assert_eq!(response.text().expect("utf-8"), "hello");
}
