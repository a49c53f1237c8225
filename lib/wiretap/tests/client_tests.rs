//! Integration tests for `HyperClient` using wiremock.

use std::time::Duration;

use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string, header, method, path, query_param},
};
use wiretap::{HttpClient, HttpClientExt, HyperClient, Method, Request};

#[tokio::test]
async fn test_get_with_headers_and_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "latency"))
        .and(header("X-Client", "wiretap"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Request-Id", "abc123")
                .set_body_string("3 hits"),
        )
        .mount(&mock_server)
        .await;

    let client = HyperClient::new();
    let url = url::Url::parse(&format!("{}/search", mock_server.uri())).expect("url");
    let request = Request::builder(Method::Get, url)
        .query("q", "latency")
        .header("X-Client", "wiretap")
        .build();

    let response = client.execute(request).await.expect("response");

    assert!(response.is_success());
    assert_eq!(response.header("x-request-id"), Some("abc123"));
    assert_eq!(response.text().expect("utf-8"), "3 hits");
}

#[tokio::test]
async fn test_post_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/probes"))
        .and(body_string("target=db-1"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&mock_server)
        .await;

    let client = HyperClient::new();
    let url = url::Url::parse(&format!("{}/probes", mock_server.uri())).expect("url");
    let request = Request::builder(Method::Post, url)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(bytes::Bytes::from_static(b"target=db-1"))
        .build();

    let response = client.execute(request).await.expect("response");

    assert_eq!(response.status(), 201);
    assert_eq!(response.status_class(), "2xx");
}

#[tokio::test]
async fn test_http_error_status_is_a_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/probes/1"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let client = HyperClient::new();
    let url = url::Url::parse(&format!("{}/probes/1", mock_server.uri())).expect("url");
    let response = client
        .execute(Request::builder(Method::Delete, url).build())
        .await
        .expect("response");

    assert!(response.is_server_error());
    assert_eq!(response.status_class(), "5xx");
}

#[tokio::test]
async fn test_timeout() {
    let mock_server = MockServer::start().await;

    // Delay longer than client timeout
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let client = HyperClient::builder()
        .timeout(Duration::from_millis(100))
        .build();

    let err = client
        .get(&format!("{}/slow", mock_server.uri()))
        .await
        .expect_err("expected timeout error");
    assert!(err.is_timeout(), "Expected timeout error, got: {err}");
}

#[tokio::test]
async fn test_connection_error() {
    let client = HyperClient::builder()
        .connect_timeout(Duration::from_secs(1))
        .build();

    let err = client
        .get("http://127.0.0.1:1")
        .await
        .expect_err("expected connection error");
    assert!(err.is_connection(), "Expected connection error, got: {err}");
}
