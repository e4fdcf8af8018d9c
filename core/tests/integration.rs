//! End-to-end tests of `RequestExecutor` over real HTTP.
//!
//! # Design
//! Starts the mock server on a random port and drives it through
//! `ReqwestTransport`, checking message extraction, activity bookkeeping and
//! notifications against actual status lines and bodies.

use std::net::SocketAddr;
use std::time::Duration;

use fetch_core::{
    Credentials, ErrorBoundary, FetchConfig, FetchErrorKind, FetchEvent, HttpMethod,
    RequestExecutor, RequestOptions,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::broadcast::{error::TryRecvError, Receiver};

async fn start_server() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(mock_server::run(listener));
    addr
}

/// Serve one connection with a hand-written status line and no body.
async fn start_raw_server(status_line: &'static str) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            request.extend_from_slice(&buf[..n]);
        }
        let reply = format!("{status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
        socket.write_all(reply.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
    });
    addr
}

fn executor() -> RequestExecutor<fetch_core::ReqwestTransport> {
    RequestExecutor::from_config(&FetchConfig::default()).unwrap()
}

fn drain(rx: &mut Receiver<FetchEvent>) -> Vec<FetchEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Empty) => return events,
            Err(other) => panic!("unexpected receive error: {other:?}"),
        }
    }
}

#[tokio::test]
async fn document_lifecycle() {
    let addr = start_server().await;
    let exec = executor();
    let mut rx = exec.events().subscribe();
    let base = format!("http://{addr}");

    let stored = exec
        .execute(
            format!("{base}/docs/walk"),
            RequestOptions::new()
                .method(HttpMethod::Put)
                .json(&serde_json::json!({"title": "Walk dog"}))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(stored["title"], "Walk dog");

    let url = reqwest::Url::parse(&format!("{base}/docs/walk")).unwrap();
    let fetched = exec.execute(&url, RequestOptions::new()).await.unwrap();
    assert_eq!(fetched, stored);

    let keys: Vec<String> = exec
        .execute_as(format!("{base}/docs"), RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(keys, vec!["walk".to_string()]);

    assert_eq!(exec.tracker().in_flight(), 0);
    assert_eq!(
        drain(&mut rx),
        vec![
            FetchEvent::ActivityStarted,
            FetchEvent::ActivityEnded,
            FetchEvent::ActivityStarted,
            FetchEvent::ActivityEnded,
            FetchEvent::ActivityStarted,
            FetchEvent::ActivityEnded,
        ]
    );
}

#[tokio::test]
async fn not_found_message_comes_from_body() {
    let addr = start_server().await;
    let exec = executor();
    let mut rx = exec.events().subscribe();

    let err = exec
        .execute(format!("http://{addr}/docs/missing"), RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FetchErrorKind::Http { status: 404 });
    assert_eq!(err.message(), "Error 404: document missing not found");
    assert_eq!(err.response().unwrap().status_text, "Not Found");
    assert_eq!(
        drain(&mut rx),
        vec![
            FetchEvent::ActivityStarted,
            FetchEvent::ActivityEnded,
            FetchEvent::FetchError("Error 404: document missing not found".to_string()),
        ]
    );
}

#[tokio::test]
async fn server_error_without_body_uses_reason_phrase() {
    let addr = start_server().await;
    let err = executor()
        .execute(format!("http://{addr}/status/500"), RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.message(), "Error 500: Internal Server Error");
    assert!(err.body().is_none());
}

#[tokio::test]
async fn custom_reason_phrase_is_used_as_status_text() {
    let addr = start_raw_server("HTTP/1.1 500 Database Down").await;
    let err = executor()
        .execute(format!("http://{addr}/"), RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.message(), "Error 500: Database Down");
    assert_eq!(err.response().unwrap().status_text, "Database Down");
}

#[tokio::test]
async fn nonstandard_code_keeps_its_reason_phrase() {
    let addr = start_raw_server("HTTP/1.1 599 Upstream Gone").await;
    let err = executor()
        .execute(format!("http://{addr}/"), RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.message(), "Error 599: Upstream Gone");
}

#[tokio::test]
async fn nested_error_message_is_extracted() {
    let addr = start_server().await;
    let err = executor()
        .execute(
            format!("http://{addr}/nested-error/409?message=already%20exists"),
            RequestOptions::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.message(), "Error 409: already exists");
}

#[tokio::test]
async fn plain_text_success_is_a_body_parse_error() {
    let addr = start_server().await;
    let exec = executor();
    let err = exec
        .execute(format!("http://{addr}/not-json"), RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FetchErrorKind::BodyParse);
    assert_eq!(err.status(), Some(200));
    assert_eq!(exec.tracker().in_flight(), 0);
}

#[tokio::test]
async fn refused_connection_is_a_network_error() {
    // Bind then drop to get a port nothing listens on.
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let exec = executor();
    let mut rx = exec.events().subscribe();

    let err = exec
        .execute(format!("http://{addr}/docs"), RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FetchErrorKind::Network);
    assert_eq!(err.message(), "Network error has occurred.");
    assert!(err.response().is_none());
    assert!(err.body().is_none());
    assert_eq!(exec.tracker().in_flight(), 0);
    assert_eq!(
        drain(&mut rx).last(),
        Some(&FetchEvent::FetchError("Network error has occurred.".to_string()))
    );
}

#[tokio::test]
async fn request_timeout_is_a_network_error() {
    let addr = start_server().await;
    let err = executor()
        .execute(
            format!("http://{addr}/slow/2000"),
            RequestOptions::new().timeout(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FetchErrorKind::Network);
}

#[tokio::test]
async fn credentials_and_headers_reach_the_server() {
    let addr = start_server().await;
    let echoed = executor()
        .execute(
            format!("http://{addr}/echo"),
            RequestOptions::new()
                .method(HttpMethod::Post)
                .credentials(Credentials::Bearer("secret-token".to_string()))
                .json(&serde_json::json!({"a": 1}))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(echoed["method"], "POST");
    assert_eq!(echoed["authorization"], "Bearer secret-token");
    assert_eq!(echoed["content_type"], "application/json");
    assert_eq!(echoed["body"], r#"{"a":1}"#);
}

#[tokio::test]
async fn concurrent_requests_share_one_activity_cycle() {
    let addr = start_server().await;
    let exec = executor();
    let mut rx = exec.events().subscribe();

    let (a, b) = tokio::join!(
        exec.execute(format!("http://{addr}/slow/100"), RequestOptions::new()),
        exec.execute(format!("http://{addr}/slow/10"), RequestOptions::new()),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(
        drain(&mut rx),
        vec![FetchEvent::ActivityStarted, FetchEvent::ActivityEnded]
    );
}

#[tokio::test]
async fn unhandled_failure_reaches_the_boundary() {
    let addr = start_server().await;
    let exec = executor();
    let alerts = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = std::sync::Arc::clone(&alerts);
    let boundary = ErrorBoundary::new(exec.events().clone(), move |message| {
        sink.lock().unwrap().push(message.to_string());
    });
    let mut rx = exec.events().subscribe();

    let result = boundary
        .run(exec.execute(format!("http://{addr}/status/503"), RequestOptions::new()))
        .await;

    assert!(result.is_none());
    assert_eq!(
        *alerts.lock().unwrap(),
        vec!["Error 503: Service Unavailable".to_string()]
    );
    assert_eq!(
        drain(&mut rx),
        vec![
            FetchEvent::ActivityStarted,
            FetchEvent::ActivityEnded,
            FetchEvent::FetchError("Error 503: Service Unavailable".to_string()),
            FetchEvent::Unhandled("Error 503: Service Unavailable".to_string()),
        ]
    );
}
