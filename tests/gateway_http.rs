//! `HttpGateway` against a one-shot local HTTP server.
//!
//! Each test binds a listener on 127.0.0.1, serves exactly one canned
//! response, and hands back the raw request so headers and body can be
//! checked.

use examquiz::{
    HttpGateway, ModelDescriptor, ModelGateway, ModelInvocationError, ModelPayload, ModelRole,
    PipelineConfig,
};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

// ── Test helpers ─────────────────────────────────────────────────────────────

async fn serve_once(status: u16, body: &'static str, delay: Duration) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/api/v1/chat/completions", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        tokio::time::sleep(delay).await;
        let response = format!(
            "HTTP/1.1 {status} Status\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        // The client may have hung up already when testing timeouts.
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
        request
    });
    (url, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

fn gateway(url: &str, timeout_secs: u64) -> HttpGateway {
    let config = PipelineConfig::builder()
        .endpoint(url)
        .api_key("test-key")
        .api_timeout_secs(timeout_secs)
        .build()
        .unwrap();
    HttpGateway::from_config(&config).unwrap()
}

fn formatting_call() -> (ModelDescriptor, ModelPayload) {
    (
        ModelDescriptor::new("openai/gpt-4o-mini", ModelRole::Formatting),
        ModelPayload::Text {
            prompt: "Format these notes".into(),
        },
    )
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn success_returns_first_choice_and_sends_bearer_key() {
    let (url, server) = serve_once(
        200,
        r#"{"choices":[{"message":{"role":"assistant","content":"Q.1 What is 2 + 2?"}}]}"#,
        Duration::ZERO,
    )
    .await;
    let (model, payload) = formatting_call();

    let text = gateway(&url, 5).invoke(&model, &payload).await.unwrap();
    assert_eq!(text, "Q.1 What is 2 + 2?");

    let request = server.await.unwrap();
    let lower = request.to_ascii_lowercase();
    assert!(lower.starts_with("post /api/v1/chat/completions"), "{request}");
    assert!(lower.contains("authorization: bearer test-key"), "{request}");
    assert!(request.contains(r#""model":"openai/gpt-4o-mini""#), "{request}");
    assert!(request.contains(r#""content":"Format these notes""#), "{request}");
}

#[tokio::test]
async fn error_status_keeps_code_and_body() {
    let (url, _server) = serve_once(429, r#"{"error":"rate limited"}"#, Duration::ZERO).await;
    let (model, payload) = formatting_call();

    let err = gateway(&url, 5).invoke(&model, &payload).await.unwrap_err();
    match err {
        ModelInvocationError::HttpStatus { model, status, body } => {
            assert_eq!(model, "openai/gpt-4o-mini");
            assert_eq!(status, 429);
            assert!(body.contains("rate limited"));
        }
        other => panic!("expected HttpStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_endpoint_times_out() {
    let (url, _server) = serve_once(200, r#"{"choices":[]}"#, Duration::from_secs(3)).await;
    let (model, payload) = formatting_call();

    let err = gateway(&url, 1).invoke(&model, &payload).await.unwrap_err();
    assert!(
        matches!(err, ModelInvocationError::Timeout { secs: 1, .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let (url, _server) = serve_once(200, "<html>gateway</html>", Duration::ZERO).await;
    let (model, payload) = formatting_call();

    let err = gateway(&url, 5).invoke(&model, &payload).await.unwrap_err();
    assert!(matches!(err, ModelInvocationError::Malformed { .. }), "got {err:?}");
}

#[tokio::test]
async fn unreachable_endpoint_is_transport_error() {
    // Bind then drop to get a port with nothing listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/v1/chat/completions", listener.local_addr().unwrap());
    drop(listener);
    let (model, payload) = formatting_call();

    let err = gateway(&url, 5).invoke(&model, &payload).await.unwrap_err();
    assert!(matches!(err, ModelInvocationError::Transport { .. }), "got {err:?}");
}
