use morphfeed_core::models::{Recipe, RecipeSpec};
use morphfeed_core::{CorrelationId, FailureKind};
use morphfeed_generation::{Generator, InvocationClient, InvocationError, InvocationRequest, RetryPolicy};
use std::time::Duration;
use uuid::Uuid;

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(1),
        cap_delay: Duration::from_millis(5),
        jitter_ratio: 0.1,
    }
}

fn client_for(server: &mockito::Server) -> InvocationClient {
    InvocationClient::new(format!("{}/generate", server.url()))
        .unwrap()
        .with_api_token("test-token")
        .with_timeout(Duration::from_secs(5))
        .with_retry_policy(fast_policy())
}

fn request() -> InvocationRequest {
    let recipe = Recipe::style("anime", RecipeSpec::new("anime illustration", 0.7));
    InvocationRequest::for_recipe(
        "https://cdn.example.com/uploads/source.png",
        &recipe,
        CorrelationId::new(Uuid::new_v4()),
    )
}

#[tokio::test]
async fn test_success_returns_output_url() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/generate")
        .match_header("authorization", "Bearer test-token")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "image_url": "https://cdn.example.com/uploads/source.png",
            "prompt": "anime illustration",
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"output_url": "https://cdn.example.com/out/anime.png"}"#)
        .expect(1)
        .create_async()
        .await;

    let success = client_for(&server).invoke(&request()).await.unwrap();
    assert_eq!(success.output_url, "https://cdn.example.com/out/anime.png");
    assert_eq!(success.attempts, 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_errors_make_four_attempts() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/generate")
        .with_status(503)
        .with_body("upstream unavailable")
        .expect(4)
        .create_async()
        .await;

    let err = client_for(&server).invoke(&request()).await.unwrap_err();
    match err {
        InvocationError::RetriesExhausted {
            last_kind,
            attempts,
            ..
        } => {
            assert_eq!(last_kind, FailureKind::Server);
            assert_eq!(attempts, 4);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unauthorized_is_never_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/generate")
        .with_status(401)
        .with_body("invalid token")
        .expect(1)
        .create_async()
        .await;

    let err = client_for(&server).invoke(&request()).await.unwrap_err();
    assert!(matches!(err, InvocationError::Auth { status: 401, .. }));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_other_client_errors_are_protocol_errors() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/generate")
        .with_status(403)
        .expect(1)
        .create_async()
        .await;

    let err = client_for(&server).invoke(&request()).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Protocol);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_client_error_after_server_errors_keeps_attempt_count() {
    let mut server = mockito::Server::new_async().await;
    // The 503 mock answers until its two hits are used up
    let unavailable = server
        .mock("POST", "/generate")
        .with_status(503)
        .expect(2)
        .create_async()
        .await;
    let rejected = server
        .mock("POST", "/generate")
        .with_status(400)
        .with_body("prompt rejected")
        .expect(1)
        .create_async()
        .await;

    let err = client_for(&server).invoke(&request()).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Protocol);
    assert_eq!(err.attempts(), 3);
    assert!(err.to_string().contains("prompt rejected"));
    unavailable.assert_async().await;
    rejected.assert_async().await;
}

#[tokio::test]
async fn test_rate_limit_then_success() {
    let mut server = mockito::Server::new_async().await;
    let limited = server
        .mock("POST", "/generate")
        .with_status(429)
        .expect(1)
        .create_async()
        .await;
    let ok = server
        .mock("POST", "/generate")
        .with_status(200)
        .with_body(r#"{"output": ["https://cdn.example.com/out/late.png"]}"#)
        .expect(1)
        .create_async()
        .await;

    let success = client_for(&server).invoke(&request()).await.unwrap();
    assert_eq!(success.output_url, "https://cdn.example.com/out/late.png");
    assert_eq!(success.attempts, 2);
    limited.assert_async().await;
    ok.assert_async().await;
}

#[tokio::test]
async fn test_missing_output_url_is_protocol_error() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/generate")
        .with_status(200)
        .with_body(r#"{"status": "succeeded"}"#)
        .expect(1)
        .create_async()
        .await;

    let err = client_for(&server).invoke(&request()).await.unwrap_err();
    assert!(matches!(err, InvocationError::Protocol { .. }));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_invalid_request_never_reaches_the_network() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/generate")
        .expect(0)
        .create_async()
        .await;

    let mut bad = request();
    bad.strength = 3.0;
    let err = client_for(&server).invoke(&bad).await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Validation);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_deadline_aborts_hanging_request() {
    // Accept connections but never answer
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let client = InvocationClient::new(format!("http://{}/generate", addr))
        .unwrap()
        .with_timeout(Duration::from_millis(100))
        .with_retry_policy(RetryPolicy {
            max_retries: 1,
            ..fast_policy()
        });

    let started = std::time::Instant::now();
    let err = client.invoke(&request()).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(5));
    match err {
        InvocationError::RetriesExhausted {
            last_kind,
            attempts,
            ..
        } => {
            assert_eq!(last_kind, FailureKind::Timeout);
            assert_eq!(attempts, 2);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_output_downloads_bytes() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/out/anime.png")
        .with_status(200)
        .with_body(vec![1u8, 2, 3, 4])
        .create_async()
        .await;

    let client = client_for(&server);
    let data = client
        .fetch_output(
            &format!("{}/out/anime.png", server.url()),
            CorrelationId::new(Uuid::new_v4()),
        )
        .await
        .unwrap();
    assert_eq!(data.as_ref(), &[1u8, 2, 3, 4]);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_fetch_output_missing_object_is_an_error() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/out/gone.png")
        .with_status(404)
        .with_body("not found")
        .expect(1)
        .create_async()
        .await;

    let err = client_for(&server)
        .fetch_output(
            &format!("{}/out/gone.png", server.url()),
            CorrelationId::new(Uuid::new_v4()),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        InvocationError::Protocol {
            status: Some(404),
            ..
        }
    ));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_fetch_output_retries_server_errors() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/out/busy.png")
        .with_status(503)
        .with_body("<html>busy</html>")
        .expect(4)
        .create_async()
        .await;

    let err = client_for(&server)
        .fetch_output(
            &format!("{}/out/busy.png", server.url()),
            CorrelationId::new(Uuid::new_v4()),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Server);
    assert_eq!(err.attempts(), 4);
    mock.assert_async().await;
}
