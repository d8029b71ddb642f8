//! Status-code mapping of the OpenAI-compatible client against a local stub.

#![cfg(feature = "openai")]

use axum::{Json, Router, http::StatusCode, routing::post};
use plenodoc_model::openai::{OpenAICompatibleClient, OpenAIConfig};
use plenodoc_model::{ChatModel, ConversationTurn, ModelError};
use serde_json::{Value, json};

async fn spawn_stub(status: StatusCode, body: Value) -> (String, tokio::task::JoinHandle<()>) {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move |Json(request): Json<Value>| {
            let body = body.clone();
            async move {
                let has_choice =
                    body["choices"].as_array().is_some_and(|choices| !choices.is_empty());
                if status.is_success() && has_choice {
                    // Echo the message count so the test can check request shaping.
                    let count = request["messages"].as_array().map(Vec::len).unwrap_or_default();
                    let mut body = body;
                    body["choices"][0]["message"]["content"] =
                        json!(format!("messages={count}"));
                    (status, Json(body))
                } else {
                    (status, Json(body))
                }
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind stub listener");
    let addr = listener.local_addr().expect("listener addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server");
    });
    (format!("http://{addr}/v1"), handle)
}

fn client(base_url: &str) -> OpenAICompatibleClient {
    OpenAICompatibleClient::new(
        OpenAIConfig::compatible("test-key", base_url, "stub-model").with_provider_name("Stub"),
    )
    .expect("client")
}

#[tokio::test]
async fn success_returns_first_choice_content() {
    let (base, handle) = spawn_stub(
        StatusCode::OK,
        json!({ "choices": [ { "message": { "role": "assistant", "content": "" } } ] }),
    )
    .await;

    let history = vec![ConversationTurn::user("hi"), ConversationTurn::assistant("hello")];
    let reply = client(&base).complete("system", &history, "question").await.expect("reply");
    // system + two history turns + user message
    assert_eq!(reply, "messages=4");

    handle.abort();
}

#[tokio::test]
async fn unauthorized_is_distinguishable() {
    let (base, handle) =
        spawn_stub(StatusCode::UNAUTHORIZED, json!({ "error": { "message": "Invalid API key" } }))
            .await;

    let err = client(&base).complete("system", &[], "question").await.unwrap_err();
    match err {
        ModelError::Unauthorized { provider, message } => {
            assert_eq!(provider, "Stub");
            assert_eq!(message, "Invalid API key");
        }
        other => panic!("expected Unauthorized, got {other:?}"),
    }

    handle.abort();
}

#[tokio::test]
async fn rate_limit_is_distinguishable() {
    let (base, handle) =
        spawn_stub(StatusCode::TOO_MANY_REQUESTS, json!({ "error": { "message": "slow down" } }))
            .await;

    let err = client(&base).complete("system", &[], "question").await.unwrap_err();
    assert!(matches!(err, ModelError::RateLimited { .. }));
    assert!(err.is_transient());

    handle.abort();
}

#[tokio::test]
async fn empty_choices_is_invalid_response() {
    let (base, handle) = spawn_stub(StatusCode::OK, json!({ "choices": [] })).await;

    let err = client(&base).complete("system", &[], "question").await.unwrap_err();
    assert!(matches!(err, ModelError::InvalidResponse { .. }));

    handle.abort();
}

#[tokio::test]
async fn unreachable_endpoint_is_request_error() {
    // Port 9 (discard) on localhost is not expected to run an HTTP server.
    let err = client("http://127.0.0.1:9/v1").complete("system", &[], "question").await.unwrap_err();
    assert!(matches!(err, ModelError::Request { .. } | ModelError::Timeout { .. }));
}
