use lexia_core::{AgentRequest, Completion, SinkFactory};
use lexia_providers::RelaySinkFactory;
use lexia_providers::relay::API_KEY_HEADER;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request() -> AgentRequest {
    let mut request = AgentRequest::new("thread-1", "hello");
    request.stream_url = Some("responses:thread-1".to_string());
    request
}

#[tokio::test]
async fn chunks_then_completion_are_published() -> anyhow::Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/publish"))
        .and(header(API_KEY_HEADER, "relay-key"))
        .and(body_partial_json(json!({
            "channel": "responses:thread-1",
            "data": {"type": "chunk", "text": "Hel"}
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/publish"))
        .and(body_partial_json(json!({
            "channel": "responses:thread-1",
            "data": {"type": "complete", "text": "Hello", "file_url": "https://img/1.png"}
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let factory = RelaySinkFactory::new(
        format!("{}/api/publish", server.uri()),
        Some("relay-key".to_string()),
    );
    let sink = factory.open(&request());

    sink.send("Hel").await?;
    sink.close(Completion {
        text: "Hello".to_string(),
        usage: None,
        file_url: Some("https://img/1.png".to_string()),
    })
    .await?;

    // Dropped after the terminal signal, so no third request.
    sink.send("late").await?;
    sink.send_error("late error").await?;
    Ok(())
}

#[tokio::test]
async fn error_is_published_once() -> anyhow::Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/publish"))
        .and(body_partial_json(json!({
            "data": {"type": "error", "message": "boom"}
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let factory = RelaySinkFactory::new(format!("{}/api/publish", server.uri()), None);
    let sink = factory.open(&request());

    sink.send_error("boom").await?;
    sink.close(Completion::default()).await?;
    Ok(())
}

#[tokio::test]
async fn relay_rejection_surfaces_as_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/publish"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let factory = RelaySinkFactory::new(format!("{}/api/publish", server.uri()), None);
    let sink = factory.open(&request());
    assert!(sink.send("chunk").await.is_err());
}
