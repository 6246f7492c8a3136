//! Assistant Transport Tests
//!
//! Runs the server on an ephemeral port and talks to it over both transports:
//! the `/ws` channel and the synchronous `/api/ai/*` routes.

use async_trait::async_trait;
use axum::extract::ws::WebSocketUpgrade;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio_tungstenite::tungstenite::protocol::Message;

use sqldesk::assistant::{GENERATE_UNAVAILABLE, OPTIMIZE_UNAVAILABLE};
use sqldesk::{
    build_router, AppState, AssistantClient, AssistantGateway, AssistantProvider, ChatSession, Role, Store,
    TransportKind,
};

/// Echoes the user prompt back as the message and records every system prompt
#[derive(Default)]
struct EchoProvider {
    system_prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl AssistantProvider for EchoProvider {
    async fn complete(&self, system_prompt: &str, user_prompt: &str, _temperature: f32) -> anyhow::Result<String> {
        self.system_prompts.lock().unwrap().push(system_prompt.to_string());
        Ok(json!({"message": user_prompt, "sqlQuery": "SELECT 1"}).to_string())
    }
}

/// Echoes prompts, holding any prompt that starts with `hold` until released
#[derive(Default)]
struct GatedProvider {
    release: Notify,
}

#[async_trait]
impl AssistantProvider for GatedProvider {
    async fn complete(&self, _system_prompt: &str, user_prompt: &str, _temperature: f32) -> anyhow::Result<String> {
        if user_prompt.starts_with("hold") {
            self.release.notified().await;
        }
        Ok(json!({"message": user_prompt}).to_string())
    }
}

async fn spawn(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(axum::serve(listener, router).into_future());
    addr
}

async fn spawn_desk(provider: Arc<dyn AssistantProvider>) -> SocketAddr {
    let store = Store::open_in_memory().unwrap();
    store.seed_sample_data().unwrap();
    spawn(build_router(AppState::new(Arc::new(store), AssistantGateway::new(provider)))).await
}

async fn next_text<S>(socket: &mut S) -> Value
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match socket.next().await.expect("frame").expect("frame ok") {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Close(_) => panic!("channel closed"),
            _ => {}
        }
    }
}

fn chat(prompt: &str) -> Message {
    Message::Text(json!({"type": "ai_chat", "content": prompt}).to_string())
}

async fn reply_message<S>(socket: &mut S) -> String
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let reply = tokio::time::timeout(Duration::from_secs(5), next_text(socket)).await.expect("reply in time");
    reply["data"]["message"].as_str().expect("ai_response").to_string()
}

// ============================================================================
// Raw Channel
// ============================================================================

#[tokio::test]
async fn test_channel_replies_in_order() {
    let addr = spawn_desk(Arc::new(EchoProvider::default())).await;
    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws")).await.unwrap();

    for prompt in ["first", "second"] {
        let frame = json!({"type": "ai_chat", "content": prompt}).to_string();
        socket.send(Message::Text(frame)).await.unwrap();
        let reply = next_text(&mut socket).await;
        assert_eq!(reply, json!({"type": "ai_response", "data": {"message": prompt, "sqlQuery": "SELECT 1"}}));
    }
}

#[tokio::test]
async fn test_channels_are_independent_and_ordered() {
    let provider = Arc::new(GatedProvider::default());
    let addr = spawn_desk(Arc::clone(&provider) as Arc<dyn AssistantProvider>).await;
    let url = format!("ws://{addr}/ws");
    let (mut first, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    let (mut second, _) = tokio_tungstenite::connect_async(&url).await.unwrap();

    // The first channel is stuck on a held prompt while the second keeps answering
    first.send(chat("hold first-1")).await.unwrap();
    second.send(chat("second-1")).await.unwrap();
    first.send(chat("first-2")).await.unwrap();
    second.send(chat("second-2")).await.unwrap();

    assert_eq!(reply_message(&mut second).await, "second-1");
    assert_eq!(reply_message(&mut second).await, "second-2");

    provider.release.notify_one();
    assert_eq!(reply_message(&mut first).await, "hold first-1");
    assert_eq!(reply_message(&mut first).await, "first-2");
}

#[tokio::test]
async fn test_channel_survives_malformed_frames() {
    let addr = spawn_desk(Arc::new(EchoProvider::default())).await;
    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws")).await.unwrap();

    for bad in ["not json", r#"{"type": "ai_chat"}"#, r#"{"type": "subscribe", "content": "x"}"#] {
        socket.send(Message::Text(bad.to_string())).await.unwrap();
        assert_eq!(next_text(&mut socket).await, json!({"type": "error", "message": "Failed to process message"}));
    }

    socket.send(Message::Text(json!({"type": "ai_chat", "content": "still here"}).to_string())).await.unwrap();
    assert_eq!(next_text(&mut socket).await["type"], "ai_response");
}

#[tokio::test]
async fn test_channel_passes_schema_to_provider() {
    let provider = Arc::new(EchoProvider::default());
    let addr = spawn_desk(Arc::clone(&provider) as Arc<dyn AssistantProvider>).await;
    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws")).await.unwrap();

    let frame = json!({"type": "ai_chat", "content": "count users", "tableSchema": "users(id, username)"});
    socket.send(Message::Text(frame.to_string())).await.unwrap();
    next_text(&mut socket).await;

    let prompts = provider.system_prompts.lock().unwrap();
    assert!(prompts[0].contains("users(id, username)"));
}

// ============================================================================
// Client Transport Selection
// ============================================================================

#[tokio::test]
async fn test_client_prefers_stream() {
    let addr = spawn_desk(Arc::new(EchoProvider::default())).await;
    let mut client = AssistantClient::new(format!("http://{addr}"));
    client.connect_stream().await.unwrap();
    assert!(client.has_stream());

    let response = client.generate("streamed please", None).await;
    assert_eq!(response.message, "streamed please");
    assert_eq!(client.last_transport(), Some(TransportKind::Streamed));

    client.disconnect().await;
    assert!(!client.has_stream());
}

#[tokio::test]
async fn test_client_uses_http_without_stream() {
    let addr = spawn_desk(Arc::new(EchoProvider::default())).await;
    let mut client = AssistantClient::new(format!("http://{addr}"));

    let response = client.generate("over http", Some("users(id)")).await;
    assert_eq!(response.message, "over http");
    assert_eq!(response.sql_query.as_deref(), Some("SELECT 1"));
    assert_eq!(client.last_transport(), Some(TransportKind::Synchronous));

    let response = client.optimize("SELECT * FROM users").await;
    assert_eq!(response.sql_query.as_deref(), Some("SELECT 1"));

    let response = client.explain("SELECT * FROM users").await;
    assert_eq!(response.sql_query, None);
}

#[tokio::test]
async fn test_client_falls_back_when_stream_drops() {
    // Channel that hangs up immediately, HTTP route that answers
    let router = Router::new()
        .route("/ws", get(|ws: WebSocketUpgrade| async move { ws.on_upgrade(|socket| async move { drop(socket) }) }))
        .route("/api/ai/generate", post(|| async { Json(json!({"message": "via http"})) }));
    let addr = spawn(router).await;

    let mut client = AssistantClient::new(format!("http://{addr}"));
    client.connect_stream().await.unwrap();

    let response = client.generate("hello", None).await;
    assert_eq!(response.message, "via http");
    assert_eq!(client.last_transport(), Some(TransportKind::Synchronous));
    assert!(!client.has_stream());
}

#[tokio::test]
async fn test_client_placeholder_when_server_unreachable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut client = AssistantClient::new(format!("http://{addr}"));
    assert!(client.connect_stream().await.is_err());

    assert_eq!(client.generate("hello", None).await.message, GENERATE_UNAVAILABLE);
    assert_eq!(client.last_transport(), Some(TransportKind::Unavailable));
    assert_eq!(client.optimize("SELECT 1").await.message, OPTIMIZE_UNAVAILABLE);
}

// ============================================================================
// Chat Session
// ============================================================================

#[tokio::test]
async fn test_chat_session_records_turns() {
    let addr = spawn_desk(Arc::new(EchoProvider::default())).await;
    let mut client = AssistantClient::new(format!("http://{addr}"));
    client.connect_stream().await.unwrap();

    let mut session = ChatSession::new();
    let reply = session.ask(&mut client, "show users", None).await;
    assert_eq!(reply.role, Role::Assistant);
    assert_eq!(reply.text, "show users");
    assert_eq!(reply.sql_query.as_deref(), Some("SELECT 1"));

    session.ask(&mut client, "and posts", None).await;
    let roles: Vec<Role> = session.turns().iter().map(|t| t.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
    assert_eq!(session.turns()[2].text, "and posts");

    session.clear();
    assert!(session.turns().is_empty());
}
