//! Caller-side assistant client
//!
//! Transport selection happens here, per call: `generate` uses the streamed
//! channel while it is open and healthy and otherwise falls back to
//! `POST /api/ai/generate`. `optimize` and `explain` are synchronous only. A
//! failed call still yields an [`AIResponse`].

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::assistant::{
    AIResponse, AssistantTurn, ChannelReply, ChannelRequest, EXPLAIN_UNAVAILABLE, GENERATE_UNAVAILABLE,
    OPTIMIZE_UNAVAILABLE,
};
use crate::error::{DeskError, Result};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Transport that produced the last response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Persistent WebSocket channel
    Streamed,
    /// Plain HTTP request/reply
    Synchronous,
    /// Both transports failed; the response is a local placeholder
    Unavailable,
}

/// One open `/ws` connection
///
/// Requests are answered in submission order; `&mut self` keeps a single
/// request outstanding.
pub struct StreamedChannel {
    socket: Socket,
    healthy: bool,
}

impl StreamedChannel {
    /// Open a channel to a `ws://` or `wss://` endpoint
    pub async fn connect(url: &str) -> Result<Self> {
        let (socket, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| DeskError::transport(format!("WebSocket connect to {url} failed: {e}")))?;
        info!(url, "assistant channel connected");
        Ok(Self { socket, healthy: true })
    }

    /// False once a send or receive has failed
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        self.healthy
    }

    /// Send one `ai_chat` frame and wait for its reply
    ///
    /// Any failure marks the channel unhealthy.
    pub async fn request(&mut self, prompt: &str, table_schema: Option<&str>) -> Result<AIResponse> {
        let outcome = self.exchange(prompt, table_schema).await;
        if outcome.is_err() {
            self.healthy = false;
        }
        outcome
    }

    async fn exchange(&mut self, prompt: &str, table_schema: Option<&str>) -> Result<AIResponse> {
        let frame = serde_json::to_string(&ChannelRequest::AiChat {
            content: prompt.to_string(),
            table_schema: table_schema.map(str::to_string),
        })
        .map_err(|e| DeskError::transport(e.to_string()))?;

        self.socket
            .send(Message::text(frame))
            .await
            .map_err(|e| DeskError::transport(format!("WebSocket send failed: {e}")))?;

        while let Some(message) = self.socket.next().await {
            let message = message.map_err(|e| DeskError::transport(format!("WebSocket receive failed: {e}")))?;
            match message {
                Message::Text(text) => {
                    let reply: ChannelReply = serde_json::from_str(&text)
                        .map_err(|e| DeskError::transport(format!("unreadable channel frame: {e}")))?;
                    return match reply {
                        ChannelReply::AiResponse { data } => Ok(data),
                        ChannelReply::Error { message } => Err(DeskError::transport(message)),
                    };
                }
                Message::Close(_) => break,
                _ => {}
            }
        }

        Err(DeskError::transport("WebSocket closed by server"))
    }

    /// Send a close frame; errors are ignored
    pub async fn close(mut self) {
        let _ = self.socket.close(None).await;
    }
}

impl std::fmt::Debug for StreamedChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamedChannel").field("healthy", &self.healthy).finish_non_exhaustive()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    table_schema: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SqlBody<'a> {
    sql_query: &'a str,
}

/// Assistant access for a caller of the sqldesk server
#[derive(Debug)]
pub struct AssistantClient {
    http: reqwest::Client,
    base_url: String,
    channel: Option<StreamedChannel>,
    last_transport: Option<TransportKind>,
}

impl AssistantClient {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:5000`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            channel: None,
            last_transport: None,
        }
    }

    /// `ws://` form of the server's `/ws` endpoint
    #[must_use]
    pub fn stream_url(&self) -> String {
        if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}/ws")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}/ws")
        } else {
            format!("ws://{}/ws", self.base_url)
        }
    }

    /// Open (or replace) the streamed channel
    pub async fn connect_stream(&mut self) -> Result<()> {
        let channel = StreamedChannel::connect(&self.stream_url()).await?;
        if let Some(previous) = self.channel.replace(channel) {
            previous.close().await;
        }
        Ok(())
    }

    /// Whether the next `generate` would try the streamed channel
    #[must_use]
    pub fn has_stream(&self) -> bool {
        self.channel.as_ref().is_some_and(StreamedChannel::is_healthy)
    }

    /// Transport that answered the most recent call
    #[must_use]
    pub const fn last_transport(&self) -> Option<TransportKind> {
        self.last_transport
    }

    /// Generate SQL from a prompt, preferring the streamed channel
    pub async fn generate(&mut self, prompt: &str, table_schema: Option<&str>) -> AIResponse {
        if let Some(channel) = self.channel.as_mut().filter(|c| c.is_healthy()) {
            match channel.request(prompt, table_schema).await {
                Ok(response) => {
                    self.last_transport = Some(TransportKind::Streamed);
                    return response;
                }
                Err(e) => {
                    warn!(error = %e, "streamed channel failed, falling back to HTTP");
                    if let Some(channel) = self.channel.take() {
                        channel.close().await;
                    }
                }
            }
        }

        let body = GenerateBody { prompt, table_schema };
        self.post("/api/ai/generate", &body, GENERATE_UNAVAILABLE).await
    }

    /// Ask for a faster form of `sql` over HTTP
    pub async fn optimize(&mut self, sql: &str) -> AIResponse {
        self.post("/api/ai/optimize", &SqlBody { sql_query: sql }, OPTIMIZE_UNAVAILABLE).await
    }

    /// Ask for an explanation of `sql` over HTTP
    pub async fn explain(&mut self, sql: &str) -> AIResponse {
        self.post("/api/ai/explain", &SqlBody { sql_query: sql }, EXPLAIN_UNAVAILABLE).await
    }

    /// Close the streamed channel, if any
    pub async fn disconnect(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.close().await;
        }
    }

    async fn post(&mut self, path: &str, body: &impl Serialize, unavailable: &str) -> AIResponse {
        match self.post_json(path, body).await {
            Ok(response) => {
                self.last_transport = Some(TransportKind::Synchronous);
                response
            }
            Err(e) => {
                warn!(path, error = %e, "assistant request failed");
                self.last_transport = Some(TransportKind::Unavailable);
                AIResponse::message_only(unavailable)
            }
        }
    }

    async fn post_json(&self, path: &str, body: &impl Serialize) -> Result<AIResponse> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "assistant request");

        self.http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| DeskError::transport(format!("request to {url} failed: {e}")))?
            .error_for_status()
            .map_err(|e| DeskError::transport(e.to_string()))?
            .json::<AIResponse>()
            .await
            .map_err(|e| DeskError::transport(format!("unreadable assistant reply: {e}")))
    }
}

/// In-memory conversation for one caller; nothing is persisted
#[derive(Debug, Default)]
pub struct ChatSession {
    turns: Vec<AssistantTurn>,
}

impl ChatSession {
    /// Start an empty conversation
    #[must_use]
    pub const fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Record the prompt, ask the assistant, record and return the reply turn
    pub async fn ask(
        &mut self,
        client: &mut AssistantClient,
        prompt: &str,
        table_schema: Option<&str>,
    ) -> &AssistantTurn {
        self.turns.push(AssistantTurn::user(prompt));
        let response = client.generate(prompt, table_schema).await;
        self.turns.push(AssistantTurn::assistant(&response));
        &self.turns[self.turns.len() - 1]
    }

    /// Turns so far, oldest first
    #[must_use]
    pub fn turns(&self) -> &[AssistantTurn] {
        &self.turns
    }

    /// Forget every turn
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
