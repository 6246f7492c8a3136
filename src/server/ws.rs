//! Streamed assistant channel (`GET /ws`)
//!
//! One task per connection; frames of a connection are handled in order.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use tracing::{debug, error, info, warn};

use crate::assistant::{AssistantGateway, ChannelReply, ChannelRequest};
use crate::server::AppState;

/// Reply to any inbound frame that cannot be processed
pub const PROCESS_FAILURE: &str = "Failed to process message";

/// Upgrade `GET /ws` to a streamed assistant channel
pub async fn channel(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_channel(socket, state.gateway))
}

async fn handle_channel(mut socket: WebSocket, gateway: AssistantGateway) {
    info!("assistant channel client connected");

    while let Some(frame) = socket.recv().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "assistant channel receive failed");
                break;
            }
        };

        let reply = match serde_json::from_str::<ChannelRequest>(&text) {
            Ok(ChannelRequest::AiChat { content, table_schema }) => {
                debug!(chars = content.len(), "assistant channel request");
                ChannelReply::AiResponse { data: gateway.generate(&content, table_schema.as_deref()).await }
            }
            Err(e) => {
                warn!(error = %e, "unreadable assistant channel frame");
                ChannelReply::Error { message: PROCESS_FAILURE.to_string() }
            }
        };

        let payload = match serde_json::to_string(&reply) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "could not encode assistant channel reply");
                continue;
            }
        };

        if socket.send(Message::Text(payload)).await.is_err() {
            break;
        }
    }

    info!("assistant channel client disconnected");
}
