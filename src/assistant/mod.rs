//! SQL Assistant Gateway
//!
//! Three assistant operations (generate, optimize, explain) over an opaque
//! completion provider. The gateway never fails: provider errors and malformed
//! replies are replaced by a fixed, human-readable [`AIResponse`].
//!
//! # Transports
//! The server exposes the gateway over two transports:
//! - synchronous HTTP (`POST /api/ai/*`), one request and one reply
//! - a streamed WebSocket channel (`/ws`) carrying [`ChannelRequest`] and
//!   [`ChannelReply`] frames
//!
//! Frames carry no correlation id. A channel must have at most one outstanding
//! request; [`AssistantClient`] enforces this by taking `&mut self`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

pub mod client;
pub mod openai;

pub use client::{AssistantClient, ChatSession, StreamedChannel, TransportKind};
pub use openai::{OpenAiProvider, UnavailableProvider};

/// Message returned by `generate` when the provider fails
pub const GENERATE_UNAVAILABLE: &str =
    "I'm currently unavailable. Please try again later or write your SQL query manually.";
/// Message returned by `optimize` when the provider fails
pub const OPTIMIZE_UNAVAILABLE: &str = "Unable to optimize query at the moment. Please try again later.";
/// Message returned by `explain` when the provider fails
pub const EXPLAIN_UNAVAILABLE: &str = "Unable to explain query at the moment. Please try again later.";

const GENERATE_DEFAULT: &str = "I'm here to help with your database questions!";
const OPTIMIZE_DEFAULT: &str = "Here are some optimization suggestions:";
const EXPLAIN_DEFAULT: &str = "Here's what this query does:";

const GENERATE_SYSTEM_PROMPT: &str = "You are a SQL expert assistant for a database management system.
Help users write SQL queries, optimize performance, and explain database concepts.
Always provide valid SQL syntax and explain your reasoning.";

const OPTIMIZE_SYSTEM_PROMPT: &str = "You are a SQL optimization expert.
Analyze the provided SQL query and suggest optimizations for better performance.
Consider indexes, query structure, and best practices.

Respond with JSON in this format:
{
  \"message\": \"Optimization summary\",
  \"sqlQuery\": \"Optimized SQL query\",
  \"explanation\": \"Detailed explanation of optimizations made\"
}";

const EXPLAIN_SYSTEM_PROMPT: &str = "You are a SQL education expert.
Explain the provided SQL query in simple terms, breaking down each part.
Help users understand what the query does and how it works.

Respond with JSON in this format:
{
  \"message\": \"Simple explanation of the query\",
  \"explanation\": \"Detailed breakdown of each part\"
}";

const GENERATE_REPLY_FORMAT: &str = "Respond with JSON in this format:
{
  \"message\": \"Your explanation or response\",
  \"sqlQuery\": \"SQL query if applicable\",
  \"explanation\": \"Detailed explanation of the query\"
}";

/// Reply contract shared by all three assistant operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AIResponse {
    /// Human-readable reply
    pub message: String,

    /// Suggested SQL, when the operation produced one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,

    /// Longer explanation of the suggestion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl AIResponse {
    /// A bare message with no SQL and no explanation
    pub fn message_only(message: impl Into<String>) -> Self {
        Self { message: message.into(), sql_query: None, explanation: None }
    }
}

/// Who produced a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of an in-memory conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantTurn {
    /// Who produced the turn
    pub role: Role,
    /// Prompt or reply text
    pub text: String,
    /// SQL attached to an assistant reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,
    /// When the turn was recorded
    pub created_at: DateTime<Utc>,
}

impl AssistantTurn {
    /// Turn holding a caller prompt
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into(), sql_query: None, created_at: Utc::now() }
    }

    /// Turn holding an assistant reply
    #[must_use]
    pub fn assistant(response: &AIResponse) -> Self {
        Self {
            role: Role::Assistant,
            text: response.message.clone(),
            sql_query: response.sql_query.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Frame sent by a client over the streamed channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelRequest {
    AiChat {
        content: String,
        #[serde(rename = "tableSchema", default, skip_serializing_if = "Option::is_none")]
        table_schema: Option<String>,
    },
}

/// Frame sent by the server over the streamed channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelReply {
    AiResponse { data: AIResponse },
    Error { message: String },
}

/// Opaque completion capability
///
/// Returns the raw completion text, expected to be a JSON object with optional
/// `message`, `sqlQuery` and `explanation` string fields.
#[async_trait]
pub trait AssistantProvider: Send + Sync + 'static {
    async fn complete(&self, system_prompt: &str, user_prompt: &str, temperature: f32) -> anyhow::Result<String>;
}

/// Sampling temperature per operation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Temperatures {
    /// Used by `generate`
    pub generate: f32,
    /// Used by `optimize`
    pub optimize: f32,
    /// Used by `explain`
    pub explain: f32,
}

impl Default for Temperatures {
    fn default() -> Self {
        Self { generate: 0.3, optimize: 0.2, explain: 0.3 }
    }
}

/// Provider reply fields; anything else in the object is ignored
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderReply {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    sql_query: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
}

/// Degrade-gracefully front for an [`AssistantProvider`]
#[derive(Clone)]
pub struct AssistantGateway {
    provider: Arc<dyn AssistantProvider>,
    temperatures: Temperatures,
}

impl fmt::Debug for AssistantGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssistantGateway").field("temperatures", &self.temperatures).finish_non_exhaustive()
    }
}

impl AssistantGateway {
    /// Create a gateway with the default temperatures
    pub fn new(provider: Arc<dyn AssistantProvider>) -> Self {
        Self { provider, temperatures: Temperatures::default() }
    }

    /// Override the per-operation temperatures
    #[must_use]
    pub fn with_temperatures(mut self, temperatures: Temperatures) -> Self {
        self.temperatures = temperatures;
        self
    }

    /// Turn a natural-language request into SQL, optionally grounded in a schema description
    pub async fn generate(&self, prompt: &str, table_schema: Option<&str>) -> AIResponse {
        let system_prompt = generate_system_prompt(table_schema);

        match self.ask("generate", &system_prompt, prompt, self.temperatures.generate).await {
            Some(reply) => AIResponse {
                message: non_empty(reply.message).unwrap_or_else(|| GENERATE_DEFAULT.to_string()),
                sql_query: reply.sql_query,
                explanation: reply.explanation,
            },
            None => AIResponse::message_only(GENERATE_UNAVAILABLE),
        }
    }

    /// Suggest a faster form of `sql`
    ///
    /// When the provider gives no rewritten query the input is echoed back.
    pub async fn optimize(&self, sql: &str) -> AIResponse {
        let user_prompt = format!("Please optimize this SQL query:\n\n{sql}");

        match self.ask("optimize", OPTIMIZE_SYSTEM_PROMPT, &user_prompt, self.temperatures.optimize).await {
            Some(reply) => AIResponse {
                message: non_empty(reply.message).unwrap_or_else(|| OPTIMIZE_DEFAULT.to_string()),
                sql_query: Some(non_empty(reply.sql_query).unwrap_or_else(|| sql.to_string())),
                explanation: reply.explanation,
            },
            None => AIResponse::message_only(OPTIMIZE_UNAVAILABLE),
        }
    }

    /// Describe what `sql` does
    pub async fn explain(&self, sql: &str) -> AIResponse {
        let user_prompt = format!("Please explain this SQL query:\n\n{sql}");

        match self.ask("explain", EXPLAIN_SYSTEM_PROMPT, &user_prompt, self.temperatures.explain).await {
            Some(reply) => AIResponse {
                message: non_empty(reply.message).unwrap_or_else(|| EXPLAIN_DEFAULT.to_string()),
                sql_query: None,
                explanation: reply.explanation,
            },
            None => AIResponse::message_only(EXPLAIN_UNAVAILABLE),
        }
    }

    /// Call the provider and parse its reply; `None` on any failure
    async fn ask(&self, operation: &str, system_prompt: &str, user_prompt: &str, temperature: f32) -> Option<ProviderReply> {
        let raw = match self.provider.complete(system_prompt, user_prompt, temperature).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(operation, error = %format!("{e:#}"), "assistant provider failed");
                return None;
            }
        };

        match parse_reply(&raw) {
            Ok(reply) => {
                debug!(operation, "assistant reply parsed");
                Some(reply)
            }
            Err(e) => {
                warn!(operation, error = %e, "assistant reply malformed");
                None
            }
        }
    }
}

fn generate_system_prompt(table_schema: Option<&str>) -> String {
    match table_schema.map(str::trim).filter(|s| !s.is_empty()) {
        Some(schema) => {
            format!("{GENERATE_SYSTEM_PROMPT}\n\nAvailable tables and schema:\n{schema}\n\n{GENERATE_REPLY_FORMAT}")
        }
        None => format!("{GENERATE_SYSTEM_PROMPT}\n\n{GENERATE_REPLY_FORMAT}"),
    }
}

/// Blank content counts as an empty object
fn parse_reply(raw: &str) -> Result<ProviderReply, String> {
    if raw.trim().is_empty() {
        return Ok(ProviderReply::default());
    }

    let value: Value = serde_json::from_str(raw).map_err(|e| format!("not JSON: {e}"))?;
    if !value.is_object() {
        return Err("reply is not a JSON object".to_string());
    }
    serde_json::from_value(value).map_err(|e| format!("unexpected field types: {e}"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}
