//! sqldesk - Local Database Browser Service
//!
//! sqldesk lets a caller inspect the tables of an embedded `SQLite` store, run
//! arbitrary SQL, edit rows through schema-driven CRUD and ask an assistant to
//! generate, optimize or explain SQL.
//!
//! # Architecture
//! The library holds all behavior; the HTTP server and the CLI are thin
//! wrappers over the same components. The store handle is opened by the
//! composition root and injected into each component.
//!
//! # Module Organization
//! - [`error`] - Error types and handling
//! - [`output`] - JSON output envelopes for the CLI
//! - [`classify`] - Read vs. mutating statement classification
//! - [`engine`] - Store handle, data model and data-access components
//! - [`assistant`] - Assistant gateway, provider capability and caller-side client
//! - [`saved`] - Saved query store
//! - [`server`] - HTTP routes and the streamed assistant channel
//! - [`config`] - Configuration management

pub mod assistant;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod output;
pub mod saved;
pub mod server;

pub use assistant::{
    AIResponse, AssistantClient, AssistantGateway, AssistantProvider, AssistantTurn, ChatSession, Role,
    Temperatures, TransportKind,
};
pub use classify::{classify, StatementKind};
pub use config::{AssistantConfig, ConfigLayer, DeskConfig};
pub use engine::{
    ColumnDescriptor, MutationOutcome, Page, PageRequest, PaginationEngine, QueryExecutor, QueryResult,
    RowId, RowMutator, RowRecord, SchemaCatalog, Store, TableDescriptor, TableKind,
};
pub use error::{DeskError, Result};
pub use output::{ErrorEnvelope, ErrorInfo, Metadata, SuccessEnvelope};
pub use saved::{NewSavedQuery, SavedQuery, SavedQueryStore};
pub use server::{build_router, serve, AppState};
