//! HTTP and streamed-channel server
//!
//! ```text
//! /
//! ├── /api/tables                      - catalog, pages, row CRUD
//! ├── /api/query/execute               - raw SQL
//! ├── /api/ai/{generate,optimize,explain}
//! ├── /api/queries                     - saved queries
//! └── /ws                              - streamed assistant channel
//! ```
//!
//! [`serve`] is the composition root: it opens the store, injects it into every
//! component and closes it after shutdown.

use axum::routing::{delete, get, post, put};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::assistant::{AssistantGateway, AssistantProvider, OpenAiProvider, UnavailableProvider};
use crate::config::{AssistantConfig, DeskConfig};
use crate::engine::{PaginationEngine, QueryExecutor, RowMutator, SchemaCatalog, Store};
use crate::error::{DeskError, Result};
use crate::saved::SavedQueryStore;

pub mod http;
pub mod ws;

/// Components shared by every handler
#[derive(Debug, Clone)]
pub struct AppState {
    /// Table listing and column introspection
    pub catalog: SchemaCatalog,
    /// Raw SQL execution
    pub executor: QueryExecutor,
    /// Row insert/update/delete
    pub mutator: RowMutator,
    /// Table pages
    pub pages: PaginationEngine,
    /// Assistant operations shared by both transports
    pub gateway: AssistantGateway,
    /// Saved queries, kept for the life of the process
    pub saved: Arc<SavedQueryStore>,
}

impl AppState {
    /// Wire every data-access component to the same store
    pub fn new(store: Arc<Store>, gateway: AssistantGateway) -> Self {
        Self {
            catalog: SchemaCatalog::new(Arc::clone(&store)),
            executor: QueryExecutor::new(Arc::clone(&store)),
            mutator: RowMutator::new(Arc::clone(&store)),
            pages: PaginationEngine::new(store),
            gateway,
            saved: Arc::new(SavedQueryStore::new()),
        }
    }
}

/// Build the complete router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_router())
        .route("/ws", get(ws::channel))
        .with_state(state)
}

fn api_router() -> Router<AppState> {
    Router::new()
        .route("/tables", get(http::list_tables))
        .route("/tables/:name/schema", get(http::table_schema))
        .route("/tables/:name/data", get(http::table_data))
        .route("/tables/:name/rows", post(http::insert_row))
        .route("/tables/:name/rows/:id", put(http::update_row).delete(http::delete_row))
        .route("/query/execute", post(http::execute_query))
        .route("/ai/generate", post(http::ai_generate))
        .route("/ai/optimize", post(http::ai_optimize))
        .route("/ai/explain", post(http::ai_explain))
        .route("/queries", get(http::list_queries).post(http::save_query))
        .route("/queries/:id", delete(http::delete_query))
}

/// Pick the assistant provider: OpenAI when a key is present, otherwise one that always degrades
pub fn gateway_for(config: &AssistantConfig) -> AssistantGateway {
    let provider: Arc<dyn AssistantProvider> = match config.api_key() {
        Some(key) => {
            info!(model = %config.model, api_base = %config.api_base, "assistant provider configured");
            Arc::new(OpenAiProvider::new(&config.api_base, &config.model, key))
        }
        None => {
            warn!(env = %config.api_key_env, "no assistant API key set; assistant replies will be placeholders");
            Arc::new(UnavailableProvider)
        }
    };
    AssistantGateway::new(provider).with_temperatures(config.temperatures)
}

/// Run the server until Ctrl-C
pub async fn serve(config: &DeskConfig) -> Result<()> {
    let store = Arc::new(Store::open(&config.database)?);
    if config.seed {
        store.seed_sample_data()?;
    }

    let state = AppState::new(Arc::clone(&store), gateway_for(&config.assistant));

    let listener = TcpListener::bind(config.bind)
        .await
        .map_err(|e| DeskError::config(format!("Could not bind {}: {e}", config.bind)))?;
    info!(addr = %config.bind, database = %store.label(), "sqldesk listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| DeskError::transport(format!("server error: {e}")))?;

    // Channel tasks may still hold clones of the state briefly after shutdown
    match Arc::try_unwrap(store) {
        Ok(store) => store.close()?,
        Err(_) => warn!("store still referenced at shutdown; dropping without explicit close"),
    }
    info!("sqldesk stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
