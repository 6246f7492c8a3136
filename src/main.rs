//! sqldesk CLI Entry Point
//!
//! Subcommands:
//! - `serve` - run the HTTP API and streamed assistant channel
//! - `tables` - list tables and views with row counts
//! - `schema` - describe a table's columns
//! - `query` - execute one SQL statement
//! - `page` - fetch a slice of a table
//!
//! One-shot commands print a single JSON envelope to stdout and exit 1 on
//! error. Logs go to stderr.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::error;
use tracing_subscriber::EnvFilter;

use sqldesk::config::{self, ConfigLayer};
use sqldesk::{
    DeskError, ErrorEnvelope, Metadata, PageRequest, PaginationEngine, QueryExecutor, SchemaCatalog, Store,
    SuccessEnvelope,
};

/// sqldesk - local database browser with an SQL assistant
#[derive(Parser)]
#[command(name = "sqldesk")]
#[command(about = "Local database browser with schema-driven CRUD and an SQL assistant")]
#[command(version)]
struct Cli {
    /// `SQLite` database file (overrides SQLDESK_DB and config files)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Log filter (error, warn, info, debug, trace or a full EnvFilter directive)
    #[arg(long, global = true, default_value = "info", env = "SQLDESK_LOG")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API and the streamed assistant channel until Ctrl-C
    Serve {
        /// Listen address (overrides SQLDESK_BIND and config files)
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,

        /// Do not create the sample tables
        #[arg(long)]
        no_seed: bool,
    },

    /// List tables and views with live row counts
    Tables,

    /// Describe the columns of a table or view
    Schema {
        table: String,
    },

    /// Execute one SQL statement
    Query {
        sql: String,
    },

    /// Fetch a page of rows from a table
    Page {
        table: String,

        #[arg(long)]
        limit: Option<i64>,

        #[arg(long)]
        offset: Option<i64>,
    },
}

impl Commands {
    const fn name(&self) -> &'static str {
        match self {
            Self::Serve { .. } => "serve",
            Self::Tables => "tables",
            Self::Schema { .. } => "schema",
            Self::Query { .. } => "query",
            Self::Page { .. } => "page",
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let flags = ConfigLayer { database: cli.db, ..ConfigLayer::default() };

    match cli.command {
        Commands::Serve { bind, no_seed } => {
            let flags = ConfigLayer { bind, seed: no_seed.then_some(false), ..flags };
            match run_server(flags).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!("{e:#}");
                    ExitCode::FAILURE
                }
            }
        }
        command => run_command(flags, &command),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

async fn run_server(flags: ConfigLayer) -> anyhow::Result<()> {
    let config = config::load(flags).context("failed to load configuration")?;
    sqldesk::serve(&config).await.context("server failed")?;
    Ok(())
}

/// Run a one-shot command and print its envelope
fn run_command(flags: ConfigLayer, command: &Commands) -> ExitCode {
    let start = Instant::now();

    match execute(flags, command) {
        Ok((data, rows)) => {
            let elapsed = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
            let meta = rows.map_or_else(|| Metadata::new(elapsed), |rows| Metadata::with_rows(elapsed, rows));
            emit(&SuccessEnvelope::new(command.name(), data, meta));
            ExitCode::SUCCESS
        }
        Err(e) => {
            emit(&ErrorEnvelope::from_error(command.name(), &e));
            ExitCode::FAILURE
        }
    }
}

fn execute(flags: ConfigLayer, command: &Commands) -> sqldesk::Result<(Value, Option<usize>)> {
    let config = config::load(flags)?;
    let store = Arc::new(Store::open(&config.database)?);

    let outcome = match command {
        Commands::Tables => {
            let tables = SchemaCatalog::new(Arc::clone(&store)).list_tables()?;
            (to_data(&tables)?, Some(tables.len()))
        }
        Commands::Schema { table } => {
            let columns = SchemaCatalog::new(Arc::clone(&store)).describe_table(table)?;
            (to_data(&columns)?, None)
        }
        Commands::Query { sql } => {
            let result = QueryExecutor::new(Arc::clone(&store)).execute(sql)?;
            (to_data(&result)?, Some(result.rows.len()))
        }
        Commands::Page { table, limit, offset } => {
            let page = PaginationEngine::new(Arc::clone(&store)).page(table, PageRequest::new(*limit, *offset))?;
            (to_data(&page)?, Some(page.data.len()))
        }
        Commands::Serve { .. } => return Err(DeskError::validation("serve is not a one-shot command")),
    };

    if let Ok(store) = Arc::try_unwrap(store) {
        store.close()?;
    }
    Ok(outcome)
}

fn to_data<T: Serialize>(value: &T) -> sqldesk::Result<Value> {
    serde_json::to_value(value).map_err(|e| DeskError::execution(format!("could not encode result: {e}")))
}

fn emit<T: Serialize>(envelope: &T) {
    match serde_json::to_string(envelope) {
        Ok(json) => println!("{json}"),
        Err(e) => error!(error = %e, "could not encode output envelope"),
    }
}
