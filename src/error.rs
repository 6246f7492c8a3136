//! Error Handling Infrastructure
//!
//! This module defines all error types used throughout sqldesk.
//! Every error maps to a stable error code (CLI envelopes) and an HTTP status
//! (server responses).
//!
//! # Error Categories
//! - `Validation`: Missing or empty required caller input
//! - `UnknownTable`: Table or view not present in the store's catalog
//! - `InvalidIdentifier`: Identifier cannot be safely embedded in SQL
//! - `Execution`: The store rejected a statement (syntax, constraint, type)
//! - `Catalog`: The store could not be introspected
//! - `Transport`: Streamed channel or assistant provider unreachable
//! - `Config`: Configuration file or environment errors

use axum::http::StatusCode;
use thiserror::Error;

/// Main error type for sqldesk operations
#[derive(Error, Debug)]
pub enum DeskError {
    /// Bad caller input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Table or view does not exist
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Identifier contains the quoting delimiter or a control character
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Statement rejected by the store
    #[error("SQL execution failed: {0}")]
    Execution(String),

    /// Store unreachable during introspection
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Channel closed or provider unreachable
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration error (invalid JSON, bad bind address, etc.)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DeskError {
    /// Convert error to error code string for JSON output
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::UnknownTable(_) => "UNKNOWN_TABLE",
            Self::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
            Self::Execution(_) => "EXECUTION_ERROR",
            Self::Catalog(_) => "CATALOG_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// HTTP status for this error at the server boundary
    ///
    /// Client-triggerable failures are 400, everything else is 500.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::UnknownTable(_)
            | Self::InvalidIdentifier(_)
            | Self::Execution(_) => StatusCode::BAD_REQUEST,
            Self::Catalog(_) | Self::Transport(_) | Self::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get human-readable error message
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an unknown table error
    pub fn unknown_table(name: impl Into<String>) -> Self {
        Self::UnknownTable(name.into())
    }

    /// Create an invalid identifier error
    pub fn invalid_identifier(message: impl Into<String>) -> Self {
        Self::InvalidIdentifier(message.into())
    }

    /// Create an execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    /// Create a catalog error
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog(message.into())
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Result type alias for sqldesk operations
pub type Result<T> = std::result::Result<T, DeskError>;
