//! JSON Output Envelope Types
//!
//! Structured JSON output for the one-shot CLI commands. Every command prints
//! exactly one envelope to stdout.
//!
//! # Output Contract
//! - Success: `{"ok": true, "command": "...", "data": {...}, "meta": {...}}`
//! - Error: `{"ok": false, "command": "...", "error": {"code": "...", "message": "..."}}`

use serde::{Deserialize, Serialize};

use crate::error::DeskError;

/// Success envelope for command results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessEnvelope<T> {
    /// Always true for success envelopes
    pub ok: bool,

    /// Command that was executed (tables, schema, query, page)
    pub command: String,

    /// Command-specific data
    pub data: T,

    /// Timing and row metadata
    pub meta: Metadata,
}

impl<T> SuccessEnvelope<T> {
    /// Wrap command output in a success envelope
    pub fn new(command: impl Into<String>, data: T, meta: Metadata) -> Self {
        Self { ok: true, command: command.into(), data, meta }
    }
}

/// Error envelope for command failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Always false for error envelopes
    pub ok: bool,

    /// Command that failed
    pub command: String,

    /// Error code and message
    pub error: ErrorInfo,
}

impl ErrorEnvelope {
    /// Wrap error information in an error envelope
    pub fn new(command: impl Into<String>, error: ErrorInfo) -> Self {
        Self { ok: false, command: command.into(), error }
    }

    /// Create error envelope from a [`DeskError`]
    pub fn from_error(command: impl Into<String>, err: &DeskError) -> Self {
        Self::new(command, ErrorInfo { code: err.error_code().to_string(), message: err.message() })
    }
}

/// Error information structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable error code (e.g., `UNKNOWN_TABLE`, `EXECUTION_ERROR`)
    pub code: String,

    /// Human-readable error message
    pub message: String,
}

impl ErrorInfo {
    /// Create error information from a code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into() }
    }
}

/// Execution metadata included in all success responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Execution time in milliseconds
    pub execution_ms: u64,

    /// Number of rows returned (row-producing commands only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_returned: Option<usize>,
}

impl Metadata {
    /// Metadata without a row count
    #[must_use]
    pub const fn new(execution_ms: u64) -> Self {
        Self { execution_ms, rows_returned: None }
    }

    /// Metadata with a row count
    #[must_use]
    pub const fn with_rows(execution_ms: u64, rows_returned: usize) -> Self {
        Self { execution_ms, rows_returned: Some(rows_returned) }
    }
}
