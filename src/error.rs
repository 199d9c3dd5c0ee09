// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the replication engine.
//!
//! Errors are split by where they stop a run:
//!
//! | Error Type | Fatal | Description |
//! |------------|-------|-------------|
//! | `Connection` | Yes | A store is unreachable before or at the start of a run |
//! | `Filter` | Yes | Caller-supplied filter is malformed (no record touched) |
//! | `Config` | Yes | Configuration invalid |
//! | `Store` | Yes | Unexpected store failure outside the per-record path |
//! | `Internal` | Yes | Unexpected internal error |
//!
//! Per-record copy and delete failures are *not* errors at this level.
//! They are captured in the [`RunSummary`](crate::engine::RunSummary) and
//! never abort a run.
//!
//! [`StoreError`] is what a [`DocumentStore`](crate::store::DocumentStore)
//! returns; the engine inspects [`StoreError::is_connection()`] to decide
//! whether a failure is isolated to one record or ends record processing.

use thiserror::Error;

/// Result type alias for replication operations.
pub type Result<T> = std::result::Result<T, ReplicationError>;

/// Exit code for a run that completed with every record handled.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code for a run with copy/delete failures or an early halt.
pub const EXIT_PARTIAL_FAILURE: u8 = 1;
/// Exit code for a run that never touched data (connection, filter, config).
pub const EXIT_FATAL: u8 = 2;

/// Errors that abort a replication run.
#[derive(Error, Debug)]
pub enum ReplicationError {
    /// A store could not be reached.
    ///
    /// Raised by readiness checks and when the source cursor cannot be
    /// opened. Retrying the whole run later is the recovery path.
    #[error("Connection error ({store}): {message}")]
    Connection { store: String, message: String },

    /// Caller-supplied filter could not be parsed.
    ///
    /// Raised before any store call is made.
    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Store operation failed outside the per-record path.
    #[error("Store error: {0}")]
    Store(StoreError),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReplicationError {
    /// Create a connection error for the named store.
    pub fn connection(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            store: store.into(),
            message: message.into(),
        }
    }

    /// Check if retrying the run later could succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection { .. } => true,
            Self::Store(e) => e.is_connection(),
            Self::Filter(_) => false,
            Self::Config(_) => false,
            Self::Internal(_) => false,
        }
    }

    /// Process exit code for a run that ended with this error.
    pub fn exit_code(&self) -> u8 {
        EXIT_FATAL
    }
}

impl From<StoreError> for ReplicationError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Connection { store, message } => Self::Connection { store, message },
            other => Self::Store(other),
        }
    }
}

/// Errors returned by a document store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Store unreachable, connection refused or dropped, or timed out.
    #[error("store unreachable ({store}): {message}")]
    Connection { store: String, message: String },

    /// Store reachable but the command failed.
    #[error("{operation} failed on {store}: {message}")]
    Operation {
        store: String,
        operation: String,
        message: String,
    },

    /// Stored document could not be encoded or decoded.
    #[error("malformed document: {0}")]
    Codec(String),
}

impl StoreError {
    /// Create a connection error.
    pub fn connection(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            store: store.into(),
            message: message.into(),
        }
    }

    /// Create an operation error.
    pub fn operation(
        store: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Operation {
            store: store.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// True when the store itself is gone, rather than one command failing.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Codec(e.to_string())
    }
}

/// Malformed filter expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("filter must be a JSON object, got {0}")]
    NotAnObject(String),

    #[error("unknown operator `{0}`")]
    UnknownOperator(String),

    #[error("operator `{operator}` expects {expected}")]
    BadOperand {
        operator: String,
        expected: &'static str,
    },

    #[error("condition on `{0}` mixes operators and literal fields")]
    MixedCondition(String),

    #[error("empty field path")]
    EmptyPath,

    #[error("invalid JSON: {0}")]
    Json(String),
}
