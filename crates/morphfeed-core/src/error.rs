//! Error types module
//!
//! `AssetError` covers everything the asset state machine can reject. It is
//! raised synchronously and is never retried: it always points at a caller bug
//! (double processing, publishing an unfinished asset) or at bad input.
//!
//! `FailureKind` is the flat taxonomy shared by every crate so branch failures,
//! log lines and run reports can name an error class without carrying the
//! original error value around.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

use crate::models::AssetStatus;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like rate limits
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error should be reported and whether the
/// surrounding user action is worth retrying.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "NOT_READY")
    fn error_code(&self) -> &'static str;

    /// Whether repeating the whole user action may succeed
    fn is_recoverable(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;
}

/// Error classes used across the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Auth,
    RateLimited,
    Server,
    Timeout,
    Network,
    Protocol,
    Validation,
    NotReady,
    IllegalTransition,
    Composition,
    Storage,
    Persistence,
    Source,
    Aggregate,
}

impl FailureKind {
    /// Transient classes that the invocation layer retries.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FailureKind::RateLimited
                | FailureKind::Server
                | FailureKind::Timeout
                | FailureKind::Network
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Auth => "auth",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::Server => "server",
            FailureKind::Timeout => "timeout",
            FailureKind::Network => "network",
            FailureKind::Protocol => "protocol",
            FailureKind::Validation => "validation",
            FailureKind::NotReady => "not_ready",
            FailureKind::IllegalTransition => "illegal_transition",
            FailureKind::Composition => "composition",
            FailureKind::Storage => "storage",
            FailureKind::Persistence => "persistence",
            FailureKind::Source => "source",
            FailureKind::Aggregate => "aggregate",
        }
    }
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the asset state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssetError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Asset {asset_id} is not ready for publishing (status: {status})")]
    NotReady { asset_id: Uuid, status: AssetStatus },

    #[error("Illegal transition for asset {asset_id}: {from} -> {to}")]
    IllegalTransition {
        asset_id: Uuid,
        from: AssetStatus,
        to: AssetStatus,
    },
}

impl AssetError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AssetError::Validation(_) => FailureKind::Validation,
            AssetError::NotReady { .. } => FailureKind::NotReady,
            AssetError::IllegalTransition { .. } => FailureKind::IllegalTransition,
        }
    }
}

impl ErrorMetadata for AssetError {
    fn error_code(&self) -> &'static str {
        match self {
            AssetError::Validation(_) => "VALIDATION_ERROR",
            AssetError::NotReady { .. } => "NOT_READY",
            AssetError::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }

    fn log_level(&self) -> LogLevel {
        match self {
            AssetError::Validation(_) => LogLevel::Debug,
            // Both indicate a caller driving the state machine incorrectly
            AssetError::NotReady { .. } | AssetError::IllegalTransition { .. } => LogLevel::Error,
        }
    }

    fn client_message(&self) -> String {
        match self {
            AssetError::Validation(msg) => msg.clone(),
            AssetError::NotReady { .. } => {
                "Only finished generations can be published".to_string()
            }
            AssetError::IllegalTransition { .. } => {
                "This generation is already being processed".to_string()
            }
        }
    }
}
