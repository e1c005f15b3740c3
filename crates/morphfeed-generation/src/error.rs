use morphfeed_core::{ErrorMetadata, FailureKind, LogLevel};
use std::time::Duration;

/// Longest provider error body kept in an error message.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Failure of one generation invocation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvocationError {
    #[error("Generation endpoint rejected credentials (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    #[error("Generation endpoint rate limited the request: {message}")]
    RateLimited { message: String },

    #[error("Generation endpoint failed (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Generation request timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("Network error calling generation endpoint: {0}")]
    Network(String),

    #[error("Unexpected response from generation endpoint: {message}")]
    Protocol { status: Option<u16>, message: String },

    #[error("Invalid generation request: {0}")]
    InvalidRequest(String),

    #[error("Generation failed after {attempts} attempt(s), last error {last_kind}: {message}")]
    RetriesExhausted {
        last_kind: FailureKind,
        attempts: u32,
        message: String,
    },

    /// A non-retryable failure that arrived after earlier transient ones.
    #[error("{source} (after {attempts} attempts)")]
    AfterRetries {
        attempts: u32,
        source: Box<InvocationError>,
    },
}

impl InvocationError {
    pub fn kind(&self) -> FailureKind {
        match self {
            InvocationError::Auth { .. } => FailureKind::Auth,
            InvocationError::RateLimited { .. } => FailureKind::RateLimited,
            InvocationError::Server { .. } => FailureKind::Server,
            InvocationError::Timeout { .. } => FailureKind::Timeout,
            InvocationError::Network(_) => FailureKind::Network,
            InvocationError::Protocol { .. } => FailureKind::Protocol,
            InvocationError::InvalidRequest(_) => FailureKind::Validation,
            InvocationError::RetriesExhausted { last_kind, .. } => *last_kind,
            InvocationError::AfterRetries { source, .. } => source.kind(),
        }
    }

    /// Whether the invocation layer may try the same request again.
    pub fn is_retryable(&self) -> bool {
        match self {
            InvocationError::RetriesExhausted { .. } | InvocationError::AfterRetries { .. } => false,
            other => other.kind().is_transient(),
        }
    }

    /// Attempts made before this error was surfaced.
    pub fn attempts(&self) -> u32 {
        match self {
            InvocationError::RetriesExhausted { attempts, .. }
            | InvocationError::AfterRetries { attempts, .. } => *attempts,
            _ => 1,
        }
    }

    /// Attach the attempt count to a terminal error surfaced by the retry loop.
    pub fn after_attempts(self, attempts: u32) -> Self {
        match self {
            InvocationError::RetriesExhausted { .. } | InvocationError::AfterRetries { .. } => self,
            err if attempts > 1 => InvocationError::AfterRetries {
                attempts,
                source: Box::new(err),
            },
            err => err,
        }
    }
}

/// Map an HTTP status to an invocation error. Returns `None` for 2xx.
pub fn classify_status(status: u16, body: &str) -> Option<InvocationError> {
    if (200..300).contains(&status) {
        return None;
    }

    let message = truncate_body(body);
    let err = match status {
        401 => InvocationError::Auth { status, message },
        429 => InvocationError::RateLimited { message },
        s if s >= 500 => InvocationError::Server { status, message },
        _ => InvocationError::Protocol {
            status: Some(status),
            message,
        },
    };
    Some(err)
}

fn truncate_body(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return "Unknown error".to_string();
    }
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body.to_string();
    }
    let mut truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    truncated.push_str("...");
    truncated
}

impl From<reqwest::Error> for InvocationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            InvocationError::Protocol {
                status: err.status().map(|s| s.as_u16()),
                message: err.to_string(),
            }
        } else if err.is_builder() {
            InvocationError::InvalidRequest(err.to_string())
        } else {
            InvocationError::Network(err.to_string())
        }
    }
}

impl ErrorMetadata for InvocationError {
    fn error_code(&self) -> &'static str {
        match self {
            InvocationError::Auth { .. } => "GENERATION_AUTH_FAILED",
            InvocationError::RateLimited { .. } => "GENERATION_RATE_LIMITED",
            InvocationError::Server { .. } => "GENERATION_SERVER_ERROR",
            InvocationError::Timeout { .. } => "GENERATION_TIMEOUT",
            InvocationError::Network(_) => "GENERATION_NETWORK_ERROR",
            InvocationError::Protocol { .. } => "GENERATION_PROTOCOL_ERROR",
            InvocationError::InvalidRequest(_) => "GENERATION_INVALID_REQUEST",
            InvocationError::RetriesExhausted { .. } => "GENERATION_RETRIES_EXHAUSTED",
            InvocationError::AfterRetries { source, .. } => source.error_code(),
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            InvocationError::RetriesExhausted { last_kind, .. } => last_kind.is_transient(),
            InvocationError::AfterRetries { source, .. } => source.is_recoverable(),
            other => other.kind().is_transient(),
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            InvocationError::AfterRetries { source, .. } => source.log_level(),
            InvocationError::InvalidRequest(_) => LogLevel::Debug,
            InvocationError::RateLimited { .. }
            | InvocationError::Timeout { .. }
            | InvocationError::RetriesExhausted { .. } => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }

    fn client_message(&self) -> String {
        match self {
            InvocationError::AfterRetries { source, .. } => source.client_message(),
            InvocationError::Auth { .. } => {
                "The generation service rejected our credentials".to_string()
            }
            InvocationError::RateLimited { .. } => {
                "The generation service is busy, please try again shortly".to_string()
            }
            InvocationError::InvalidRequest(msg) => msg.clone(),
            InvocationError::RetriesExhausted { .. }
            | InvocationError::Server { .. }
            | InvocationError::Timeout { .. }
            | InvocationError::Network(_) => {
                "The generation service is temporarily unavailable".to_string()
            }
            InvocationError::Protocol { .. } => {
                "The generation service returned an unexpected response".to_string()
            }
        }
    }
}
