// Error taxonomy surfaced to callers through promise rejection.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numeric class of caller-data validation failures.
pub const VALIDATION_ERROR_CODE: i32 = 400;
/// Numeric class of local/internal failures (decode errors, aborted requests).
pub const INTERNAL_ERROR_CODE: i32 = 500;

/// A structured error carrying a numeric class and message.
///
/// Protocol defects (parseable but out-of-domain server data) never appear
/// here: they are corrected and logged at the translation boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientError {
    /// Caller-supplied data is malformed. Never retried.
    #[error("{code}: {message}")]
    Validation { code: i32, message: String },

    /// The server (or the path to it) rejected the request.
    #[error("{code}: {message}")]
    Remote { code: i32, message: String },

    /// The request was aborted because the client is shutting down.
    #[error("500: Request aborted")]
    Shutdown,
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { code: VALIDATION_ERROR_CODE, message: message.into() }
    }

    pub fn remote(code: i32, message: impl Into<String>) -> Self {
        Self::Remote { code, message: message.into() }
    }

    /// A 500-class failure raised locally while handling a reply.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::remote(INTERNAL_ERROR_CODE, message)
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Validation { code, .. } | Self::Remote { code, .. } => *code,
            Self::Shutdown => INTERNAL_ERROR_CODE,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Validation { message, .. } | Self::Remote { message, .. } => message,
            Self::Shutdown => "Request aborted",
        }
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown)
    }
}
