//! Model client error types

use std::time::Duration;
use thiserror::Error;

/// Errors from remote model calls
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Every configured host failed; the typed terminal error of §7
    #[error("All {attempts} model hosts exhausted; last error: {last}")]
    HostsExhausted { attempts: usize, last: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LlmError {
    /// Whether trying the next fallback host makes sense
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Network(_) => true,
            LlmError::Timeout(_) => true,
            LlmError::ApiError { status, .. } => *status >= 500 || *status == 429,
            LlmError::InvalidResponse(_) => false,
            LlmError::Json(_) => false,
            LlmError::HostsExhausted { .. } => false,
            LlmError::Config(_) => false,
        }
    }
}
