//! Model client - unified RPC to remote model servers
//!
//! Phases talk to specialist models through the [`LlmClient`] trait. The
//! production implementation walks a configured fallback host list; tests
//! use the scripted mock.

mod client;
mod error;
mod remote;
mod types;

pub use client::{LlmClient, MockLlmClient};
pub use error::LlmError;
pub use remote::ModelServerClient;
pub use types::{ChatMessage, ChatRequest, ChatResponse, ModelRole, Role, ToolCall, ToolDefinition};

use std::sync::Arc;

use crate::config::LlmConfig;

/// Build the production client from configuration
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    Ok(Arc::new(ModelServerClient::from_config(config)?))
}
