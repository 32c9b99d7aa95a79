//! LlmClient trait and the scripted mock used by tests

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::error::LlmError;
use super::types::{ChatRequest, ChatResponse};

/// Unified RPC surface to a model server
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// One blocking chat call; either fails with a typed error or returns a
    /// complete response, never a partial one
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;
}

/// Scripted client for tests: pops pre-canned responses in order and
/// records every request it saw
pub struct MockLlmClient {
    responses: Mutex<VecDeque<ChatResponse>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockLlmClient {
    pub fn new(responses: Vec<ChatResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests observed so far
    pub fn seen_requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().expect("mock poisoned").clone()
    }

    pub fn push_response(&self, response: ChatResponse) {
        self.responses.lock().expect("mock poisoned").push_back(response);
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        self.requests.lock().expect("mock poisoned").push(request);
        self.responses
            .lock()
            .expect("mock poisoned")
            .pop_front()
            .ok_or_else(|| LlmError::InvalidResponse("mock script exhausted".to_string()))
    }
}
