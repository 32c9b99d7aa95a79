//! ModelServerClient - HTTP chat client with fallback hosts
//!
//! Walks the configured host list in order. Retryable failures (network,
//! timeout, 5xx, 429) fall through to the next host after a short jittered
//! pause; the terminal failure is a typed [`LlmError::HostsExhausted`].

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::LlmConfig;

use super::client::LlmClient;
use super::error::LlmError;
use super::types::{ChatRequest, ChatResponse, ToolCall};

pub struct ModelServerClient {
    http: Client,
    hosts: Vec<String>,
    timeout: Duration,
}

impl ModelServerClient {
    /// Build from configuration; the host-list environment variable, when
    /// set, overrides the configured hosts
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let hosts = match std::env::var(&config.hosts_env) {
            Ok(raw) if !raw.trim().is_empty() => raw
                .split(',')
                .map(|h| h.trim().trim_end_matches('/').to_string())
                .filter(|h| !h.is_empty())
                .collect(),
            _ => config.hosts.clone(),
        };

        if hosts.is_empty() {
            return Err(LlmError::Config("no model server hosts configured".to_string()));
        }

        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self { http, hosts, timeout })
    }

    fn build_request_body(request: &ChatRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "messages": request.messages.iter().map(|m| m.wire_json()).collect::<Vec<_>>(),
        });
        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(request.tools);
        }
        body
    }

    /// Parse the server response; malformed tool calls come through verbatim
    fn parse_response(value: serde_json::Value) -> Result<ChatResponse, LlmError> {
        let content = value["content"].as_str().map(|s| s.to_string());

        let tool_calls = match value.get("tool_calls") {
            Some(serde_json::Value::Array(calls)) => calls
                .iter()
                .map(|c| ToolCall {
                    name: c["name"].as_str().unwrap_or("").to_string(),
                    arguments: c.get("arguments").cloned().unwrap_or(serde_json::json!({})),
                })
                .collect(),
            _ => Vec::new(),
        };

        if content.is_none() && tool_calls.is_empty() {
            return Err(LlmError::InvalidResponse(
                "response carries neither content nor tool calls".to_string(),
            ));
        }

        Ok(ChatResponse {
            content,
            tool_calls,
            model: value["model"].as_str().map(|s| s.to_string()),
        })
    }

    async fn attempt(&self, host: &str, body: &serde_json::Value) -> Result<ChatResponse, LlmError> {
        let url = format!("{}/api/chat", host);

        let send = self.http.post(&url).json(body).send();
        let response = match tokio::time::timeout(self.timeout, send).await {
            Ok(result) => result?,
            Err(_) => return Err(LlmError::Timeout(self.timeout)),
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError { status, message });
        }

        let value: serde_json::Value = response.json().await?;
        Self::parse_response(value)
    }
}

#[async_trait]
impl LlmClient for ModelServerClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let body = Self::build_request_body(&request);
        let mut last_error = String::new();

        for (i, host) in self.hosts.iter().enumerate() {
            debug!(host = %host, model = %request.model, attempt = i + 1, "model call");
            match self.attempt(host, &body).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() => {
                    warn!(host = %host, error = %e, "model host failed; trying next");
                    last_error = e.to_string();
                    if i + 1 < self.hosts.len() {
                        let jitter = rand::rng().random_range(50..250);
                        tokio::time::sleep(Duration::from_millis(jitter)).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(LlmError::HostsExhausted {
            attempts: self.hosts.len(),
            last: last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::{ChatMessage, ToolDefinition};

    fn request() -> ChatRequest {
        ChatRequest {
            model: "specialist-coder".to_string(),
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("do it")],
            tools: vec![ToolDefinition::new(
                "create_file",
                "Create a file",
                serde_json::json!({"type": "object"}),
            )],
            max_tokens: 4096,
        }
    }

    #[test]
    fn test_build_request_body() {
        let body = ModelServerClient::build_request_body(&request());
        assert_eq!(body["model"], "specialist-coder");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "do it");
        assert_eq!(body["tools"][0]["name"], "create_file");
    }

    #[test]
    fn test_parse_text_response() {
        let response = ModelServerClient::parse_response(serde_json::json!({
            "content": "all good",
            "model": "specialist-coder"
        }))
        .unwrap();
        assert_eq!(response.content.as_deref(), Some("all good"));
        assert!(response.tool_calls.is_empty());
    }

    #[test]
    fn test_parse_tool_call_response() {
        let response = ModelServerClient::parse_response(serde_json::json!({
            "tool_calls": [
                {"name": "create_file", "arguments": {"filepath": "x.py", "content": "pass"}}
            ]
        }))
        .unwrap();
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "create_file");
    }

    #[test]
    fn test_parse_preserves_malformed_tool_call() {
        // Empty name and missing arguments survive parsing untouched; the
        // executor repairs them later
        let response = ModelServerClient::parse_response(serde_json::json!({
            "tool_calls": [{"name": "", }]
        }))
        .unwrap();
        assert_eq!(response.tool_calls[0].name, "");
        assert_eq!(response.tool_calls[0].arguments, serde_json::json!({}));
    }

    #[test]
    fn test_parse_empty_response_is_error() {
        let result = ModelServerClient::parse_response(serde_json::json!({}));
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    }
}
