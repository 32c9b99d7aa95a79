//! Per-phase rolling conversation threads
//!
//! Each phase owns one thread. The system message is pinned at index 0 and
//! never pruned; once the thread outgrows its configured size the middle is
//! spliced out and replaced with a synthetic assistant summary. Policy
//! (what to keep) is separate from mechanism (how to splice):
//! summarization is best-effort and falls back to a one-line placeholder.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::ConversationConfig;
use crate::llm::{ChatMessage, ChatRequest, ChatResponse, LlmClient, LlmError, Role, ToolDefinition};

/// Rolling dialog for one phase
#[derive(Debug, Clone)]
pub struct ConversationThread {
    messages: Vec<ChatMessage>,
    max_messages: usize,
    keep_recent: usize,
}

impl ConversationThread {
    pub fn new(system_prompt: impl Into<String>, config: &ConversationConfig) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt)],
            max_messages: config.max_messages.max(3),
            keep_recent: config.keep_recent.max(1),
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>, origin_model: Option<String>) {
        self.messages.push(ChatMessage::assistant(content, origin_model));
    }

    fn needs_prune(&self) -> bool {
        self.messages.len() > self.max_messages
    }

    /// Messages that would be spliced out by the next prune
    fn prune_range(&self) -> std::ops::Range<usize> {
        let end = self.messages.len().saturating_sub(self.keep_recent);
        1..end.max(1)
    }

    /// Splice the middle out, inserting the summary (or a placeholder) as a
    /// synthetic assistant message right after the system message
    fn apply_prune(&mut self, summary: Option<String>) {
        let range = self.prune_range();
        if range.is_empty() {
            return;
        }
        let elided = range.len();
        let replacement = match summary {
            Some(text) => format!("[summary of {} earlier messages] {}", elided, text),
            None => format!("[{} earlier messages elided]", elided),
        };
        self.messages
            .splice(range, [ChatMessage::assistant(replacement, None)]);
        debug!(elided, remaining = self.messages.len(), "conversation pruned");
    }

    /// Run one exchange: append the user message, prune if oversized, call
    /// the model, append its reply
    pub async fn converse(
        &mut self,
        llm: &Arc<dyn LlmClient>,
        model: &str,
        user_message: impl Into<String>,
        tools: Vec<ToolDefinition>,
        max_tokens: u32,
    ) -> Result<ChatResponse, LlmError> {
        self.push_user(user_message);

        if self.needs_prune() {
            let summary = summarize_segment(llm, model, &self.messages[self.prune_range()]).await;
            self.apply_prune(summary);
        }

        let request = ChatRequest {
            model: model.to_string(),
            messages: self.messages.clone(),
            tools,
            max_tokens,
        };

        let response = llm.chat(request).await?;

        let reply = match &response.content {
            Some(text) if !text.is_empty() => text.clone(),
            _ => {
                let names: Vec<&str> = response.tool_calls.iter().map(|c| c.name.as_str()).collect();
                format!("[requested tools: {}]", names.join(", "))
            }
        };
        self.push_assistant(reply, response.model.clone());

        Ok(response)
    }
}

/// Best-effort summarization of a segment; `None` means fall back to the
/// placeholder
async fn summarize_segment(llm: &Arc<dyn LlmClient>, model: &str, segment: &[ChatMessage]) -> Option<String> {
    if segment.is_empty() {
        return None;
    }

    let transcript: String = segment
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            format!("{}: {}\n", role, m.content)
        })
        .collect();

    let request = ChatRequest {
        model: model.to_string(),
        messages: vec![
            ChatMessage::system(
                "Summarize the following conversation segment in a few sentences. \
                 Keep file names, task ids, and decisions. Output only the summary.",
            ),
            ChatMessage::user(transcript),
        ],
        tools: vec![],
        max_tokens: 512,
    };

    match llm.chat(request).await {
        Ok(response) => response.content.filter(|c| !c.trim().is_empty()),
        Err(e) => {
            warn!(error = %e, "summarization failed; using placeholder");
            None
        }
    }
}
