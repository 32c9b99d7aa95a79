//! Bus message types and filters

use serde::{Deserialize, Serialize};
use statestore::now_ms;

/// Delivery priority; greater is more urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessagePriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// Enumerated message kinds carried on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    PhaseStarted,
    PhaseCompleted,
    TaskCreated,
    TaskUpdated,
    TaskCompleted,
    IssueReported,
    IssueResolved,
    QaApproval,
    ReviewRequested,
    ForcedTransition,
    UserInputRequired,
    Request,
    Response,
    Info,
}

/// Message destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recipient {
    Phase(String),
    Broadcast,
}

/// One bus message; ids and timestamps are assigned at construction and
/// preserved through history round-trips
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    pub id: String,

    pub sender: String,

    pub recipient: Recipient,

    pub message_type: MessageType,

    #[serde(default)]
    pub priority: MessagePriority,

    #[serde(default)]
    pub payload: serde_json::Value,

    // Correlation fields
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub objective_id: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub issue_id: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,

    #[serde(default)]
    pub requires_response: bool,

    /// Unix milliseconds after which the message is dropped unread
    #[serde(default)]
    pub expires_at: Option<i64>,

    pub created_at: i64,
}

impl BusMessage {
    pub fn new(sender: impl Into<String>, recipient: Recipient, message_type: MessageType) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            sender: sender.into(),
            recipient,
            message_type,
            priority: MessagePriority::Normal,
            payload: serde_json::Value::Null,
            task_id: None,
            objective_id: None,
            file_path: None,
            issue_id: None,
            request_id: None,
            requires_response: false,
            expires_at: None,
            created_at: now_ms(),
        }
    }

    pub fn broadcast(sender: impl Into<String>, message_type: MessageType) -> Self {
        Self::new(sender, Recipient::Broadcast, message_type)
    }

    pub fn to_phase(sender: impl Into<String>, phase: impl Into<String>, message_type: MessageType) -> Self {
        Self::new(sender, Recipient::Phase(phase.into()), message_type)
    }

    pub fn with_priority(mut self, priority: MessagePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn expiring_at(mut self, at: i64) -> Self {
        self.expires_at = Some(at);
        self
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|t| t <= now)
    }

    /// One-line rendering for console logging of critical traffic
    pub fn summary(&self) -> String {
        format!(
            "[{:?}] {} -> {:?}: {}",
            self.message_type,
            self.sender,
            self.recipient,
            self.payload
                .as_str()
                .map(|s| s.to_string())
                .unwrap_or_else(|| self.payload.to_string())
        )
    }
}

/// Filter for inbox reads and history search; all fields are conjunctive
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    pub types: Option<Vec<MessageType>>,
    pub min_priority: Option<MessagePriority>,
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub task_id: Option<String>,
    pub file_path: Option<String>,
    pub request_id: Option<String>,
    pub sender: Option<String>,
}

impl MessageFilter {
    pub fn of_types(types: &[MessageType]) -> Self {
        Self {
            types: Some(types.to_vec()),
            ..Default::default()
        }
    }

    pub fn matches(&self, msg: &BusMessage) -> bool {
        if let Some(types) = &self.types
            && !types.contains(&msg.message_type)
        {
            return false;
        }
        if let Some(min) = self.min_priority
            && msg.priority < min
        {
            return false;
        }
        if let Some(since) = self.since
            && msg.created_at < since
        {
            return false;
        }
        if let Some(until) = self.until
            && msg.created_at > until
        {
            return false;
        }
        if let Some(task_id) = &self.task_id
            && msg.task_id.as_deref() != Some(task_id.as_str())
        {
            return false;
        }
        if let Some(file_path) = &self.file_path
            && msg.file_path.as_deref() != Some(file_path.as_str())
        {
            return false;
        }
        if let Some(request_id) = &self.request_id
            && msg.request_id.as_deref() != Some(request_id.as_str())
        {
            return false;
        }
        if let Some(sender) = &self.sender
            && msg.sender != *sender
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_ids_are_unique() {
        let a = BusMessage::broadcast("planning", MessageType::Info);
        let b = BusMessage::broadcast("planning", MessageType::Info);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(MessagePriority::Low < MessagePriority::Normal);
        assert!(MessagePriority::High < MessagePriority::Critical);
    }

    #[test]
    fn test_filter_by_type_and_priority() {
        let msg = BusMessage::broadcast("qa", MessageType::IssueReported).with_priority(MessagePriority::High);

        assert!(MessageFilter::of_types(&[MessageType::IssueReported]).matches(&msg));
        assert!(!MessageFilter::of_types(&[MessageType::TaskCreated]).matches(&msg));

        let filter = MessageFilter {
            min_priority: Some(MessagePriority::Critical),
            ..Default::default()
        };
        assert!(!filter.matches(&msg));
    }

    #[test]
    fn test_filter_by_correlation() {
        let msg = BusMessage::to_phase("qa", "debugging", MessageType::IssueReported)
            .with_task("task-1")
            .with_file("src/app.py");

        let filter = MessageFilter {
            task_id: Some("task-1".to_string()),
            file_path: Some("src/app.py".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&msg));

        let filter = MessageFilter {
            task_id: Some("task-2".to_string()),
            ..Default::default()
        };
        assert!(!filter.matches(&msg));
    }

    #[test]
    fn test_expiration() {
        let msg = BusMessage::broadcast("x", MessageType::Info).expiring_at(100);
        assert!(msg.is_expired(100));
        assert!(!msg.is_expired(99));

        let msg = BusMessage::broadcast("x", MessageType::Info);
        assert!(!msg.is_expired(i64::MAX));
    }

    #[test]
    fn test_message_serde_round_trip() {
        let msg = BusMessage::to_phase("planning", "coding", MessageType::TaskCreated)
            .with_task("task-abc")
            .with_payload(serde_json::json!({"description": "build"}));

        let json = serde_json::to_string(&msg).unwrap();
        let back: BusMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }
}
