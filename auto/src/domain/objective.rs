//! Objective - a grouping of tasks with a completion target

use serde::{Deserialize, Serialize};
use statestore::now_ms;

use super::id::objective_fingerprint;

/// Nesting level of an objective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ObjectiveLevel {
    #[default]
    Primary,
    Secondary,
    Tertiary,
}

impl std::fmt::Display for ObjectiveLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary => write!(f, "secondary"),
            Self::Tertiary => write!(f, "tertiary"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ObjectiveStatus {
    #[default]
    Proposed,
    Approved,
    Active,
    Completing,
    Completed,
    Blocked,
}

/// A grouping of tasks the orchestrator drives toward a completion target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Objective {
    pub id: String,

    #[serde(default)]
    pub level: ObjectiveLevel,

    pub title: String,

    #[serde(default)]
    pub status: ObjectiveStatus,

    /// Ids of member tasks; the tasks themselves live in the state task map
    #[serde(default)]
    pub task_ids: Vec<String>,

    /// Percentage of member tasks completed, 0..=100
    #[serde(default)]
    pub completion_pct: f32,

    pub created_at: i64,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Objective {
    pub fn new(title: impl Into<String>, level: ObjectiveLevel) -> Self {
        let title = title.into();
        let id = objective_fingerprint(&title, &level.to_string());
        Self {
            id,
            level,
            title,
            status: ObjectiveStatus::Proposed,
            task_ids: Vec::new(),
            completion_pct: 0.0,
            created_at: now_ms(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn add_task(&mut self, task_id: impl Into<String>) {
        let task_id = task_id.into();
        if !self.task_ids.contains(&task_id) {
            self.task_ids.push(task_id);
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, ObjectiveStatus::Completed | ObjectiveStatus::Blocked)
    }

    /// Zero-task objectives at high completion must be closed on next visit
    /// so the scheduler never burns an iteration on them again.
    pub fn should_autocomplete(&self) -> bool {
        !self.is_terminal() && self.task_ids.is_empty() && self.completion_pct >= 80.0
    }
}
