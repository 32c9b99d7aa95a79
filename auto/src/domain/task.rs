//! Task - the unit of work

use serde::{Deserialize, Serialize};
use statestore::now_ms;

use super::id::task_fingerprint;
use super::priority::Priority;

/// Workflow status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    New,
    InProgress,
    QaPending,
    NeedsFixes,
    Completed,
    Failed,
    Blocked,
}

impl TaskStatus {
    /// Terminal states are never left except by opening a new task
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Rank used for the monotonic-advance check
    fn rank(self) -> u8 {
        match self {
            Self::New => 0,
            Self::InProgress => 1,
            Self::QaPending => 2,
            Self::NeedsFixes => 2,
            Self::Blocked => 3,
            Self::Completed => 4,
            Self::Failed => 4,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::New => "NEW",
            Self::InProgress => "IN_PROGRESS",
            Self::QaPending => "QA_PENDING",
            Self::NeedsFixes => "NEEDS_FIXES",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Blocked => "BLOCKED",
        };
        write!(f, "{}", s)
    }
}

/// Broad kind of work a task represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    #[default]
    General,
    Refactoring,
    Documentation,
}

/// A unit of work with a content-derived stable id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Fingerprint of (description, target file, objective id)
    pub id: String,

    pub description: String,

    /// File this task targets, when it has one
    #[serde(default)]
    pub target_file: Option<String>,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub category: TaskCategory,

    /// Number of executions attempted against this task
    #[serde(default)]
    pub attempts: u32,

    #[serde(default)]
    pub completed: bool,

    /// Ids of tasks that must complete first
    #[serde(default)]
    pub deps: Vec<String>,

    #[serde(default)]
    pub objective_id: Option<String>,

    pub created_at: i64,

    #[serde(default)]
    pub completed_at: Option<i64>,

    /// Fields written by other versions of the pipeline; preserved verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Task {
    /// Create a task; the id is derived from the identity fields
    pub fn new(description: impl Into<String>, target_file: Option<String>, objective_id: Option<String>) -> Self {
        let description = description.into();
        let id = task_fingerprint(&description, target_file.as_deref(), objective_id.as_deref());
        Self {
            id,
            description,
            target_file,
            status: TaskStatus::New,
            priority: Priority::NewTask,
            category: TaskCategory::General,
            attempts: 0,
            completed: false,
            deps: Vec::new(),
            objective_id,
            created_at: now_ms(),
            completed_at: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: TaskCategory) -> Self {
        self.category = category;
        self
    }

    pub fn add_dependency(&mut self, dep_id: impl Into<String>) {
        self.deps.push(dep_id.into());
    }

    /// Advance the status, enforcing the monotonic-progress invariant
    ///
    /// Terminal tasks and rank regressions are rejected; reopening finished
    /// work requires a fresh task. Returns whether the transition applied.
    pub fn advance_status(&mut self, status: TaskStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        // NEEDS_FIXES -> QA_PENDING and back is legitimate churn at equal rank
        if status.rank() < self.status.rank() && status != TaskStatus::InProgress {
            return false;
        }
        self.status = status;
        if status == TaskStatus::Completed {
            self.completed = true;
            self.completed_at = Some(now_ms());
        }
        true
    }

    /// Developer review override; bypasses the monotonic-advance check
    pub fn review_override(&mut self, status: TaskStatus) {
        self.status = status;
        if status == TaskStatus::Completed {
            self.completed = true;
            self.completed_at = Some(now_ms());
        } else {
            self.completed = false;
            self.completed_at = None;
        }
    }

    pub fn record_attempt(&mut self) {
        self.attempts += 1;
    }

    /// Ready to be worked: NEW with all dependencies completed
    pub fn is_ready(&self, completed_ids: &[&str]) -> bool {
        self.status == TaskStatus::New && self.deps.iter().all(|d| completed_ids.contains(&d.as_str()))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, TaskStatus::New | TaskStatus::InProgress)
    }
}
