//! PipelineState - aggregate root owned by the main loop
//!
//! Tasks, objectives, and per-phase counters live here, keyed by id. The
//! aggregate is the single unit of persistence; the orchestrator is its
//! only writer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use statestore::now_ms;

use crate::domain::{Objective, Priority, Task, TaskCategory, TaskStatus};
use crate::phases::PhaseKind;

/// Per-phase execution counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhaseRecord {
    #[serde(default)]
    pub run_count: u32,

    #[serde(default)]
    pub success_count: u32,

    #[serde(default)]
    pub last_result: Option<String>,

    /// Consecutive executions that produced no effect-carrying tool call
    #[serde(default)]
    pub no_update_count: u32,

    #[serde(default)]
    pub last_run_at: Option<i64>,
}

/// One dispatched phase execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseHistoryEntry {
    pub phase: PhaseKind,
    pub at: i64,
    pub success: bool,
}

/// A loop-break override, recorded for diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForcedTransition {
    pub from: PhaseKind,
    pub to: PhaseKind,
    pub reason: String,
    pub at: i64,
}

/// A failure signature the pattern detector has seen repeat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnedPattern {
    pub signature: String,
    pub occurrences: u32,
    pub last_seen: i64,
}

/// One fix attempt against a file, for repeated-failure detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixRecord {
    pub file: String,
    pub error_signature: String,
    pub phase: PhaseKind,
    pub success: bool,
    pub at: i64,
}

/// Aggregate root for everything the pipeline persists
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineState {
    #[serde(default)]
    pub tasks: BTreeMap<String, Task>,

    #[serde(default)]
    pub objectives: BTreeMap<String, Objective>,

    /// Keyed by phase name
    #[serde(default)]
    pub phase_records: BTreeMap<String, PhaseRecord>,

    #[serde(default)]
    pub current_phase: Option<PhaseKind>,

    /// Append-only across saves
    #[serde(default)]
    pub phase_history: Vec<PhaseHistoryEntry>,

    #[serde(default)]
    pub forced_transitions: Vec<ForcedTransition>,

    #[serde(default)]
    pub learned_patterns: BTreeMap<String, LearnedPattern>,

    #[serde(default)]
    pub fix_history: Vec<FixRecord>,

    /// Fields written by other versions of the pipeline; preserved verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PipelineState {
    pub fn phase_record(&self, phase: PhaseKind) -> Option<&PhaseRecord> {
        self.phase_records.get(phase.name())
    }

    /// Lazily created on first access; never destroyed
    pub fn phase_record_mut(&mut self, phase: PhaseKind) -> &mut PhaseRecord {
        self.phase_records.entry(phase.name().to_string()).or_default()
    }

    pub fn record_history(&mut self, phase: PhaseKind, success: bool) {
        self.phase_history.push(PhaseHistoryEntry {
            phase,
            at: now_ms(),
            success,
        });
        self.current_phase = Some(phase);
    }

    pub fn record_forced_transition(&mut self, from: PhaseKind, to: PhaseKind, reason: impl Into<String>) {
        self.forced_transitions.push(ForcedTransition {
            from,
            to,
            reason: reason.into(),
            at: now_ms(),
        });
    }

    pub fn record_fix(&mut self, file: impl Into<String>, signature: impl Into<String>, phase: PhaseKind, success: bool) {
        self.fix_history.push(FixRecord {
            file: file.into(),
            error_signature: signature.into(),
            phase,
            success,
            at: now_ms(),
        });
    }

    pub fn learn_pattern(&mut self, signature: impl Into<String>) {
        let signature = signature.into();
        let entry = self
            .learned_patterns
            .entry(signature.clone())
            .or_insert_with(|| LearnedPattern {
                signature,
                occurrences: 0,
                last_seen: 0,
            });
        entry.occurrences += 1;
        entry.last_seen = now_ms();
    }

    /// Insert a task unless its fingerprint already exists; links the
    /// owning objective. Proposing the same work twice is a no-op.
    pub fn upsert_task(&mut self, task: Task) -> bool {
        if self.tasks.contains_key(&task.id) {
            return false;
        }
        if let Some(obj_id) = &task.objective_id
            && let Some(objective) = self.objectives.get_mut(obj_id)
        {
            objective.add_task(task.id.clone());
        }
        self.tasks.insert(task.id.clone(), task);
        true
    }

    pub fn upsert_objective(&mut self, objective: Objective) -> bool {
        if self.objectives.contains_key(&objective.id) {
            return false;
        }
        self.objectives.insert(objective.id.clone(), objective);
        true
    }

    /// Remove a task and every objective membership pointing at it
    pub fn remove_task(&mut self, id: &str) -> Option<Task> {
        for objective in self.objectives.values_mut() {
            objective.task_ids.retain(|t| t != id);
        }
        self.tasks.remove(id)
    }

    // === Task queries used by the tactical tree ===

    pub fn tasks_with_status(&self, status: TaskStatus) -> Vec<&Task> {
        self.tasks.values().filter(|t| t.status == status).collect()
    }

    /// Highest-priority ready general task, oldest first within a priority
    /// level; refactoring and documentation backlogs have their own phases
    pub fn next_pending_task(&self) -> Option<&Task> {
        let completed: Vec<&str> = self
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Completed)
            .map(|t| t.id.as_str())
            .collect();

        self.tasks
            .values()
            .filter(|t| t.category == TaskCategory::General && t.is_ready(&completed))
            .max_by(|a, b| a.priority.cmp(&b.priority).then(b.created_at.cmp(&a.created_at)))
    }

    pub fn pending_refactoring_tasks(&self) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|t| t.category == TaskCategory::Refactoring && !t.status.is_terminal())
            .collect()
    }

    pub fn pending_documentation_tasks(&self) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|t| t.category == TaskCategory::Documentation && t.is_pending())
            .collect()
    }

    /// Fraction of tasks completed, 0..=1; empty task map counts as 0
    pub fn completion_ratio(&self) -> f32 {
        if self.tasks.is_empty() {
            return 0.0;
        }
        let done = self.tasks.values().filter(|t| t.status == TaskStatus::Completed).count();
        done as f32 / self.tasks.len() as f32
    }

    pub fn all_tasks_completed(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.values().all(|t| t.status.is_terminal())
    }

    /// Recompute each objective's completion percentage from its members
    pub fn refresh_objective_completion(&mut self) {
        let statuses: BTreeMap<String, TaskStatus> =
            self.tasks.iter().map(|(id, t)| (id.clone(), t.status)).collect();

        for objective in self.objectives.values_mut() {
            if objective.task_ids.is_empty() {
                continue;
            }
            let done = objective
                .task_ids
                .iter()
                .filter(|id| statuses.get(*id) == Some(&TaskStatus::Completed))
                .count();
            objective.completion_pct = 100.0 * done as f32 / objective.task_ids.len() as f32;
        }
    }

    /// Referential integrity: every task id an objective holds must resolve
    pub fn validate(&self) -> Result<(), String> {
        for objective in self.objectives.values() {
            for task_id in &objective.task_ids {
                if !self.tasks.contains_key(task_id) {
                    return Err(format!(
                        "objective {} references missing task {}",
                        objective.id, task_id
                    ));
                }
            }
        }
        Ok(())
    }

    /// Critical-priority pending task, if any (drives urgency scoring)
    pub fn has_critical_pending(&self) -> bool {
        self.tasks
            .values()
            .any(|t| t.priority == Priority::Critical && !t.status.is_terminal())
    }
}
