//! Tactical decision tree - deterministic next-phase selection
//!
//! The tree runs before any scoring: concrete work always beats heuristic
//! selection. Only when no rule fires does the orchestrator fall back to
//! polytopic selection over the current phase's neighbors.

use crate::config::Config;
use crate::domain::{Priority, TaskCategory, TaskStatus};
use crate::lifecycle::LifecycleStage;
use crate::phases::PhaseKind;
use crate::state::PipelineState;

/// What the tree decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Dispatch {
        phase: PhaseKind,
        task_id: Option<String>,
        reason: &'static str,
    },
    /// Every task is done and the wrap-up sequence has finished
    Complete,
    /// No rule fired; use polytopic selection
    Fallback,
}

impl Decision {
    fn dispatch(phase: PhaseKind, task_id: Option<String>, reason: &'static str) -> Self {
        Self::Dispatch {
            phase,
            task_id,
            reason,
        }
    }
}

/// Walk the tactical tree
///
/// `iteration` drives periodic refactoring; `duplicates_detected` is the
/// duplicate-pattern trigger; `wrapup_step` tracks the finishing sequence
/// (documentation, then project planning, then done).
pub fn decide(
    state: &PipelineState,
    config: &Config,
    iteration: u64,
    duplicates_detected: bool,
    wrapup_step: u8,
) -> Decision {
    let stage = LifecycleStage::from_ratio(state.completion_ratio());

    // Broken builds come first
    if let Some(task) = state
        .tasks_with_status(TaskStatus::NeedsFixes)
        .into_iter()
        .max_by_key(|t| (t.priority, std::cmp::Reverse(t.created_at)))
    {
        return Decision::dispatch(PhaseKind::Debugging, Some(task.id.clone()), "needs_fixes");
    }

    // QA policy is lifecycle-aware: deferred in foundation, batched in the
    // middle, eager at the end
    let qa_pending = state.tasks_with_status(TaskStatus::QaPending);
    if !qa_pending.is_empty() {
        if stage.eager_qa() {
            let task_id = qa_pending.first().map(|t| t.id.clone());
            return Decision::dispatch(PhaseKind::Qa, task_id, "qa_eager");
        }
        if stage.batches_qa() && qa_pending.len() >= config.thresholds.qa_batch_size {
            return Decision::dispatch(PhaseKind::Qa, None, "qa_batch");
        }
        // Foundation defers QA entirely
    }

    // Refactoring triggers
    let refactor_pending = state.pending_refactoring_tasks();
    if stage.refactoring_critical_only() {
        if let Some(task) = refactor_pending
            .iter()
            .find(|t| t.priority == Priority::Critical && t.status != TaskStatus::Blocked)
        {
            return Decision::dispatch(PhaseKind::Refactoring, Some(task.id.clone()), "refactor_critical");
        }
    } else {
        let periodic = stage.periodic_refactoring()
            && config.thresholds.refactor_interval > 0
            && iteration % config.thresholds.refactor_interval as u64 == 0;
        if periodic || duplicates_detected {
            let task_id = refactor_pending
                .iter()
                .find(|t| t.status != TaskStatus::Blocked)
                .map(|t| t.id.clone());
            return Decision::dispatch(
                PhaseKind::Refactoring,
                task_id,
                if periodic { "refactor_periodic" } else { "refactor_duplicates" },
            );
        }
    }

    // Documentation backlog
    if let Some(task) = state.pending_documentation_tasks().first() {
        return Decision::dispatch(PhaseKind::Documentation, Some(task.id.clone()), "documentation_backlog");
    }

    // Ready work goes to coding, highest priority first
    if let Some(task) = state.next_pending_task() {
        return Decision::dispatch(PhaseKind::Coding, Some(task.id.clone()), "pending_task");
    }

    // A task stuck IN_PROGRESS keeps its claim on coding
    if let Some(task) = state
        .tasks
        .values()
        .find(|t| t.status == TaskStatus::InProgress && t.category != TaskCategory::Refactoring)
    {
        return Decision::dispatch(PhaseKind::Coding, Some(task.id.clone()), "in_progress_task");
    }

    // No tasks at all: plan
    if state.tasks.is_empty() {
        return Decision::dispatch(PhaseKind::Planning, None, "no_tasks");
    }

    // Everything terminal: documentation, project planning, done
    if state.all_tasks_completed() {
        return match wrapup_step {
            0 => Decision::dispatch(PhaseKind::Documentation, None, "wrapup_documentation"),
            1 => Decision::dispatch(PhaseKind::ProjectPlanning, None, "wrapup_project_planning"),
            _ => Decision::Complete,
        };
    }

    Decision::Fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Task;

    fn config() -> Config {
        Config::default()
    }

    fn add_task(state: &mut PipelineState, desc: &str, status: TaskStatus) -> String {
        let mut task = Task::new(desc, None, None);
        task.status = status;
        let id = task.id.clone();
        state.tasks.insert(id.clone(), task);
        id
    }

    #[test]
    fn test_needs_fixes_beats_everything() {
        let mut state = PipelineState::default();
        add_task(&mut state, "pending", TaskStatus::New);
        let fix_id = add_task(&mut state, "broken", TaskStatus::NeedsFixes);

        match decide(&state, &config(), 1, false, 0) {
            Decision::Dispatch { phase, task_id, .. } => {
                assert_eq!(phase, PhaseKind::Debugging);
                assert_eq!(task_id, Some(fix_id));
            }
            other => panic!("unexpected decision {:?}", other),
        }
    }

    #[test]
    fn test_qa_deferred_in_foundation() {
        let mut state = PipelineState::default();
        // 0% complete: foundation
        add_task(&mut state, "reviewme", TaskStatus::QaPending);
        add_task(&mut state, "next", TaskStatus::New);

        match decide(&state, &config(), 1, false, 0) {
            Decision::Dispatch { phase, .. } => assert_eq!(phase, PhaseKind::Coding),
            other => panic!("unexpected decision {:?}", other),
        }
    }

    #[test]
    fn test_qa_batched_in_integration() {
        let mut state = PipelineState::default();
        // 4 of 12 complete: integration stage
        for i in 0..4 {
            add_task(&mut state, &format!("done{}", i), TaskStatus::Completed);
        }
        for i in 0..4 {
            add_task(&mut state, &format!("new{}", i), TaskStatus::New);
        }
        // Below the batch size of 5: defer
        for i in 0..4 {
            add_task(&mut state, &format!("qa{}", i), TaskStatus::QaPending);
        }
        match decide(&state, &config(), 1, false, 0) {
            Decision::Dispatch { phase, .. } => assert_eq!(phase, PhaseKind::Coding),
            other => panic!("unexpected decision {:?}", other),
        }

        // At the batch size: QA runs
        add_task(&mut state, "qa5", TaskStatus::QaPending);
        match decide(&state, &config(), 1, false, 0) {
            Decision::Dispatch { phase, task_id, .. } => {
                assert_eq!(phase, PhaseKind::Qa);
                assert!(task_id.is_none());
            }
            other => panic!("unexpected decision {:?}", other),
        }
    }

    #[test]
    fn test_qa_eager_in_completion() {
        let mut state = PipelineState::default();
        for i in 0..9 {
            add_task(&mut state, &format!("done{}", i), TaskStatus::Completed);
        }
        add_task(&mut state, "lastone", TaskStatus::QaPending);

        match decide(&state, &config(), 1, false, 0) {
            Decision::Dispatch { phase, task_id, .. } => {
                assert_eq!(phase, PhaseKind::Qa);
                assert!(task_id.is_some());
            }
            other => panic!("unexpected decision {:?}", other),
        }
    }

    #[test]
    fn test_duplicates_trigger_refactoring() {
        let mut state = PipelineState::default();
        add_task(&mut state, "work", TaskStatus::New);

        match decide(&state, &config(), 1, true, 0) {
            Decision::Dispatch { phase, reason, .. } => {
                assert_eq!(phase, PhaseKind::Refactoring);
                assert_eq!(reason, "refactor_duplicates");
            }
            other => panic!("unexpected decision {:?}", other),
        }
    }

    #[test]
    fn test_completion_only_critical_refactoring() {
        let mut state = PipelineState::default();
        for i in 0..9 {
            add_task(&mut state, &format!("done{}", i), TaskStatus::Completed);
        }
        let mut task = Task::new("tidy", None, None).with_category(TaskCategory::Refactoring);
        task.priority = Priority::Medium;
        state.tasks.insert(task.id.clone(), task);

        // Medium-priority refactoring does not run in completion; with no
        // other work the wrap-up has not started because one task is open
        let decision = decide(&state, &config(), 5, true, 0);
        assert!(
            !matches!(decision, Decision::Dispatch { phase: PhaseKind::Refactoring, .. }),
            "got {:?}",
            decision
        );

        let mut critical = Task::new("urgent arch fix", None, None).with_category(TaskCategory::Refactoring);
        critical.priority = Priority::Critical;
        state.tasks.insert(critical.id.clone(), critical.clone());

        match decide(&state, &config(), 5, false, 0) {
            Decision::Dispatch { phase, task_id, .. } => {
                assert_eq!(phase, PhaseKind::Refactoring);
                assert_eq!(task_id, Some(critical.id));
            }
            other => panic!("unexpected decision {:?}", other),
        }
    }

    #[test]
    fn test_no_tasks_goes_to_planning() {
        let state = PipelineState::default();
        match decide(&state, &config(), 1, false, 0) {
            Decision::Dispatch { phase, .. } => assert_eq!(phase, PhaseKind::Planning),
            other => panic!("unexpected decision {:?}", other),
        }
    }

    #[test]
    fn test_wrapup_sequence() {
        let mut state = PipelineState::default();
        add_task(&mut state, "done", TaskStatus::Completed);

        match decide(&state, &config(), 1, false, 0) {
            Decision::Dispatch { phase, .. } => assert_eq!(phase, PhaseKind::Documentation),
            other => panic!("unexpected decision {:?}", other),
        }
        match decide(&state, &config(), 2, false, 1) {
            Decision::Dispatch { phase, .. } => assert_eq!(phase, PhaseKind::ProjectPlanning),
            other => panic!("unexpected decision {:?}", other),
        }
        assert_eq!(decide(&state, &config(), 3, false, 2), Decision::Complete);
    }

    #[test]
    fn test_pending_task_priority_order() {
        let mut state = PipelineState::default();
        add_task(&mut state, "minor", TaskStatus::New);
        let mut urgent = Task::new("urgent", None, None);
        urgent.priority = Priority::Critical;
        let urgent_id = urgent.id.clone();
        state.tasks.insert(urgent_id.clone(), urgent);

        match decide(&state, &config(), 1, false, 0) {
            Decision::Dispatch { phase, task_id, .. } => {
                assert_eq!(phase, PhaseKind::Coding);
                assert_eq!(task_id, Some(urgent_id));
            }
            other => panic!("unexpected decision {:?}", other),
        }
    }
}
