//! Task and refactoring-backlog tools

use async_trait::async_trait;
use serde_json::Value;

use crate::bus::{BusMessage, MessageType};
use crate::domain::{ObjectiveStatus, Priority, Task, TaskCategory, TaskStatus};
use crate::tools::{Tool, ToolCategory, ToolCtx, ToolOutcome};

fn parse_priority(args: &Value) -> Priority {
    args["priority"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

fn parse_status(args: &Value) -> Option<TaskStatus> {
    args["status"]
        .as_str()
        .and_then(|s| serde_json::from_value(Value::String(s.to_string())).ok())
}

/// Shared by the task and refactoring-task creators
fn create_task_with_category(tool: &'static str, args: &Value, ctx: &mut ToolCtx<'_>, category: TaskCategory) -> ToolOutcome {
    let Some(description) = args["description"].as_str() else {
        return ToolOutcome::failed(tool, "description is required");
    };
    let target_file = args["target_file"]
        .as_str()
        .or_else(|| args["filepath"].as_str())
        .map(|s| s.to_string());
    // Unattributed tasks join the active objective
    let objective_id = args["objective_id"].as_str().map(|s| s.to_string()).or_else(|| {
        ctx.state
            .objectives
            .values()
            .find(|o| o.status == ObjectiveStatus::Active)
            .map(|o| o.id.clone())
    });

    let mut task = Task::new(description, target_file, objective_id)
        .with_priority(parse_priority(args))
        .with_category(category);

    if let Some(deps) = args["deps"].as_array() {
        for dep in deps.iter().filter_map(|d| d.as_str()) {
            task.add_dependency(dep);
        }
    }

    let task_id = task.id.clone();
    let created = ctx.state.upsert_task(task);

    if created {
        ctx.bus.publish(
            BusMessage::broadcast(ctx.phase.name(), MessageType::TaskCreated)
                .with_task(task_id.clone())
                .with_payload(serde_json::json!({"description": description})),
        );
    }

    // Re-proposing known work is a successful no-op with the same id
    let outcome = ToolOutcome::ok(tool, serde_json::json!({"task_id": task_id, "created": created}));
    if created { outcome.with_effect() } else { outcome }
}

pub struct CreateTaskTool;

#[async_trait]
impl Tool for CreateTaskTool {
    fn name(&self) -> &'static str {
        "create_task"
    }

    fn description(&self) -> &'static str {
        "Create a work task. The task id is derived from its content; duplicates are no-ops."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::TaskOps
    }

    fn schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "description": { "type": "string" },
                "target_file": { "type": "string" },
                "objective_id": { "type": "string" },
                "priority": { "type": "string", "description": "CRITICAL|HIGH|MEDIUM|LOW|NEW_TASK" },
                "deps": { "type": "array", "description": "Ids of prerequisite tasks" }
            },
            "required": ["description"]
        })
    }

    async fn execute(&self, args: &Value, ctx: &mut ToolCtx<'_>) -> ToolOutcome {
        create_task_with_category(self.name(), args, ctx, TaskCategory::General)
    }
}

pub struct UpdateTaskTool;

#[async_trait]
impl Tool for UpdateTaskTool {
    fn name(&self) -> &'static str {
        "update_task"
    }

    fn description(&self) -> &'static str {
        "Update a task's status or priority. Status only moves forward; finished tasks are frozen."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::TaskOps
    }

    fn schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task_id": { "type": "string" },
                "status": { "type": "string", "description": "NEW|IN_PROGRESS|QA_PENDING|NEEDS_FIXES|COMPLETED|FAILED|BLOCKED" },
                "priority": { "type": "string" }
            },
            "required": ["task_id"]
        })
    }

    async fn execute(&self, args: &Value, ctx: &mut ToolCtx<'_>) -> ToolOutcome {
        let Some(task_id) = args["task_id"].as_str() else {
            return ToolOutcome::failed(self.name(), "task_id is required");
        };
        let status = parse_status(args);
        let priority = args["priority"].as_str().and_then(|s| s.parse::<Priority>().ok());

        let Some(task) = ctx.state.tasks.get_mut(task_id) else {
            return ToolOutcome::failed(self.name(), format!("unknown task '{}'", task_id));
        };

        let mut changed = false;
        if let Some(status) = status {
            if task.advance_status(status) {
                changed = true;
            } else {
                return ToolOutcome::failed(
                    self.name(),
                    format!("transition to {} rejected for task {} ({})", status, task_id, task.status),
                );
            }
        }
        if let Some(priority) = priority {
            task.priority = priority;
            changed = true;
        }

        let status_now = task.status;
        if changed {
            ctx.bus.publish(
                BusMessage::broadcast(ctx.phase.name(), MessageType::TaskUpdated)
                    .with_task(task_id.to_string())
                    .with_payload(serde_json::json!({"status": status_now})),
            );
        }

        let outcome = ToolOutcome::ok(self.name(), serde_json::json!({"task_id": task_id, "status": status_now}));
        if changed { outcome.with_effect() } else { outcome }
    }
}

pub struct CompleteTaskTool;

#[async_trait]
impl Tool for CompleteTaskTool {
    fn name(&self) -> &'static str {
        "complete_task"
    }

    fn description(&self) -> &'static str {
        "Mark a task COMPLETED."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::TaskOps
    }

    fn schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task_id": { "type": "string" }
            },
            "required": ["task_id"]
        })
    }

    async fn execute(&self, args: &Value, ctx: &mut ToolCtx<'_>) -> ToolOutcome {
        let Some(task_id) = args["task_id"].as_str() else {
            return ToolOutcome::failed(self.name(), "task_id is required");
        };

        let Some(task) = ctx.state.tasks.get_mut(task_id) else {
            return ToolOutcome::failed(self.name(), format!("unknown task '{}'", task_id));
        };

        if !task.advance_status(TaskStatus::Completed) {
            return ToolOutcome::failed(self.name(), format!("task {} cannot complete from {}", task_id, task.status));
        }

        ctx.state.refresh_objective_completion();
        ctx.bus.publish(
            BusMessage::broadcast(ctx.phase.name(), MessageType::TaskCompleted).with_task(task_id.to_string()),
        );

        ToolOutcome::ok(self.name(), serde_json::json!({"task_id": task_id})).with_effect()
    }
}

pub struct CreateRefactoringTaskTool;

#[async_trait]
impl Tool for CreateRefactoringTaskTool {
    fn name(&self) -> &'static str {
        "create_refactoring_task"
    }

    fn description(&self) -> &'static str {
        "Add a task to the persistent refactoring backlog, with priority and dependencies."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::TaskOps
    }

    fn schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "description": { "type": "string" },
                "target_file": { "type": "string" },
                "priority": { "type": "string" },
                "deps": { "type": "array" }
            },
            "required": ["description"]
        })
    }

    async fn execute(&self, args: &Value, ctx: &mut ToolCtx<'_>) -> ToolOutcome {
        create_task_with_category(self.name(), args, ctx, TaskCategory::Refactoring)
    }
}

pub struct UpdateRefactoringTaskTool;

#[async_trait]
impl Tool for UpdateRefactoringTaskTool {
    fn name(&self) -> &'static str {
        "update_refactoring_task"
    }

    fn description(&self) -> &'static str {
        "Update a refactoring task's status or priority."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::TaskOps
    }

    fn schema(&self) -> Value {
        UpdateTaskTool.schema()
    }

    async fn execute(&self, args: &Value, ctx: &mut ToolCtx<'_>) -> ToolOutcome {
        let outcome = UpdateTaskTool.execute(args, ctx).await;
        ToolOutcome {
            tool: self.name().to_string(),
            ..outcome
        }
    }
}

pub struct ListRefactoringTasksTool;

#[async_trait]
impl Tool for ListRefactoringTasksTool {
    fn name(&self) -> &'static str {
        "list_refactoring_tasks"
    }

    fn description(&self) -> &'static str {
        "List the refactoring backlog."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::TaskOps
    }

    fn schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: &Value, ctx: &mut ToolCtx<'_>) -> ToolOutcome {
        let tasks: Vec<Value> = ctx
            .state
            .pending_refactoring_tasks()
            .iter()
            .map(|t| {
                serde_json::json!({
                    "task_id": t.id,
                    "description": t.description,
                    "status": t.status,
                    "priority": t.priority,
                    "deps": t.deps,
                })
            })
            .collect();
        ToolOutcome::ok(self.name(), serde_json::json!({"tasks": tasks}))
    }
}

pub struct RefactoringProgressTool;

#[async_trait]
impl Tool for RefactoringProgressTool {
    fn name(&self) -> &'static str {
        "refactoring_progress"
    }

    fn description(&self) -> &'static str {
        "Summarize refactoring backlog progress."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::TaskOps
    }

    fn schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: &Value, ctx: &mut ToolCtx<'_>) -> ToolOutcome {
        let all: Vec<&Task> = ctx
            .state
            .tasks
            .values()
            .filter(|t| t.category == TaskCategory::Refactoring)
            .collect();
        let count_where = |status: TaskStatus| all.iter().filter(|t| t.status == status).count();

        ToolOutcome::ok(
            self.name(),
            serde_json::json!({
                "total": all.len(),
                "completed": count_where(TaskStatus::Completed),
                "blocked": count_where(TaskStatus::Blocked),
                "pending": all.iter().filter(|t| !t.status.is_terminal()).count(),
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{BasicAnalyzer, BasicSyntaxChecker};
    use crate::bus::{MessageBus, MessageFilter};
    use crate::patch::PatchLayer;
    use crate::phases::PhaseKind;
    use crate::state::PipelineState;
    use std::sync::Arc;
    use tempfile::{TempDir, tempdir};

    struct Fixture {
        temp: TempDir,
        patcher: PatchLayer,
        bus: MessageBus,
        state: PipelineState,
        analyzer: BasicAnalyzer,
    }

    fn fixture() -> Fixture {
        let temp = tempdir().unwrap();
        let patcher =
            PatchLayer::new(temp.path(), temp.path().join("patches"), Arc::new(BasicSyntaxChecker)).unwrap();
        Fixture {
            temp,
            patcher,
            bus: MessageBus::new(50),
            state: PipelineState::default(),
            analyzer: BasicAnalyzer::default(),
        }
    }

    macro_rules! ctx {
        ($fx:ident) => {
            ToolCtx {
                state: &mut $fx.state,
                bus: &$fx.bus,
                patcher: &$fx.patcher,
                analyzer: &$fx.analyzer,
                checker: &BasicSyntaxChecker,
                project_root: $fx.temp.path(),
                reports_dir: $fx.temp.path(),
                phase: PhaseKind::Planning,
                known_tools: vec![],
            }
        };
    }

    #[tokio::test]
    async fn test_create_task_then_duplicate_is_noop() {
        let mut fx = fixture();
        let mut ctx = ctx!(fx);
        let args = serde_json::json!({"description": "build parser", "target_file": "parser.py"});

        let first = CreateTaskTool.execute(&args, &mut ctx).await;
        assert!(first.success);
        assert!(first.effect);
        assert_eq!(first.details["created"], true);

        let second = CreateTaskTool.execute(&args, &mut ctx).await;
        assert!(second.success);
        assert!(!second.effect);
        assert_eq!(second.details["created"], false);
        assert_eq!(first.details["task_id"], second.details["task_id"]);

        assert_eq!(fx.state.tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_update_task_rejects_regression() {
        let mut fx = fixture();
        let mut task = Task::new("done work", None, None);
        task.advance_status(TaskStatus::Completed);
        let id = task.id.clone();
        fx.state.upsert_task(task);

        let mut ctx = ctx!(fx);
        let outcome = UpdateTaskTool
            .execute(&serde_json::json!({"task_id": id, "status": "IN_PROGRESS"}), &mut ctx)
            .await;
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn test_complete_task_publishes_and_refreshes() {
        let mut fx = fixture();
        let task = Task::new("work", None, None);
        let id = task.id.clone();
        fx.state.upsert_task(task);

        let mut ctx = ctx!(fx);
        let outcome = CompleteTaskTool
            .execute(&serde_json::json!({"task_id": id}), &mut ctx)
            .await;
        assert!(outcome.success);

        let events = fx.bus.search(&MessageFilter::of_types(&[MessageType::TaskCompleted]));
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_refactoring_backlog_tools() {
        let mut fx = fixture();
        let mut ctx = ctx!(fx);

        let created = CreateRefactoringTaskTool
            .execute(
                &serde_json::json!({"description": "dedupe parsers", "priority": "HIGH"}),
                &mut ctx,
            )
            .await;
        assert!(created.success);

        let listed = ListRefactoringTasksTool.execute(&serde_json::json!({}), &mut ctx).await;
        assert_eq!(listed.details["tasks"].as_array().unwrap().len(), 1);

        let progress = RefactoringProgressTool.execute(&serde_json::json!({}), &mut ctx).await;
        assert_eq!(progress.details["total"], 1);
        assert_eq!(progress.details["pending"], 1);
        assert!(!progress.effect);
    }
}
