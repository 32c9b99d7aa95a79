//! Orchestrator runner - owns every component and drives the loop
//!
//! One iteration: settle objectives, pick the next phase (tactical tree,
//! then polytopic fallback), apply loop-detection overrides, dispatch
//! through the kernel, record history, save. The loop is single-threaded
//! by design; the only parallelism is the supervised child and its output
//! capture.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use statestore::{DocStore, now_ms};
use tracing::{info, warn};

use crate::analysis::{Analyzer, BasicAnalyzer, BasicSyntaxChecker, SyntaxChecker};
use crate::bus::{BusMessage, MessageBus, MessagePriority, MessageType};
use crate::config::Config;
use crate::conversation::ConversationThread;
use crate::domain::{Objective, ObjectiveLevel, ObjectiveStatus, TaskStatus};
use crate::errors::PipelineError;
use crate::lifecycle::LifecycleStage;
use crate::llm::LlmClient;
use crate::loopdetect::{Blacklist, PatternDetector, scan_history};
use crate::patch::PatchLayer;
use crate::phases::{PhaseEnv, PhaseKernel, PhaseKind, SituationVector, select_next};
use crate::state::StateStore;
use crate::supervisor::{MonitorVerdict, RunMode, Supervisor};

/// Directory under the project holding all pipeline artifacts
pub const PIPELINE_DIR: &str = ".autonomy";

/// Counters reported at shutdown
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct PipelineMetrics {
    pub iterations: u64,
    pub phases_dispatched: u64,
    pub tool_calls: u64,
    pub effects: u64,
    pub forced_transitions: u64,
    pub model_failures: u64,
}

/// Per-run options from the CLI
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub objective: Option<String>,
    pub command: Option<String>,
    pub test_duration_secs: Option<u64>,
    pub success_timeout_secs: Option<u64>,
    pub detach: bool,
    pub debug_qa: bool,
    pub max_iterations: u64,
}

impl RunOptions {
    pub fn with_defaults(mut self) -> Self {
        if self.max_iterations == 0 {
            self.max_iterations = 256;
        }
        self
    }
}

pub struct Orchestrator {
    project_root: PathBuf,
    ipc_dir: PathBuf,
    reports_dir: PathBuf,
    logs_dir: PathBuf,
    config: Config,
    kernel: PhaseKernel,
    store: StateStore,
    bus: MessageBus,
    history_doc: DocStore,
    patcher: PatchLayer,
    analyzer: Box<dyn Analyzer>,
    llm: Arc<dyn LlmClient>,
    conversations: HashMap<PhaseKind, ConversationThread>,
    blacklist: Blacklist,
    detector: PatternDetector,
    supervisor: Supervisor,
    metrics: PipelineMetrics,
    wrapup_step: u8,
    /// Forced transitions acknowledged by the user up to this index
    forced_ack: usize,
    abort: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(project_root: PathBuf, config: Config, llm: Arc<dyn LlmClient>) -> Result<Self, PipelineError> {
        let pipeline_dir = project_root.join(PIPELINE_DIR);
        let store = StateStore::open(&pipeline_dir)?;

        let bus = MessageBus::new(config.bus.history_cap);
        let history_doc = DocStore::open(pipeline_dir.join("messages").join("history.json"))?;
        if let Some(history) = history_doc.load::<Vec<BusMessage>>()? {
            bus.restore_history(history);
        }

        let checker: Arc<dyn SyntaxChecker> = Arc::new(BasicSyntaxChecker);
        let patcher = PatchLayer::new(&project_root, pipeline_dir.join("patches"), checker)?;

        let detector = PatternDetector::new(config.thresholds.failure_streak);
        let blacklist = Blacklist::new(config.thresholds.blacklist_cooldown_ms);
        let supervisor = Supervisor::new(config.supervisor.clone());

        // Standing broadcast subscriptions
        bus.subscribe(PhaseKind::Planning.name(), &[MessageType::IssueReported, MessageType::TaskCompleted]);
        bus.subscribe(PhaseKind::Refactoring.name(), &[MessageType::IssueReported]);
        bus.subscribe(PhaseKind::Documentation.name(), &[MessageType::TaskCompleted]);
        bus.subscribe(PhaseKind::ProjectPlanning.name(), &[MessageType::PhaseCompleted]);

        Ok(Self {
            ipc_dir: pipeline_dir.join("ipc"),
            reports_dir: pipeline_dir.join("reports"),
            logs_dir: pipeline_dir.join("logs"),
            project_root,
            config,
            kernel: PhaseKernel::new(),
            store,
            bus,
            history_doc,
            patcher,
            analyzer: Box::new(BasicAnalyzer::default()),
            llm,
            conversations: HashMap::new(),
            blacklist,
            detector,
            supervisor,
            metrics: PipelineMetrics::default(),
            wrapup_step: 0,
            forced_ack: 0,
            abort: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut StateStore {
        &mut self.store
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Abort flag shared with the Ctrl-C handler
    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    /// Make sure there is an active objective, synthesizing one if needed
    fn bootstrap_objectives(&mut self, objective_arg: Option<&str>) {
        if !self.store.state().objectives.is_empty() {
            return;
        }

        let title = objective_arg
            .map(|s| s.to_string())
            .or_else(|| {
                // First heading of the master plan document, when present
                let plan = std::fs::read_to_string(self.project_root.join("MASTER_PLAN.md")).ok()?;
                plan.lines()
                    .find(|l| l.starts_with('#'))
                    .map(|l| l.trim_start_matches('#').trim().to_string())
            })
            .unwrap_or_else(|| "Deliver the project objectives".to_string());

        let mut objective = Objective::new(title, ObjectiveLevel::Primary);
        objective.status = ObjectiveStatus::Active;
        let obj_id = objective.id.clone();

        // Adopt pre-existing orphan tasks
        let orphans: Vec<String> = self
            .store
            .state()
            .tasks
            .values()
            .filter(|t| t.objective_id.is_none())
            .map(|t| t.id.clone())
            .collect();
        for task_id in &orphans {
            objective.add_task(task_id.clone());
        }
        self.store.upsert_objective(objective);
        for task_id in orphans {
            if let Some(task) = self.store.get_task_mut(&task_id) {
                task.objective_id = Some(obj_id.clone());
            }
        }

        info!(objective = %obj_id, "bootstrapped primary objective");
    }

    /// Close out zero-task objectives and keep exactly one active
    fn advance_objectives(&mut self) {
        self.store.state_mut().refresh_objective_completion();

        let autocompleted: Vec<String> = self
            .store
            .state()
            .objectives
            .values()
            .filter(|o| o.should_autocomplete())
            .map(|o| o.id.clone())
            .collect();
        for id in autocompleted {
            if let Some(objective) = self.store.get_objective_mut(&id) {
                objective.status = ObjectiveStatus::Completed;
                info!(objective = %id, "zero-task objective auto-completed");
            }
        }

        let has_active = self
            .store
            .state()
            .objectives
            .values()
            .any(|o| o.status == ObjectiveStatus::Active);
        if !has_active {
            let next: Option<String> = self
                .store
                .state()
                .objectives
                .values()
                .find(|o| !o.is_terminal())
                .map(|o| o.id.clone());
            if let Some(id) = next
                && let Some(objective) = self.store.get_objective_mut(&id)
            {
                objective.status = ObjectiveStatus::Active;
            }
        }
    }

    fn situation(&self) -> SituationVector {
        let state = self.store.state();
        let errors = state.tasks_with_status(TaskStatus::NeedsFixes).len();
        SituationVector {
            has_errors: errors > 0,
            error_severity: (errors as f32 / 5.0).min(1.0),
            complexity: (state.tasks.len() as f32 / 50.0).min(1.0),
            urgency: if state.has_critical_pending() { 1.0 } else { 0.3 },
            completion_ratio: state.completion_ratio(),
        }
    }

    /// Forced transitions repeating themselves is the meta-loop signal
    fn meta_loop_detected(&self) -> bool {
        let window = self.config.thresholds.history_window;
        let transitions = &self.store.state().forced_transitions[self.forced_ack..];
        if window == 0 || transitions.len() < window {
            return false;
        }
        let tail = &transitions[transitions.len() - window..];
        let first = (&tail[0].from, &tail[0].to);
        tail.iter().all(|t| (&t.from, &t.to) == first)
    }

    fn print_recent_history(&self) {
        let history = &self.store.state().phase_history;
        let window = self.config.thresholds.history_window.max(1);
        eprintln!("Recent phase history:");
        for entry in history.iter().rev().take(window).rev() {
            eprintln!("  {} (success: {})", entry.phase, entry.success);
        }
    }

    /// Block for a human decision; EOF or empty input aborts the run
    async fn request_user_input(&self, reason: &str) -> Result<(), PipelineError> {
        self.bus.publish(
            BusMessage::broadcast("orchestrator", MessageType::UserInputRequired)
                .with_priority(MessagePriority::Critical)
                .with_payload(serde_json::json!({"reason": reason})),
        );
        eprintln!("Pipeline needs input ({}). Press enter to continue, Ctrl-D to abort:", reason);

        let line = tokio::task::spawn_blocking(|| {
            let mut buffer = String::new();
            std::io::stdin().read_line(&mut buffer).map(|n| (n, buffer))
        })
        .await
        .map_err(|e| PipelineError::UnrecoverableLoop {
            reason: format!("input worker failed: {}", e),
        })?;

        match line {
            Ok((n, _)) if n > 0 => Ok(()),
            _ => {
                self.print_recent_history();
                Err(PipelineError::UnrecoverableLoop {
                    reason: reason.to_string(),
                })
            }
        }
    }

    fn save_all(&mut self) -> Result<(), PipelineError> {
        self.store.save()?;
        self.history_doc.save(&self.bus.history_snapshot())?;
        Ok(())
    }

    /// Main loop; returns the process exit code
    pub async fn run(&mut self, options: RunOptions) -> Result<i32, PipelineError> {
        let options = options.with_defaults();
        self.bootstrap_objectives(options.objective.as_deref());

        let mut pending_forced: Option<PhaseKind> = None;
        let mut soft_hint: Option<PhaseKind> = None;
        let mut iteration: u64 = 0;

        loop {
            if self.abort.load(Ordering::Relaxed) {
                warn!("user abort; saving state");
                self.save_all()?;
                return Err(PipelineError::UserAbort);
            }

            iteration += 1;
            self.metrics.iterations = iteration;
            if iteration > options.max_iterations {
                self.print_recent_history();
                self.save_all()?;
                return Err(PipelineError::UnrecoverableLoop {
                    reason: format!("no convergence after {} iterations", options.max_iterations),
                });
            }

            self.advance_objectives();

            let stage = LifecycleStage::from_ratio(self.store.state().completion_ratio());
            let duplicates = stage == LifecycleStage::Consolidation
                && !self.analyzer.detect_duplicates(&self.project_root).is_empty();

            // Decide: forced transition first, then QA-focus, then the tree
            let mut decision = match pending_forced.take() {
                Some(phase) => super::Decision::Dispatch {
                    phase,
                    task_id: None,
                    reason: "forced_transition",
                },
                None => {
                    let qa_first = options.debug_qa
                        && !self.store.state().tasks_with_status(TaskStatus::QaPending).is_empty();
                    if qa_first {
                        let task_id = self
                            .store
                            .state()
                            .tasks_with_status(TaskStatus::QaPending)
                            .first()
                            .map(|t| t.id.clone());
                        super::Decision::Dispatch {
                            phase: PhaseKind::Qa,
                            task_id,
                            reason: "debug_qa",
                        }
                    } else {
                        super::decide(
                            self.store.state(),
                            &self.config,
                            iteration,
                            duplicates,
                            self.wrapup_step,
                        )
                    }
                }
            };

            if decision == super::Decision::Fallback {
                let current = self.store.state().current_phase.unwrap_or(PhaseKind::Planning);
                let situation = self.situation();
                let weights = self.config.selection_weights();
                let now = now_ms();
                let phase = soft_hint
                    .filter(|hint| current.adjacencies().contains(hint) && !self.blacklist.is_banned(*hint, now))
                    .or_else(|| {
                        select_next(
                            current,
                            &situation,
                            &weights,
                            |p| self.config.profile_for(p),
                            self.config.meta_phases_enabled,
                        )
                        .filter(|p| !self.blacklist.is_banned(*p, now))
                    })
                    .unwrap_or(PhaseKind::Planning);
                decision = super::Decision::Dispatch {
                    phase,
                    task_id: None,
                    reason: "polytopic",
                };
            }
            soft_hint = None;

            let (mut phase, mut task_id, reason) = match decision {
                super::Decision::Dispatch { phase, task_id, reason } => (phase, task_id, reason),
                super::Decision::Complete => {
                    info!("all objectives complete");
                    self.save_all()?;
                    return self.finish(&options).await;
                }
                super::Decision::Fallback => unreachable!("fallback resolved above"),
            };

            self.wrapup_step = match reason {
                "wrapup_documentation" => 1,
                "wrapup_project_planning" => 2,
                _ if self.wrapup_step == 2 => 2,
                _ => 0,
            };

            // Coordinator-level loop break: the same phase K times in a row
            // gets overridden through the polytopic selector
            let window = self.config.thresholds.history_window;
            if let Some(spinning) = scan_history(&self.store.state().phase_history, window)
                && spinning == phase
            {
                let situation = self.situation();
                let weights = self.config.selection_weights();
                let now = now_ms();
                let replacement = select_next(
                    spinning,
                    &situation,
                    &weights,
                    |p| self.config.profile_for(p),
                    self.config.meta_phases_enabled,
                )
                .filter(|p| *p != spinning && !self.blacklist.is_banned(*p, now))
                .unwrap_or_else(|| spinning.forced_transition_target());

                warn!(from = %spinning, to = %replacement, "history loop; overriding dispatch");
                self.store
                    .state_mut()
                    .record_forced_transition(spinning, replacement, "history_loop");
                self.store.reset_no_update_count(spinning);
                self.metrics.forced_transitions += 1;
                phase = replacement;
                task_id = None;
            }

            // Failure-signature patterns: learn them, blacklist the
            // implicated phase, escalate when forced transitions meta-loop
            let diagnostics = self.detector.detect(self.store.state(), &self.bus);
            let now = now_ms();
            for diagnostic in &diagnostics {
                self.store.state_mut().learn_pattern(diagnostic.signature.clone());
                if let Some(implicated) = diagnostic.phase {
                    self.blacklist.ban(implicated, now);
                }
            }

            if self.meta_loop_detected() {
                self.request_user_input("forced transitions are looping").await?;
                self.forced_ack = self.store.state().forced_transitions.len();
            }

            // Dispatch
            info!(phase = %phase, reason, task = ?task_id, iteration, "dispatching");
            let outcome = {
                let mut env = PhaseEnv {
                    store: &mut self.store,
                    conversations: &mut self.conversations,
                    llm: &self.llm,
                    bus: &self.bus,
                    patcher: &self.patcher,
                    analyzer: &*self.analyzer,
                    checker: &BasicSyntaxChecker,
                    config: &self.config,
                    project_root: &self.project_root,
                    ipc_dir: &self.ipc_dir,
                    reports_dir: &self.reports_dir,
                };
                self.kernel.execute(phase, task_id, &mut env).await
            };

            self.store.state_mut().record_history(phase, outcome.success);
            self.metrics.phases_dispatched += 1;
            self.metrics.tool_calls += outcome.tool_calls as u64;
            self.metrics.effects += outcome.effects as u64;
            if !outcome.success && outcome.tool_calls == 0 {
                self.metrics.model_failures += 1;
            }
            if outcome.forced {
                self.metrics.forced_transitions += 1;
                pending_forced = outcome.next_phase;
            } else {
                soft_hint = outcome.next_phase;
            }

            self.save_all()?;
        }
    }

    /// Post-completion: run the program under test per the run mode
    async fn finish(&mut self, options: &RunOptions) -> Result<i32, PipelineError> {
        if let Some(command) = &options.command {
            let log_path = self.logs_dir.join("child.log");
            let mut handle = self.supervisor.start(command, &self.project_root, &[], log_path)?;

            let test_duration = Duration::from_secs(options.test_duration_secs.unwrap_or(30));
            let mode = if options.detach {
                RunMode::Detach {
                    health_window: Duration::from_secs(options.success_timeout_secs.unwrap_or(5)),
                }
            } else if let Some(extended) = options.success_timeout_secs {
                RunMode::SuccessTimeout {
                    initial: test_duration,
                    extended: Duration::from_secs(extended),
                }
            } else {
                RunMode::Fixed(test_duration)
            };

            match self.supervisor.monitor(&mut handle, mode).await? {
                MonitorVerdict::CleanRun => info!("program under test ran clean"),
                MonitorVerdict::Detached => {
                    println!("Program left running. Stop it with: {}", handle.stop_command());
                }
                MonitorVerdict::EarlyExit(code) if code != 0 => {
                    warn!(code, "program under test exited early");
                    let _ = crate::reports::write_issue_report(
                        &self.reports_dir,
                        "early-exit",
                        "Program under test exited during monitoring",
                        &format!("Exit code: {}. See logs/child.log.", code),
                        None,
                    );
                    return Ok(1);
                }
                MonitorVerdict::EarlyExit(_) => info!("program under test exited cleanly"),
            }
        }

        if self.config.push_token().is_some() {
            info!("push credential present; patch archive is ready for publication");
        }

        let summary = serde_json::to_string_pretty(&self.metrics).unwrap_or_default();
        info!("pipeline metrics: {}", summary);
        println!(
            "Pipeline complete: {} iterations, {} phases dispatched, {} tool calls, {} forced transitions.",
            self.metrics.iterations,
            self.metrics.phases_dispatched,
            self.metrics.tool_calls,
            self.metrics.forced_transitions
        );
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Task;
    use crate::llm::{ChatResponse, MockLlmClient, ToolCall};
    use tempfile::tempdir;

    fn orchestrator(root: &std::path::Path, responses: Vec<ChatResponse>) -> Orchestrator {
        Orchestrator::new(
            root.to_path_buf(),
            Config::default(),
            Arc::new(MockLlmClient::new(responses)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_bootstrap_creates_primary_objective() {
        let temp = tempdir().unwrap();
        let mut orch = orchestrator(temp.path(), vec![]);

        orch.bootstrap_objectives(Some("Ship the parser"));

        let objectives: Vec<_> = orch.store().state().objectives.values().collect();
        assert_eq!(objectives.len(), 1);
        assert_eq!(objectives[0].title, "Ship the parser");
        assert_eq!(objectives[0].status, ObjectiveStatus::Active);
    }

    #[tokio::test]
    async fn test_bootstrap_adopts_orphan_tasks() {
        let temp = tempdir().unwrap();
        let mut orch = orchestrator(temp.path(), vec![]);
        let task = Task::new("orphan work", None, None);
        let task_id = task.id.clone();
        orch.store_mut().upsert_task(task);

        orch.bootstrap_objectives(None);

        let objective = orch.store().state().objectives.values().next().unwrap().clone();
        assert!(objective.task_ids.contains(&task_id));
        assert_eq!(
            orch.store().state().tasks[&task_id].objective_id,
            Some(objective.id.clone())
        );
        assert!(orch.store().state().validate().is_ok());
    }

    #[tokio::test]
    async fn test_zero_task_objective_autocompleted() {
        let temp = tempdir().unwrap();
        let mut orch = orchestrator(temp.path(), vec![]);

        let mut stale = Objective::new("finished already", ObjectiveLevel::Primary);
        stale.completion_pct = 100.0;
        stale.status = ObjectiveStatus::Active;
        let stale_id = stale.id.clone();
        orch.store_mut().upsert_objective(stale);

        let fresh = Objective::new("next up", ObjectiveLevel::Secondary);
        let fresh_id = fresh.id.clone();
        orch.store_mut().upsert_objective(fresh);

        orch.advance_objectives();

        let state = orch.store().state();
        assert_eq!(state.objectives[&stale_id].status, ObjectiveStatus::Completed);
        // The remaining objective took over as active
        assert_eq!(state.objectives[&fresh_id].status, ObjectiveStatus::Active);
    }

    #[tokio::test]
    async fn test_meta_loop_detection_window() {
        let temp = tempdir().unwrap();
        let mut orch = orchestrator(temp.path(), vec![]);
        assert!(!orch.meta_loop_detected());

        for _ in 0..5 {
            orch.store_mut().state_mut().record_forced_transition(
                PhaseKind::Documentation,
                PhaseKind::ProjectPlanning,
                "no_updates_threshold",
            );
        }
        assert!(orch.meta_loop_detected());

        // Acknowledged transitions stop counting
        orch.forced_ack = orch.store().state().forced_transitions.len();
        assert!(!orch.meta_loop_detected());
    }

    #[tokio::test]
    async fn test_single_task_clean_run() {
        // Scenario: planning proposes one task, coding writes the file,
        // wrap-up runs documentation and project planning, then exit 0
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("MASTER_PLAN.md"), "# Build x.py\n\nOne function.\n").unwrap();

        let responses = vec![
            // planning
            ChatResponse::with_tool_calls(vec![ToolCall::new(
                "create_task",
                serde_json::json!({"description": "implement x.py", "target_file": "x.py", "priority": "HIGH"}),
            )]),
            // coding
            ChatResponse::with_tool_calls(vec![ToolCall::new(
                "create_file",
                serde_json::json!({"filepath": "x.py", "content": "def main():\n    return 0\n"}),
            )]),
            // wrap-up documentation
            ChatResponse::text("documentation reviewed"),
            // wrap-up project planning
            ChatResponse::text("objective met"),
        ];

        let mut orch = orchestrator(temp.path(), responses);
        let exit = orch
            .run(RunOptions {
                max_iterations: 16,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(exit, 0);
        assert!(temp.path().join("x.py").exists());

        let state = orch.store().state();
        assert_eq!(state.tasks.len(), 1);
        let task = state.tasks.values().next().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);

        // One patch was archived
        let patches: Vec<_> = std::fs::read_dir(temp.path().join(PIPELINE_DIR).join("patches"))
            .unwrap()
            .collect();
        assert_eq!(patches.len(), 1);

        // state.json exists and parses
        let raw = std::fs::read_to_string(temp.path().join(PIPELINE_DIR).join("state.json")).unwrap();
        assert!(raw.contains("COMPLETED"));
    }

    #[tokio::test]
    async fn test_syntax_error_routes_to_debugging() {
        // Scenario: coding emits a broken payload; the file is written, a
        // NEEDS_FIXES task appears, and the next dispatch is debugging
        let temp = tempdir().unwrap();

        let responses = vec![
            // planning
            ChatResponse::with_tool_calls(vec![ToolCall::new(
                "create_task",
                serde_json::json!({"description": "implement app.py", "target_file": "app.py"}),
            )]),
            // coding writes a syntactically broken file
            ChatResponse::with_tool_calls(vec![ToolCall::new(
                "create_file",
                serde_json::json!({"filepath": "app.py", "content": "def f( :\n"}),
            )]),
        ];

        let mut orch = orchestrator(temp.path(), responses);
        // The run errors out when the mock script is exhausted; that is fine,
        // we only care about the state it leaves behind
        let _ = orch
            .run(RunOptions {
                max_iterations: 3,
                ..Default::default()
            })
            .await;

        assert!(temp.path().join("app.py").exists());
        let state = orch.store().state();
        let needs_fixes = state.tasks_with_status(TaskStatus::NeedsFixes);
        assert_eq!(needs_fixes.len(), 1);
        assert_eq!(needs_fixes[0].target_file.as_deref(), Some("app.py"));

        // The next tactical decision is debugging with that task
        match super::super::decide(state, &Config::default(), 3, false, 0) {
            super::super::Decision::Dispatch { phase, task_id, .. } => {
                assert_eq!(phase, PhaseKind::Debugging);
                assert_eq!(task_id.as_deref(), Some(needs_fixes[0].id.as_str()));
            }
            other => panic!("unexpected decision {:?}", other),
        }
    }
}
