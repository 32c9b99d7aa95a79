//! StateStore - durable home of the PipelineState
//!
//! One JSON artifact per project, replaced atomically on every save. Saves
//! are serialized by the single-writer design; the advisory lock in the
//! underlying [`DocStore`] rejects a second process outright.

use std::path::Path;

use statestore::{DocStore, StoreError};
use tracing::{debug, info};

use crate::domain::{Objective, Task};
use crate::phases::PhaseKind;

use super::pipeline::PipelineState;

/// File name of the state artifact inside the pipeline directory
pub const STATE_FILE: &str = "state.json";

/// Owns the in-memory [`PipelineState`] and its on-disk document
pub struct StateStore {
    doc: DocStore,
    state: PipelineState,
}

impl StateStore {
    /// Load existing state or start fresh; corrupt state fails loudly
    pub fn open(pipeline_dir: &Path) -> Result<Self, StoreError> {
        let doc = DocStore::open(pipeline_dir.join(STATE_FILE))?;
        let state = match doc.load::<PipelineState>()? {
            Some(state) => {
                info!(
                    tasks = state.tasks.len(),
                    objectives = state.objectives.len(),
                    "Loaded pipeline state"
                );
                state
            }
            None => {
                info!("No state artifact; starting fresh");
                PipelineState::default()
            }
        };
        Ok(Self { doc, state })
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut PipelineState {
        &mut self.state
    }

    /// Persist the aggregate (write-temp, fsync, rename)
    pub fn save(&self) -> Result<(), StoreError> {
        self.doc.save(&self.state)
    }

    // === Counter mutators ===

    /// Returns the new count
    pub fn increment_no_update_count(&mut self, phase: PhaseKind) -> u32 {
        let record = self.state.phase_record_mut(phase);
        record.no_update_count += 1;
        debug!(phase = %phase, count = record.no_update_count, "no-update count incremented");
        record.no_update_count
    }

    pub fn reset_no_update_count(&mut self, phase: PhaseKind) {
        self.state.phase_record_mut(phase).no_update_count = 0;
    }

    pub fn record_phase_execution(&mut self, phase: PhaseKind, success: bool) {
        let record = self.state.phase_record_mut(phase);
        record.run_count += 1;
        if success {
            record.success_count += 1;
        }
        record.last_run_at = Some(statestore::now_ms());
    }

    // === Task CRUD ===

    /// Insert a task unless its fingerprint already exists
    ///
    /// Proposing the same work twice is a no-op; returns whether the task
    /// was actually inserted.
    pub fn upsert_task(&mut self, task: Task) -> bool {
        let inserted = self.state.upsert_task(task);
        if !inserted {
            debug!("task already known; proposal ignored");
        }
        inserted
    }

    pub fn get_task(&self, id: &str) -> Option<&Task> {
        self.state.tasks.get(id)
    }

    pub fn get_task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.state.tasks.get_mut(id)
    }

    /// Remove a task and its memberships
    pub fn remove_task(&mut self, id: &str) -> Option<Task> {
        self.state.remove_task(id)
    }

    // === Objective CRUD ===

    pub fn upsert_objective(&mut self, objective: Objective) -> bool {
        self.state.upsert_objective(objective)
    }

    pub fn get_objective_mut(&mut self, id: &str) -> Option<&mut Objective> {
        self.state.objectives.get_mut(id)
    }
}
