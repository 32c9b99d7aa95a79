//! Pipeline state - the aggregate root and its durable store

mod pipeline;
mod store;

pub use pipeline::{
    FixRecord, ForcedTransition, LearnedPattern, PhaseHistoryEntry, PhaseRecord, PipelineState,
};
pub use store::{STATE_FILE, StateStore};
