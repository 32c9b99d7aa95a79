//! Project lifecycle stage, derived from the completion ratio
//!
//! The stage modulates scheduling thresholds: early on the pipeline builds
//! momentum and defers QA; late it validates everything.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    Foundation,
    Integration,
    Consolidation,
    Completion,
}

impl LifecycleStage {
    /// Stage from the completed-to-total task ratio (0..=1)
    pub fn from_ratio(ratio: f32) -> Self {
        if ratio < 0.25 {
            Self::Foundation
        } else if ratio < 0.50 {
            Self::Integration
        } else if ratio < 0.75 {
            Self::Consolidation
        } else {
            Self::Completion
        }
    }

    /// In foundation, coding marks tasks COMPLETED outright to build
    /// momentum; QA starts participating afterwards
    pub fn skip_qa(self) -> bool {
        self == Self::Foundation
    }

    /// Whether QA waits for a batch of pending tasks before running
    pub fn batches_qa(self) -> bool {
        matches!(self, Self::Integration | Self::Consolidation)
    }

    /// Whether QA runs on every task
    pub fn eager_qa(self) -> bool {
        self == Self::Completion
    }

    /// Whether periodic refactoring triggers apply at this stage
    pub fn periodic_refactoring(self) -> bool {
        self == Self::Consolidation
    }

    /// In completion, refactoring runs only for critical architectural work
    pub fn refactoring_critical_only(self) -> bool {
        self == Self::Completion
    }
}

impl std::fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Foundation => write!(f, "foundation"),
            Self::Integration => write!(f, "integration"),
            Self::Consolidation => write!(f, "consolidation"),
            Self::Completion => write!(f, "completion"),
        }
    }
}
