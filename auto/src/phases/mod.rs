//! Phase graph - vertices, edges, and selection profiles
//!
//! The pipeline cycles through a fixed directed graph of phases. Edges are
//! the permitted next-phase transitions; the orchestrator only ever
//! dispatches along an edge (or a forced-transition target, which is itself
//! an edge).

mod kernel;
mod profile;
mod spec;

pub use kernel::{NO_UPDATES_REASON, PhaseEnv, PhaseKernel, PhaseOutcome};
pub use profile::{DimensionalProfile, SituationVector, default_profile, select_next};
pub use spec::{PhaseSpec, spec_for};

use serde::{Deserialize, Serialize};

/// A vertex of the orchestration graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Planning,
    Coding,
    Qa,
    Debugging,
    Investigation,
    ApplicationTroubleshooting,
    Documentation,
    ProjectPlanning,
    Refactoring,
    PromptDesign,
    PromptImprovement,
    RoleDesign,
    RoleImprovement,
    ToolDesign,
    ToolEvaluation,
}

impl PhaseKind {
    /// Every vertex, in stable (alphabetical-by-name) order
    pub const ALL: [PhaseKind; 15] = [
        PhaseKind::ApplicationTroubleshooting,
        PhaseKind::Coding,
        PhaseKind::Debugging,
        PhaseKind::Documentation,
        PhaseKind::Investigation,
        PhaseKind::Planning,
        PhaseKind::ProjectPlanning,
        PhaseKind::PromptDesign,
        PhaseKind::PromptImprovement,
        PhaseKind::Qa,
        PhaseKind::Refactoring,
        PhaseKind::RoleDesign,
        PhaseKind::RoleImprovement,
        PhaseKind::ToolDesign,
        PhaseKind::ToolEvaluation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Coding => "coding",
            Self::Qa => "qa",
            Self::Debugging => "debugging",
            Self::Investigation => "investigation",
            Self::ApplicationTroubleshooting => "application_troubleshooting",
            Self::Documentation => "documentation",
            Self::ProjectPlanning => "project_planning",
            Self::Refactoring => "refactoring",
            Self::PromptDesign => "prompt_design",
            Self::PromptImprovement => "prompt_improvement",
            Self::RoleDesign => "role_design",
            Self::RoleImprovement => "role_improvement",
            Self::ToolDesign => "tool_design",
            Self::ToolEvaluation => "tool_evaluation",
        }
    }

    /// Permitted next phases (directed edges out of this vertex)
    pub fn adjacencies(self) -> &'static [PhaseKind] {
        use PhaseKind::*;
        match self {
            Planning => &[Coding, Refactoring],
            Coding => &[Qa, Documentation, Refactoring],
            Qa => &[Debugging, Documentation, ApplicationTroubleshooting, Refactoring],
            Debugging => &[Investigation, Coding, ApplicationTroubleshooting],
            Investigation => &[
                Debugging,
                Coding,
                ApplicationTroubleshooting,
                PromptDesign,
                RoleDesign,
                ToolDesign,
                Refactoring,
            ],
            ApplicationTroubleshooting => &[Debugging, Investigation, Coding],
            Documentation => &[Planning, Qa, ProjectPlanning],
            ProjectPlanning => &[Planning, Refactoring],
            Refactoring => &[Coding, Qa, Planning],
            PromptDesign => &[PromptImprovement],
            PromptImprovement => &[PromptDesign, Planning],
            RoleDesign => &[RoleImprovement],
            RoleImprovement => &[RoleDesign, Planning],
            ToolDesign => &[ToolEvaluation],
            ToolEvaluation => &[ToolDesign, Coding],
        }
    }

    /// Where this phase goes when its no-update threshold trips
    pub fn forced_transition_target(self) -> PhaseKind {
        use PhaseKind::*;
        match self {
            Planning => Coding,
            Coding => Qa,
            Qa => Documentation,
            Debugging => Investigation,
            Investigation => Coding,
            ApplicationTroubleshooting => Investigation,
            Documentation => ProjectPlanning,
            ProjectPlanning => Planning,
            Refactoring => Planning,
            PromptDesign => PromptImprovement,
            PromptImprovement => Planning,
            RoleDesign => RoleImprovement,
            RoleImprovement => Planning,
            ToolDesign => ToolEvaluation,
            ToolEvaluation => Coding,
        }
    }

    /// Meta-phases are disabled unless explicitly enabled in configuration
    pub fn is_meta(self) -> bool {
        matches!(
            self,
            Self::PromptDesign
                | Self::PromptImprovement
                | Self::RoleDesign
                | Self::RoleImprovement
                | Self::ToolDesign
                | Self::ToolEvaluation
        )
    }
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for PhaseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PhaseKind::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| format!("Unknown phase: {}", s))
    }
}

/// Vertices reachable from `start` by walking edges
pub fn reachable_from(start: PhaseKind) -> std::collections::BTreeSet<PhaseKind> {
    let mut seen = std::collections::BTreeSet::new();
    let mut stack = vec![start];
    while let Some(phase) = stack.pop() {
        if seen.insert(phase) {
            stack.extend(phase.adjacencies().iter().copied());
        }
    }
    seen
}
