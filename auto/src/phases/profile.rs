//! Dimensional profiles and polytopic selection
//!
//! Each vertex carries a fixed vector over seven named axes. When the
//! tactical decision tree yields no action, the orchestrator scores the
//! current phase's neighbors against a situation vector and picks the
//! maximum. The axis values are configuration, not learned.

use serde::{Deserialize, Serialize};

use super::PhaseKind;

/// Fixed per-phase vector over the seven selection axes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionalProfile {
    pub temporal: f32,
    pub functional: f32,
    pub data: f32,
    pub state: f32,
    pub error: f32,
    pub context: f32,
    pub integration: f32,
}

impl DimensionalProfile {
    const fn new(
        temporal: f32,
        functional: f32,
        data: f32,
        state: f32,
        error: f32,
        context: f32,
        integration: f32,
    ) -> Self {
        Self {
            temporal,
            functional,
            data,
            state,
            error,
            context,
            integration,
        }
    }

    pub fn as_array(&self) -> [f32; 7] {
        [
            self.temporal,
            self.functional,
            self.data,
            self.state,
            self.error,
            self.context,
            self.integration,
        ]
    }
}

/// Default profile table; `Config` may override individual phases
pub fn default_profile(phase: PhaseKind) -> DimensionalProfile {
    use PhaseKind::*;
    match phase {
        Planning => DimensionalProfile::new(0.9, 0.7, 0.5, 0.6, 0.2, 0.8, 0.4),
        Coding => DimensionalProfile::new(0.6, 0.9, 0.6, 0.5, 0.3, 0.5, 0.5),
        Qa => DimensionalProfile::new(0.5, 0.6, 0.5, 0.6, 0.8, 0.5, 0.6),
        Debugging => DimensionalProfile::new(0.7, 0.5, 0.5, 0.6, 0.9, 0.6, 0.4),
        Investigation => DimensionalProfile::new(0.4, 0.5, 0.7, 0.5, 0.7, 0.9, 0.5),
        ApplicationTroubleshooting => DimensionalProfile::new(0.8, 0.4, 0.5, 0.7, 0.9, 0.6, 0.6),
        Documentation => DimensionalProfile::new(0.3, 0.4, 0.6, 0.4, 0.1, 0.7, 0.5),
        ProjectPlanning => DimensionalProfile::new(0.8, 0.6, 0.5, 0.7, 0.2, 0.9, 0.7),
        Refactoring => DimensionalProfile::new(0.4, 0.8, 0.6, 0.6, 0.4, 0.6, 0.8),
        PromptDesign => DimensionalProfile::new(0.3, 0.5, 0.4, 0.3, 0.2, 0.8, 0.3),
        PromptImprovement => DimensionalProfile::new(0.3, 0.5, 0.4, 0.3, 0.3, 0.8, 0.3),
        RoleDesign => DimensionalProfile::new(0.3, 0.4, 0.4, 0.3, 0.2, 0.8, 0.3),
        RoleImprovement => DimensionalProfile::new(0.3, 0.4, 0.4, 0.3, 0.3, 0.8, 0.3),
        ToolDesign => DimensionalProfile::new(0.3, 0.6, 0.5, 0.4, 0.2, 0.7, 0.4),
        ToolEvaluation => DimensionalProfile::new(0.3, 0.6, 0.5, 0.4, 0.3, 0.7, 0.5),
    }
}

/// Snapshot of the situation the orchestrator is selecting for
#[derive(Debug, Clone, Copy, Default)]
pub struct SituationVector {
    pub has_errors: bool,
    /// 0..=1
    pub error_severity: f32,
    /// 0..=1
    pub complexity: f32,
    /// 0..=1
    pub urgency: f32,
    /// Fraction of tasks completed, 0..=1
    pub completion_ratio: f32,
}

impl SituationVector {
    /// Expand the situation onto the seven axes
    fn features(&self) -> [f32; 7] {
        let error = if self.has_errors { self.error_severity.max(0.1) } else { 0.0 };
        [
            self.urgency,               // temporal
            self.complexity,            // functional
            0.5,                        // data
            0.5,                        // state
            error,                      // error
            self.complexity,            // context
            1.0 - self.completion_ratio, // integration
        ]
    }
}

/// Score one candidate: sum of weight * axis * feature
pub fn score(profile: &DimensionalProfile, situation: &SituationVector, weights: &[f32; 7]) -> f32 {
    profile
        .as_array()
        .iter()
        .zip(situation.features())
        .zip(weights)
        .map(|((dim, feat), w)| w * dim * feat)
        .sum()
}

/// Pick the best-scoring neighbor of `current`
///
/// Ties break toward the higher `integration` axis, then alphabetically.
/// `allow_meta` filters the meta vertices out of consideration entirely.
pub fn select_next(
    current: PhaseKind,
    situation: &SituationVector,
    weights: &[f32; 7],
    profile_for: impl Fn(PhaseKind) -> DimensionalProfile,
    allow_meta: bool,
) -> Option<PhaseKind> {
    let mut best: Option<(PhaseKind, f32, f32)> = None;

    // Alphabetical iteration makes the final tie-break implicit
    let mut candidates: Vec<PhaseKind> = current
        .adjacencies()
        .iter()
        .copied()
        .filter(|p| allow_meta || !p.is_meta())
        .collect();
    candidates.sort_by_key(|p| p.name());

    for candidate in candidates {
        let profile = profile_for(candidate);
        let s = score(&profile, situation, weights);
        let replace = match best {
            None => true,
            Some((_, best_score, best_integration)) => {
                s > best_score || (s == best_score && profile.integration > best_integration)
            }
        };
        if replace {
            best = Some((candidate, s, profile.integration));
        }
    }

    best.map(|(p, _, _)| p)
}
