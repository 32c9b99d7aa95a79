//! Loop detection - history scans, failure signatures, blacklist
//!
//! Two layers above the per-phase no-update counters: a coordinator-level
//! scan of recent phase history, and a pattern detector over the fix
//! history and bus traffic. Detection is observational; the one hard rule
//! is that a phase in a failure streak is never recommended as its own
//! resolver.

use std::collections::HashMap;

use crate::bus::{MessageBus, MessageFilter, MessageType};
use crate::phases::PhaseKind;
use crate::state::{PhaseHistoryEntry, PipelineState};

/// All entries in the window identical means the scheduler is spinning
pub fn scan_history(history: &[PhaseHistoryEntry], window: usize) -> Option<PhaseKind> {
    if window == 0 || history.len() < window {
        return None;
    }
    let tail = &history[history.len() - window..];
    let first = tail[0].phase;
    if tail.iter().all(|e| e.phase == first) {
        Some(first)
    } else {
        None
    }
}

/// What kind of repetition was observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopKind {
    /// Same error on the same file, repeatedly, without a successful fix
    RepeatedFileError,
    /// The same issue reported on the bus over and over
    RepeatedIssueReport,
    /// A phase kept getting picked to resolve its own failures
    SelfResolution,
}

/// A detected repetition, for orchestrator diagnostics and user escalation
#[derive(Debug, Clone)]
pub struct LoopDiagnostic {
    pub kind: LoopKind,
    pub signature: String,
    pub occurrences: usize,
    /// Phase implicated in the streak, when attributable
    pub phase: Option<PhaseKind>,
}

/// Phases temporarily excluded from selection after failure streaks
#[derive(Debug, Default)]
pub struct Blacklist {
    until: HashMap<PhaseKind, i64>,
    pub cooldown_ms: i64,
}

impl Blacklist {
    pub fn new(cooldown_ms: i64) -> Self {
        Self {
            until: HashMap::new(),
            cooldown_ms,
        }
    }

    pub fn ban(&mut self, phase: PhaseKind, now_ms: i64) {
        self.until.insert(phase, now_ms + self.cooldown_ms);
    }

    pub fn is_banned(&self, phase: PhaseKind, now_ms: i64) -> bool {
        self.until.get(&phase).is_some_and(|&until| now_ms < until)
    }
}

/// Scans persisted failure traces for repetition
pub struct PatternDetector {
    pub streak_threshold: usize,
}

impl PatternDetector {
    pub fn new(streak_threshold: usize) -> Self {
        Self {
            streak_threshold: streak_threshold.max(2),
        }
    }

    pub fn detect(&self, state: &PipelineState, bus: &MessageBus) -> Vec<LoopDiagnostic> {
        let mut diagnostics = Vec::new();

        // Same (file, error) failing N times in a row at the fix-history tail
        let failures: Vec<_> = state.fix_history.iter().rev().take_while(|f| !f.success).collect();
        if failures.len() >= self.streak_threshold {
            let head = failures[0];
            let same = failures
                .iter()
                .take_while(|f| f.file == head.file && f.error_signature == head.error_signature)
                .count();
            if same >= self.streak_threshold {
                diagnostics.push(LoopDiagnostic {
                    kind: LoopKind::RepeatedFileError,
                    signature: format!("{}:{}", head.file, head.error_signature),
                    occurrences: same,
                    phase: Some(head.phase),
                });
            }
        }

        // Identical issue reports accumulating on the bus
        let issues = bus.search(&MessageFilter::of_types(&[MessageType::IssueReported]));
        let mut by_signature: HashMap<String, usize> = HashMap::new();
        for issue in &issues {
            let signature = format!(
                "{}:{}",
                issue.file_path.as_deref().unwrap_or("-"),
                issue.payload
            );
            *by_signature.entry(signature).or_insert(0) += 1;
        }
        for (signature, count) in by_signature {
            if count >= self.streak_threshold {
                diagnostics.push(LoopDiagnostic {
                    kind: LoopKind::RepeatedIssueReport,
                    signature,
                    occurrences: count,
                    phase: None,
                });
            }
        }

        diagnostics
    }

    /// Pick a resolver phase for a diagnostic
    ///
    /// Never the streaking phase itself, and never a blacklisted phase. The
    /// candidates walk the streaking phase's neighbors; with no usable
    /// neighbor the answer is `None` and the orchestrator escalates to the
    /// user instead.
    pub fn resolver_for(
        &self,
        diagnostic: &LoopDiagnostic,
        blacklist: &Blacklist,
        now_ms: i64,
    ) -> Option<PhaseKind> {
        let streaking = diagnostic.phase?;
        streaking
            .adjacencies()
            .iter()
            .copied()
            .find(|&candidate| candidate != streaking && !candidate.is_meta() && !blacklist.is_banned(candidate, now_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statestore::now_ms;

    fn entry(phase: PhaseKind) -> PhaseHistoryEntry {
        PhaseHistoryEntry {
            phase,
            at: now_ms(),
            success: true,
        }
    }

    #[test]
    fn test_scan_history_all_identical() {
        let history: Vec<_> = (0..5).map(|_| entry(PhaseKind::Documentation)).collect();
        assert_eq!(scan_history(&history, 5), Some(PhaseKind::Documentation));
    }

    #[test]
    fn test_scan_history_mixed_is_fine() {
        let mut history: Vec<_> = (0..4).map(|_| entry(PhaseKind::Documentation)).collect();
        history.push(entry(PhaseKind::Qa));
        assert_eq!(scan_history(&history, 5), None);
    }

    #[test]
    fn test_scan_history_short_window_not_triggered() {
        let history: Vec<_> = (0..3).map(|_| entry(PhaseKind::Coding)).collect();
        assert_eq!(scan_history(&history, 5), None);
    }

    #[test]
    fn test_scan_only_looks_at_tail() {
        let mut history: Vec<_> = (0..3).map(|_| entry(PhaseKind::Qa)).collect();
        history.extend((0..5).map(|_| entry(PhaseKind::Coding)));
        assert_eq!(scan_history(&history, 5), Some(PhaseKind::Coding));
    }

    #[test]
    fn test_blacklist_cooldown() {
        let mut blacklist = Blacklist::new(1000);
        let now = now_ms();
        blacklist.ban(PhaseKind::Debugging, now);

        assert!(blacklist.is_banned(PhaseKind::Debugging, now));
        assert!(blacklist.is_banned(PhaseKind::Debugging, now + 999));
        assert!(!blacklist.is_banned(PhaseKind::Debugging, now + 1000));
        assert!(!blacklist.is_banned(PhaseKind::Coding, now));
    }

    #[test]
    fn test_detector_finds_repeated_file_error() {
        let mut state = PipelineState::default();
        for _ in 0..3 {
            state.record_fix("src/app.py", "NameError: x", PhaseKind::Debugging, false);
        }
        let bus = MessageBus::new(10);

        let detector = PatternDetector::new(3);
        let diagnostics = detector.detect(&state, &bus);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, LoopKind::RepeatedFileError);
        assert_eq!(diagnostics[0].occurrences, 3);
        assert_eq!(diagnostics[0].phase, Some(PhaseKind::Debugging));
    }

    #[test]
    fn test_detector_streak_broken_by_success() {
        let mut state = PipelineState::default();
        state.record_fix("src/app.py", "NameError: x", PhaseKind::Debugging, false);
        state.record_fix("src/app.py", "NameError: x", PhaseKind::Debugging, true);
        state.record_fix("src/app.py", "NameError: x", PhaseKind::Debugging, false);
        let bus = MessageBus::new(10);

        let diagnostics = PatternDetector::new(3).detect(&state, &bus);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_resolver_never_suggests_streaking_phase() {
        let detector = PatternDetector::new(3);
        let blacklist = Blacklist::new(1000);
        let now = now_ms();

        for phase in PhaseKind::ALL {
            let diagnostic = LoopDiagnostic {
                kind: LoopKind::RepeatedFileError,
                signature: "x".to_string(),
                occurrences: 3,
                phase: Some(phase),
            };
            if let Some(resolver) = detector.resolver_for(&diagnostic, &blacklist, now) {
                assert_ne!(resolver, phase, "{} suggested as its own resolver", phase);
            }
        }
    }

    #[test]
    fn test_resolver_honors_blacklist() {
        let detector = PatternDetector::new(3);
        let mut blacklist = Blacklist::new(60_000);
        let now = now_ms();

        let diagnostic = LoopDiagnostic {
            kind: LoopKind::RepeatedFileError,
            signature: "x".to_string(),
            occurrences: 3,
            phase: Some(PhaseKind::Debugging),
        };

        // debugging's neighbors: investigation, coding, application_troubleshooting
        blacklist.ban(PhaseKind::Investigation, now);
        let resolver = detector.resolver_for(&diagnostic, &blacklist, now).unwrap();
        assert_eq!(resolver, PhaseKind::Coding);
    }
}
