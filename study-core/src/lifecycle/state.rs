use study_types::{EndingOutcome, EndingReason, StudyPhase, WeightedVariation};

/// Mutable per-run state of one study. Owned by `Study` only.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyState {
    pub phase: StudyPhase,
    /// Set once, never recomputed
    pub variation: Option<WeightedVariation>,
    /// Epoch milliseconds, mirrored in the preference store
    pub first_run_timestamp: Option<i64>,
    /// Set once, when the ending sequence starts
    pub ending_reason: Option<EndingReason>,
    /// Guards re-entrant termination
    pub is_ending: bool,
    /// Returned to every later `end_study` caller
    pub ending_outcome: Option<EndingOutcome>,
}

impl StudyState {
    pub fn new() -> Self {
        Self {
            phase: StudyPhase::Unconfigured,
            variation: None,
            first_run_timestamp: None,
            ending_reason: None,
            is_ending: false,
            ending_outcome: None,
        }
    }

    /// Move forward to `to`. Phases never go backwards and nothing leaves Ended.
    pub fn advance(&mut self, to: StudyPhase) -> bool {
        if rank(to) <= rank(self.phase) {
            log::warn!(
                "[STUDY] Ignoring transition {:?} -> {:?}",
                self.phase,
                to
            );
            return false;
        }
        log::debug!("[STUDY] Phase {:?} -> {:?}", self.phase, to);
        self.phase = to;
        true
    }

    /// True once termination has started or finished
    pub fn is_terminating(&self) -> bool {
        self.is_ending || self.phase.is_terminal()
    }

    pub fn variation_name(&self) -> Option<String> {
        self.variation.as_ref().map(|v| v.name.clone())
    }
}

impl Default for StudyState {
    fn default() -> Self {
        Self::new()
    }
}

fn rank(phase: StudyPhase) -> u8 {
    match phase {
        StudyPhase::Unconfigured => 0,
        StudyPhase::Configuring => 1,
        StudyPhase::AwaitingFirstRunDecision => 2,
        StudyPhase::Active => 3,
        StudyPhase::Ended => 4,
    }
}
