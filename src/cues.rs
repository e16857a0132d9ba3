use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::catalog::StageDefinition;

pub const DEFAULT_WARNING_SECONDS: u32 = 60;

/// Discrete notifications for the UI to realize as sound or visuals
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, strum_macros::Display,
)]
pub enum CueKind {
    Warning,
    ProtectedStart,
    ProtectedEnd,
    End,
}

pub type CueSet = BTreeSet<CueKind>;

/// Thresholds the evaluator checks against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CueConfig {
    /// `None` turns the warning cue off.
    pub warning_seconds: Option<u32>,
}

impl Default for CueConfig {
    fn default() -> Self {
        Self {
            warning_seconds: Some(DEFAULT_WARNING_SECONDS),
        }
    }
}

/// Cues for one tick, and whether the caller must latch the warning flag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CueEvaluation {
    pub cues: CueSet,
    pub latch_warning: bool,
}

/// Stateless: every "already fired" flag lives in the clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CueEvaluator {
    config: CueConfig,
}

/// True on the tick that moves remaining time from above `mark` to at or below it.
fn crossed(before: u32, after: u32, mark: u32) -> bool {
    before > mark && mark >= after
}

impl CueEvaluator {
    pub fn new(config: CueConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> CueConfig {
        self.config
    }

    pub fn evaluate(
        &self,
        stage: &StageDefinition,
        before: u32,
        after: u32,
        has_fired_warning: bool,
    ) -> CueEvaluation {
        let mut eval = CueEvaluation::default();

        if let Some(threshold) = self.config.warning_seconds {
            if !has_fired_warning && crossed(before, after, threshold) {
                eval.cues.insert(CueKind::Warning);
                eval.latch_warning = true;
            }
        }

        if let Some(window) = stage.protected_window_seconds() {
            // Only boundaries crossed while counting fire. A stage opens
            // inside its opening window, so that window has no start cue;
            // callers read it from `in_protected_window` instead.
            if crossed(before, after, stage.duration_seconds().saturating_sub(window)) {
                eval.cues.insert(CueKind::ProtectedEnd);
            }
            if crossed(before, after, window) {
                eval.cues.insert(CueKind::ProtectedStart);
            }
        }

        if after == 0 && before > 0 {
            eval.cues.insert(CueKind::End);
        }

        eval
    }

    /// Whether `remaining` falls inside either protected window of `stage`.
    pub fn in_protected_window(stage: &StageDefinition, remaining: u32) -> bool {
        match stage.protected_window_seconds() {
            Some(window) => {
                remaining > stage.duration_seconds().saturating_sub(window) || remaining <= window
            }
            None => false,
        }
    }
}
