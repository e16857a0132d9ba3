use std::sync::Arc;
use tracing::debug;

use crate::catalog::{FormatDefinition, StageDefinition};
use crate::clock::{Clock, ClockTick};
use crate::cues::{CueEvaluator, CueSet};
use crate::error::{TimerError, TimerResult};

/// What one tick did to the active stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageTick {
    pub cues: CueSet,
    pub remaining_seconds: u32,
    /// Set on every tick received while running with nothing left.
    pub overtime: bool,
}

/// Walks a format's stages, owning the clock of the active one
#[derive(Debug, Clone)]
pub struct StageSequencer {
    format: Arc<FormatDefinition>,
    index: usize,
    clock: Clock,
    is_overtime: bool,
}

impl StageSequencer {
    /// Starts on stage 0.
    pub fn new(format: Arc<FormatDefinition>) -> Self {
        let clock = Clock::new(format.first_stage().duration_seconds());
        Self {
            format,
            index: 0,
            clock,
            is_overtime: false,
        }
    }

    pub fn activate(&mut self, index: usize) -> TimerResult<()> {
        let stage = self.format.stage(index).ok_or(TimerError::OutOfRange {
            index,
            len: self.format.len(),
        })?;
        debug!(stage = stage.name(), index, "activating stage");
        self.clock.reset(stage.duration_seconds());
        self.index = index;
        self.is_overtime = false;
        Ok(())
    }

    pub fn advance(&mut self) -> TimerResult<()> {
        if self.is_last_stage() {
            return Err(TimerError::NoNextStage {
                stage: self.current_stage().name().to_string(),
            });
        }
        self.activate(self.index + 1)
    }

    /// Manual stage selection; the target always starts fresh.
    pub fn jump_to(&mut self, index: usize) -> TimerResult<()> {
        self.activate(index)
    }

    pub fn tick(&mut self, evaluator: &CueEvaluator) -> StageTick {
        let mut out = StageTick::default();
        match self.clock.tick() {
            ClockTick::Stopped => {}
            ClockTick::Overtime => out.overtime = true,
            ClockTick::Counted { before, after } => {
                let eval = evaluator.evaluate(
                    self.current_stage(),
                    before,
                    after,
                    self.clock.has_fired_warning(),
                );
                if eval.latch_warning {
                    self.clock.latch_warning();
                }
                if after == 0 {
                    self.is_overtime = true;
                    out.overtime = true;
                }
                out.cues = eval.cues;
            }
        }
        out.remaining_seconds = self.clock.remaining_seconds();
        out
    }

    pub fn format(&self) -> &Arc<FormatDefinition> {
        &self.format
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current_stage(&self) -> &StageDefinition {
        &self.format.stages()[self.index]
    }

    pub fn is_last_stage(&self) -> bool {
        self.index + 1 == self.format.len()
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    pub fn is_overtime(&self) -> bool {
        self.is_overtime
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cues::CueKind;
    use assert_matches::assert_matches;

    fn debate() -> Arc<FormatDefinition> {
        Arc::new(
            FormatDefinition::new(
                "Mini",
                vec![
                    StageDefinition::new("Constructive", 240).unwrap(),
                    StageDefinition::new("Rebuttal", 120).unwrap(),
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_starts_on_first_stage() {
        let seq = StageSequencer::new(debate());
        assert_eq!(seq.index(), 0);
        assert_eq!(seq.current_stage().name(), "Constructive");
        assert_eq!(seq.clock().remaining_seconds(), 240);
        assert!(!seq.clock().is_running());
    }

    #[test]
    fn test_activate_out_of_range_has_no_effect() {
        let mut seq = StageSequencer::new(debate());
        seq.clock_mut().start();
        seq.tick(&CueEvaluator::default());
        assert_eq!(
            seq.activate(2),
            Err(TimerError::OutOfRange { index: 2, len: 2 })
        );
        assert_eq!(seq.index(), 0);
        assert_eq!(seq.clock().remaining_seconds(), 239);
        assert!(seq.clock().is_running());
    }

    #[test]
    fn test_advance_and_no_next_stage() {
        let mut seq = StageSequencer::new(debate());
        seq.advance().unwrap();
        assert_eq!(seq.current_stage().name(), "Rebuttal");
        assert_eq!(seq.clock().remaining_seconds(), 120);
        assert_matches!(seq.advance(), Err(TimerError::NoNextStage { stage }) if stage == "Rebuttal");
        assert_eq!(seq.index(), 1);
    }

    #[test]
    fn test_jump_resets_clock() {
        let mut seq = StageSequencer::new(debate());
        seq.clock_mut().start();
        for _ in 0..100 {
            seq.tick(&CueEvaluator::default());
        }
        seq.jump_to(1).unwrap();
        assert_eq!(seq.clock().remaining_seconds(), 120);
        assert!(!seq.clock().is_running());
        seq.jump_to(0).unwrap();
        assert_eq!(seq.clock().remaining_seconds(), 240);
    }

    #[test]
    fn test_tick_latches_warning_and_marks_overtime() {
        let mut seq = StageSequencer::new(debate());
        seq.jump_to(1).unwrap();
        seq.clock_mut().start();
        let eval = CueEvaluator::default();

        let mut warnings = 0;
        let mut ends = 0;
        for _ in 0..130 {
            let tick = seq.tick(&eval);
            warnings += tick.cues.contains(&CueKind::Warning) as u32;
            ends += tick.cues.contains(&CueKind::End) as u32;
        }
        assert_eq!(warnings, 1);
        assert_eq!(ends, 1);
        assert!(seq.clock().has_fired_warning());
        assert!(seq.is_overtime());
        assert_eq!(seq.clock().remaining_seconds(), 0);
    }

    #[test]
    fn test_activation_clears_overtime() {
        let mut seq = StageSequencer::new(debate());
        seq.jump_to(1).unwrap();
        seq.clock_mut().start();
        for _ in 0..120 {
            seq.tick(&CueEvaluator::default());
        }
        assert!(seq.is_overtime());
        seq.activate(1).unwrap();
        assert!(!seq.is_overtime());
        assert!(!seq.clock().has_fired_warning());
    }
}
