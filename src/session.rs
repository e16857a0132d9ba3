//! Session controller: the state machine the UI drives.
//!
//! ```text
//! Idle --select_format--> Ready --start--> Running <--pause/resume--> Paused
//! Running --remaining hits 0--> Overtime --advance/reset--> Ready
//! any --reset--> Ready (stage 0)
//! any active --stop, or advance on last stage--> Finished
//! ```
//! From `Finished` only `reset` and `select_format` are accepted.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::catalog::{FormatDefinition, StageCatalog};
use crate::cues::{CueConfig, CueEvaluator, CueSet};
use crate::error::{TimerError, TimerResult};
use crate::sequencer::StageSequencer;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[strum(serialize_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Ready,
    Running,
    Paused,
    Overtime,
    Finished,
}

/// Operations that can be refused with `InvalidTransition`
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    Start,
    Pause,
    Resume,
    Stop,
    Reset,
    Advance,
    JumpTo,
    Tick,
}

fn is_allowed(op: Operation, phase: SessionPhase) -> bool {
    use Operation::*;
    use SessionPhase::*;

    match phase {
        Idle => false,
        Finished => op == Reset,
        Ready => op != Resume,
        Running | Paused | Overtime => true,
    }
}

/// Read-only view of the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub phase: SessionPhase,
    pub format_name: Option<String>,
    pub stage_name: Option<String>,
    pub stage_index: Option<usize>,
    pub stage_count: usize,
    pub duration_seconds: u32,
    pub remaining_seconds: u32,
    pub is_running: bool,
    pub is_overtime: bool,
    pub in_protected_window: bool,
}

/// Result of one engine tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub cues: CueSet,
    pub remaining_seconds: u32,
    pub overtime: bool,
}

pub struct SessionController<C: StageCatalog> {
    catalog: C,
    evaluator: CueEvaluator,
    sequencer: Option<StageSequencer>,
    phase: SessionPhase,
}

impl<C: StageCatalog> SessionController<C> {
    pub fn new(catalog: C, cue_config: CueConfig) -> Self {
        Self {
            catalog,
            evaluator: CueEvaluator::new(cue_config),
            sequencer: None,
            phase: SessionPhase::Idle,
        }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn cue_config(&self) -> CueConfig {
        self.evaluator.config()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn format(&self) -> Option<&Arc<FormatDefinition>> {
        self.sequencer.as_ref().map(|s| s.format())
    }

    pub fn sequencer(&self) -> Option<&StageSequencer> {
        self.sequencer.as_ref()
    }

    /// Loads a format and readies its first stage. Unknown names leave the
    /// session untouched.
    pub fn select_format(&mut self, name: &str) -> TimerResult<()> {
        let format = self.catalog.get_format(name)?;
        info!(format = format.name(), stages = format.len(), "format selected");
        self.sequencer = Some(StageSequencer::new(format));
        self.set_phase(SessionPhase::Ready);
        Ok(())
    }

    pub fn start(&mut self) -> TimerResult<()> {
        let phase = self.guard(Operation::Start)?;
        let seq = self.active_mut(Operation::Start)?;
        seq.clock_mut().start();
        if phase != SessionPhase::Overtime {
            self.set_phase(SessionPhase::Running);
        }
        Ok(())
    }

    pub fn pause(&mut self) -> TimerResult<()> {
        let phase = self.guard(Operation::Pause)?;
        let seq = self.active_mut(Operation::Pause)?;
        seq.clock_mut().pause();
        if phase == SessionPhase::Running {
            self.set_phase(SessionPhase::Paused);
        }
        Ok(())
    }

    /// Same as `start`, but only meaningful once the stage has been started.
    pub fn resume(&mut self) -> TimerResult<()> {
        self.guard(Operation::Resume)?;
        self.start()
    }

    /// Halts the clock and ends the session, keeping the stage for inspection.
    pub fn stop(&mut self) -> TimerResult<()> {
        self.guard(Operation::Stop)?;
        self.active_mut(Operation::Stop)?.clock_mut().pause();
        self.set_phase(SessionPhase::Finished);
        Ok(())
    }

    pub fn reset(&mut self) -> TimerResult<()> {
        self.guard(Operation::Reset)?;
        self.active_mut(Operation::Reset)?.activate(0)?;
        self.set_phase(SessionPhase::Ready);
        Ok(())
    }

    /// Moves to the next stage, or finishes the session from the last one.
    pub fn advance(&mut self) -> TimerResult<()> {
        self.guard(Operation::Advance)?;
        let seq = self.active_mut(Operation::Advance)?;
        match seq.advance() {
            Ok(()) => {
                self.set_phase(SessionPhase::Ready);
                Ok(())
            }
            Err(TimerError::NoNextStage { stage }) => {
                debug!(%stage, "advanced past last stage");
                seq.clock_mut().pause();
                self.set_phase(SessionPhase::Finished);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub fn jump_to(&mut self, index: usize) -> TimerResult<()> {
        self.guard(Operation::JumpTo)?;
        self.active_mut(Operation::JumpTo)?.jump_to(index)?;
        self.set_phase(SessionPhase::Ready);
        Ok(())
    }

    /// One second of wall-clock time. Ticks outside `Running`/`Overtime` are
    /// empty; ticks with no active session are refused.
    pub fn tick(&mut self) -> TimerResult<TickOutcome> {
        let phase = self.guard(Operation::Tick)?;
        let evaluator = self.evaluator;
        let seq = self.active_mut(Operation::Tick)?;
        let tick = seq.tick(&evaluator);
        if !tick.cues.is_empty() {
            debug!(cues = ?tick.cues, remaining = tick.remaining_seconds, "cues fired");
        }
        if seq.is_overtime() && phase == SessionPhase::Running {
            self.set_phase(SessionPhase::Overtime);
        }
        Ok(TickOutcome {
            cues: tick.cues,
            remaining_seconds: tick.remaining_seconds,
            overtime: tick.overtime,
        })
    }

    pub fn snapshot(&self) -> Snapshot {
        match &self.sequencer {
            None => Snapshot {
                phase: self.phase,
                format_name: None,
                stage_name: None,
                stage_index: None,
                stage_count: 0,
                duration_seconds: 0,
                remaining_seconds: 0,
                is_running: false,
                is_overtime: false,
                in_protected_window: false,
            },
            Some(seq) => {
                let stage = seq.current_stage();
                let remaining = seq.clock().remaining_seconds();
                Snapshot {
                    phase: self.phase,
                    format_name: Some(seq.format().name().to_string()),
                    stage_name: Some(stage.name().to_string()),
                    stage_index: Some(seq.index()),
                    stage_count: seq.format().len(),
                    duration_seconds: stage.duration_seconds(),
                    remaining_seconds: remaining,
                    is_running: seq.clock().is_running(),
                    is_overtime: seq.is_overtime(),
                    in_protected_window: CueEvaluator::in_protected_window(stage, remaining),
                }
            }
        }
    }

    fn guard(&self, operation: Operation) -> TimerResult<SessionPhase> {
        if is_allowed(operation, self.phase) {
            Ok(self.phase)
        } else {
            debug!(%operation, phase = %self.phase, "refused transition");
            Err(TimerError::InvalidTransition {
                operation,
                phase: self.phase,
            })
        }
    }

    fn active_mut(&mut self, operation: Operation) -> TimerResult<&mut StageSequencer> {
        let phase = self.phase;
        self.sequencer
            .as_mut()
            .ok_or(TimerError::InvalidTransition { operation, phase })
    }

    fn set_phase(&mut self, next: SessionPhase) {
        if next != self.phase {
            debug!(from = %self.phase, to = %next, "phase transition");
            self.phase = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MapCatalog, StageDefinition};
    use crate::cues::CueKind;
    use assert_matches::assert_matches;

    fn controller() -> SessionController<MapCatalog> {
        let format = FormatDefinition::new(
            "Mini",
            vec![
                StageDefinition::new("Constructive", 240).unwrap(),
                StageDefinition::new("Rebuttal", 240).unwrap(),
            ],
        )
        .unwrap();
        SessionController::new(MapCatalog::from_formats([format]), CueConfig::default())
    }

    fn ready() -> SessionController<MapCatalog> {
        let mut c = controller();
        c.select_format("Mini").unwrap();
        c
    }

    #[test]
    fn test_starts_idle() {
        let c = controller();
        let snap = c.snapshot();
        assert_eq!(snap.phase, SessionPhase::Idle);
        assert_eq!(snap.stage_name, None);
    }

    #[test]
    fn test_idle_refuses_everything() {
        let mut c = controller();
        assert_matches!(
            c.start(),
            Err(TimerError::InvalidTransition { operation: Operation::Start, phase: SessionPhase::Idle })
        );
        assert_matches!(c.tick(), Err(TimerError::InvalidTransition { .. }));
        assert_matches!(c.reset(), Err(TimerError::InvalidTransition { .. }));
    }

    #[test]
    fn test_unknown_format_leaves_state() {
        let mut c = ready();
        c.start().unwrap();
        assert_eq!(
            c.select_format("Oxford"),
            Err(TimerError::NotFound("Oxford".into()))
        );
        assert_eq!(c.phase(), SessionPhase::Running);
        assert_eq!(c.snapshot().format_name.as_deref(), Some("Mini"));
    }

    #[test]
    fn test_select_format_readies_stage_zero() {
        let c = ready();
        let snap = c.snapshot();
        assert_eq!(snap.phase, SessionPhase::Ready);
        assert_eq!(snap.stage_index, Some(0));
        assert_eq!(snap.remaining_seconds, 240);
        assert_eq!(snap.stage_count, 2);
    }

    #[test]
    fn test_start_pause_resume() {
        let mut c = ready();
        assert_matches!(c.resume(), Err(TimerError::InvalidTransition { .. }));
        c.start().unwrap();
        assert_eq!(c.phase(), SessionPhase::Running);
        c.tick().unwrap();
        c.pause().unwrap();
        assert_eq!(c.phase(), SessionPhase::Paused);
        for _ in 0..10 {
            assert_eq!(c.tick().unwrap(), TickOutcome {
                remaining_seconds: 239,
                ..Default::default()
            });
        }
        c.resume().unwrap();
        assert_eq!(c.phase(), SessionPhase::Running);
        assert_eq!(c.snapshot().remaining_seconds, 239);
    }

    #[test]
    fn test_tick_in_ready_is_empty() {
        let mut c = ready();
        let out = c.tick().unwrap();
        assert!(out.cues.is_empty());
        assert_eq!(out.remaining_seconds, 240);
    }

    #[test]
    fn test_runs_into_overtime() {
        let mut c = ready();
        c.start().unwrap();
        let mut last = TickOutcome::default();
        for _ in 0..240 {
            last = c.tick().unwrap();
        }
        assert!(last.cues.contains(&CueKind::End));
        assert!(last.overtime);
        let snap = c.snapshot();
        assert_eq!(snap.phase, SessionPhase::Overtime);
        assert_eq!(snap.remaining_seconds, 0);
        assert!(snap.is_overtime);
        assert!(snap.is_running);

        let more = c.tick().unwrap();
        assert!(more.cues.is_empty());
        assert!(more.overtime);
    }

    #[test]
    fn test_pause_in_overtime_keeps_phase() {
        let mut c = ready();
        c.start().unwrap();
        for _ in 0..240 {
            c.tick().unwrap();
        }
        c.pause().unwrap();
        assert_eq!(c.phase(), SessionPhase::Overtime);
        assert!(!c.snapshot().is_running);
        c.resume().unwrap();
        assert_eq!(c.phase(), SessionPhase::Overtime);
        assert!(c.snapshot().is_running);
    }

    #[test]
    fn test_advance_from_overtime_readies_next() {
        let mut c = ready();
        c.start().unwrap();
        for _ in 0..241 {
            c.tick().unwrap();
        }
        c.advance().unwrap();
        let snap = c.snapshot();
        assert_eq!(snap.phase, SessionPhase::Ready);
        assert_eq!(snap.stage_name.as_deref(), Some("Rebuttal"));
        assert_eq!(snap.remaining_seconds, 240);
        assert!(!snap.is_overtime);
        c.start().unwrap();
        assert_eq!(c.phase(), SessionPhase::Running);
    }

    #[test]
    fn test_advance_on_last_stage_finishes() {
        let mut c = ready();
        c.jump_to(1).unwrap();
        c.start().unwrap();
        c.tick().unwrap();
        c.advance().unwrap();
        let snap = c.snapshot();
        assert_eq!(snap.phase, SessionPhase::Finished);
        assert_eq!(snap.stage_name.as_deref(), Some("Rebuttal"));
        assert!(!snap.is_running);
    }

    #[test]
    fn test_finished_only_accepts_reset_and_select() {
        let mut c = ready();
        c.stop().unwrap();
        let before = c.snapshot();
        for result in [
            c.start(),
            c.pause(),
            c.resume(),
            c.stop(),
            c.advance(),
            c.jump_to(0),
            c.tick().map(|_| ()),
        ] {
            assert_matches!(result, Err(TimerError::InvalidTransition { phase: SessionPhase::Finished, .. }));
        }
        assert_eq!(c.snapshot(), before);

        c.reset().unwrap();
        assert_eq!(c.phase(), SessionPhase::Ready);
        c.stop().unwrap();
        c.select_format("mini").unwrap();
        assert_eq!(c.phase(), SessionPhase::Ready);
    }

    #[test]
    fn test_stop_keeps_state_for_inspection() {
        let mut c = ready();
        c.start().unwrap();
        for _ in 0..30 {
            c.tick().unwrap();
        }
        c.stop().unwrap();
        let snap = c.snapshot();
        assert_eq!(snap.phase, SessionPhase::Finished);
        assert_eq!(snap.remaining_seconds, 210);
        assert!(!snap.is_running);
    }

    #[test]
    fn test_reset_from_any_state() {
        let mut c = ready();
        c.jump_to(1).unwrap();
        c.start().unwrap();
        for _ in 0..250 {
            c.tick().unwrap();
        }
        c.reset().unwrap();
        let snap = c.snapshot();
        assert_eq!(snap.phase, SessionPhase::Ready);
        assert_eq!(snap.stage_index, Some(0));
        assert_eq!(snap.remaining_seconds, 240);
        assert!(!snap.is_running);
        assert!(!snap.is_overtime);
    }

    #[test]
    fn test_jump_out_of_range_is_noop() {
        let mut c = ready();
        c.start().unwrap();
        c.tick().unwrap();
        assert_eq!(
            c.jump_to(5),
            Err(TimerError::OutOfRange { index: 5, len: 2 })
        );
        assert_eq!(c.phase(), SessionPhase::Running);
        assert_eq!(c.snapshot().remaining_seconds, 239);
    }

    #[test]
    fn test_jump_while_running_resets_and_stops() {
        let mut c = ready();
        c.start().unwrap();
        for _ in 0..140 {
            c.tick().unwrap();
        }
        assert_eq!(c.snapshot().remaining_seconds, 100);
        c.jump_to(1).unwrap();
        let snap = c.snapshot();
        assert_eq!(snap.stage_name.as_deref(), Some("Rebuttal"));
        assert_eq!(snap.remaining_seconds, 240);
        assert!(!snap.is_running);
        assert_eq!(snap.phase, SessionPhase::Ready);
    }

    #[test]
    fn test_protected_window_in_snapshot() {
        let format = FormatDefinition::new(
            "BP",
            vec![StageDefinition::new("PM", 420)
                .unwrap()
                .with_protected_window(60)
                .unwrap()],
        )
        .unwrap();
        let mut c =
            SessionController::new(MapCatalog::from_formats([format]), CueConfig::default());
        c.select_format("BP").unwrap();
        assert!(c.snapshot().in_protected_window);
        c.start().unwrap();
        let mut saw_end_of_protection = false;
        for _ in 0..60 {
            saw_end_of_protection |= c.tick().unwrap().cues.contains(&CueKind::ProtectedEnd);
        }
        assert!(saw_end_of_protection);
        assert!(!c.snapshot().in_protected_window);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(SessionPhase::Overtime.to_string(), "overtime");
        assert_eq!(Operation::JumpTo.to_string(), "jump_to");
    }
}
