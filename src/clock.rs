/// Result of advancing the clock by one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockTick {
    /// Not running; nothing changed.
    Stopped,
    /// One second was consumed.
    Counted { before: u32, after: u32 },
    /// Running with nothing left; remaining stays at zero.
    Overtime,
}

/// Countdown for a single stage activation.
///
/// `remaining_seconds` is clamped at zero. Overtime is the clock still
/// running with zero remaining; how long it has been over is for the caller
/// to count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clock {
    remaining_seconds: u32,
    is_running: bool,
    has_fired_warning: bool,
}

impl Clock {
    pub fn new(seconds: u32) -> Self {
        Self {
            remaining_seconds: seconds,
            is_running: false,
            has_fired_warning: false,
        }
    }

    pub fn start(&mut self) {
        self.is_running = true;
    }

    pub fn pause(&mut self) {
        self.is_running = false;
    }

    pub fn tick(&mut self) -> ClockTick {
        if !self.is_running {
            return ClockTick::Stopped;
        }
        if self.remaining_seconds == 0 {
            return ClockTick::Overtime;
        }
        let before = self.remaining_seconds;
        self.remaining_seconds -= 1;
        ClockTick::Counted {
            before,
            after: self.remaining_seconds,
        }
    }

    pub fn reset(&mut self, to_seconds: u32) {
        *self = Self::new(to_seconds);
    }

    pub fn latch_warning(&mut self) {
        self.has_fired_warning = true;
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn has_fired_warning(&self) -> bool {
        self.has_fired_warning
    }

    pub fn is_overtime(&self) -> bool {
        self.is_running && self.remaining_seconds == 0
    }
}
