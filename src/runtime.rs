use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};

/// What the timer loop reacts to
#[derive(Clone, Debug)]
pub enum TimerEvent {
    Key(KeyEvent),
    Resize,
    /// Redraw and pacing tick, stamped with the instant it was issued.
    Tick(Instant),
}

/// Where key and resize events come from
pub trait TimerEventSource: Send + 'static {
    /// Waits up to `timeout` for the next event.
    fn recv_timeout(&self, timeout: Duration) -> Result<TimerEvent, RecvTimeoutError>;
}

/// Reads the terminal on a background thread
pub struct CrosstermEventSource {
    rx: Receiver<TimerEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let event = match event::read() {
                // presses only; release and repeat reports are dropped
                Ok(CtEvent::Key(key)) if key.kind == KeyEventKind::Press => TimerEvent::Key(key),
                Ok(CtEvent::Resize(_, _)) => TimerEvent::Resize,
                Ok(_) => continue,
                Err(_) => break,
            };
            if tx.send(event).is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<TimerEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Spacing of UI ticks
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Channel-fed event source for headless runs
pub struct TestEventSource {
    rx: Receiver<TimerEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<TimerEvent>) -> Self {
        Self { rx }
    }
}

impl TimerEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<TimerEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Hands out one event per step, with ticks on a fixed schedule.
///
/// A tick that has come due is returned before any queued input, so a burst
/// of key presses cannot hold the clock back. Missed ticks are not replayed;
/// `SecondPacer` works from the tick timestamps instead.
pub struct Runner<E: TimerEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
    next_tick: Instant,
}

impl<E: TimerEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        let next_tick = Instant::now() + ticker.interval();
        Self {
            event_source,
            ticker,
            next_tick,
        }
    }

    pub fn step(&mut self) -> TimerEvent {
        let now = Instant::now();
        if now < self.next_tick {
            match self.event_source.recv_timeout(self.next_tick - now) {
                Ok(ev) => return ev,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    std::thread::sleep(self.next_tick.saturating_duration_since(Instant::now()));
                }
            }
        }
        let now = Instant::now();
        self.next_tick = now + self.ticker.interval();
        TimerEvent::Tick(now)
    }
}

/// Turns wall-clock time into whole-second engine ticks.
///
/// UI ticks arrive faster than once a second and at uneven spacing; `due`
/// reports how many full seconds have elapsed since it last answered. Time
/// spent halted does not count, and a partial second is carried over a
/// halt/resume pair.
#[derive(Debug, Clone, Default)]
pub struct SecondPacer {
    anchor: Option<Instant>,
    issued: u64,
    carry: Duration,
}

impl SecondPacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn resume_at(&mut self, now: Instant) {
        if self.anchor.is_some() {
            return;
        }
        self.anchor = Some(now.checked_sub(self.carry).unwrap_or(now));
        self.issued = 0;
    }

    pub fn halt_at(&mut self, now: Instant) {
        if let Some(anchor) = self.anchor.take() {
            let elapsed = now.saturating_duration_since(anchor);
            self.carry = elapsed.saturating_sub(Duration::from_secs(self.issued));
            self.issued = 0;
        }
    }

    /// Forget any partial second, e.g. when the stage changes.
    pub fn clear(&mut self) {
        self.anchor = None;
        self.issued = 0;
        self.carry = Duration::ZERO;
    }

    pub fn due(&mut self, now: Instant) -> u64 {
        let Some(anchor) = self.anchor else {
            return 0;
        };
        let whole = now.saturating_duration_since(anchor).as_secs();
        let due = whole.saturating_sub(self.issued);
        self.issued = whole;
        due
    }
}
