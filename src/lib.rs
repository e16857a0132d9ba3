// Library surface for headless/integration tests and reuse.
// The terminal front end lives in main.rs and ui.rs.
pub mod app_dirs;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod cues;
pub mod error;
pub mod history;
pub mod runtime;
pub mod sequencer;
pub mod session;
pub mod util;

pub use catalog::{FormatDefinition, MapCatalog, StageCatalog, StageDefinition};
pub use cues::{CueConfig, CueKind, CueSet};
pub use error::{TimerError, TimerResult};
pub use session::{SessionController, SessionPhase, Snapshot, TickOutcome};
