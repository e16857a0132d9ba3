pub mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use itertools::Itertools;
use lectern::{
    app_dirs::AppDirs,
    catalog::DEFAULT_FORMAT,
    config::{load_formats_file, Config, ConfigStore, FileConfigStore},
    history::{export_csv, HistoryDb, StageRecord},
    runtime::{CrosstermEventSource, FixedTicker, Runner, SecondPacer, TimerEvent},
    util::{format_clock, format_total, parse_stage_arg},
    CueConfig, CueKind, FormatDefinition, MapCatalog, SessionController, SessionPhase,
    Snapshot, StageCatalog, StageDefinition, TimerError, TimerResult,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    fs::{self, File, OpenOptions},
    io::{self, stdin},
    path::PathBuf,
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const TICK_RATE_MS: u64 = 100;
const FLASH_TICKS: u8 = 15;
const CUSTOM_FORMAT: &str = "Custom";

/// debate speech timer with stage formats, protected time, and cue alerts
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal speech timer for debate rounds: pick a format, run each speech's countdown, and get warning, protected-time, and time-up cues."
)]
pub struct Cli {
    /// debate format to time (see --list-formats)
    #[clap(short = 'f', long)]
    format: Option<String>,

    /// seconds remaining when the warning cue fires
    #[clap(short = 'w', long, conflicts_with = "no_warning")]
    warning_secs: Option<u32>,

    /// turn the warning cue off
    #[clap(long)]
    no_warning: bool,

    /// do not ring the terminal bell on warning and time-up cues
    #[clap(long)]
    no_bell: bool,

    /// ad-hoc stage as NAME=M:SS[/PROTECTED]; repeat to build a custom format
    #[clap(long = "stage", value_name = "STAGE")]
    stages: Vec<String>,

    /// JSON file with additional format definitions
    #[clap(long)]
    formats_file: Option<PathBuf>,

    /// list available formats and exit
    #[clap(long)]
    list_formats: bool,

    /// print the N most recent stage records and exit
    #[clap(long, value_name = "N")]
    history: Option<usize>,

    /// write every stage record as CSV to PATH and exit
    #[clap(long, value_name = "PATH")]
    export_history: Option<PathBuf>,

    /// delete every stage record and exit
    #[clap(long)]
    clear_history: bool,
}

/// Config file values with command-line overrides applied
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    pub format: Option<String>,
    pub default_format: String,
    pub cue_config: CueConfig,
    pub bell: bool,
    pub formats_file: Option<PathBuf>,
    pub custom_stages: Vec<StageDefinition>,
}

impl RuntimeSettings {
    pub fn resolve(cli: &Cli, config: &Config) -> TimerResult<Self> {
        let mut cue_config = config.cue_config();
        if cli.no_warning {
            cue_config.warning_seconds = None;
        } else if let Some(secs) = cli.warning_secs {
            cue_config.warning_seconds = Some(secs);
        }
        let custom_stages = cli
            .stages
            .iter()
            .map(|s| parse_stage_arg(s))
            .collect::<TimerResult<Vec<_>>>()?;

        Ok(Self {
            format: cli.format.clone(),
            default_format: config.default_format.clone(),
            cue_config,
            bell: config.bell && !cli.no_bell,
            formats_file: cli.formats_file.clone().or_else(|| config.formats_file.clone()),
            custom_stages,
        })
    }

    pub fn build_catalog(&self) -> Result<MapCatalog, Box<dyn Error>> {
        let mut catalog = MapCatalog::builtin()?;
        if let Some(path) = &self.formats_file {
            let formats = load_formats_file(path)
                .map_err(|e| format!("cannot load formats from {}: {e}", path.display()))?;
            info!(count = formats.len(), path = %path.display(), "loaded user formats");
            catalog.extend(formats);
        }
        if !self.custom_stages.is_empty() {
            catalog.insert(FormatDefinition::new(
                CUSTOM_FORMAT,
                self.custom_stages.clone(),
            )?);
        }
        Ok(catalog)
    }

    /// An explicitly requested format must exist. A configured default that
    /// has gone missing falls back to the built-in default.
    pub fn select_initial_format<C: StageCatalog>(
        &self,
        controller: &mut SessionController<C>,
    ) -> TimerResult<()> {
        if let Some(name) = &self.format {
            return controller.select_format(name);
        }
        if !self.custom_stages.is_empty() {
            return controller.select_format(CUSTOM_FORMAT);
        }
        match controller.select_format(&self.default_format) {
            Err(TimerError::NotFound(name)) => {
                warn!(%name, fallback = DEFAULT_FORMAT, "configured format not found");
                controller.select_format(DEFAULT_FORMAT)
            }
            other => other,
        }
    }
}

/// Cue banner currently on screen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Flash {
    pub cue: CueKind,
    pub ticks_left: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyAction {
    Continue,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Toggle,
    Advance,
    JumpTo(usize),
    Reset,
    Stop,
    NextFormat,
}

impl Command {
    /// Whether a successful run of this command ends the current stage activation.
    fn ends_activation(self) -> bool {
        !matches!(self, Command::Toggle)
    }
}

pub struct App {
    pub controller: SessionController<MapCatalog>,
    pub pacer: SecondPacer,
    /// Seconds past zero on the current stage; the engine clamps at zero.
    pub overtime_secs: u32,
    pub flash: Option<Flash>,
    pub notice: Option<String>,
    pub bell: bool,
    history: Option<HistoryDb>,
    stage_logged: bool,
}

impl App {
    pub fn new(
        controller: SessionController<MapCatalog>,
        bell: bool,
        history: Option<HistoryDb>,
    ) -> Self {
        Self {
            controller,
            pacer: SecondPacer::new(),
            overtime_secs: 0,
            flash: None,
            notice: None,
            bell,
            history,
            stage_logged: false,
        }
    }

    /// Feeds elapsed wall time to the engine; returns the cues that fired.
    pub fn on_ui_tick(&mut self, now: Instant) -> Vec<CueKind> {
        let mut fired = Vec::new();
        for _ in 0..self.pacer.due(now) {
            match self.controller.tick() {
                Ok(outcome) => {
                    if outcome.overtime && !outcome.cues.contains(&CueKind::End) {
                        self.overtime_secs += 1;
                    }
                    if let Some(&cue) = outcome.cues.iter().next_back() {
                        self.flash = Some(Flash {
                            cue,
                            ticks_left: FLASH_TICKS,
                        });
                    }
                    fired.extend(outcome.cues);
                }
                Err(e) => {
                    warn!(error = %e, "tick refused");
                    self.pacer.clear();
                    break;
                }
            }
        }

        if let Some(flash) = &mut self.flash {
            flash.ticks_left = flash.ticks_left.saturating_sub(1);
            if flash.ticks_left == 0 {
                self.flash = None;
            }
        }
        fired
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) -> KeyAction {
        let command = match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return KeyAction::Quit,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return KeyAction::Quit
            }
            KeyCode::Char(' ') => Command::Toggle,
            KeyCode::Char('n') | KeyCode::Right => Command::Advance,
            KeyCode::Char('r') => Command::Reset,
            KeyCode::Char('s') => Command::Stop,
            KeyCode::Tab => Command::NextFormat,
            KeyCode::Char(c @ '1'..='9') => Command::JumpTo(c as usize - '1' as usize),
            _ => return KeyAction::Continue,
        };
        self.apply(command, now);
        KeyAction::Continue
    }

    fn apply(&mut self, command: Command, now: Instant) {
        let before = self.controller.snapshot();
        let result = match command {
            Command::Toggle => self.toggle(&before),
            Command::Advance => self.controller.advance(),
            Command::JumpTo(index) => self.controller.jump_to(index),
            Command::Reset => self.controller.reset(),
            Command::Stop => self.controller.stop(),
            Command::NextFormat => self.next_format(),
        };

        match result {
            Err(e) => {
                if !e.is_notice() {
                    warn!(error = %e, ?command, "key command failed");
                }
                self.notice = Some(e.to_string());
            }
            Ok(()) => {
                self.notice = None;
                if command.ends_activation() {
                    self.log_stage(&before);
                    if self.controller.phase() == SessionPhase::Finished {
                        self.stage_logged = true;
                    } else {
                        self.overtime_secs = 0;
                        self.stage_logged = false;
                        self.flash = None;
                        self.pacer.clear();
                    }
                }
            }
        }
        self.sync_pacer(now);
    }

    fn toggle(&mut self, snap: &Snapshot) -> TimerResult<()> {
        match snap.phase {
            SessionPhase::Running => self.controller.pause(),
            SessionPhase::Overtime if snap.is_running => self.controller.pause(),
            SessionPhase::Paused | SessionPhase::Overtime => self.controller.resume(),
            _ => self.controller.start(),
        }
    }

    fn next_format(&mut self) -> TimerResult<()> {
        let names = self.controller.catalog().format_names();
        let current = self
            .controller
            .format()
            .and_then(|f| names.iter().position(|n| n == f.name()));
        let next = match current {
            Some(i) => (i + 1) % names.len(),
            None => 0,
        };
        self.controller.select_format(&names[next])
    }

    fn sync_pacer(&mut self, now: Instant) {
        if self.controller.snapshot().is_running {
            self.pacer.resume_at(now);
        } else {
            self.pacer.halt_at(now);
        }
    }

    fn log_stage(&mut self, snap: &Snapshot) {
        if self.stage_logged {
            return;
        }
        let (Some(format_name), Some(stage_name)) = (&snap.format_name, &snap.stage_name) else {
            return;
        };
        let used = snap.duration_seconds - snap.remaining_seconds;
        if used == 0 && self.overtime_secs == 0 {
            return;
        }
        let record = StageRecord {
            format_name: format_name.clone(),
            stage_name: stage_name.clone(),
            allotted_seconds: snap.duration_seconds,
            used_seconds: used,
            overtime_seconds: self.overtime_secs,
            recorded_at: chrono::Local::now(),
        };
        if let Some(db) = &self.history {
            if let Err(e) = db.record(&record) {
                warn!(error = %e, "failed to record stage history");
            }
        }
    }

    pub fn history(&self) -> Option<&HistoryDb> {
        self.history.as_ref()
    }
}

fn init_logging() {
    let Ok(filter) = EnvFilter::try_from_env("LECTERN_LOG") else {
        return;
    };
    let Some(path) = AppDirs::log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
}

fn print_formats(catalog: &MapCatalog) {
    for format in catalog.iter() {
        println!(
            "{} ({})",
            format.name(),
            format_total(format.total_seconds())
        );
        println!(
            "  {}",
            format
                .stages()
                .iter()
                .map(|s| match s.protected_window_seconds() {
                    Some(w) => format!(
                        "{} {} [{}s protected]",
                        s.name(),
                        format_clock(s.duration_seconds()),
                        w
                    ),
                    None => format!("{} {}", s.name(), format_clock(s.duration_seconds())),
                })
                .join(", ")
        );
    }
}

fn print_history(records: &[StageRecord]) {
    if records.is_empty() {
        println!("no stages recorded yet");
        return;
    }
    for r in records {
        let over = if r.overtime_seconds > 0 {
            format!(" (+{})", format_clock(r.overtime_seconds))
        } else {
            String::new()
        };
        println!(
            "{}  {} / {}  {} of {}{}",
            r.recorded_at.format("%Y-%m-%d %H:%M"),
            r.format_name,
            r.stage_name,
            format_clock(r.used_seconds),
            format_clock(r.allotted_seconds),
            over
        );
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logging();
    let cli = Cli::parse();
    let store = FileConfigStore::new();
    info!(path = %store.path().display(), "loading config");
    let config = store.load();

    let settings = match RuntimeSettings::resolve(&cli, &config) {
        Ok(settings) => settings,
        Err(e) => Cli::command().error(ErrorKind::InvalidValue, e).exit(),
    };
    let catalog = match settings.build_catalog() {
        Ok(catalog) => catalog,
        Err(e) => Cli::command().error(ErrorKind::Io, e).exit(),
    };

    if cli.list_formats {
        print_formats(&catalog);
        return Ok(());
    }
    if let Some(limit) = cli.history {
        print_history(&HistoryDb::new()?.recent(limit)?);
        return Ok(());
    }
    if let Some(path) = &cli.export_history {
        let records = HistoryDb::new()?.all()?;
        export_csv(&records, File::create(path)?)?;
        println!("wrote {} records to {}", records.len(), path.display());
        return Ok(());
    }
    if cli.clear_history {
        HistoryDb::new()?.clear()?;
        println!("stage history cleared");
        return Ok(());
    }

    let mut controller = SessionController::new(catalog, settings.cue_config);
    if let Err(e) = settings.select_initial_format(&mut controller) {
        Cli::command().error(ErrorKind::InvalidValue, e).exit();
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let history = HistoryDb::new()
        .map_err(|e| warn!(error = %e, "stage history disabled"))
        .ok();
    let mut app = App::new(controller, settings.bell, history);

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen,)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let mut runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    terminal.draw(|f| ui(app, f))?;
    loop {
        match runner.step() {
            TimerEvent::Tick(now) => {
                let cues = app.on_ui_tick(now);
                if app.bell && cues.iter().any(|c| matches!(c, CueKind::Warning | CueKind::End)) {
                    let mut out = io::stdout();
                    let _ = execute!(out, Print('\x07'));
                }
            }
            TimerEvent::Resize => {}
            TimerEvent::Key(key) => {
                if app.handle_key(key, Instant::now()) == KeyAction::Quit {
                    break;
                }
            }
        }
        terminal.draw(|f| ui(app, f))?;
    }

    Ok(())
}

fn ui(app: &App, f: &mut Frame) {
    f.render_widget(app, f.area());
}
