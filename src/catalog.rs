use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::error::{TimerError, TimerResult};

static FORMATS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/formats");

/// Format selected when nothing else is configured
pub const DEFAULT_FORMAT: &str = "Public Forum";

/// One timed segment of a round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawStage")]
pub struct StageDefinition {
    name: String,
    duration_seconds: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    protected_window_seconds: Option<u32>,
}

#[derive(Deserialize)]
struct RawStage {
    name: String,
    duration_seconds: u32,
    #[serde(default)]
    protected_window_seconds: Option<u32>,
}

impl TryFrom<RawStage> for StageDefinition {
    type Error = TimerError;

    fn try_from(raw: RawStage) -> Result<Self, Self::Error> {
        let stage = StageDefinition::new(raw.name, raw.duration_seconds)?;
        match raw.protected_window_seconds {
            Some(window) => stage.with_protected_window(window),
            None => Ok(stage),
        }
    }
}

impl StageDefinition {
    pub fn new(name: impl Into<String>, duration_seconds: u32) -> TimerResult<Self> {
        let name = name.into();
        if duration_seconds == 0 {
            return Err(TimerError::InvalidDefinition(format!(
                "stage \"{name}\" must last at least one second"
            )));
        }
        Ok(Self {
            name,
            duration_seconds,
            protected_window_seconds: None,
        })
    }

    /// A zero-length window means no protected time at all.
    pub fn with_protected_window(mut self, window_seconds: u32) -> TimerResult<Self> {
        if window_seconds == 0 {
            self.protected_window_seconds = None;
            return Ok(self);
        }
        if window_seconds.saturating_mul(2) > self.duration_seconds {
            return Err(TimerError::InvalidDefinition(format!(
                "stage \"{}\": protected windows of {}s overlap in a {}s stage",
                self.name, window_seconds, self.duration_seconds
            )));
        }
        self.protected_window_seconds = Some(window_seconds);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn duration_seconds(&self) -> u32 {
        self.duration_seconds
    }

    /// Length of both the opening and the closing protected window.
    pub fn protected_window_seconds(&self) -> Option<u32> {
        self.protected_window_seconds
    }
}

/// A named, ordered list of stages.
///
/// Definitions only come out of the validating constructors, so a format
/// always has at least one stage:
///
/// ```compile_fail
/// let empty = lectern::FormatDefinition { name: "Empty".into(), stages: vec![] };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFormat")]
pub struct FormatDefinition {
    name: String,
    stages: Vec<StageDefinition>,
}

#[derive(Deserialize)]
struct RawFormat {
    name: String,
    stages: Vec<StageDefinition>,
}

impl TryFrom<RawFormat> for FormatDefinition {
    type Error = TimerError;

    fn try_from(raw: RawFormat) -> Result<Self, Self::Error> {
        FormatDefinition::new(raw.name, raw.stages)
    }
}

impl FormatDefinition {
    pub fn new(name: impl Into<String>, stages: Vec<StageDefinition>) -> TimerResult<Self> {
        let name = name.into();
        if stages.is_empty() {
            return Err(TimerError::InvalidDefinition(format!(
                "format \"{name}\" has no stages"
            )));
        }
        Ok(Self { name, stages })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stages(&self) -> &[StageDefinition] {
        &self.stages
    }

    pub fn stage(&self, index: usize) -> Option<&StageDefinition> {
        self.stages.get(index)
    }

    pub fn first_stage(&self) -> &StageDefinition {
        &self.stages[0]
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Whole-round length; wide enough for any number of `u32` stages.
    pub fn total_seconds(&self) -> u64 {
        self.stages.iter().map(|s| u64::from(s.duration_seconds)).sum()
    }
}

/// Lookup key: case-insensitive, with spaces, underscores and hyphens equivalent.
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            ' ' | '_' => '-',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Source of immutable format definitions
pub trait StageCatalog {
    fn get_format(&self, name: &str) -> TimerResult<Arc<FormatDefinition>>;
    fn format_names(&self) -> Vec<String>;
}

/// In-memory catalog, ordered by insertion
#[derive(Debug, Clone, Default)]
pub struct MapCatalog {
    formats: Vec<Arc<FormatDefinition>>,
}

impl MapCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_formats(formats: impl IntoIterator<Item = FormatDefinition>) -> Self {
        let mut catalog = Self::new();
        catalog.extend(formats);
        catalog
    }

    /// Formats compiled into the binary
    pub fn builtin() -> TimerResult<Self> {
        let mut files: Vec<_> = FORMATS_DIR
            .files()
            .filter(|f| f.path().extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort_by(|a, b| a.path().cmp(b.path()));

        let mut catalog = Self::new();
        for file in files {
            let name = file.path().display().to_string();
            let text = file.contents_utf8().ok_or_else(|| {
                TimerError::InvalidDefinition(format!("{name} is not valid utf-8"))
            })?;
            let format: FormatDefinition = serde_json::from_str(text)
                .map_err(|e| TimerError::InvalidDefinition(format!("{name}: {e}")))?;
            catalog.insert(format);
        }
        Ok(catalog)
    }

    /// Inserts a format, replacing any existing one with the same normalized name.
    pub fn insert(&mut self, format: FormatDefinition) {
        let key = normalize_name(&format.name);
        let format = Arc::new(format);
        match self
            .formats
            .iter_mut()
            .find(|f| normalize_name(&f.name) == key)
        {
            Some(existing) => {
                debug!(format = %format.name, "replacing format definition");
                *existing = format;
            }
            None => self.formats.push(format),
        }
    }

    pub fn extend(&mut self, formats: impl IntoIterator<Item = FormatDefinition>) {
        for format in formats {
            self.insert(format);
        }
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<FormatDefinition>> {
        self.formats.iter()
    }
}

impl StageCatalog for MapCatalog {
    fn get_format(&self, name: &str) -> TimerResult<Arc<FormatDefinition>> {
        let key = normalize_name(name);
        self.formats
            .iter()
            .find(|f| normalize_name(&f.name) == key)
            .cloned()
            .ok_or_else(|| TimerError::NotFound(name.to_string()))
    }

    fn format_names(&self) -> Vec<String> {
        self.formats.iter().map(|f| f.name.clone()).collect()
    }
}
