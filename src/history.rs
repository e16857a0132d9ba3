use chrono::{DateTime, Local};
use rusqlite::{params, Connection, Result};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;

/// One finished stage, as the speaker actually used it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRecord {
    pub format_name: String,
    pub stage_name: String,
    pub allotted_seconds: u32,
    pub used_seconds: u32,
    pub overtime_seconds: u32,
    pub recorded_at: DateTime<Local>,
}

/// SQLite log of completed stages
#[derive(Debug)]
pub struct HistoryDb {
    conn: Connection,
}

impl HistoryDb {
    /// Opens the database under $HOME/.local/state/lectern
    pub fn new() -> Result<Self> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("lectern_history.db"));
        Self::open(&path)
    }

    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS stage_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                format_name TEXT NOT NULL,
                stage_name TEXT NOT NULL,
                allotted_seconds INTEGER NOT NULL,
                used_seconds INTEGER NOT NULL,
                overtime_seconds INTEGER NOT NULL,
                recorded_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_stage_history_recorded ON stage_history(recorded_at)",
            [],
        )?;

        Ok(HistoryDb { conn })
    }

    pub fn record(&self, record: &StageRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO stage_history
            (format_name, stage_name, allotted_seconds, used_seconds, overtime_seconds, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.format_name,
                record.stage_name,
                record.allotted_seconds,
                record.used_seconds,
                record.overtime_seconds,
                record.recorded_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Most recent first
    pub fn recent(&self, limit: usize) -> Result<Vec<StageRecord>> {
        self.query(
            "SELECT format_name, stage_name, allotted_seconds, used_seconds, overtime_seconds, recorded_at
             FROM stage_history ORDER BY id DESC LIMIT ?1",
            params![limit as i64],
        )
    }

    /// Oldest first
    pub fn all(&self) -> Result<Vec<StageRecord>> {
        self.query(
            "SELECT format_name, stage_name, allotted_seconds, used_seconds, overtime_seconds, recorded_at
             FROM stage_history ORDER BY id ASC",
            [],
        )
    }

    fn query<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<StageRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            let recorded_at: String = row.get(5)?;
            let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
                .map(|dt| dt.with_timezone(&Local))
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        5,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
            Ok(StageRecord {
                format_name: row.get(0)?,
                stage_name: row.get(1)?,
                allotted_seconds: row.get(2)?,
                used_seconds: row.get(3)?,
                overtime_seconds: row.get(4)?,
                recorded_at,
            })
        })?;
        rows.collect()
    }

    pub fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM stage_history", [])?;
        Ok(())
    }
}

/// Writes records as CSV with a header row.
pub fn export_csv<W: Write>(records: &[StageRecord], writer: W) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}
