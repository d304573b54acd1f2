//! SQLite-backed character ledger.
//!
//! Reference implementation of [`CharacterLedger`]: a single character row
//! holding the spirit/vitality totals plus an append-only activity log.
//! Spirit is clamped to the configured bounds, vitality never drops below
//! zero. Each write is one transaction behind the ledger's own lock, so an
//! outside decay timer can run alongside reward dispatch.

use crate::config::CoreConfig;
use crate::rewards::CharacterLedger;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Current spirit/vitality totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CharacterTotals {
    pub spirit: i64,
    pub vitality: i64,
}

/// One recorded activity with the delta it applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub name: String,
    pub category: String,
    pub spirit_delta: i64,
    pub vitality_delta: i64,
    pub recorded_at: DateTime<Utc>,
}

pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
    spirit_floor: i64,
    spirit_ceiling: i64,
}

impl SqliteLedger {
    /// Open or create the ledger at the configured location
    pub fn open_default(config: &CoreConfig) -> Result<Self> {
        Self::open(&config.ledger_path(), config)
    }

    /// Open or create the ledger at a specific path
    pub fn open(path: &Path, config: &CoreConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        info!("Opening character ledger at: {}", path.display());
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {:?}", path))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        let (spirit_floor, spirit_ceiling) = config.effective_spirit_bounds();
        let ledger = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
            spirit_floor,
            spirit_ceiling,
        };

        ledger.init_schema(config.starting_vitality)?;
        Ok(ledger)
    }

    fn init_schema(&self, starting_vitality: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS character (
                id INTEGER PRIMARY KEY CHECK(id = 1),
                spirit INTEGER NOT NULL DEFAULT 0,
                vitality INTEGER NOT NULL DEFAULT 0
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS activities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                category TEXT NOT NULL,
                spirit_delta INTEGER NOT NULL,
                vitality_delta INTEGER NOT NULL,
                recorded_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_activities_recorded ON activities(recorded_at)",
            [],
        )?;

        // Singleton row; an existing sheet keeps its totals
        conn.execute(
            "INSERT OR IGNORE INTO character (id, spirit, vitality) VALUES (1, 0, ?1)",
            params![starting_vitality.max(0)],
        )?;

        Ok(())
    }

    /// Current totals
    pub fn totals(&self) -> Result<CharacterTotals> {
        let conn = self.conn.lock().unwrap();
        let totals = conn.query_row(
            "SELECT spirit, vitality FROM character WHERE id = 1",
            [],
            |row| {
                Ok(CharacterTotals {
                    spirit: row.get(0)?,
                    vitality: row.get(1)?,
                })
            },
        )?;
        Ok(totals)
    }

    /// Most recent activities, newest first
    pub fn recent_activities(&self, limit: usize) -> Result<Vec<ActivityRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT name, category, spirit_delta, vitality_delta, recorded_at
             FROM activities ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(ActivityRecord {
                name: row.get(0)?,
                category: row.get(1)?,
                spirit_delta: row.get(2)?,
                vitality_delta: row.get(3)?,
                recorded_at: DateTime::parse_from_rfc3339(&row.get::<_, String>(4)?)
                    .unwrap_or_else(|_| Utc::now().into())
                    .with_timezone(&Utc),
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Drain vitality by `amount`, floored at zero. Meant for the life
    /// countdown timer that runs outside the progression core.
    pub fn decay_vitality(&self, amount: i64) -> Result<()> {
        self.apply_delta(0, -amount)
    }

    /// Get database path
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    fn apply_delta_tx(&self, tx: &rusqlite::Transaction, spirit: i64, vitality: i64) -> Result<()> {
        let (current_spirit, current_vitality): (i64, i64) = tx.query_row(
            "SELECT spirit, vitality FROM character WHERE id = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let new_spirit = (current_spirit + spirit).clamp(self.spirit_floor, self.spirit_ceiling);
        let new_vitality = (current_vitality + vitality).max(0);

        tx.execute(
            "UPDATE character SET spirit = ?1, vitality = ?2 WHERE id = 1",
            params![new_spirit, new_vitality],
        )?;
        Ok(())
    }
}

impl CharacterLedger for SqliteLedger {
    fn apply_delta(&self, spirit: i64, vitality: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;
        self.apply_delta_tx(&tx, spirit, vitality)?;
        tx.commit()?;
        Ok(())
    }

    fn record_activity(
        &self,
        name: &str,
        category: &str,
        spirit: i64,
        vitality: i64,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO activities (name, category, spirit_delta, vitality_delta, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![name, category, spirit, vitality, Utc::now().to_rfc3339()],
        )?;
        self.apply_delta_tx(&tx, spirit, vitality)?;
        tx.commit()?;

        debug!(
            "recorded activity '{}' (spirit {:+}, vitality {:+})",
            name, spirit, vitality
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_ledger(starting_vitality: i64) -> (SqliteLedger, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test_character.db");
        let config = CoreConfig {
            starting_vitality,
            ..Default::default()
        };
        let ledger = SqliteLedger::open(&path, &config).unwrap();
        (ledger, dir)
    }

    #[test]
    fn test_fresh_ledger_totals() {
        let (ledger, _dir) = test_ledger(0);
        assert_eq!(
            ledger.totals().unwrap(),
            CharacterTotals {
                spirit: 0,
                vitality: 0
            }
        );
    }

    #[test]
    fn test_record_activity_accumulates() {
        let (ledger, _dir) = test_ledger(0);
        ledger
            .record_activity("QiRefining-Meditation-Basic", "positive", 1, 1)
            .unwrap();
        ledger
            .record_activity("QiRefining-Meditation-Basic", "positive", 1, 1)
            .unwrap();

        // Re-earned rewards stack; there is no dedup by name
        assert_eq!(
            ledger.totals().unwrap(),
            CharacterTotals {
                spirit: 2,
                vitality: 2
            }
        );

        let records = ledger.recent_activities(10).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "QiRefining-Meditation-Basic");
        assert_eq!(records[0].category, "positive");
    }

    #[test]
    fn test_spirit_clamped_at_bounds() {
        let (ledger, _dir) = test_ledger(0);

        ledger.apply_delta(500, 0).unwrap();
        assert_eq!(ledger.totals().unwrap().spirit, 200);

        ledger.apply_delta(-1000, 0).unwrap();
        assert_eq!(ledger.totals().unwrap().spirit, -80);
    }

    #[test]
    fn test_vitality_floored_at_zero() {
        let (ledger, _dir) = test_ledger(3);
        ledger.apply_delta(0, -10).unwrap();
        assert_eq!(ledger.totals().unwrap().vitality, 0);
    }

    #[test]
    fn test_decay_vitality() {
        let (ledger, _dir) = test_ledger(10);
        ledger.decay_vitality(3).unwrap();
        assert_eq!(ledger.totals().unwrap().vitality, 7);

        ledger.decay_vitality(20).unwrap();
        assert_eq!(ledger.totals().unwrap().vitality, 0);
    }

    #[test]
    fn test_recent_activities_order_and_limit() {
        let (ledger, _dir) = test_ledger(0);
        ledger.record_activity("first", "positive", 1, 0).unwrap();
        ledger.record_activity("second", "positive", 1, 0).unwrap();
        ledger.record_activity("third", "positive", 1, 0).unwrap();

        let records = ledger.recent_activities(2).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "third");
        assert_eq!(records[1].name, "second");
    }

    #[test]
    fn test_reopen_keeps_totals() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test_character.db");
        let config = CoreConfig {
            starting_vitality: 5,
            ..Default::default()
        };

        {
            let ledger = SqliteLedger::open(&path, &config).unwrap();
            ledger.apply_delta(7, 2).unwrap();
        }

        let ledger = SqliteLedger::open(&path, &config).unwrap();
        assert_eq!(
            ledger.totals().unwrap(),
            CharacterTotals {
                spirit: 7,
                vitality: 7
            }
        );
    }
}
