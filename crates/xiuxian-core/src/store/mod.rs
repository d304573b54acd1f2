//! Progression store: SQLite persistence with a TTL read cache.
//!
//! Layout: `realms` rows in ladder order, `skills` rows for gongfa (tied to
//! a realm) and the independent pools (realm-less), one `progression_config`
//! row for the player position. Node lists travel as JSON string arrays.
//!
//! v0.3.0: save collapsed into a single transaction
//! v0.4.0: read cache TTL from config, index clamp on load

pub mod cache;
pub mod ledger;

pub use cache::SnapshotCache;
pub use ledger::{ActivityRecord, CharacterTotals, SqliteLedger};

use crate::config::CoreConfig;
use crate::error::Result;
use crate::model::{ProgressionState, Realm, Skill, SkillCategory};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

const SCHEMA_VERSION: u32 = 1;

/// SQLite-backed progression store
pub struct ProgressionStore {
    conn: Arc<Mutex<Connection>>,
    cache: SnapshotCache,
    db_path: PathBuf,
    default_realm: String,
}

impl ProgressionStore {
    /// Open or create the store at the configured location
    pub fn open_default(config: &CoreConfig) -> Result<Self> {
        Self::open(&config.database_path(), config)
    }

    /// Open or create the store at a specific path
    pub fn open(path: &Path, config: &CoreConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening progression store at: {}", path.display());
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            cache: SnapshotCache::new(config.effective_cache_ttl()),
            db_path: path.to_path_buf(),
            default_realm: config.default_realm.clone(),
        };

        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS realms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                order_index INTEGER NOT NULL,
                completed INTEGER NOT NULL DEFAULT 0
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS skills (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                realm_id INTEGER REFERENCES realms(id),
                category TEXT NOT NULL CHECK(category IN ('gongfa', 'secret_art', 'challenge')),
                nodes_json TEXT NOT NULL,
                completed_json TEXT NOT NULL DEFAULT '[]'
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS progression_config (
                id INTEGER PRIMARY KEY CHECK(id = 1),
                current_realm_index INTEGER NOT NULL DEFAULT 0
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS schema_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('version', ?1)",
            params![SCHEMA_VERSION.to_string()],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_realms_order ON realms(order_index)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_skills_realm ON skills(realm_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_skills_category ON skills(category)",
            [],
        )?;

        Ok(())
    }

    /// Persist the whole aggregate in one transaction: position, ladder and
    /// every skill are rewritten together, so a failure leaves the previous
    /// row set untouched. The read cache is dropped only after the commit.
    pub fn save(&self, state: &ProgressionState) -> Result<()> {
        {
            let mut guard = self.conn.lock().unwrap();
            let tx = guard.transaction()?;

            tx.execute(
                "INSERT OR REPLACE INTO progression_config (id, current_realm_index) VALUES (1, ?1)",
                params![state.current_realm_index as i64],
            )?;
            tx.execute("DELETE FROM skills", [])?;
            tx.execute("DELETE FROM realms", [])?;

            for (order, realm) in state.realms.iter().enumerate() {
                tx.execute(
                    "INSERT INTO realms (name, order_index, completed) VALUES (?1, ?2, ?3)",
                    params![realm.name, order as i64, realm.completed],
                )?;
                let realm_id = tx.last_insert_rowid();
                for (name, skill) in &realm.skills {
                    insert_skill(&tx, name, Some(realm_id), SkillCategory::Gongfa, skill)?;
                }
            }
            for (name, skill) in &state.secret_arts {
                insert_skill(&tx, name, None, SkillCategory::SecretArt, skill)?;
            }
            for (name, skill) in &state.challenges {
                insert_skill(&tx, name, None, SkillCategory::Challenge, skill)?;
            }

            tx.commit()?;
        }

        self.cache.invalidate();
        debug!(
            "saved progression state ({} realms, current index {})",
            state.realms.len(),
            state.current_realm_index
        );
        Ok(())
    }

    /// Load the aggregate, served from the read cache while it is fresh.
    /// An empty store yields a seeded single-realm ladder without writing it.
    pub fn load(&self) -> Result<ProgressionState> {
        if let Some(state) = self.cache.get() {
            return Ok(state);
        }

        let state = self.read_state()?;
        self.cache.put(state.clone());
        Ok(state)
    }

    /// Degraded load for startup paths: any persistence failure falls back
    /// to the seeded default, which is never cached
    pub fn load_or_default(&self) -> ProgressionState {
        match self.load() {
            Ok(state) => state,
            Err(err) => {
                warn!(
                    "failed to load progression state, falling back to default: {}",
                    err
                );
                ProgressionState::seeded(&self.default_realm)
            }
        }
    }

    fn read_state(&self) -> Result<ProgressionState> {
        let conn = self.conn.lock().unwrap();

        let stored_index: i64 = conn
            .query_row(
                "SELECT current_realm_index FROM progression_config WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(0);

        let mut realms = Vec::new();
        let mut realm_ids = Vec::new();
        {
            let mut stmt =
                conn.prepare("SELECT id, name, completed FROM realms ORDER BY order_index")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, bool>(2)?,
                ))
            })?;
            for row in rows {
                let (id, name, completed) = row?;
                realm_ids.push(id);
                realms.push(Realm {
                    name,
                    completed,
                    skills: BTreeMap::new(),
                });
            }
        }

        if realms.is_empty() {
            info!(
                "progression store is empty, seeding realm '{}'",
                self.default_realm
            );
            return Ok(ProgressionState::seeded(&self.default_realm));
        }

        {
            let mut stmt = conn.prepare(
                "SELECT realm_id, name, nodes_json, completed_json FROM skills WHERE category = 'gongfa'",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, Option<i64>>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?;
            for row in rows {
                let (realm_id, name, nodes_json, completed_json) = row?;
                let skill = decode_skill(&nodes_json, &completed_json)?;
                match realm_id.and_then(|id| realm_ids.iter().position(|r| *r == id)) {
                    Some(pos) => {
                        realms[pos].skills.insert(name, skill);
                    }
                    None => {
                        warn!("skipping gongfa '{}' with no matching realm row", name);
                    }
                }
            }
        }

        let secret_arts = read_pool(&conn, SkillCategory::SecretArt)?;
        let challenges = read_pool(&conn, SkillCategory::Challenge)?;

        // A store written by an older build may carry an out-of-range index
        let mut current = stored_index.max(0) as usize;
        if current >= realms.len() {
            warn!(
                "stored realm index {} out of range, clamping to {}",
                current,
                realms.len() - 1
            );
            current = realms.len() - 1;
        }

        Ok(ProgressionState {
            realms,
            current_realm_index: current,
            secret_arts,
            challenges,
        })
    }

    /// Get database path
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }
}

fn insert_skill(
    tx: &Transaction,
    name: &str,
    realm_id: Option<i64>,
    category: SkillCategory,
    skill: &Skill,
) -> Result<()> {
    let nodes = serde_json::to_string(&skill.nodes)?;
    let completed = serde_json::to_string(&skill.completed)?;
    tx.execute(
        "INSERT INTO skills (name, realm_id, category, nodes_json, completed_json)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![name, realm_id, category.as_str(), nodes, completed],
    )?;
    Ok(())
}

fn decode_skill(nodes_json: &str, completed_json: &str) -> Result<Skill> {
    let nodes: Vec<String> = serde_json::from_str(nodes_json)?;
    let mut completed: BTreeSet<String> = serde_json::from_str(completed_json)?;
    // completed must stay a subset of nodes, whatever the rows say
    completed.retain(|label| nodes.iter().any(|n| n == label));
    Ok(Skill { nodes, completed })
}

fn read_pool(conn: &Connection, category: SkillCategory) -> Result<BTreeMap<String, Skill>> {
    let mut stmt = conn
        .prepare("SELECT name, nodes_json, completed_json FROM skills WHERE category = ?1")?;
    let rows = stmt.query_map(params![category.as_str()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut pool = BTreeMap::new();
    for row in rows {
        let (name, nodes_json, completed_json) = row?;
        pool.insert(name, decode_skill(&nodes_json, &completed_json)?);
    }
    Ok(pool)
}
