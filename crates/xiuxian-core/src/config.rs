//! Core configuration.
//!
//! Configuration lives in the user config directory (config.toml); databases
//! live under the user data directory.
//!
//! v0.3.0: cache TTL made configurable
//! v0.4.0: spirit bounds and starting vitality moved here from the ledger

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Application directory name under the platform config/data dirs
pub const APP_DIR: &str = "xiuxian";
const CONFIG_FILE: &str = "config.toml";
const PROGRESSION_DB_FILE: &str = "progression.db";
const LEDGER_DB_FILE: &str = "character.db";

/// Realm seeded into an empty store
pub const DEFAULT_REALM_NAME: &str = "Qi Refining";

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Directory holding the progression and character databases
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Read-cache TTL in seconds (valid: 1-300)
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Name of the realm seeded into an empty store
    #[serde(default = "default_realm")]
    pub default_realm: String,

    /// Lower bound for the character's spirit total
    #[serde(default = "default_spirit_floor")]
    pub spirit_floor: i64,

    /// Upper bound for the character's spirit total
    #[serde(default = "default_spirit_ceiling")]
    pub spirit_ceiling: i64,

    /// Vitality a fresh character sheet starts with
    #[serde(default)]
    pub starting_vitality: i64,
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join(APP_DIR)
}

fn default_cache_ttl_secs() -> u64 {
    3 // matches the save cadence of a single interactive writer
}

fn default_realm() -> String {
    DEFAULT_REALM_NAME.to_string()
}

fn default_spirit_floor() -> i64 {
    -80
}

fn default_spirit_ceiling() -> i64 {
    200
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            cache_ttl_secs: default_cache_ttl_secs(),
            default_realm: default_realm(),
            spirit_floor: default_spirit_floor(),
            spirit_ceiling: default_spirit_ceiling(),
            starting_vitality: 0,
        }
    }
}

impl CoreConfig {
    /// Load config from the user config directory, falling back to defaults
    pub fn load() -> Self {
        let path = config_path();
        if path.exists() {
            if let Ok(content) = fs::read_to_string(&path) {
                if let Ok(config) = toml::from_str(&content) {
                    return config;
                }
            }
        }
        Self::default()
    }

    /// Save config to the user config file
    pub fn save(&self) -> std::io::Result<()> {
        let path = config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, content)
    }

    /// Validate and clamp cache_ttl_secs to valid range (1-300)
    pub fn effective_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs.clamp(1, 300))
    }

    /// Check if cache_ttl_secs was clamped
    pub fn cache_ttl_was_clamped(&self) -> bool {
        self.effective_cache_ttl() != Duration::from_secs(self.cache_ttl_secs)
    }

    /// Spirit bounds ordered as (floor, ceiling)
    pub fn effective_spirit_bounds(&self) -> (i64, i64) {
        let floor = self.spirit_floor.min(self.spirit_ceiling);
        let ceiling = self.spirit_ceiling.max(self.spirit_floor);
        (floor, ceiling)
    }

    /// Path of the progression database
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(PROGRESSION_DB_FILE)
    }

    /// Path of the character ledger database
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(LEDGER_DB_FILE)
    }
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join(APP_DIR)
        .join(CONFIG_FILE)
}
