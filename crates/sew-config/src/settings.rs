//! Typed view over the merged config JSON. Every key has a default, so an
//! empty config is valid.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::LoadedConfig;

pub const DEFAULT_DB_URL_ENV: &str = "SEW_DATABASE_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseSettings {
    /// NAME of the env var holding the connection string.
    pub url_env: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url_env: DEFAULT_DB_URL_ENV.to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JournalSettings {
    pub enabled: bool,
    pub path: String,
    pub hash_chain: bool,
}

impl Default for JournalSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "var/journal/transitions.jsonl".to_string(),
            hash_chain: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub database: DatabaseSettings,
    pub journal: JournalSettings,
    pub log: LogSettings,
}

impl MarketConfig {
    /// Unknown top-level sections are ignored here; `report_unused_keys`
    /// is where they surface.
    pub fn from_loaded(loaded: &LoadedConfig) -> Result<Self> {
        let cfg: MarketConfig = serde_json::from_value(loaded.config_json.clone())
            .context("config does not match the expected shape")?;
        cfg.check()?;
        Ok(cfg)
    }

    fn check(&self) -> Result<()> {
        if self.database.max_connections == 0 {
            bail!("database.max_connections must be > 0");
        }
        if self.journal.enabled && self.journal.path.trim().is_empty() {
            bail!("journal.path is required when journal.enabled is true");
        }
        Ok(())
    }
}
