use std::env;
use std::fs;
use std::path::PathBuf;

use crate::error::Result;

pub const DATA_DIR_VAR: &str = "TRADE_JOURNAL_DATA_DIR";
pub const DB_FILE_VAR: &str = "TRADE_JOURNAL_DB";

const DEFAULT_DATA_DIR: &str = "trade-journal-data";
const DEFAULT_DB_FILE: &str = "trading_journal.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub database_file: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            database_file: DEFAULT_DB_FILE.to_string(),
        }
    }
}

impl AppConfig {
    /// Defaults overridden by `TRADE_JOURNAL_DATA_DIR` / `TRADE_JOURNAL_DB`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            data_dir: non_empty(DATA_DIR_VAR).map(PathBuf::from).unwrap_or(defaults.data_dir),
            database_file: non_empty(DB_FILE_VAR).unwrap_or(defaults.database_file),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    /// Create the data directory if it doesn't exist.
    pub fn ensure_data_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}
