pub mod analytics;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod models;

use anyhow::Context;

use crate::config::AppConfig;
use crate::db::Database;

/// Open (and migrate) the journal database described by `config`.
pub fn open_database(config: &AppConfig) -> anyhow::Result<Database> {
    config
        .ensure_data_dir()
        .with_context(|| format!("Failed to create data directory {}", config.data_dir.display()))?;

    let db_path = config.database_path();
    log::info!("Database path: {}", db_path.display());

    let db_path_str = db_path
        .to_str()
        .with_context(|| format!("Database path is not valid UTF-8: {}", db_path.display()))?;

    match Database::new(db_path_str) {
        Ok(db) => Ok(db),
        Err(e) => {
            log::error!("Database initialization failed: {}", e);
            log::error!("This might be due to a failed migration or database corruption.");
            log::error!("Your database backups are located at: {}", config.data_dir.join("backups").display());
            log::error!("To recover, replace {} with the most recent backup.", config.database_file);

            Err(e).context("Database initialization failed")
        }
    }
}
