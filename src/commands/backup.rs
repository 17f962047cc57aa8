use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::JournalStore;
use crate::error::{JournalError, Result};
use crate::models::{EntryModel, Trade};

const BACKUP_VERSION: &str = "1.0.0";

#[derive(Debug, Serialize, Deserialize)]
pub struct BackupData {
    pub version: String,
    pub export_date: String,
    #[serde(default)]
    pub entry_models: Vec<EntryModel>,
    pub trades: Vec<Trade>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub entry_models_imported: usize,
    pub trades_imported: usize,
    pub skipped: Vec<String>,
}

/// Export one user's entry models and trades as pretty JSON.
pub fn export_user_data(store: &impl JournalStore, user_id: &str) -> Result<String> {
    let backup = BackupData {
        version: BACKUP_VERSION.to_string(),
        export_date: Utc::now().to_rfc3339(),
        entry_models: store.list_entry_models(user_id)?,
        trades: store.list_trades(user_id)?,
    };

    log::info!(
        "Exporting {} trades and {} entry models for {}",
        backup.trades.len(),
        backup.entry_models.len(),
        user_id
    );

    Ok(serde_json::to_string_pretty(&backup)?)
}

/// Restore a backup into `user_id`'s journal.
///
/// Records are re-owned by the importing user and overwrite existing ones
/// with the same id. Ids that already belong to someone else are skipped.
pub fn import_user_data(store: &impl JournalStore, user_id: &str, json_data: &str) -> Result<ImportSummary> {
    let backup: BackupData = serde_json::from_str(json_data)?;

    let mut summary = ImportSummary {
        entry_models_imported: 0,
        trades_imported: 0,
        skipped: Vec::new(),
    };

    // Reject the whole file before anything is written
    if let Some(bad) = backup
        .trades
        .iter()
        .find(|t| !t.pnl.is_finite() || t.symbol.trim().is_empty())
    {
        return Err(JournalError::Validation(format!("Trade {} in backup is malformed", bad.id)));
    }

    // Models first so trade links resolve
    for mut model in backup.entry_models {
        model.user_id = user_id.to_string();
        if store.upsert_entry_model(&model)? {
            summary.entry_models_imported += 1;
        } else {
            summary.skipped.push(model.id);
        }
    }

    for mut trade in backup.trades {
        trade.user_id = user_id.to_string();
        let dangling_link = match trade.entry_model_id.as_deref() {
            Some(model_id) => store.find_entry_model(user_id, model_id)?.is_none(),
            None => false,
        };
        if dangling_link {
            log::warn!("Trade {} links an unknown entry model, unlinking", trade.id);
            trade.entry_model_id = None;
        }

        if store.upsert_trade(&trade)? {
            summary.trades_imported += 1;
        } else {
            summary.skipped.push(trade.id);
        }
    }

    log::info!(
        "Imported {} trades and {} entry models for {} ({} skipped)",
        summary.trades_imported,
        summary.entry_models_imported,
        user_id,
        summary.skipped.len()
    );

    Ok(summary)
}
