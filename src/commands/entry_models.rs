use chrono::Utc;
use std::collections::HashSet;

use crate::db::JournalStore;
use crate::error::{JournalError, Result};
use crate::models::{EntryModel, EntryModelInput};

/// Trimmed name plus trimmed, non-blank, unique field names.
fn validate_entry_model(input: EntryModelInput) -> Result<(String, Vec<String>)> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(JournalError::Validation("Model name cannot be empty".to_string()));
    }

    let fields: Vec<String> = input
        .fields
        .iter()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect();
    if fields.is_empty() {
        return Err(JournalError::Validation("Model must have at least one field".to_string()));
    }

    let unique: HashSet<&String> = fields.iter().collect();
    if unique.len() != fields.len() {
        return Err(JournalError::Validation("Model field names must be unique".to_string()));
    }

    Ok((name, fields))
}

pub fn get_entry_models(store: &impl JournalStore, user_id: &str) -> Result<Vec<EntryModel>> {
    store.list_entry_models(user_id)
}

pub fn create_entry_model(store: &impl JournalStore, user_id: &str, input: EntryModelInput) -> Result<EntryModel> {
    let (name, fields) = validate_entry_model(input)?;
    let now = Utc::now().timestamp();

    let model = EntryModel {
        id: format!("MODEL-{}-{}", Utc::now().timestamp_millis(), uuid::Uuid::new_v4()),
        user_id: user_id.to_string(),
        name,
        fields,
        created_at: now,
        updated_at: now,
    };
    store.insert_entry_model(&model)?;

    log::info!("Created entry model {} ({})", model.id, model.name);

    Ok(model)
}

pub fn update_entry_model(
    store: &impl JournalStore,
    user_id: &str,
    id: &str,
    input: EntryModelInput,
) -> Result<EntryModel> {
    let mut model = store
        .find_entry_model(user_id, id)?
        .ok_or_else(|| JournalError::NotFound(format!("Entry model {}", id)))?;

    let (name, fields) = validate_entry_model(input)?;
    model.name = name;
    model.fields = fields;
    model.updated_at = Utc::now().timestamp();

    store.update_entry_model(&model)?;
    Ok(model)
}

/// Trades that used the model stay, with the link cleared.
pub fn delete_entry_model(store: &impl JournalStore, user_id: &str, id: &str) -> Result<()> {
    if !store.delete_entry_model(user_id, id)? {
        return Err(JournalError::NotFound(format!("Entry model {}", id)));
    }
    log::info!("Deleted entry model {}", id);
    Ok(())
}
