use chrono::{Local, NaiveDate, Utc};

use crate::analytics::{day_journal, parse_time_of_day, DayJournal};
use crate::db::JournalStore;
use crate::error::{JournalError, Result};
use crate::models::{CreateTradeInput, Trade, UpdateTradeInput};

fn new_trade_id() -> String {
    format!("TRADE-{}-{}", Utc::now().timestamp_millis(), uuid::Uuid::new_v4())
}

fn validate_symbol(symbol: &str) -> Result<String> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(JournalError::Validation("Symbol is required".to_string()));
    }
    Ok(symbol.to_uppercase())
}

fn validate_pnl(pnl: f64) -> Result<f64> {
    if !pnl.is_finite() {
        return Err(JournalError::Validation(format!("P/L must be a finite number, got {}", pnl)));
    }
    Ok(pnl)
}

/// Blank clears the time; anything else must be `HH:MM`.
fn validate_time(time: &str) -> Result<Option<String>> {
    let time = time.trim();
    if time.is_empty() {
        return Ok(None);
    }
    if parse_time_of_day(time).is_none() {
        return Err(JournalError::Validation(format!("Time must be HH:MM (24h), got {:?}", time)));
    }
    Ok(Some(time.to_string()))
}

fn validate_position_size(size: f64) -> Result<f64> {
    if !size.is_finite() || size < 0.0 {
        return Err(JournalError::Validation(format!("Invalid position size: {}", size)));
    }
    Ok(size)
}

/// Blank unlinks the entry model; otherwise it must belong to the user.
fn validate_entry_model(store: &impl JournalStore, user_id: &str, id: &str) -> Result<Option<String>> {
    let id = id.trim();
    if id.is_empty() {
        return Ok(None);
    }
    if store.find_entry_model(user_id, id)?.is_none() {
        return Err(JournalError::Validation(format!("Unknown entry model: {}", id)));
    }
    Ok(Some(id.to_string()))
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() { None } else { Some(value) }
}

pub fn get_trades(store: &impl JournalStore, user_id: &str) -> Result<Vec<Trade>> {
    store.list_trades(user_id)
}

pub fn get_trade(store: &impl JournalStore, user_id: &str, id: &str) -> Result<Trade> {
    store
        .find_trade(user_id, id)?
        .ok_or_else(|| JournalError::NotFound(format!("Trade {}", id)))
}

pub fn create_trade(store: &impl JournalStore, user_id: &str, input: CreateTradeInput) -> Result<Trade> {
    let entry_model_id = match input.entry_model_id.as_deref() {
        Some(id) => validate_entry_model(store, user_id, id)?,
        None => None,
    };
    let now = Utc::now().timestamp();

    let trade = Trade {
        id: new_trade_id(),
        user_id: user_id.to_string(),
        date: input.date.unwrap_or_else(|| Local::now().date_naive()),
        time: match input.time.as_deref() {
            Some(t) => validate_time(t)?,
            None => None,
        },
        symbol: validate_symbol(&input.symbol)?,
        pnl: validate_pnl(input.pnl)?,
        direction: input.direction,
        position_size: input.position_size.map(validate_position_size).transpose()?,
        position_unit: input.position_unit.and_then(non_blank),
        notes: input.notes,
        screenshot: input.screenshot.and_then(non_blank),
        entry_model_data: if entry_model_id.is_some() { input.entry_model_data } else { None },
        entry_model_id,
        created_at: now,
        updated_at: now,
    };

    store.insert_trade(&trade)?;
    log::info!("Created trade {} ({} {:+.2})", trade.id, trade.symbol, trade.pnl);

    Ok(trade)
}

/// Apply the fields present in `update`. An empty string clears `time`,
/// `screenshot`, `position_unit` or `entry_model_id`. Entry model data is
/// dropped when the model changes and only kept while a model is linked.
pub fn update_trade(
    store: &impl JournalStore,
    user_id: &str,
    id: &str,
    update: UpdateTradeInput,
) -> Result<Trade> {
    let mut trade = get_trade(store, user_id, id)?;

    if let Some(date) = update.date {
        trade.date = date;
    }
    if let Some(time) = update.time.as_deref() {
        trade.time = validate_time(time)?;
    }
    if let Some(symbol) = update.symbol.as_deref() {
        trade.symbol = validate_symbol(symbol)?;
    }
    if let Some(pnl) = update.pnl {
        trade.pnl = validate_pnl(pnl)?;
    }
    if let Some(direction) = update.direction {
        trade.direction = Some(direction);
    }
    if let Some(size) = update.position_size {
        trade.position_size = Some(validate_position_size(size)?);
    }
    if let Some(unit) = update.position_unit {
        trade.position_unit = non_blank(unit);
    }
    if let Some(notes) = update.notes {
        trade.notes = notes;
    }
    if let Some(screenshot) = update.screenshot {
        trade.screenshot = non_blank(screenshot);
    }
    if let Some(model_id) = update.entry_model_id.as_deref() {
        let model_id = validate_entry_model(store, user_id, model_id)?;
        // Field values belong to the previous model
        if model_id != trade.entry_model_id {
            trade.entry_model_data = None;
        }
        trade.entry_model_id = model_id;
    }
    if let Some(data) = update.entry_model_data {
        trade.entry_model_data = Some(data);
    }
    if trade.entry_model_id.is_none() {
        trade.entry_model_data = None;
    }

    trade.updated_at = Utc::now().timestamp();
    store.update_trade(&trade)?;

    Ok(trade)
}

pub fn delete_trade(store: &impl JournalStore, user_id: &str, id: &str) -> Result<()> {
    if !store.delete_trade(user_id, id)? {
        return Err(JournalError::NotFound(format!("Trade {}", id)));
    }
    log::info!("Deleted trade {}", id);
    Ok(())
}

pub fn get_trades_for_day(store: &impl JournalStore, user_id: &str, date: NaiveDate) -> Result<DayJournal> {
    let trades = store.list_trades(user_id)?;
    Ok(day_journal(&trades, date))
}
