use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Type, ValueRef};
use rusqlite::{params, OptionalExtension, Row, ToSql};
use serde::de::DeserializeOwned;

use crate::db::Database;
use crate::error::Result;
use crate::models::{Direction, EntryModel, Trade, User};

/// Durable per-user storage for users, sessions, trades and entry models.
///
/// Every trade/entry-model query is scoped by `user_id`; callers never see
/// another user's records.
pub trait JournalStore {
    fn insert_user(&self, user: &User) -> Result<()>;
    fn find_user(&self, id: &str) -> Result<Option<User>>;
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    fn insert_session(&self, token: &str, user_id: &str) -> Result<()>;
    fn find_session_user(&self, token: &str) -> Result<Option<User>>;
    fn delete_session(&self, token: &str) -> Result<()>;

    fn insert_trade(&self, trade: &Trade) -> Result<()>;
    /// Insert or overwrite by id; returns false when the id belongs to another user.
    fn upsert_trade(&self, trade: &Trade) -> Result<bool>;
    fn find_trade(&self, user_id: &str, id: &str) -> Result<Option<Trade>>;
    /// The complete trade set of one user, newest first.
    fn list_trades(&self, user_id: &str) -> Result<Vec<Trade>>;
    fn update_trade(&self, trade: &Trade) -> Result<()>;
    fn delete_trade(&self, user_id: &str, id: &str) -> Result<bool>;

    fn insert_entry_model(&self, model: &EntryModel) -> Result<()>;
    fn upsert_entry_model(&self, model: &EntryModel) -> Result<bool>;
    fn find_entry_model(&self, user_id: &str, id: &str) -> Result<Option<EntryModel>>;
    fn list_entry_models(&self, user_id: &str) -> Result<Vec<EntryModel>>;
    fn update_entry_model(&self, model: &EntryModel) -> Result<()>;
    fn delete_entry_model(&self, user_id: &str, id: &str) -> Result<bool>;
}

const TRADE_COLUMNS: &str = "id, user_id, date, time, symbol, pnl, direction, position_size, position_unit, \
     notes, screenshot, entry_model_id, entry_model_data, created_at, updated_at";

const ENTRY_MODEL_COLUMNS: &str = "id, user_id, name, fields, created_at, updated_at";

impl ToSql for Direction {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Direction {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

fn json_column<T: DeserializeOwned>(row: &Row, column: &str) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|s| {
        serde_json::from_str(&s).map_err(|e| {
            let idx = row.as_ref().column_index(column).unwrap_or_default();
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
        })
    })
    .transpose()
}

/// Helper function to map a database row to a Trade struct
fn map_row_to_trade(row: &Row) -> rusqlite::Result<Trade> {
    Ok(Trade {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        date: row.get("date")?,
        time: row.get("time")?,
        symbol: row.get("symbol")?,
        pnl: row.get("pnl")?,
        direction: row.get("direction")?,
        position_size: row.get("position_size")?,
        position_unit: row.get("position_unit")?,
        notes: row.get("notes")?,
        screenshot: row.get("screenshot")?,
        entry_model_id: row.get("entry_model_id")?,
        entry_model_data: json_column(row, "entry_model_data")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn map_row_to_entry_model(row: &Row) -> rusqlite::Result<EntryModel> {
    Ok(EntryModel {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        name: row.get("name")?,
        fields: json_column(row, "fields")?.unwrap_or_default(),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn map_row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        email: row.get("email")?,
        password_hash: row.get("password_hash")?,
        created_at: row.get("created_at")?,
    })
}

fn entry_model_data_json(trade: &Trade) -> Result<Option<String>> {
    Ok(trade
        .entry_model_data
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?)
}

impl JournalStore for Database {
    fn insert_user(&self, user: &User) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO users (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
            params![user.id, user.email, user.password_hash, user.created_at],
        )?;
        Ok(())
    }

    fn find_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.lock()?;
        let user = conn
            .query_row(
                "SELECT id, email, password_hash, created_at FROM users WHERE id = ?",
                [id],
                map_row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.lock()?;
        let user = conn
            .query_row(
                "SELECT id, email, password_hash, created_at FROM users WHERE email = ?",
                [email],
                map_row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    fn insert_session(&self, token: &str, user_id: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sessions (token, user_id, created_at) VALUES (?, ?, strftime('%s', 'now'))",
            params![token, user_id],
        )?;
        Ok(())
    }

    fn find_session_user(&self, token: &str) -> Result<Option<User>> {
        let conn = self.lock()?;
        let user = conn
            .query_row(
                "SELECT u.id, u.email, u.password_hash, u.created_at
                 FROM sessions s JOIN users u ON u.id = s.user_id
                 WHERE s.token = ?",
                [token],
                map_row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    fn delete_session(&self, token: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM sessions WHERE token = ?", [token])?;
        Ok(())
    }

    fn insert_trade(&self, trade: &Trade) -> Result<()> {
        let data = entry_model_data_json(trade)?;
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO trades ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                TRADE_COLUMNS
            ),
            params![
                trade.id, trade.user_id, trade.date, trade.time, trade.symbol, trade.pnl,
                trade.direction, trade.position_size, trade.position_unit, trade.notes,
                trade.screenshot, trade.entry_model_id, data, trade.created_at, trade.updated_at
            ],
        )?;
        Ok(())
    }

    fn upsert_trade(&self, trade: &Trade) -> Result<bool> {
        let data = entry_model_data_json(trade)?;
        let conn = self.lock()?;
        let changed = conn.execute(
            &format!(
                "INSERT INTO trades ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    date = excluded.date, time = excluded.time, symbol = excluded.symbol,
                    pnl = excluded.pnl, direction = excluded.direction,
                    position_size = excluded.position_size, position_unit = excluded.position_unit,
                    notes = excluded.notes, screenshot = excluded.screenshot,
                    entry_model_id = excluded.entry_model_id, entry_model_data = excluded.entry_model_data,
                    updated_at = excluded.updated_at
                 WHERE trades.user_id = excluded.user_id",
                TRADE_COLUMNS
            ),
            params![
                trade.id, trade.user_id, trade.date, trade.time, trade.symbol, trade.pnl,
                trade.direction, trade.position_size, trade.position_unit, trade.notes,
                trade.screenshot, trade.entry_model_id, data, trade.created_at, trade.updated_at
            ],
        )?;
        Ok(changed > 0)
    }

    fn find_trade(&self, user_id: &str, id: &str) -> Result<Option<Trade>> {
        let conn = self.lock()?;
        let trade = conn
            .query_row(
                &format!("SELECT {} FROM trades WHERE user_id = ? AND id = ?", TRADE_COLUMNS),
                [user_id, id],
                map_row_to_trade,
            )
            .optional()?;
        Ok(trade)
    }

    fn list_trades(&self, user_id: &str) -> Result<Vec<Trade>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM trades WHERE user_id = ? ORDER BY date DESC, created_at DESC",
            TRADE_COLUMNS
        ))?;
        let trades = stmt
            .query_map([user_id], map_row_to_trade)?
            .collect::<rusqlite::Result<Vec<Trade>>>()?;
        Ok(trades)
    }

    fn update_trade(&self, trade: &Trade) -> Result<()> {
        let data = entry_model_data_json(trade)?;
        let conn = self.lock()?;
        conn.execute(
            "UPDATE trades SET
                date = ?, time = ?, symbol = ?, pnl = ?, direction = ?,
                position_size = ?, position_unit = ?, notes = ?, screenshot = ?,
                entry_model_id = ?, entry_model_data = ?, updated_at = ?
             WHERE user_id = ? AND id = ?",
            params![
                trade.date, trade.time, trade.symbol, trade.pnl, trade.direction,
                trade.position_size, trade.position_unit, trade.notes, trade.screenshot,
                trade.entry_model_id, data, trade.updated_at, trade.user_id, trade.id
            ],
        )?;
        Ok(())
    }

    fn delete_trade(&self, user_id: &str, id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM trades WHERE user_id = ? AND id = ?", [user_id, id])?;
        Ok(deleted > 0)
    }

    fn insert_entry_model(&self, model: &EntryModel) -> Result<()> {
        let fields = serde_json::to_string(&model.fields)?;
        let conn = self.lock()?;
        conn.execute(
            &format!("INSERT INTO entry_models ({}) VALUES (?, ?, ?, ?, ?, ?)", ENTRY_MODEL_COLUMNS),
            params![model.id, model.user_id, model.name, fields, model.created_at, model.updated_at],
        )?;
        Ok(())
    }

    fn upsert_entry_model(&self, model: &EntryModel) -> Result<bool> {
        let fields = serde_json::to_string(&model.fields)?;
        let conn = self.lock()?;
        // DO UPDATE rather than REPLACE so linked trades keep their entry_model_id
        let changed = conn.execute(
            &format!(
                "INSERT INTO entry_models ({}) VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name, fields = excluded.fields, updated_at = excluded.updated_at
                 WHERE entry_models.user_id = excluded.user_id",
                ENTRY_MODEL_COLUMNS
            ),
            params![model.id, model.user_id, model.name, fields, model.created_at, model.updated_at],
        )?;
        Ok(changed > 0)
    }

    fn find_entry_model(&self, user_id: &str, id: &str) -> Result<Option<EntryModel>> {
        let conn = self.lock()?;
        let model = conn
            .query_row(
                &format!("SELECT {} FROM entry_models WHERE user_id = ? AND id = ?", ENTRY_MODEL_COLUMNS),
                [user_id, id],
                map_row_to_entry_model,
            )
            .optional()?;
        Ok(model)
    }

    fn list_entry_models(&self, user_id: &str) -> Result<Vec<EntryModel>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM entry_models WHERE user_id = ? ORDER BY created_at ASC, name ASC",
            ENTRY_MODEL_COLUMNS
        ))?;
        let models = stmt
            .query_map([user_id], map_row_to_entry_model)?
            .collect::<rusqlite::Result<Vec<EntryModel>>>()?;
        Ok(models)
    }

    fn update_entry_model(&self, model: &EntryModel) -> Result<()> {
        let fields = serde_json::to_string(&model.fields)?;
        let conn = self.lock()?;
        conn.execute(
            "UPDATE entry_models SET name = ?, fields = ?, updated_at = ? WHERE user_id = ? AND id = ?",
            params![model.name, fields, model.updated_at, model.user_id, model.id],
        )?;
        Ok(())
    }

    fn delete_entry_model(&self, user_id: &str, id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM entry_models WHERE user_id = ? AND id = ?", [user_id, id])?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryModelFieldValue;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn user(id: &str, email: &str) -> User {
        User {
            id: id.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            created_at: 1,
        }
    }

    fn trade(id: &str, user_id: &str, date: &str, pnl: f64) -> Trade {
        Trade {
            id: id.to_string(),
            user_id: user_id.to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            time: Some("09:45".to_string()),
            symbol: "NQ".to_string(),
            pnl,
            direction: Some(Direction::Short),
            position_size: Some(2.0),
            position_unit: Some("contracts".to_string()),
            notes: "held too long".to_string(),
            screenshot: None,
            entry_model_id: None,
            entry_model_data: None,
            created_at: 10,
            updated_at: 10,
        }
    }

    fn model(id: &str, user_id: &str) -> EntryModel {
        EntryModel {
            id: id.to_string(),
            user_id: user_id.to_string(),
            name: "Silver Bullet".to_string(),
            fields: vec!["Bias".to_string(), "Liquidity".to_string()],
            created_at: 5,
            updated_at: 5,
        }
    }

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.insert_user(&user("U1", "one@example.com")).unwrap();
        db.insert_user(&user("U2", "two@example.com")).unwrap();
        db
    }

    #[test]
    fn test_trade_round_trips_all_columns() {
        let db = seeded();
        db.insert_entry_model(&model("M1", "U1")).unwrap();

        let mut t = trade("T1", "U1", "2024-03-04", -120.5);
        t.entry_model_id = Some("M1".to_string());
        let mut data = BTreeMap::new();
        data.insert(
            "Bias".to_string(),
            EntryModelFieldValue { value: "bearish".to_string(), timeframe: "H1".to_string() },
        );
        t.entry_model_data = Some(data);
        db.insert_trade(&t).unwrap();

        assert_eq!(db.find_trade("U1", "T1").unwrap(), Some(t));
    }

    #[test]
    fn test_trades_are_scoped_to_owner() {
        let db = seeded();
        db.insert_trade(&trade("T1", "U1", "2024-03-04", 10.0)).unwrap();
        db.insert_trade(&trade("T2", "U2", "2024-03-05", 20.0)).unwrap();

        assert_eq!(db.list_trades("U1").unwrap().len(), 1);
        assert!(db.find_trade("U2", "T1").unwrap().is_none());
        assert!(!db.delete_trade("U2", "T1").unwrap(), "cannot delete another user's trade");
        assert!(db.delete_trade("U1", "T1").unwrap());
        assert!(db.list_trades("U1").unwrap().is_empty());
    }

    #[test]
    fn test_list_trades_newest_first() {
        let db = seeded();
        db.insert_trade(&trade("T1", "U1", "2024-03-04", 10.0)).unwrap();
        db.insert_trade(&trade("T2", "U1", "2024-03-06", 20.0)).unwrap();
        db.insert_trade(&trade("T3", "U1", "2024-03-05", 30.0)).unwrap();

        let ids: Vec<String> = db.list_trades("U1").unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["T2", "T3", "T1"]);
    }

    #[test]
    fn test_upsert_does_not_cross_users() {
        let db = seeded();
        db.insert_trade(&trade("T1", "U1", "2024-03-04", 10.0)).unwrap();

        let hijack = trade("T1", "U2", "2024-03-04", 9999.0);
        assert!(!db.upsert_trade(&hijack).unwrap());
        assert_eq!(db.find_trade("U1", "T1").unwrap().map(|t| t.pnl), Some(10.0));

        let mut own = trade("T1", "U1", "2024-03-04", 42.0);
        own.updated_at = 99;
        assert!(db.upsert_trade(&own).unwrap());
        assert_eq!(db.find_trade("U1", "T1").unwrap().map(|t| t.pnl), Some(42.0));
    }

    #[test]
    fn test_deleting_entry_model_unlinks_trades() {
        let db = seeded();
        db.insert_entry_model(&model("M1", "U1")).unwrap();
        let mut t = trade("T1", "U1", "2024-03-04", 10.0);
        t.entry_model_id = Some("M1".to_string());
        db.insert_trade(&t).unwrap();

        assert!(db.delete_entry_model("U1", "M1").unwrap());

        let stored = db.find_trade("U1", "T1").unwrap().unwrap();
        assert_eq!(stored.entry_model_id, None);
    }

    #[test]
    fn test_entry_model_update_and_list() {
        let db = seeded();
        let mut m = model("M1", "U1");
        db.insert_entry_model(&m).unwrap();

        m.name = "Turtle Soup".to_string();
        m.fields.push("Target".to_string());
        db.update_entry_model(&m).unwrap();

        assert_eq!(db.list_entry_models("U1").unwrap(), vec![m]);
        assert!(db.list_entry_models("U2").unwrap().is_empty());
    }

    #[test]
    fn test_sessions() {
        let db = seeded();
        db.insert_session("tok", "U1").unwrap();

        assert_eq!(db.find_session_user("tok").unwrap().map(|u| u.id), Some("U1".to_string()));

        db.delete_session("tok").unwrap();
        assert!(db.find_session_user("tok").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_email_is_rejected_by_schema() {
        let db = seeded();
        assert!(db.insert_user(&user("U3", "one@example.com")).is_err());
    }
}
