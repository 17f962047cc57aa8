use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "long" => Ok(Direction::Long),
            "short" => Ok(Direction::Short),
            other => Err(format!("Unknown direction: {}", other)),
        }
    }
}

/// One filled-in field of an entry model, e.g. `"Bias" -> {value: "bullish", timeframe: "H4"}`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntryModelFieldValue {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub timeframe: String,
}

pub type EntryModelData = BTreeMap<String, EntryModelFieldValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub user_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub time: Option<String>, // HH:MM, missing on older records
    pub symbol: String,
    pub pnl: f64,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub position_size: Option<f64>,
    #[serde(default)]
    pub position_unit: Option<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub screenshot: Option<String>,
    #[serde(default)]
    pub entry_model_id: Option<String>,
    #[serde(default)]
    pub entry_model_data: Option<EntryModelData>,

    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTradeInput {
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub symbol: String,
    pub pnl: f64,
    pub direction: Option<Direction>,
    pub position_size: Option<f64>,
    pub position_unit: Option<String>,
    #[serde(default)]
    pub notes: String,
    pub screenshot: Option<String>,
    pub entry_model_id: Option<String>,
    pub entry_model_data: Option<EntryModelData>,
}

/// Partial update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTradeInput {
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub symbol: Option<String>,
    pub pnl: Option<f64>,
    pub direction: Option<Direction>,
    pub position_size: Option<f64>,
    pub position_unit: Option<String>,
    pub notes: Option<String>,
    pub screenshot: Option<String>,
    pub entry_model_id: Option<String>,
    pub entry_model_data: Option<EntryModelData>,
}
