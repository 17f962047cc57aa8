use serde::{Deserialize, Serialize};

/// User-defined checklist of fields filled in for each trade that uses it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryModel {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub fields: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryModelInput {
    pub name: String,
    pub fields: Vec<String>,
}
