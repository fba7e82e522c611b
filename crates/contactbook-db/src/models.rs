//! Row types, mapping directly to SQLite rows.
//! Ids are kept as TEXT; callers parse them into their own id types.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub mobile: String,
    pub password: String,
    pub reg_number: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionRow {
    pub token_hash: String,
    pub user_id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ResetTokenRow {
    pub id: String,
    pub email: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ContactRow {
    pub id: String,
    pub reg_number: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub user_id: String,
    pub updated_at: DateTime<Utc>,
}

/// Which branch an upsert took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}
