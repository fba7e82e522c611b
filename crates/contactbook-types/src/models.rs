use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered account as seen outside the credential store.
/// The password hash never leaves the store, so it is not part of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub mobile: String,
    pub registration_number: String,
    pub created_at: DateTime<Utc>,
}

/// One contact record, keyed by registration number.
/// `owner_user_id` is whoever wrote it last; it does not restrict writers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub registration_number: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub owner_user_id: Uuid,
    pub updated_at: DateTime<Utc>,
}
