use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use contactbook_db::Database;
use contactbook_db::models::{ContactRow, UpsertOutcome};
use contactbook_types::models::ContactRecord;

use crate::clock::Clock;
use crate::error::InternalError;
use crate::session::SessionHandle;

/// Mutable fields of a contact record.
#[derive(Debug, Clone, Copy)]
pub struct ContactDetails<'a> {
    pub phone: &'a str,
    pub email: &'a str,
    pub address: &'a str,
}

#[derive(Debug, Clone)]
pub struct SavedContact {
    pub record: ContactRecord,
    /// True if no record existed for the registration number before.
    pub created: bool,
}

/// One contact record per registration number. Every operation takes the
/// caller's [`SessionHandle`], so it can only be reached after login.
#[derive(Clone)]
pub struct ContactStore {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
}

impl ContactStore {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Overwrite the record for `registration_number`, or create it. Any
    /// session may write any number; the writer becomes the owner.
    pub fn upsert(
        &self,
        session: &SessionHandle,
        registration_number: &str,
        details: ContactDetails<'_>,
    ) -> Result<SavedContact, InternalError> {
        let row = ContactRow {
            id: Uuid::new_v4().to_string(),
            reg_number: registration_number.to_string(),
            phone: details.phone.to_string(),
            email: details.email.to_string(),
            address: details.address.to_string(),
            user_id: session.user_id().to_string(),
            updated_at: self.clock.now(),
        };

        let (outcome, saved) = self.db.upsert_contact(&row)?;
        let created = outcome == UpsertOutcome::Inserted;
        info!(
            reg_number = %registration_number,
            user_id = %session.user_id(),
            created,
            "Contact saved"
        );

        Ok(SavedContact {
            record: to_record(saved)?,
            created,
        })
    }

    pub fn find(
        &self,
        _session: &SessionHandle,
        registration_number: &str,
    ) -> Result<Option<ContactRecord>, InternalError> {
        self.db
            .get_contact_by_reg_number(registration_number)?
            .map(to_record)
            .transpose()
    }
}

fn to_record(row: ContactRow) -> Result<ContactRecord, InternalError> {
    let owner_user_id = row.user_id.parse().map_err(|_| InternalError::Corrupt {
        field: "contact owner id",
        value: row.user_id.clone(),
    })?;

    Ok(ContactRecord {
        registration_number: row.reg_number,
        phone: row.phone,
        email: row.email,
        address: row.address,
        owner_user_id,
        updated_at: row.updated_at,
    })
}
