use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use contactbook_db::models::UserRow;
use contactbook_db::{Database, DbError};
use contactbook_types::models::User;

use crate::clock::Clock;
use crate::error::{AuthError, InternalError, RegisterError, SetPasswordError};
use crate::password::CredentialHasher;

/// Registration input. The password is plaintext here and nowhere after.
#[derive(Debug, Clone, Copy)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub mobile: &'a str,
    pub password: &'a str,
    pub registration_number: &'a str,
}

/// User identities and their hashed credentials.
#[derive(Clone)]
pub struct CredentialStore {
    db: Arc<Database>,
    hasher: Arc<dyn CredentialHasher>,
    clock: Arc<dyn Clock>,
}

impl CredentialStore {
    pub fn new(
        db: Arc<Database>,
        hasher: Arc<dyn CredentialHasher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { db, hasher, clock }
    }

    /// Create a user. Username and email are each unique, compared exactly.
    /// A collision detected up front or by the store's unique index is
    /// reported as [`RegisterError::Duplicate`].
    pub fn register(&self, new: NewUser<'_>) -> Result<Uuid, RegisterError> {
        if self
            .db
            .find_user_by_username_or_email(new.username, new.email)?
            .is_some()
        {
            return Err(RegisterError::Duplicate);
        }

        let password_hash = self.hasher.hash(new.password).map_err(InternalError::from)?;
        let id = Uuid::new_v4();

        let row = UserRow {
            id: id.to_string(),
            username: new.username.to_string(),
            email: new.email.to_string(),
            mobile: new.mobile.to_string(),
            password: password_hash,
            reg_number: new.registration_number.to_string(),
            created_at: self.clock.now(),
        };

        match self.db.create_user(&row) {
            Ok(()) => {}
            // lost a race with a concurrent registration
            Err(DbError::Conflict) => return Err(RegisterError::Duplicate),
            Err(e) => return Err(e.into()),
        }

        info!(user_id = %id, username = %new.username, "User registered");
        Ok(id)
    }

    pub fn authenticate(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let row = self
            .db
            .get_user_by_username(username)?
            .ok_or(AuthError::NotFound)?;

        if !self.hasher.verify(password, &row.password) {
            return Err(AuthError::InvalidCredential);
        }

        Ok(to_user(row)?)
    }

    /// Replace the password of the user owning `email`.
    pub fn set_password(&self, email: &str, new_password: &str) -> Result<(), SetPasswordError> {
        let password_hash = self.hasher.hash(new_password).map_err(InternalError::from)?;

        if self.db.update_password_by_email(email, &password_hash)? == 0 {
            return Err(SetPasswordError::NotFound);
        }

        info!("Password updated");
        Ok(())
    }

    pub fn email_registered(&self, email: &str) -> Result<bool, InternalError> {
        Ok(self.db.get_user_by_email(email)?.is_some())
    }
}

fn to_user(row: UserRow) -> Result<User, InternalError> {
    let id = row.id.parse().map_err(|_| InternalError::Corrupt {
        field: "user id",
        value: row.id.clone(),
    })?;

    Ok(User {
        id,
        username: row.username,
        email: row.email,
        mobile: row.mobile,
        registration_number: row.reg_number,
        created_at: row.created_at,
    })
}
