use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior};

use crate::models::{ContactRow, ResetTokenRow, SessionRow, UpsertOutcome, UserRow};
use crate::{Database, Result};

const USER_COLUMNS: &str = "id, username, email, mobile, password, reg_number, created_at";
const CONTACT_COLUMNS: &str = "id, reg_number, phone, email, address, user_id, updated_at";

impl Database {
    // -- Users --

    /// Fails with [`crate::DbError::Conflict`] if the username or email is taken.
    pub fn create_user(&self, user: &UserRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, mobile, password, reg_number, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    user.id,
                    user.username,
                    user.email,
                    user.mobile,
                    user.password,
                    user.reg_number,
                    encode_timestamp(user.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1", [username]))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", [email]))
    }

    pub fn find_user_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1 OR email = ?2", [username, email]))
    }

    /// Returns the number of users updated.
    pub fn update_password_by_email(&self, email: &str, password_hash: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET password = ?1 WHERE email = ?2",
                (password_hash, email),
            )?;
            Ok(n)
        })
    }

    // -- Sessions --

    pub fn create_session(&self, session: &SessionRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (token_hash, user_id, username, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    session.token_hash,
                    session.user_id,
                    session.username,
                    encode_timestamp(session.created_at),
                    encode_timestamp(session.expires_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_session(&self, token_hash: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT token_hash, user_id, username, created_at, expires_at
                     FROM sessions WHERE token_hash = ?1",
                    [token_hash],
                    |row| {
                        Ok(SessionRow {
                            token_hash: row.get(0)?,
                            user_id: row.get(1)?,
                            username: row.get(2)?,
                            created_at: timestamp(row, 3)?,
                            expires_at: timestamp(row, 4)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Returns the number of rows removed; zero is not an error.
    pub fn delete_session(&self, token_hash: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM sessions WHERE token_hash = ?1", [token_hash])?;
            Ok(n)
        })
    }

    // -- Password resets --

    pub fn insert_reset_token(&self, token: &ResetTokenRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO password_resets (id, email, token_hash, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    token.id,
                    token.email,
                    token.token_hash,
                    encode_timestamp(token.expires_at),
                    encode_timestamp(token.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_reset_token(&self, token_hash: &str) -> Result<Option<ResetTokenRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, email, token_hash, expires_at, created_at
                     FROM password_resets WHERE token_hash = ?1",
                    [token_hash],
                    |row| {
                        Ok(ResetTokenRow {
                            id: row.get(0)?,
                            email: row.get(1)?,
                            token_hash: row.get(2)?,
                            expires_at: timestamp(row, 3)?,
                            created_at: timestamp(row, 4)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Returns the number of rows removed; zero is not an error.
    pub fn delete_reset_token(&self, token_hash: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM password_resets WHERE token_hash = ?1",
                [token_hash],
            )?;
            Ok(n)
        })
    }

    pub fn count_reset_tokens_for_email(&self, email: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM password_resets WHERE email = ?1",
                [email],
                |r| r.get(0),
            )?;
            Ok(n)
        })
    }

    // -- Contacts --

    /// Update the record for `contact.reg_number` if one exists, otherwise
    /// insert `contact`. The lookup and the write share one immediate
    /// transaction. An updated record keeps its original id.
    pub fn upsert_contact(&self, contact: &ContactRow) -> Result<(UpsertOutcome, ContactRow)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let existing_id: Option<String> = tx
                .query_row(
                    "SELECT id FROM contacts WHERE reg_number = ?1",
                    [&contact.reg_number],
                    |row| row.get(0),
                )
                .optional()?;

            let updated_at = encode_timestamp(contact.updated_at);
            let (outcome, id) = match existing_id {
                Some(id) => {
                    tx.execute(
                        "UPDATE contacts
                         SET phone = ?1, email = ?2, address = ?3, user_id = ?4, updated_at = ?5
                         WHERE id = ?6",
                        rusqlite::params![
                            contact.phone,
                            contact.email,
                            contact.address,
                            contact.user_id,
                            updated_at,
                            id,
                        ],
                    )?;
                    (UpsertOutcome::Updated, id)
                }
                None => {
                    tx.execute(
                        "INSERT INTO contacts (id, reg_number, phone, email, address, user_id, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        rusqlite::params![
                            contact.id,
                            contact.reg_number,
                            contact.phone,
                            contact.email,
                            contact.address,
                            contact.user_id,
                            updated_at,
                        ],
                    )?;
                    (UpsertOutcome::Inserted, contact.id.clone())
                }
            };

            tx.commit()?;
            Ok((outcome, ContactRow { id, ..contact.clone() }))
        })
    }

    pub fn get_contact_by_reg_number(&self, reg_number: &str) -> Result<Option<ContactRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE reg_number = ?1");
            let row = conn
                .query_row(&sql, [reg_number], |row| {
                    Ok(ContactRow {
                        id: row.get(0)?,
                        reg_number: row.get(1)?,
                        phone: row.get(2)?,
                        email: row.get(3)?,
                        address: row.get(4)?,
                        user_id: row.get(5)?,
                        updated_at: timestamp(row, 6)?,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    pub fn count_contacts_by_reg_number(&self, reg_number: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM contacts WHERE reg_number = ?1",
                [reg_number],
                |r| r.get(0),
            )?;
            Ok(n)
        })
    }
}

fn query_user<P: rusqlite::Params>(
    conn: &Connection,
    predicate: &str,
    params: P,
) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {predicate} LIMIT 1");
    let row = conn
        .query_row(&sql, params, |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                mobile: row.get(3)?,
                password: row.get(4)?,
                reg_number: row.get(5)?,
                created_at: timestamp(row, 6)?,
            })
        })
        .optional()?;
    Ok(row)
}

/// Fixed-width RFC 3339 in UTC, so stored values also sort lexically.
fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbError;
    use chrono::{Duration, SubsecRound};
    use uuid::Uuid;

    fn user(username: &str, email: &str) -> UserRow {
        UserRow {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            mobile: "0700000000".to_string(),
            password: "$argon2id$stub".to_string(),
            reg_number: "REG-1".to_string(),
            created_at: Utc::now(),
        }
    }

    fn contact(reg_number: &str, phone: &str, owner: &str) -> ContactRow {
        ContactRow {
            id: Uuid::new_v4().to_string(),
            reg_number: reg_number.to_string(),
            phone: phone.to_string(),
            email: "c@x.com".to_string(),
            address: "1 Rd".to_string(),
            user_id: owner.to_string(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn user_lookup_by_username_and_email() {
        let db = Database::open_in_memory().unwrap();
        let alice = user("alice", "alice@x.com");
        db.create_user(&alice).unwrap();

        let by_name = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(by_name.id, alice.id);
        assert_eq!(by_name.created_at, alice.created_at.trunc_subsecs(6));

        let by_email = db.get_user_by_email("alice@x.com").unwrap().unwrap();
        assert_eq!(by_email.username, "alice");

        assert!(db.get_user_by_username("Alice").unwrap().is_none());
    }

    #[test]
    fn unique_username_and_email_surface_as_conflict() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&user("alice", "alice@x.com")).unwrap();

        let same_name = db.create_user(&user("alice", "other@x.com"));
        assert!(matches!(same_name, Err(DbError::Conflict)));

        let same_email = db.create_user(&user("bob", "alice@x.com"));
        assert!(matches!(same_email, Err(DbError::Conflict)));
    }

    #[test]
    fn username_or_email_lookup_matches_either_field() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&user("alice", "alice@x.com")).unwrap();

        assert!(db.find_user_by_username_or_email("alice", "nobody@x.com").unwrap().is_some());
        assert!(db.find_user_by_username_or_email("nobody", "alice@x.com").unwrap().is_some());
        assert!(db.find_user_by_username_or_email("nobody", "nobody@x.com").unwrap().is_none());
    }

    #[test]
    fn reset_token_rows_delete_idempotently() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let row = ResetTokenRow {
            id: Uuid::new_v4().to_string(),
            email: "a@x.com".to_string(),
            token_hash: "digest".to_string(),
            expires_at: now + Duration::hours(24),
            created_at: now,
        };
        db.insert_reset_token(&row).unwrap();

        let stored = db.get_reset_token("digest").unwrap().unwrap();
        assert_eq!(stored.email, "a@x.com");

        assert_eq!(db.delete_reset_token("digest").unwrap(), 1);
        assert_eq!(db.delete_reset_token("digest").unwrap(), 0);
        assert!(db.get_reset_token("digest").unwrap().is_none());
    }

    #[test]
    fn sessions_cascade_with_their_user() {
        let db = Database::open_in_memory().unwrap();
        let alice = user("alice", "alice@x.com");
        db.create_user(&alice).unwrap();

        let now = Utc::now();
        db.create_session(&SessionRow {
            token_hash: "s1".to_string(),
            user_id: alice.id.clone(),
            username: alice.username.clone(),
            created_at: now,
            expires_at: now + Duration::days(7),
        })
        .unwrap();
        assert!(db.get_session("s1").unwrap().is_some());

        db.with_conn(|conn| {
            conn.execute("DELETE FROM users WHERE id = ?1", [&alice.id])?;
            Ok(())
        })
        .unwrap();
        assert!(db.get_session("s1").unwrap().is_none());
    }

    #[test]
    fn upsert_keeps_one_row_per_reg_number() {
        let db = Database::open_in_memory().unwrap();

        let first = contact("REG1", "111", "owner-a");
        let (outcome, saved) = db.upsert_contact(&first).unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted);
        assert_eq!(saved.id, first.id);

        let second = contact("REG1", "222", "owner-b");
        let (outcome, saved) = db.upsert_contact(&second).unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(saved.id, first.id);

        assert_eq!(db.count_contacts_by_reg_number("REG1").unwrap(), 1);
        let stored = db.get_contact_by_reg_number("REG1").unwrap().unwrap();
        assert_eq!(stored.phone, "222");
        assert_eq!(stored.user_id, "owner-b");

        assert!(db.get_contact_by_reg_number("REG2").unwrap().is_none());
    }
}
