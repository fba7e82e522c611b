//! Password recovery through emailed, single-use, time-limited tokens.
//!
//! A token is `Issued` when its row is written and leaves that state either by
//! being consumed (row deleted together with the password change) or by
//! expiring, which is only ever noticed when the token is next presented.
//! Issuing a token leaves earlier outstanding tokens for the same email valid.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use contactbook_db::Database;
use contactbook_db::models::ResetTokenRow;

use crate::clock::Clock;
use crate::credentials::CredentialStore;
use crate::error::{ResetError, SetPasswordError};
use crate::mailer::{Mailer, OutboundMessage};
use crate::token;

pub const RESET_SUBJECT: &str = "Password Reset Request";

/// Outcome of [`ResetTokenService::issue`]. `delivered` is false when the
/// mail could not be handed off; the token is stored and valid regardless.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub delivered: bool,
}

pub struct ResetTokenService {
    db: Arc<Database>,
    credentials: CredentialStore,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    public_base_url: String,
    mail_from: String,
}

impl ResetTokenService {
    pub fn new(
        db: Arc<Database>,
        credentials: CredentialStore,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        public_base_url: impl Into<String>,
        mail_from: impl Into<String>,
    ) -> Self {
        Self {
            db,
            credentials,
            mailer,
            clock,
            ttl,
            public_base_url: public_base_url.into(),
            mail_from: mail_from.into(),
        }
    }

    pub fn reset_url(&self, token: &str) -> String {
        format!("{}/reset/{}", self.public_base_url.trim_end_matches('/'), token)
    }

    /// Store a new token for `email` and mail the reset link to it.
    pub async fn issue(&self, email: &str) -> Result<IssuedToken, ResetError> {
        let issued = self.create(email)?;
        Ok(self.deliver(issued).await)
    }

    /// Store a new token for `email` without sending anything. Touches the
    /// database only, so callers on the runtime should run it via
    /// `spawn_blocking`.
    pub fn create(&self, email: &str) -> Result<IssuedToken, ResetError> {
        if !self.credentials.email_registered(email)? {
            return Err(ResetError::NotFound);
        }

        let token = token::generate_token();
        let now = self.clock.now();
        let expires_at = now + self.ttl;

        self.db.insert_reset_token(&ResetTokenRow {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            token_hash: token::digest(&token),
            expires_at,
            created_at: now,
        })?;
        info!(%email, %expires_at, "Password reset token issued");

        Ok(IssuedToken {
            token,
            email: email.to_string(),
            expires_at,
            delivered: false,
        })
    }

    /// Mail the reset link for a token returned by [`Self::create`].
    pub async fn deliver(&self, mut issued: IssuedToken) -> IssuedToken {
        let message = OutboundMessage {
            from: self.mail_from.clone(),
            to: issued.email.clone(),
            subject: RESET_SUBJECT.to_string(),
            body: reset_body(&self.reset_url(&issued.token), self.ttl),
        };

        match self.mailer.deliver(&message).await {
            Ok(()) => issued.delivered = true,
            Err(e) => warn!(email = %issued.email, "Password reset mail not delivered: {}", e),
        }
        issued
    }

    /// The email a still-valid token belongs to. Does not consume it.
    pub fn validate(&self, token: &str) -> Result<String, ResetError> {
        self.live_row(token).map(|row| row.email)
    }

    /// Set a new password through the token, then delete the token.
    /// A confirmation mismatch is checked first and leaves the token usable.
    pub fn consume(
        &self,
        token: &str,
        new_password: &str,
        new_password_confirmation: &str,
    ) -> Result<(), ResetError> {
        if new_password != new_password_confirmation {
            return Err(ResetError::Mismatch);
        }

        let row = self.live_row(token)?;

        self.credentials
            .set_password(&row.email, new_password)
            .map_err(|e| match e {
                SetPasswordError::NotFound => ResetError::NotFound,
                SetPasswordError::Internal(e) => ResetError::Internal(e),
            })?;

        // A concurrent consume may already have removed it.
        self.db.delete_reset_token(&row.token_hash)?;

        info!(email = %row.email, "Password reset completed");
        Ok(())
    }

    fn live_row(&self, token: &str) -> Result<ResetTokenRow, ResetError> {
        let row = self
            .db
            .get_reset_token(&token::digest(token))?
            .ok_or(ResetError::InvalidOrExpired)?;

        if self.clock.now() >= row.expires_at {
            return Err(ResetError::InvalidOrExpired);
        }
        Ok(row)
    }
}

fn reset_body(url: &str, ttl: Duration) -> String {
    format!(
        "To reset your password, please visit the following link:\n\
         {url}\n\
         \n\
         This link will expire in {} hours.\n\
         \n\
         If you did not make this request, please ignore this email.\n",
        ttl.num_hours()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::credentials::tests::{alice, store};
    use crate::mailer::MemoryMailer;

    struct Fixture {
        db: Arc<Database>,
        clock: Arc<ManualClock>,
        mailer: Arc<MemoryMailer>,
        credentials: CredentialStore,
        resets: ResetTokenService,
    }

    fn fixture_with(mailer: MemoryMailer) -> Fixture {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let credentials = store(db.clone());
        credentials.register(alice()).unwrap();

        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mailer = Arc::new(mailer);
        let resets = ResetTokenService::new(
            db.clone(),
            credentials.clone(),
            mailer.clone(),
            clock.clone(),
            Duration::hours(24),
            "http://localhost:3000/",
            "no-reply@localhost",
        );
        Fixture {
            db,
            clock,
            mailer,
            credentials,
            resets,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MemoryMailer::new())
    }

    #[tokio::test]
    async fn issued_token_validates_to_its_email() {
        let f = fixture();
        let issued = f.resets.issue("alice@x.com").await.unwrap();
        assert!(issued.delivered);
        assert_eq!(f.resets.validate(&issued.token).unwrap(), "alice@x.com");
    }

    #[tokio::test]
    async fn issue_mails_the_reset_link() {
        let f = fixture();
        let issued = f.resets.issue("alice@x.com").await.unwrap();

        let sent = f.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "alice@x.com");
        assert_eq!(sent[0].subject, RESET_SUBJECT);
        let link = format!("http://localhost:3000/reset/{}", issued.token);
        assert!(sent[0].body.contains(&link));
        assert!(sent[0].body.contains("24 hours"));
    }

    #[tokio::test]
    async fn create_stores_without_mailing() {
        let f = fixture();
        let issued = f.resets.create("alice@x.com").unwrap();
        assert!(!issued.delivered);
        assert!(f.mailer.sent().is_empty());
        assert_eq!(f.resets.validate(&issued.token).unwrap(), "alice@x.com");

        let issued = f.resets.deliver(issued).await;
        assert!(issued.delivered);
        assert_eq!(f.mailer.sent().len(), 1);
    }

    #[test]
    fn create_rejects_unknown_email() {
        let f = fixture();
        assert!(matches!(
            f.resets.create("nobody@x.com"),
            Err(ResetError::NotFound)
        ));
    }

    #[tokio::test]
    async fn unknown_email_is_not_found() {
        let f = fixture();
        assert!(matches!(
            f.resets.issue("nobody@x.com").await,
            Err(ResetError::NotFound)
        ));
        assert!(f.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn token_expires_at_the_deadline() {
        let f = fixture();
        let issued = f.resets.issue("alice@x.com").await.unwrap();

        f.clock.set(issued.expires_at - Duration::seconds(1));
        assert!(f.resets.validate(&issued.token).is_ok());

        f.clock.set(issued.expires_at);
        assert!(matches!(
            f.resets.validate(&issued.token),
            Err(ResetError::InvalidOrExpired)
        ));
        assert!(matches!(
            f.resets.consume(&issued.token, "newpw", "newpw"),
            Err(ResetError::InvalidOrExpired)
        ));
    }

    #[tokio::test]
    async fn mismatch_leaves_the_token_usable() {
        let f = fixture();
        let issued = f.resets.issue("alice@x.com").await.unwrap();

        assert!(matches!(
            f.resets.consume(&issued.token, "p1", "p2"),
            Err(ResetError::Mismatch)
        ));
        assert!(f.credentials.authenticate("alice", "secret1").is_ok());

        f.resets.consume(&issued.token, "p1", "p1").unwrap();
        assert!(f.credentials.authenticate("alice", "p1").is_ok());
    }

    #[tokio::test]
    async fn token_is_single_use() {
        let f = fixture();
        let issued = f.resets.issue("alice@x.com").await.unwrap();

        f.resets.consume(&issued.token, "newpw", "newpw").unwrap();
        assert!(f.credentials.authenticate("alice", "newpw").is_ok());
        assert!(f.credentials.authenticate("alice", "secret1").is_err());
        assert_eq!(f.db.count_reset_tokens_for_email("alice@x.com").unwrap(), 0);

        assert!(matches!(
            f.resets.consume(&issued.token, "again", "again"),
            Err(ResetError::InvalidOrExpired)
        ));
        assert!(f.credentials.authenticate("alice", "newpw").is_ok());
    }

    #[tokio::test]
    async fn earlier_tokens_stay_valid_after_reissue() {
        let f = fixture();
        let first = f.resets.issue("alice@x.com").await.unwrap();
        let second = f.resets.issue("alice@x.com").await.unwrap();
        assert_ne!(first.token, second.token);
        assert_eq!(f.db.count_reset_tokens_for_email("alice@x.com").unwrap(), 2);

        assert!(f.resets.validate(&first.token).is_ok());
        assert!(f.resets.validate(&second.token).is_ok());

        // consuming one deletes only that one
        f.resets.consume(&second.token, "pw2", "pw2").unwrap();
        assert!(f.resets.validate(&first.token).is_ok());
    }

    #[tokio::test]
    async fn failed_delivery_keeps_the_token() {
        let f = fixture_with(MemoryMailer::failing());
        let issued = f.resets.issue("alice@x.com").await.unwrap();
        assert!(!issued.delivered);
        assert_eq!(f.resets.validate(&issued.token).unwrap(), "alice@x.com");
    }

    #[tokio::test]
    async fn tokens_are_stored_as_digests() {
        let f = fixture();
        let issued = f.resets.issue("alice@x.com").await.unwrap();

        assert!(f.db.get_reset_token(&issued.token).unwrap().is_none());
        assert!(f.db.get_reset_token(&token::digest(&issued.token)).unwrap().is_some());
    }
}
