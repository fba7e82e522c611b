use std::sync::Arc;

use tracing::error;

use contactbook_db::Database;

use crate::clock::Clock;
use crate::config::ServiceConfig;
use crate::contacts::ContactStore;
use crate::credentials::CredentialStore;
use crate::error::ApiError;
use crate::mailer::Mailer;
use crate::password::CredentialHasher;
use crate::reset::ResetTokenService;
use crate::session::SessionManager;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub credentials: CredentialStore,
    pub sessions: SessionManager,
    pub resets: ResetTokenService,
    pub contacts: ContactStore,
    pub config: ServiceConfig,
}

impl AppStateInner {
    pub fn new(
        db: Database,
        hasher: Arc<dyn CredentialHasher>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        config: ServiceConfig,
    ) -> Self {
        let db = Arc::new(db);
        let credentials = CredentialStore::new(db.clone(), hasher, clock.clone());
        let sessions = SessionManager::new(db.clone(), clock.clone(), config.session_ttl);
        let resets = ResetTokenService::new(
            db.clone(),
            credentials.clone(),
            mailer,
            clock.clone(),
            config.reset_token_ttl,
            config.public_base_url.clone(),
            config.mail_from.clone(),
        );
        let contacts = ContactStore::new(db, clock);

        Self {
            credentials,
            sessions,
            resets,
            contacts,
            config,
        }
    }
}

/// Run store and hashing work off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal
    })?
}
