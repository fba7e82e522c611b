//! Server-side login sessions.
//!
//! A session is a stored row keyed by the digest of an opaque token. The
//! token travels with each request (bearer header or cookie) and is read into
//! a request-scoped [`SessionContext`]; there is no process-wide notion of a
//! current user.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use contactbook_db::Database;
use contactbook_db::models::SessionRow;
use contactbook_types::models::User;

use crate::clock::Clock;
use crate::error::{ApiError, InternalError, SessionError};
use crate::state::{AppState, blocking};
use crate::token;

pub const SESSION_COOKIE: &str = "contactbook_session";

/// Proof of an authenticated request, obtainable only from [`SessionManager`].
#[derive(Clone)]
pub struct SessionHandle {
    token: String,
    user_id: Uuid,
    username: String,
    expires_at: DateTime<Utc>,
}

impl SessionHandle {
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// The bearer secret to hand back to the client.
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// The session token a request presented, if any.
#[derive(Clone, Default)]
pub struct SessionContext {
    token: Option<String>,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// `Authorization: Bearer` wins over the session cookie.
    pub fn from_parts(parts: &Parts) -> Self {
        let bearer = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string);

        let token = bearer.or_else(|| {
            CookieJar::from_headers(&parts.headers)
                .get(SESSION_COOKIE)
                .map(|c| c.value().to_string())
        });

        Self {
            token: token.filter(|t| !t.is_empty()),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for SessionContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

#[derive(Clone)]
pub struct SessionManager {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { db, clock, ttl }
    }

    pub fn open_session(&self, user: &User) -> Result<SessionHandle, InternalError> {
        let token = token::generate_token();
        let now = self.clock.now();
        let expires_at = now + self.ttl;

        self.db.create_session(&SessionRow {
            token_hash: token::digest(&token),
            user_id: user.id.to_string(),
            username: user.username.clone(),
            created_at: now,
            expires_at,
        })?;

        info!(user_id = %user.id, username = %user.username, "Session opened");
        Ok(SessionHandle {
            token,
            user_id: user.id,
            username: user.username.clone(),
            expires_at,
        })
    }

    /// Resolve the request's token to a live session. Expired sessions are
    /// removed on sight.
    pub fn require_session(&self, ctx: &SessionContext) -> Result<SessionHandle, SessionError> {
        let token = ctx.token.as_deref().ok_or(SessionError::Unauthenticated)?;
        let digest = token::digest(token);

        let row = self
            .db
            .get_session(&digest)?
            .ok_or(SessionError::Unauthenticated)?;

        if self.clock.now() >= row.expires_at {
            debug!(user_id = %row.user_id, "Session expired");
            self.db.delete_session(&digest)?;
            return Err(SessionError::Unauthenticated);
        }

        let user_id = row.user_id.parse().map_err(|_| InternalError::Corrupt {
            field: "session user id",
            value: row.user_id.clone(),
        })?;

        Ok(SessionHandle {
            token: token.to_string(),
            user_id,
            username: row.username,
            expires_at: row.expires_at,
        })
    }

    /// Forget the request's session. Closing nothing, or an already closed
    /// session, is fine.
    pub fn close_session(&self, ctx: &SessionContext) -> Result<(), InternalError> {
        if let Some(token) = ctx.token.as_deref() {
            if self.db.delete_session(&token::digest(token))? > 0 {
                info!("Session closed");
            }
        }
        Ok(())
    }
}

/// Route layer for protected endpoints: the resolved [`SessionHandle`] is
/// placed in the request extensions, anything else is turned away with a
/// redirect to the login screen.
pub async fn require_login(
    State(state): State<AppState>,
    ctx: SessionContext,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session = blocking(move || Ok(state.sessions.require_session(&ctx)?)).await?;
    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::credentials::tests::{alice, store};

    fn setup() -> (Arc<ManualClock>, SessionManager, User) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let creds = store(db.clone());
        creds.register(alice()).unwrap();
        let user = creds.authenticate("alice", "secret1").unwrap();

        let clock = Arc::new(ManualClock::new(Utc::now()));
        let sessions = SessionManager::new(db, clock.clone(), Duration::hours(1));
        (clock, sessions, user)
    }

    #[test]
    fn opened_session_is_required_successfully() {
        let (_clock, sessions, user) = setup();
        let handle = sessions.open_session(&user).unwrap();

        let ctx = SessionContext::with_token(handle.token());
        let resolved = sessions.require_session(&ctx).unwrap();
        assert_eq!(resolved.user_id(), user.id);
        assert_eq!(resolved.username(), "alice");
    }

    #[test]
    fn missing_or_unknown_token_is_unauthenticated() {
        let (_clock, sessions, _user) = setup();
        assert!(matches!(
            sessions.require_session(&SessionContext::anonymous()),
            Err(SessionError::Unauthenticated)
        ));
        assert!(matches!(
            sessions.require_session(&SessionContext::with_token("bogus")),
            Err(SessionError::Unauthenticated)
        ));
    }

    #[test]
    fn close_is_idempotent_and_ends_the_session() {
        let (_clock, sessions, user) = setup();
        let handle = sessions.open_session(&user).unwrap();
        let ctx = SessionContext::with_token(handle.token());

        sessions.close_session(&ctx).unwrap();
        sessions.close_session(&ctx).unwrap();
        sessions.close_session(&SessionContext::anonymous()).unwrap();

        assert!(matches!(
            sessions.require_session(&ctx),
            Err(SessionError::Unauthenticated)
        ));
    }

    #[test]
    fn sessions_expire() {
        let (clock, sessions, user) = setup();
        let handle = sessions.open_session(&user).unwrap();
        let ctx = SessionContext::with_token(handle.token());

        clock.advance(Duration::minutes(59));
        assert!(sessions.require_session(&ctx).is_ok());

        clock.advance(Duration::minutes(1));
        assert!(matches!(
            sessions.require_session(&ctx),
            Err(SessionError::Unauthenticated)
        ));
    }

    #[test]
    fn context_prefers_bearer_over_cookie() {
        let req = axum::http::Request::builder()
            .header(header::AUTHORIZATION, "Bearer from-header")
            .header(header::COOKIE, format!("{SESSION_COOKIE}=from-cookie"))
            .body(())
            .unwrap();
        let (parts, _) = req.into_parts();
        assert_eq!(
            SessionContext::from_parts(&parts).token.as_deref(),
            Some("from-header")
        );

        let req = axum::http::Request::builder()
            .header(header::COOKIE, format!("other=1; {SESSION_COOKIE}=from-cookie"))
            .body(())
            .unwrap();
        let (parts, _) = req.into_parts();
        assert_eq!(
            SessionContext::from_parts(&parts).token.as_deref(),
            Some("from-cookie")
        );
    }
}
