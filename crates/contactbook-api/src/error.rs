//! Error taxonomy of the services and its translation into HTTP notices.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use contactbook_db::DbError;
use contactbook_types::api::Notice;

use crate::password::HashError;

/// Failures of the collaborators underneath the services. Never shown to users.
#[derive(Debug, Error)]
pub enum InternalError {
    #[error("record store: {0}")]
    Store(#[from] DbError),

    #[error(transparent)]
    Hashing(#[from] HashError),

    #[error("corrupt stored {field}: {value}")]
    Corrupt { field: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("username or email already exists")]
    Duplicate,

    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no such user")]
    NotFound,

    #[error("invalid credential")]
    InvalidCredential,

    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[derive(Debug, Error)]
pub enum SetPasswordError {
    #[error("no user with that email")]
    NotFound,

    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no active session")]
    Unauthenticated,

    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[derive(Debug, Error)]
pub enum ResetError {
    #[error("no user with that email")]
    NotFound,

    #[error("reset token is invalid or has expired")]
    InvalidOrExpired,

    #[error("password confirmation does not match")]
    Mismatch,

    #[error(transparent)]
    Internal(#[from] InternalError),
}

// Store errors reach the services through `?` on DbError directly.
macro_rules! from_db_error {
    ($($ty:ty),*) => {$(
        impl From<DbError> for $ty {
            fn from(err: DbError) -> Self {
                Self::Internal(InternalError::Store(err))
            }
        }
    )*};
}

from_db_error!(RegisterError, AuthError, SetPasswordError, SessionError, ResetError);

/// What a request handler can fail with. Every variant renders as a JSON
/// [`Notice`] with a status code and, where sensible, a `Location` to go to.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} is required")]
    InvalidInput(&'static str),

    #[error("username or email already exists")]
    Duplicate,

    /// Unknown user and wrong password alike.
    #[error("invalid username or password")]
    InvalidLogin,

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("email not found")]
    EmailNotFound,

    #[error("reset token is invalid or has expired")]
    ResetTokenInvalid,

    /// `token` is the reset form to return to, if known.
    #[error("passwords do not match")]
    PasswordMismatch { token: Option<String> },

    #[error("internal error")]
    Internal,
}

impl ApiError {
    /// Like `From<ResetError>`, but keeps the token so a mismatch can send
    /// the user back to the same reset form.
    pub fn from_reset(err: ResetError, token: &str) -> Self {
        match err {
            ResetError::Mismatch => ApiError::PasswordMismatch {
                token: Some(token.to_string()),
            },
            other => other.into(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) | ApiError::PasswordMismatch { .. } => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Duplicate => StatusCode::CONFLICT,
            ApiError::InvalidLogin | ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::EmailNotFound => StatusCode::NOT_FOUND,
            ApiError::ResetTokenInvalid => StatusCode::GONE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn notice(&self) -> Notice {
        match self {
            ApiError::InvalidInput(field) => Notice::error(format!("{field} is required")),
            ApiError::Duplicate => {
                Notice::error("Username or email already exists").redirect_to("/register")
            }
            ApiError::InvalidLogin => Notice::error("Invalid username or password"),
            ApiError::Unauthenticated => {
                Notice::error("Please login to access this page").redirect_to("/login")
            }
            ApiError::EmailNotFound => Notice::error("Email not found"),
            ApiError::ResetTokenInvalid => {
                Notice::error("The password reset link is invalid or has expired")
                    .redirect_to("/login")
            }
            ApiError::PasswordMismatch { token: Some(token) } => {
                Notice::error("Passwords do not match").redirect_to(format!("/reset/{token}"))
            }
            ApiError::PasswordMismatch { token: None } => {
                Notice::error("Passwords do not match").redirect_to("/login")
            }
            ApiError::Internal => Notice::error("Internal server error"),
        }
    }
}

fn internal(err: InternalError) -> ApiError {
    error!("Internal failure: {}", err);
    ApiError::Internal
}

impl From<InternalError> for ApiError {
    fn from(err: InternalError) -> Self {
        internal(err)
    }
}

impl From<RegisterError> for ApiError {
    fn from(err: RegisterError) -> Self {
        match err {
            RegisterError::Duplicate => ApiError::Duplicate,
            RegisterError::Internal(e) => internal(e),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NotFound | AuthError::InvalidCredential => ApiError::InvalidLogin,
            AuthError::Internal(e) => internal(e),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Unauthenticated => ApiError::Unauthenticated,
            SessionError::Internal(e) => internal(e),
        }
    }
}

impl From<ResetError> for ApiError {
    fn from(err: ResetError) -> Self {
        match err {
            ResetError::NotFound => ApiError::EmailNotFound,
            ResetError::InvalidOrExpired => ApiError::ResetTokenInvalid,
            // Without the token there is no form to go back to.
            ResetError::Mismatch => ApiError::PasswordMismatch { token: None },
            ResetError::Internal(e) => internal(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let notice = self.notice();
        let location = notice
            .redirect
            .as_deref()
            .and_then(|target| HeaderValue::from_str(target).ok());

        let mut response = (self.status(), Json(notice)).into_response();
        if let Some(location) = location {
            response.headers_mut().insert(header::LOCATION, location);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_failures_collapse_to_one_rejection() {
        let missing: ApiError = AuthError::NotFound.into();
        let wrong: ApiError = AuthError::InvalidCredential.into();
        assert_eq!(missing.notice(), wrong.notice());
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn unauthenticated_redirects_to_login() {
        let response = ApiError::from(SessionError::Unauthenticated).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[test]
    fn mismatch_points_back_at_the_reset_form() {
        let err = ApiError::from_reset(ResetError::Mismatch, "tok");
        assert_eq!(err.notice().redirect.as_deref(), Some("/reset/tok"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn mismatch_without_a_token_falls_back_to_login() {
        let response = ApiError::from(ResetError::Mismatch).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[test]
    fn store_failures_hide_details() {
        let err = ApiError::from(RegisterError::from(DbError::LockPoisoned));
        assert!(matches!(err, ApiError::Internal));
        assert_eq!(err.notice().message, "Internal server error");
    }
}
