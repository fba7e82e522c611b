//! Authentication, password-reset and contact-record services for
//! contactbook, plus the axum handlers that expose them.
//!
//! The services ([`credentials::CredentialStore`], [`session::SessionManager`],
//! [`reset::ResetTokenService`], [`contacts::ContactStore`]) are plain structs
//! over the record store; the `handlers` modules translate HTTP requests into
//! calls on them and their errors into notices.

pub mod clock;
pub mod config;
pub mod contacts;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod password;
pub mod reset;
pub mod routes;
pub mod session;
pub mod state;
pub mod token;

pub use routes::router;
pub use state::{AppState, AppStateInner};
