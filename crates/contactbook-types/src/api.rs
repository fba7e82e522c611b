use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ContactRecord;

// -- Notices --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// User-facing outcome of a request: a message plus the screen the client
/// should move to next, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
            redirect: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
            redirect: None,
        }
    }

    pub fn redirect_to(mut self, target: impl Into<String>) -> Self {
        self.redirect = Some(target.into());
        self
    }
}

// -- Auth --

// Form fields default to empty so that a missing field is reported the same
// way as a blank one.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub mobile: String,
    pub password: String,
    pub reg_number: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub notice: Notice,
    pub user_id: Uuid,
    pub username: String,
    pub session_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionInfo {
    pub user_id: Uuid,
    pub username: String,
}

// -- Password reset --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ForgotRequest {
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResetPasswordRequest {
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetTokenStatus {
    pub email: String,
}

// -- Contacts --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SubmitDetailsRequest {
    pub phone: String,
    pub email: String,
    pub address: String,
    pub reg_number: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitDetailsResponse {
    pub notice: Notice,
    pub contact: ContactRecord,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    pub reg_number: String,
}

/// `contact` is `None` when nothing is stored for the searched number;
/// that case also carries an error notice.
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
    pub contact: Option<ContactRecord>,
}
