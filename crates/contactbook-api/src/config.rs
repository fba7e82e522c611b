use chrono::Duration;

/// Service-level settings. The binary builds this from its environment.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// How long a login stays valid.
    pub session_ttl: Duration,
    /// How long an issued reset link stays valid.
    pub reset_token_ttl: Duration,
    /// Absolute origin used to build reset links, without a trailing slash.
    pub public_base_url: String,
    /// Sender address of outbound mail.
    pub mail_from: String,
    /// Mark the session cookie `Secure`.
    pub cookie_secure: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::days(7),
            reset_token_ttl: Duration::hours(24),
            public_base_url: "http://localhost:3000".into(),
            mail_from: "no-reply@localhost".into(),
            cookie_secure: false,
        }
    }
}
