use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::Duration;

use contactbook_api::config::ServiceConfig;

/// Process configuration, read from `CONTACTBOOK_*` variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub mail_relay_url: Option<String>,
    pub mail_relay_key: Option<String>,
    pub service: ServiceConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = ServiceConfig::default();

        let session_ttl_hours: i64 = parse_or(&var, "CONTACTBOOK_SESSION_TTL_HOURS", 168)?;
        let reset_ttl_hours: i64 = parse_or(&var, "CONTACTBOOK_RESET_TTL_HOURS", 24)?;
        if session_ttl_hours <= 0 || reset_ttl_hours <= 0 {
            anyhow::bail!("TTL settings must be positive");
        }

        Ok(Self {
            db_path: var("CONTACTBOOK_DB_PATH")
                .unwrap_or_else(|| "contactbook.db".into())
                .into(),
            host: var("CONTACTBOOK_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&var, "CONTACTBOOK_PORT", 3000)?,
            mail_relay_url: var("CONTACTBOOK_MAIL_RELAY_URL"),
            mail_relay_key: var("CONTACTBOOK_MAIL_RELAY_KEY"),
            service: ServiceConfig {
                session_ttl: Duration::hours(session_ttl_hours),
                reset_token_ttl: Duration::hours(reset_ttl_hours),
                public_base_url: var("CONTACTBOOK_PUBLIC_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.public_base_url),
                mail_from: var("CONTACTBOOK_MAIL_FROM").unwrap_or(defaults.mail_from),
                cookie_secure: parse_or(&var, "CONTACTBOOK_COOKIE_SECURE", false)?,
            },
        })
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("contactbook.db"));
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 3000);
        assert!(cfg.mail_relay_url.is_none());
        assert_eq!(cfg.service.reset_token_ttl, Duration::hours(24));
        assert_eq!(cfg.service.session_ttl, Duration::hours(168));
        assert!(!cfg.service.cookie_secure);
    }

    #[test]
    fn values_are_read_and_trimmed() {
        let cfg = config(&[
            ("CONTACTBOOK_PORT", "8080"),
            ("CONTACTBOOK_PUBLIC_URL", "https://contacts.example/"),
            ("CONTACTBOOK_RESET_TTL_HOURS", "2"),
            ("CONTACTBOOK_COOKIE_SECURE", "true"),
            ("CONTACTBOOK_MAIL_RELAY_URL", "https://relay.example/send"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.service.public_base_url, "https://contacts.example");
        assert_eq!(cfg.service.reset_token_ttl, Duration::hours(2));
        assert!(cfg.service.cookie_secure);
        assert_eq!(cfg.mail_relay_url.as_deref(), Some("https://relay.example/send"));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let cfg = config(&[("CONTACTBOOK_PORT", " "), ("CONTACTBOOK_HOST", "")]).unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.host, "0.0.0.0");
    }

    #[test]
    fn bad_numbers_fail() {
        let err = config(&[("CONTACTBOOK_PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("CONTACTBOOK_PORT"));
        assert!(config(&[("CONTACTBOOK_RESET_TTL_HOURS", "0")]).is_err());
    }
}
