//! services/reader/src/config.rs
//!
//! Defines the reader's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// How long to wait for the sign-up trigger to provision a profile row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProvisioningPolicy {
    /// Number of profile reads before giving up. Always at least one.
    pub attempts: u32,
    /// Wait before each read.
    pub interval: Duration,
}

impl Default for ProvisioningPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            interval: Duration::from_millis(1000),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub log_level: Level,
    pub session_path: Option<PathBuf>,
    pub provisioning: ProvisioningPolicy,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Backend Settings ---
        let supabase_url = lookup("SUPABASE_URL")
            .ok_or_else(|| ConfigError::MissingVar("SUPABASE_URL".to_string()))?;
        if !supabase_url.starts_with("http://") && !supabase_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "SUPABASE_URL".to_string(),
                format!("'{}' is not an http(s) URL", supabase_url),
            ));
        }
        let supabase_url = supabase_url.trim_end_matches('/').to_string();

        let supabase_anon_key = lookup("SUPABASE_ANON_KEY")
            .ok_or_else(|| ConfigError::MissingVar("SUPABASE_ANON_KEY".to_string()))?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let session_path = lookup("SESSION_PATH").map(PathBuf::from);

        // --- Profile Provisioning ---
        let defaults = ProvisioningPolicy::default();
        let attempts = match lookup("PROFILE_POLL_ATTEMPTS") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(ConfigError::InvalidValue(
                        "PROFILE_POLL_ATTEMPTS".to_string(),
                        format!("'{}' is not a positive integer", raw),
                    ))
                }
            },
            None => defaults.attempts,
        };
        let interval = match lookup("PROFILE_POLL_INTERVAL_MS") {
            Some(raw) => raw.parse::<u64>().map(Duration::from_millis).map_err(|e| {
                ConfigError::InvalidValue("PROFILE_POLL_INTERVAL_MS".to_string(), e.to_string())
            })?,
            None => defaults.interval,
        };

        Ok(Self {
            supabase_url,
            supabase_anon_key,
            log_level,
            session_path,
            provisioning: ProvisioningPolicy { attempts, interval },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_optional_vars_are_unset() {
        let config = Config::from_lookup(lookup(&[
            ("SUPABASE_URL", "https://demo.supabase.co/"),
            ("SUPABASE_ANON_KEY", "anon"),
        ]))
        .unwrap();

        assert_eq!(config.supabase_url, "https://demo.supabase.co");
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.session_path, None);
        assert_eq!(config.provisioning, ProvisioningPolicy::default());
    }

    #[test]
    fn missing_url_is_reported_by_name() {
        let err = Config::from_lookup(lookup(&[("SUPABASE_ANON_KEY", "anon")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref v) if v == "SUPABASE_URL"));
    }

    #[test]
    fn zero_poll_attempts_are_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("SUPABASE_URL", "https://demo.supabase.co"),
            ("SUPABASE_ANON_KEY", "anon"),
            ("PROFILE_POLL_ATTEMPTS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref v, _) if v == "PROFILE_POLL_ATTEMPTS"));
    }

    #[test]
    fn poll_settings_are_read() {
        let config = Config::from_lookup(lookup(&[
            ("SUPABASE_URL", "http://localhost:54321"),
            ("SUPABASE_ANON_KEY", "anon"),
            ("PROFILE_POLL_ATTEMPTS", "3"),
            ("PROFILE_POLL_INTERVAL_MS", "250"),
            ("RUST_LOG", "debug"),
            ("SESSION_PATH", "/tmp/session.json"),
        ]))
        .unwrap();

        assert_eq!(config.provisioning.attempts, 3);
        assert_eq!(config.provisioning.interval, Duration::from_millis(250));
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.session_path, Some(PathBuf::from("/tmp/session.json")));
    }
}
