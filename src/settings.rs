//! Environment-driven defaults for the API client.

use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_ENDPOINT_URL: &str = "https://api.ai.cloud.ru/public/v2";
pub const DEFAULT_PROFILE: &str = "default";

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BACKOFF_FACTOR: f64 = 0.3;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 60;

/// Process-wide defaults, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub max_retries: u32,
    pub backoff_factor: f64,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub ssl_verify: bool,
    pub profile: String,
    pub endpoint_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            ssl_verify: true,
            profile: DEFAULT_PROFILE.to_string(),
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
        }
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            max_retries: parse_or(&lookup, "MAX_RETRIES", defaults.max_retries),
            backoff_factor: parse_or(&lookup, "BACKOFF_FACTOR", defaults.backoff_factor),
            connect_timeout: Duration::from_secs(parse_or(
                &lookup,
                "CONNECT_TIMEOUT",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )),
            read_timeout: Duration::from_secs(parse_or(
                &lookup,
                "READ_TIMEOUT",
                DEFAULT_READ_TIMEOUT_SECS,
            )),
            ssl_verify: lookup("SSL_VERIFY")
                .map(|v| parse_bool(&v))
                .unwrap_or(defaults.ssl_verify),
            profile: lookup("MLS_PROFILE")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.profile),
            endpoint_url: lookup("MLS_ENDPOINT_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.endpoint_url),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("ignoring {}={:?}: not a valid value, using {}", key, raw, default);
                default
            }
        },
        None => default,
    }
}

fn parse_bool(raw: &str) -> bool {
    !matches!(
        raw.trim().to_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_with(vars: &[(&str, &str)]) -> Settings {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_environment() {
        let settings = settings_with(&[]);
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.connect_timeout, Duration::from_secs(10));
        assert_eq!(settings.read_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_environment_overrides() {
        let settings = settings_with(&[
            ("MAX_RETRIES", "5"),
            ("BACKOFF_FACTOR", "0.2"),
            ("CONNECT_TIMEOUT", "7"),
            ("READ_TIMEOUT", "120"),
            ("SSL_VERIFY", "false"),
            ("MLS_PROFILE", "dev"),
        ]);
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.backoff_factor, 0.2);
        assert_eq!(settings.connect_timeout, Duration::from_secs(7));
        assert_eq!(settings.read_timeout, Duration::from_secs(120));
        assert!(!settings.ssl_verify);
        assert_eq!(settings.profile, "dev");
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let settings = settings_with(&[("MAX_RETRIES", "many"), ("MLS_PROFILE", "  ")]);
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.profile, "default");
    }
}
