use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Operator credential pair the session gate compares against.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub credentials: Credentials,
    pub host: IpAddr,
    pub port: u16,
    pub cache_ttl: Duration,
    pub session_ttl: Duration,
    pub zero_fill: bool,
    pub max_connections: u32,
}

impl Config {
    /// Reads the process environment. `main` merges `.env` into it first.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| -> Result<String, ConfigError> {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let database_url = required("DATABASE_URL")?;
        let username = required("USERNAME")?;
        let password = required("PASSWORD")?;

        let host = parse_or(&lookup, "ANALYTICS_HOST", IpAddr::from([127, 0, 0, 1]))?;
        let port = parse_or(&lookup, "ANALYTICS_PORT", 8501u16)?;
        let cache_ttl_secs = parse_or(&lookup, "ANALYTICS_CACHE_TTL_SECS", 300u64)?;
        if cache_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "ANALYTICS_CACHE_TTL_SECS",
                value: "0".to_string(),
            });
        }
        let session_ttl_secs = parse_or(&lookup, "ANALYTICS_SESSION_TTL_SECS", 86_400u64)?;
        let zero_fill = parse_or(&lookup, "ANALYTICS_ZERO_FILL", true)?;
        let max_connections = parse_or(&lookup, "ANALYTICS_MAX_CONNECTIONS", 5u32)?;

        Ok(Self {
            database_url,
            credentials: Credentials { username, password },
            host,
            port,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            session_ttl: Duration::from_secs(session_ttl_secs),
            zero_fill,
            max_connections,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) if value.trim().is_empty() => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("DATABASE_URL", "postgres://bot@localhost/bot"),
        ("USERNAME", "operator"),
        ("PASSWORD", "hunter2"),
    ];

    #[test]
    fn defaults_apply_when_optional_keys_absent() {
        let config = Config::from_lookup(lookup_from(&REQUIRED)).unwrap();
        assert_eq!(config.credentials.username, "operator");
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.bind_addr().to_string(), "127.0.0.1:8501");
        assert!(config.zero_fill);
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn missing_secret_is_reported_by_name() {
        for skipped in ["DATABASE_URL", "USERNAME", "PASSWORD"] {
            let pairs: Vec<(&str, &str)> = REQUIRED
                .iter()
                .copied()
                .filter(|(key, _)| *key != skipped)
                .collect();
            let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
            assert_eq!(err, ConfigError::Missing(skipped));
        }
    }

    #[test]
    fn empty_secret_counts_as_missing() {
        let mut pairs = REQUIRED.to_vec();
        pairs[2] = ("PASSWORD", "");
        let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert_eq!(err, ConfigError::Missing("PASSWORD"));
    }

    #[test]
    fn invalid_optional_values_are_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("ANALYTICS_PORT", "eighty"));
        let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "ANALYTICS_PORT", .. }));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("ANALYTICS_CACHE_TTL_SECS", "0"));
        assert!(Config::from_lookup(lookup_from(&pairs)).is_err());
    }

    #[test]
    fn debug_output_hides_password() {
        let config = Config::from_lookup(lookup_from(&REQUIRED)).unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
