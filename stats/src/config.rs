use std::path::PathBuf;

use chrono_tz::Tz;

use crate::error::{Result, StatsError};

pub const DEFAULT_TIMEZONE: &str = "America/Barbados";
pub const DEFAULT_CREDENTIALS_PATH: &str = "spotify_credentials.toml";
pub const DEFAULT_POCKETBASE_URL: &str = "http://127.0.0.1:8090";
pub const DEFAULT_POCKETBASE_COLLECTION: &str = "spotify_stats";

/// Where the export lives and which zone its local dates are taken in.
/// Enough for everything that runs offline.
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    pub streaming_history_path: PathBuf,
    pub timezone: Tz,
}

/// Runtime settings read from the process environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub authorization_code: Option<String>,
    pub redirect_uri: Option<String>,
    pub credentials_path: PathBuf,
    pub history: HistoryConfig,
}

/// Connection settings for the PocketBase stats collection.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub url: String,
    pub collection: String,
    pub email: String,
    pub password: String,
}

impl HistoryConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let streaming_history_path = get("SPOTIFY_STREAMING_HISTORY_PATH")
            .map(PathBuf::from)
            .ok_or_else(|| {
                StatsError::Config("SPOTIFY_STREAMING_HISTORY_PATH must be set".to_string())
            })?;

        let timezone = parse_timezone(
            &get("STATS_TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
        )?;

        Ok(Self {
            streaming_history_path,
            timezone,
        })
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests don't have to
    /// touch the real process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let client_id = get("SPOTIFY_CLIENT_ID");
        let client_secret = get("SPOTIFY_CLIENT_SECRET");
        let (Some(client_id), Some(client_secret)) = (client_id, client_secret) else {
            return Err(StatsError::Config(
                "SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET must be set".to_string(),
            ));
        };

        let history = HistoryConfig::from_lookup(&lookup)?;

        Ok(Self {
            client_id,
            client_secret,
            authorization_code: get("SPOTIFY_AUTHORIZATION_CODE"),
            redirect_uri: get("SPOTIFY_REDIRECT_URI"),
            credentials_path: get("SPOTIFY_CREDENTIALS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_PATH)),
            history,
        })
    }
}

impl PublisherConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let email = get("POCKETBASE_EMAIL");
        let password = get("POCKETBASE_PASSWORD");
        let (Some(email), Some(password)) = (email, password) else {
            return Err(StatsError::Config(
                "POCKETBASE_EMAIL and POCKETBASE_PASSWORD must be set".to_string(),
            ));
        };

        Ok(Self {
            url: get("POCKETBASE_URL").unwrap_or_else(|| DEFAULT_POCKETBASE_URL.to_string()),
            collection: get("POCKETBASE_COLLECTION")
                .unwrap_or_else(|| DEFAULT_POCKETBASE_COLLECTION.to_string()),
            email,
            password,
        })
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| StatsError::Config(format!("unknown timezone: {}", name)))
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
    fn test_defaults_applied() {
        let config = Config::from_lookup(lookup(&[
            ("SPOTIFY_CLIENT_ID", "id"),
            ("SPOTIFY_CLIENT_SECRET", "secret"),
            ("SPOTIFY_STREAMING_HISTORY_PATH", "/data/export"),
        ]))
        .unwrap();

        assert_eq!(config.history.timezone, chrono_tz::America::Barbados);
        assert_eq!(config.credentials_path, PathBuf::from(DEFAULT_CREDENTIALS_PATH));
        assert!(config.authorization_code.is_none());
    }

    #[test]
    fn test_missing_client_secret_is_config_error() {
        let err = Config::from_lookup(lookup(&[
            ("SPOTIFY_CLIENT_ID", "id"),
            ("SPOTIFY_STREAMING_HISTORY_PATH", "/data/export"),
        ]))
        .unwrap_err();
        assert!(matches!(err, StatsError::Config(_)));
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let err = Config::from_lookup(lookup(&[
            ("SPOTIFY_CLIENT_ID", "id"),
            ("SPOTIFY_CLIENT_SECRET", "secret"),
            ("SPOTIFY_STREAMING_HISTORY_PATH", "   "),
        ]))
        .unwrap_err();
        assert!(matches!(err, StatsError::Config(_)));
    }

    #[test]
    fn test_unknown_timezone_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("SPOTIFY_CLIENT_ID", "id"),
            ("SPOTIFY_CLIENT_SECRET", "secret"),
            ("SPOTIFY_STREAMING_HISTORY_PATH", "/data/export"),
            ("STATS_TIMEZONE", "Mars/Olympus_Mons"),
        ]))
        .unwrap_err();
        assert!(matches!(err, StatsError::Config(_)));
    }

    #[test]
    fn test_history_config_needs_no_spotify_credentials() {
        let config = HistoryConfig::from_lookup(lookup(&[
            ("SPOTIFY_STREAMING_HISTORY_PATH", "/data/export"),
            ("STATS_TIMEZONE", "Europe/Berlin"),
        ]))
        .unwrap();
        assert_eq!(config.streaming_history_path, PathBuf::from("/data/export"));
        assert_eq!(config.timezone, chrono_tz::Europe::Berlin);

        assert!(Config::from_lookup(lookup(&[(
            "SPOTIFY_STREAMING_HISTORY_PATH",
            "/data/export"
        )]))
        .is_err());
    }

    #[test]
    fn test_publisher_defaults() {
        let config = PublisherConfig::from_lookup(lookup(&[
            ("POCKETBASE_EMAIL", "me@example.com"),
            ("POCKETBASE_PASSWORD", "pw"),
        ]))
        .unwrap();
        assert_eq!(config.url, DEFAULT_POCKETBASE_URL);
        assert_eq!(config.collection, DEFAULT_POCKETBASE_COLLECTION);
    }
}
