//! Durable storage for OAuth credentials.
//!
//! Credentials live in a sectioned key/value file. Reads and writes always
//! cover a whole section.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use crate::error::{Result, StatsError};

pub const SPOTIFY_SECTION: &str = "Spotify_API";

pub const ACCESS_TOKEN: &str = "ACCESS_TOKEN";
pub const REFRESH_TOKEN: &str = "REFRESH_TOKEN";
pub const ACCESS_TOKEN_EXPIRATION: &str = "ACCESS_TOKEN_EXPIRATION";

/// The key/value pairs of one credential section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialRecord {
    values: BTreeMap<String, String>,
}

impl CredentialRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn access_token(&self) -> Option<&str> {
        self.get(ACCESS_TOKEN)
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.get(REFRESH_TOKEN)
    }

    /// The persisted expiration instant. `Ok(None)` when nothing has been
    /// stored yet; an error when the stored value can't be read back.
    pub fn expiration(&self) -> Result<Option<DateTime<Utc>>> {
        let Some(raw) = self.get(ACCESS_TOKEN_EXPIRATION) else {
            return Ok(None);
        };
        parse_expiration(raw).map(Some)
    }

    pub fn set_access_token(&mut self, token: &str, expiration: DateTime<Utc>) {
        self.set(ACCESS_TOKEN, token);
        self.set(ACCESS_TOKEN_EXPIRATION, format_expiration(expiration));
    }

    pub fn set_token_info(&mut self, access_token: &str, refresh_token: &str, expiration: DateTime<Utc>) {
        self.set_access_token(access_token, expiration);
        self.set(REFRESH_TOKEN, refresh_token);
    }
}

pub fn format_expiration(expiration: DateTime<Utc>) -> String {
    expiration.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_expiration(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| StatsError::Persistence(format!("unreadable token expiration: {}", raw)))
}

/// Section-scoped credential persistence.
pub trait CredentialStore {
    /// Returns the section, or an empty record if it was never written.
    fn load_section(&self, section: &str) -> Result<CredentialRecord>;

    /// Replaces the section with `record`, leaving other sections alone.
    fn save_section(&mut self, section: &str, record: &CredentialRecord) -> Result<()>;
}

/// A TOML file with one table per section:
///
/// ```toml
/// [Spotify_API]
/// ACCESS_TOKEN = "..."
/// REFRESH_TOKEN = "..."
/// ACCESS_TOKEN_EXPIRATION = "2024-01-01T12:00:00Z"
/// ```
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

type Sections = BTreeMap<String, BTreeMap<String, String>>;

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_sections(&self) -> Result<Sections> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Sections::new()),
            Err(e) => {
                return Err(StatsError::Persistence(format!(
                    "cannot read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        toml::from_str(&contents).map_err(|e| {
            StatsError::Persistence(format!("malformed credential file {}: {}", self.path.display(), e))
        })
    }

    fn write_sections(&self, sections: &Sections) -> Result<()> {
        let contents = toml::to_string(sections)
            .map_err(|e| StatsError::Persistence(format!("cannot encode credentials: {}", e)))?;

        // Write next to the target and rename so a crash never leaves a
        // half-written file behind.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, contents)
            .and_then(|_| fs::rename(&tmp, &self.path))
            .map_err(|e| {
                let _ = fs::remove_file(&tmp);
                StatsError::Persistence(format!("cannot write {}: {}", self.path.display(), e))
            })
    }
}

impl CredentialStore for FileCredentialStore {
    fn load_section(&self, section: &str) -> Result<CredentialRecord> {
        let mut sections = self.read_sections()?;
        Ok(sections
            .remove(section)
            .map(CredentialRecord::from_values)
            .unwrap_or_default())
    }

    fn save_section(&mut self, section: &str, record: &CredentialRecord) -> Result<()> {
        let mut sections = self.read_sections()?;
        sections.insert(section.to_string(), record.values().clone());
        self.write_sections(&sections)?;
        tracing::debug!("saved [{}] to {}", section, self.path.display());
        Ok(())
    }
}
