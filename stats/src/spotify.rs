use std::fmt;
use std::str::FromStr;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, StatsError};

pub const API_BASE_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_TOP_LIMIT: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeRange {
    #[default]
    ShortTerm,
    MediumTerm,
    LongTerm,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::ShortTerm => "short_term",
            TimeRange::MediumTerm => "medium_term",
            TimeRange::LongTerm => "long_term",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "short_term" | "short" => Ok(TimeRange::ShortTerm),
            "medium_term" | "medium" => Ok(TimeRange::MediumTerm),
            "long_term" | "long" => Ok(TimeRange::LongTerm),
            other => Err(StatsError::Config(format!("unknown time range: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopItemKind {
    Tracks,
    Artists,
}

impl TopItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopItemKind::Tracks => "tracks",
            TopItemKind::Artists => "artists",
        }
    }
}

#[derive(Debug, Deserialize)]
struct TopItemsResponse {
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    artists: Option<SearchArtists>,
}

#[derive(Debug, Deserialize)]
struct SearchArtists {
    #[serde(default)]
    items: Vec<Value>,
}

/// Thin Web API client. Payloads are returned untouched.
#[derive(Clone)]
pub struct SpotifyClient {
    client: Client,
    base_url: String,
}

impl SpotifyClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: API_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The user's top tracks or artists for a time range.
    pub async fn top_items(
        &self,
        token: &str,
        kind: TopItemKind,
        time_range: TimeRange,
        limit: u32,
    ) -> Result<Vec<Value>> {
        let url = format!("{}/me/top/{}", self.base_url, kind.as_str());
        let limit = limit.to_string();

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .query(&[("time_range", time_range.as_str()), ("limit", limit.as_str())])
            .send()
            .await
            .map_err(|e| StatsError::Upstream(format!("top {} request failed: {}", kind.as_str(), e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StatsError::Upstream(format!(
                "top {} returned {}",
                kind.as_str(),
                status
            )));
        }

        let body: TopItemsResponse = response
            .json()
            .await
            .map_err(|e| StatsError::Upstream(format!("invalid top {} body: {}", kind.as_str(), e)))?;
        Ok(body.items)
    }

    pub async fn top_tracks(&self, token: &str, time_range: TimeRange, limit: u32) -> Result<Vec<Value>> {
        self.top_items(token, TopItemKind::Tracks, time_range, limit)
            .await
    }

    pub async fn top_artists(&self, token: &str, time_range: TimeRange, limit: u32) -> Result<Vec<Value>> {
        self.top_items(token, TopItemKind::Artists, time_range, limit)
            .await
    }

    /// First artist matching `artist_name`, if any.
    pub async fn search_artist(&self, token: &str, artist_name: &str) -> Result<Option<Value>> {
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .header("Authorization", format!("Bearer {}", token))
            .query(&[("q", artist_name), ("type", "artist"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| StatsError::Upstream(format!("artist search failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StatsError::Upstream(format!("artist search returned {}", status)));
        }

        let search: SearchResponse = response
            .json()
            .await
            .map_err(|e| StatsError::Upstream(format!("invalid search body: {}", e)))?;

        Ok(search
            .artists
            .and_then(|artists| artists.items.into_iter().next()))
    }
}
