use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::PublisherConfig;
use crate::error::{Result, StatsError};

pub const TOTAL_MS_LISTENED: &str = "total_ms_listened";
pub const TOTAL_MS_LISTENED_LAST_YEAR: &str = "total_ms_listened_last_year";
pub const AVERAGE_MS_LISTENED: &str = "average_ms_listened";
pub const TOP_5_SONGS_RECENT: &str = "top_5_songs_recent";
pub const TOP_5_ARTISTS_RECENT: &str = "top_5_artists_recent";
pub const MOM_LY_MS_LISTENED: &str = "mom_ly_ms_listened";
pub const LISTENING_CLOCK_LY: &str = "listening_clock_ly";

/// Destination for computed statistics.
#[async_trait]
pub trait StatsPublisher: Send + Sync {
    /// Stores `value` under `label` on the record identified by `record_id`.
    async fn update_field(&self, record_id: &str, label: &str, value: Value) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
    record: AuthRecord,
}

#[derive(Debug, Deserialize)]
struct AuthRecord {
    id: String,
}

/// Publishes into a PocketBase auth collection, one field per statistic.
#[derive(Clone)]
pub struct PocketBasePublisher {
    client: Client,
    base_url: String,
    collection: String,
    token: String,
    record_id: String,
}

impl PocketBasePublisher {
    /// Authenticates against the collection and remembers the signed-in
    /// record, which is where all stats are written.
    pub async fn connect(client: Client, config: &PublisherConfig) -> Result<Self> {
        let base_url = config.url.trim_end_matches('/').to_string();
        let url = format!(
            "{}/api/collections/{}/auth-with-password",
            base_url, config.collection
        );

        let response = client
            .post(&url)
            .json(&json!({
                "identity": config.email,
                "password": config.password,
            }))
            .send()
            .await
            .map_err(|e| StatsError::Upstream(format!("pocketbase auth failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StatsError::Upstream(format!(
                "pocketbase auth returned {}",
                status
            )));
        }

        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| StatsError::Upstream(format!("invalid pocketbase auth body: {}", e)))?;

        tracing::info!("authenticated with pocketbase as record {}", auth.record.id);

        Ok(Self {
            client,
            base_url,
            collection: config.collection.clone(),
            token: auth.token,
            record_id: auth.record.id,
        })
    }

    pub fn record_id(&self) -> &str {
        &self.record_id
    }
}

#[async_trait]
impl StatsPublisher for PocketBasePublisher {
    async fn update_field(&self, record_id: &str, label: &str, value: Value) -> Result<()> {
        let url = format!(
            "{}/api/collections/{}/records/{}",
            self.base_url, self.collection, record_id
        );

        let mut body = serde_json::Map::new();
        body.insert(label.to_string(), value);

        let response = self
            .client
            .patch(&url)
            .header("Authorization", &self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| StatsError::Upstream(format!("update of {} failed: {}", label, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StatsError::Upstream(format!(
                "update of {} returned {}: {}",
                label, status, text
            )));
        }

        tracing::debug!("updated {} on {}", label, record_id);
        Ok(())
    }
}

/// Logs updates instead of sending them anywhere. Used for dry runs.
#[derive(Debug, Clone, Default)]
pub struct LogPublisher;

#[async_trait]
impl StatsPublisher for LogPublisher {
    async fn update_field(&self, record_id: &str, label: &str, value: Value) -> Result<()> {
        tracing::info!("[dry run] {}.{} = {}", record_id, label, value);
        Ok(())
    }
}
