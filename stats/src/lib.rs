use serde_json::{json, Value};

pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod history;
pub mod listening;
pub mod models;
pub mod publisher;
pub mod spotify;

#[cfg(test)]
mod test_server;

use error::{Result, StatsError};
use history::EventLog;
use models::DateRange;
use publisher::StatsPublisher;

/// Aggregates derived from the local export, plus the top items fetched
/// from Spotify, ready to publish.
#[derive(Debug, Clone, PartialEq)]
pub struct ListeningReport {
    pub year: i32,
    pub total_ms: u64,
    pub year_total_ms: u64,
    pub year_average_ms: f64,
    pub by_month: Value,
    pub by_hour: Value,
    pub top_tracks: Option<Value>,
    pub top_artists: Option<Value>,
}

impl ListeningReport {
    /// All-time total plus the calendar-year breakdowns for `year`.
    pub fn build(log: &EventLog, year: i32) -> Result<Self> {
        let year_range = DateRange::year(year)
            .ok_or_else(|| StatsError::Config(format!("year out of range: {}", year)))?;

        Ok(Self {
            year,
            total_ms: listening::total_listening(log, DateRange::ALL_TIME),
            year_total_ms: listening::total_listening(log, year_range),
            year_average_ms: listening::average_listening(log, year_range),
            by_month: json!(listening::listening_by_month(log, Some(year))),
            by_hour: json!(listening::listening_by_hour(log, year_range)),
            top_tracks: None,
            top_artists: None,
        })
    }

    pub fn with_top_tracks(mut self, tracks: Vec<Value>) -> Self {
        self.top_tracks = Some(json!(tracks));
        self
    }

    pub fn with_top_artists(mut self, artists: Vec<Value>) -> Self {
        self.top_artists = Some(json!(artists));
        self
    }

    /// Field label / value pairs in publishing order. Top items that were
    /// never fetched are left out.
    pub fn fields(&self) -> Vec<(&'static str, Value)> {
        let mut fields = vec![
            (publisher::TOTAL_MS_LISTENED, json!(self.total_ms)),
            (publisher::TOTAL_MS_LISTENED_LAST_YEAR, json!(self.year_total_ms)),
            (publisher::AVERAGE_MS_LISTENED, json!(self.year_average_ms)),
        ];
        if let Some(tracks) = &self.top_tracks {
            fields.push((publisher::TOP_5_SONGS_RECENT, tracks.clone()));
        }
        if let Some(artists) = &self.top_artists {
            fields.push((publisher::TOP_5_ARTISTS_RECENT, artists.clone()));
        }
        fields.push((publisher::MOM_LY_MS_LISTENED, self.by_month.clone()));
        fields.push((publisher::LISTENING_CLOCK_LY, self.by_hour.clone()));
        fields
    }
}

/// Sends every field of `report` to `publisher`, stopping at the first failure.
pub async fn publish_report<P>(publisher: &P, record_id: &str, report: &ListeningReport) -> Result<()>
where
    P: StatsPublisher + ?Sized,
{
    for (label, value) in report.fields() {
        publisher.update_field(record_id, label, value).await?;
        tracing::info!("published {}", label);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use models::PlaybackEvent;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPublisher {
        updates: Mutex<Vec<(String, String, Value)>>,
    }

    #[async_trait]
    impl StatsPublisher for RecordingPublisher {
        async fn update_field(&self, record_id: &str, label: &str, value: Value) -> Result<()> {
            self.updates
                .lock()
                .unwrap()
                .push((record_id.to_string(), label.to_string(), value));
            Ok(())
        }
    }

    fn sample_log() -> EventLog {
        let play = |y, m, d, h, ms| {
            PlaybackEvent::new(
                Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap(),
                ms,
                Some("Daft Punk".to_string()),
                chrono_tz::UTC,
            )
        };
        EventLog::from_events(vec![
            play(2022, 12, 31, 10, 100),
            play(2023, 1, 1, 9, 1000),
            play(2023, 1, 2, 9, 3000),
        ])
    }

    #[test]
    fn test_report_for_year() {
        let report = ListeningReport::build(&sample_log(), 2023).unwrap();

        assert_eq!(report.total_ms, 4100);
        assert_eq!(report.year_total_ms, 4000);
        assert_eq!(report.year_average_ms, 2000.0);
        assert_eq!(report.by_month, json!({ "2023-01-31": 4000 }));
        assert_eq!(report.by_hour, json!({ "9": 4000 }));
    }

    #[test]
    fn test_report_for_empty_year_is_zeroed() {
        let report = ListeningReport::build(&sample_log(), 2030).unwrap();
        assert_eq!(report.year_total_ms, 0);
        assert_eq!(report.year_average_ms, 0.0);
        assert_eq!(report.by_month, json!({}));
    }

    #[test]
    fn test_report_rejects_unrepresentable_year() {
        let err = ListeningReport::build(&sample_log(), 300_000).unwrap_err();
        assert!(matches!(err, StatsError::Config(_)));
    }

    #[tokio::test]
    async fn test_publish_report_sends_every_field() {
        let sink = RecordingPublisher::default();
        let report = ListeningReport::build(&sample_log(), 2023).unwrap();

        publish_report(&sink, "rec1", &report).await.unwrap();

        let updates = sink.updates.lock().unwrap();
        let labels: Vec<&str> = updates.iter().map(|(_, label, _)| label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                publisher::TOTAL_MS_LISTENED,
                publisher::TOTAL_MS_LISTENED_LAST_YEAR,
                publisher::AVERAGE_MS_LISTENED,
                publisher::MOM_LY_MS_LISTENED,
                publisher::LISTENING_CLOCK_LY,
            ]
        );
        assert!(updates.iter().all(|(id, _, _)| id == "rec1"));
        assert_eq!(updates[0].2, json!(4100));
    }

    #[tokio::test]
    async fn test_top_items_publish_before_yearly_breakdowns() {
        let sink = RecordingPublisher::default();
        let report = ListeningReport::build(&sample_log(), 2023)
            .unwrap()
            .with_top_tracks(vec![json!({ "name": "One More Time" })])
            .with_top_artists(vec![json!({ "name": "Daft Punk" })]);

        publish_report(&sink, "rec1", &report).await.unwrap();

        let updates = sink.updates.lock().unwrap();
        let labels: Vec<&str> = updates.iter().map(|(_, label, _)| label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                publisher::TOTAL_MS_LISTENED,
                publisher::TOTAL_MS_LISTENED_LAST_YEAR,
                publisher::AVERAGE_MS_LISTENED,
                publisher::TOP_5_SONGS_RECENT,
                publisher::TOP_5_ARTISTS_RECENT,
                publisher::MOM_LY_MS_LISTENED,
                publisher::LISTENING_CLOCK_LY,
            ]
        );
        assert_eq!(updates[3].2, json!([{ "name": "One More Time" }]));
    }
}
