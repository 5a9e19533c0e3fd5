use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StatsError};

/// One entry of an extended streaming history export file.
///
/// Only `ts` and `ms_played` are required. Fields the aggregates don't use
/// are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRecord {
    pub ts: String,
    pub ms_played: u64,
    #[serde(default)]
    pub master_metadata_album_artist_name: Option<String>,
}

/// A single playback, with its local-time fields derived once from the UTC
/// instant.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackEvent {
    timestamp_utc: DateTime<Utc>,
    timestamp_local: DateTime<Tz>,
    ms_played: u64,
    artist_name: Option<String>,
}

impl PlaybackEvent {
    pub fn new(
        timestamp_utc: DateTime<Utc>,
        ms_played: u64,
        artist_name: Option<String>,
        timezone: Tz,
    ) -> Self {
        Self {
            timestamp_utc,
            timestamp_local: timestamp_utc.with_timezone(&timezone),
            ms_played,
            artist_name,
        }
    }

    pub fn from_record(record: ExportRecord, timezone: Tz) -> Result<Self> {
        let timestamp_utc = parse_timestamp(&record.ts)?;
        Ok(Self::new(
            timestamp_utc,
            record.ms_played,
            record.master_metadata_album_artist_name,
            timezone,
        ))
    }

    pub fn timestamp_utc(&self) -> DateTime<Utc> {
        self.timestamp_utc
    }

    pub fn timestamp_local(&self) -> DateTime<Tz> {
        self.timestamp_local
    }

    pub fn local_date(&self) -> NaiveDate {
        self.timestamp_local.date_naive()
    }

    pub fn local_hour(&self) -> u32 {
        self.timestamp_local.hour()
    }

    pub fn ms_played(&self) -> u64 {
        self.ms_played
    }

    pub fn artist_name(&self) -> Option<&str> {
        self.artist_name.as_deref()
    }
}

/// Parses an export timestamp. Values carry either a `Z` suffix or an
/// explicit offset; a bare date-time is taken to be UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|_| StatsError::DataLoad(format!("invalid timestamp: {}", raw)))
}

/// Inclusive local-date window.
///
/// Filtering only applies when both bounds are present: a range with a single
/// bound selects everything, same as no range at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub const ALL_TIME: DateRange = DateRange {
        start: None,
        end: None,
    };

    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self::new(Some(start), Some(end))
    }

    /// Whole calendar year, January 1st through December 31st.
    pub fn year(year: i32) -> Option<Self> {
        Some(Self::between(
            NaiveDate::from_ymd_opt(year, 1, 1)?,
            NaiveDate::from_ymd_opt(year, 12, 31)?,
        ))
    }

    /// Normalizes user-supplied bounds. Each bound may be `YYYY-MM-DD` or a
    /// full RFC 3339 timestamp, in which case its written calendar date is used.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        Ok(Self::new(
            start.map(parse_date_bound).transpose()?,
            end.map(parse_date_bound).transpose()?,
        ))
    }

    pub fn bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        match self.bounds() {
            Some((start, end)) => start <= date && date <= end,
            None => true,
        }
    }
}

fn parse_date_bound(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive()))
        .map_err(|_| StatsError::Config(format!("invalid date: {}", raw)))
}
