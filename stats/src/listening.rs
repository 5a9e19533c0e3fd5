//! Listening-time aggregates over an [`EventLog`].
//!
//! Every function here is pure: results are recomputed from the log on each
//! call and an empty selection yields zero rather than an error.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::history::EventLog;
use crate::models::{DateRange, PlaybackEvent};

fn in_range<'a>(
    log: &'a EventLog,
    range: DateRange,
) -> impl Iterator<Item = &'a PlaybackEvent> + 'a {
    log.events()
        .iter()
        .filter(move |event| range.contains(event.local_date()))
}

/// Total milliseconds played in `range`.
pub fn total_listening(log: &EventLog, range: DateRange) -> u64 {
    in_range(log, range).map(PlaybackEvent::ms_played).sum()
}

/// Average milliseconds per day in `range`.
///
/// The day count spans from the first to the last day that has any
/// playback, inclusive, so quiet days in between still count.
pub fn average_listening(log: &EventLog, range: DateRange) -> f64 {
    let mut total = 0u64;
    let mut first: Option<NaiveDate> = None;
    let mut last: Option<NaiveDate> = None;

    for event in in_range(log, range) {
        let date = event.local_date();
        total += event.ms_played();
        first = Some(first.map_or(date, |d| d.min(date)));
        last = Some(last.map_or(date, |d| d.max(date)));
    }

    let (Some(first), Some(last)) = (first, last) else {
        return 0.0;
    };

    let days = last.signed_duration_since(first).num_days() + 1;
    if days > 0 {
        total as f64 / days as f64
    } else {
        0.0
    }
}

/// Milliseconds per month, keyed by the last day of each month.
///
/// `year` restricts the result to one local calendar year.
pub fn listening_by_month(log: &EventLog, year: Option<i32>) -> BTreeMap<NaiveDate, u64> {
    let mut months = BTreeMap::new();
    for event in log.events() {
        let date = event.local_date();
        if year.is_some_and(|y| date.year() != y) {
            continue;
        }
        *months.entry(month_end(date)).or_insert(0) += event.ms_played();
    }
    months
}

/// Milliseconds per local hour of day. Hours without playback are absent.
pub fn listening_by_hour(log: &EventLog, range: DateRange) -> BTreeMap<u32, u64> {
    let mut hours = BTreeMap::new();
    for event in in_range(log, range) {
        *hours.entry(event.local_hour()).or_insert(0) += event.ms_played();
    }
    hours
}

/// Dense variant of [`listening_by_hour`]: one slot per hour, zero-filled.
pub fn listening_clock(log: &EventLog, range: DateRange) -> [u64; 24] {
    let mut clock = [0u64; 24];
    for (hour, ms) in listening_by_hour(log, range) {
        clock[hour as usize] = ms;
    }
    clock
}

/// Milliseconds played for artists whose name starts with `artist_name`,
/// ignoring case. Plays without an artist never match.
pub fn artist_listening_time(log: &EventLog, artist_name: &str, range: DateRange) -> u64 {
    let needle = artist_name.to_lowercase();
    in_range(log, range)
        .filter(|event| {
            event
                .artist_name()
                .is_some_and(|name| name.to_lowercase().starts_with(&needle))
        })
        .map(PlaybackEvent::ms_played)
        .sum()
}

/// Last calendar day of the month containing `date`.
pub fn month_end(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}
