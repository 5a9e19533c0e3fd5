use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;

use crate::error::{Result, StatsError};
use crate::models::{ExportRecord, PlaybackEvent};

/// Substring identifying audio history files inside an export directory.
pub const EXPORT_FILE_MARKER: &str = "Streaming_History_Audio";

/// In-memory playback history. Built once and never mutated afterwards.
///
/// Local dates and hours are fixed on each [`PlaybackEvent`] when it is
/// built, so the log itself carries no timezone.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: Vec<PlaybackEvent>,
}

impl EventLog {
    pub fn from_events(events: Vec<PlaybackEvent>) -> Self {
        Self { events }
    }

    /// Loads every export file under `dir` whose name contains
    /// [`EXPORT_FILE_MARKER`], in file name order.
    pub fn load_dir(dir: &Path, timezone: Tz) -> Result<Self> {
        let files = find_export_files(dir)?;

        let mut events = Vec::new();
        for file in &files {
            let records = read_export_file(file)?;
            tracing::debug!("read {} records from {}", records.len(), file.display());
            for record in records {
                let event = PlaybackEvent::from_record(record, timezone).map_err(|e| match e {
                    StatsError::DataLoad(msg) => {
                        StatsError::DataLoad(format!("{}: {}", file.display(), msg))
                    }
                    other => other,
                })?;
                events.push(event);
            }
        }

        tracing::info!(
            "loaded {} playback events from {} export files",
            events.len(),
            files.len()
        );

        Ok(Self { events })
    }

    pub fn events(&self) -> &[PlaybackEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

fn find_export_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        StatsError::DataLoad(format!("cannot read directory {}: {}", dir.display(), e))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            StatsError::DataLoad(format!("cannot read directory {}: {}", dir.display(), e))
        })?;
        if entry.file_name().to_string_lossy().contains(EXPORT_FILE_MARKER) {
            files.push(entry.path());
        }
    }

    if files.is_empty() {
        return Err(StatsError::DataLoad(format!(
            "no {} files found in {}",
            EXPORT_FILE_MARKER,
            dir.display()
        )));
    }

    // read_dir order is platform dependent
    files.sort();
    Ok(files)
}

fn read_export_file(path: &Path) -> Result<Vec<ExportRecord>> {
    let file = fs::File::open(path)
        .map_err(|e| StatsError::DataLoad(format!("cannot open {}: {}", path.display(), e)))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| StatsError::DataLoad(format!("invalid export file {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_load_concatenates_matching_files_in_name_order() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "Streaming_History_Audio_2023_1.json",
            r#"[{"ts": "2023-05-01T12:00:00Z", "ms_played": 2000,
                 "master_metadata_album_artist_name": "Daft Punk"}]"#,
        );
        write(
            dir.path(),
            "Streaming_History_Audio_2022.json",
            r#"[{"ts": "2022-05-01T12:00:00Z", "ms_played": 1000,
                 "master_metadata_album_artist_name": null}]"#,
        );
        write(
            dir.path(),
            "Streaming_History_Video_2023.json",
            r#"[{"ts": "2023-05-01T12:00:00Z", "ms_played": 99999}]"#,
        );

        let log = EventLog::load_dir(dir.path(), chrono_tz::UTC).unwrap();

        assert_eq!(log.len(), 2);
        assert_eq!(log.events()[0].ms_played(), 1000);
        assert_eq!(log.events()[0].artist_name(), None);
        assert_eq!(log.events()[1].artist_name(), Some("Daft Punk"));
        assert_eq!(
            log.events()[1].local_date(),
            NaiveDate::from_ymd_opt(2023, 5, 1).unwrap()
        );
    }

    #[test]
    fn test_missing_directory_is_data_load_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = EventLog::load_dir(&missing, chrono_tz::UTC).unwrap_err();
        assert!(matches!(err, StatsError::DataLoad(_)));
    }

    #[test]
    fn test_no_matching_files_is_data_load_error() {
        let dir = tempdir().unwrap();
        write(dir.path(), "Userdata.json", "{}");
        let err = EventLog::load_dir(dir.path(), chrono_tz::UTC).unwrap_err();
        assert!(matches!(err, StatsError::DataLoad(_)));
    }

    #[test]
    fn test_record_without_ms_played_is_rejected() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "Streaming_History_Audio_2023.json",
            r#"[{"ts": "2023-05-01T12:00:00Z"}]"#,
        );
        let err = EventLog::load_dir(dir.path(), chrono_tz::UTC).unwrap_err();
        assert!(matches!(err, StatsError::DataLoad(_)));
    }

    #[test]
    fn test_negative_ms_played_is_rejected() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "Streaming_History_Audio_2023.json",
            r#"[{"ts": "2023-05-01T12:00:00Z", "ms_played": -5}]"#,
        );
        assert!(EventLog::load_dir(dir.path(), chrono_tz::UTC).is_err());
    }
}
