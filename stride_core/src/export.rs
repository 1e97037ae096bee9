//! CSV export of recorded sessions.
//!
//! Exports are written to a temp file next to the destination, synced, and
//! renamed into place so a failed export never leaves a half-written file.

use crate::{Error, Result, Session};
use std::path::Path;
use tempfile::NamedTempFile;

/// One session per row
#[derive(Debug, serde::Serialize)]
struct SessionRow {
    id: String,
    workout_id: Option<String>,
    workout_name: Option<String>,
    started_at: String,
    ended_at: String,
    unit: String,
    duration_sec: u64,
    distance: String,
    avg_hr: Option<u16>,
    total_steps: Option<u32>,
    notes: Option<String>,
}

impl From<&Session> for SessionRow {
    fn from(session: &Session) -> Self {
        SessionRow {
            id: session.id.to_string(),
            workout_id: session.workout_id.clone(),
            workout_name: session.workout_name.clone(),
            started_at: session.started_at.to_rfc3339(),
            ended_at: session.ended_at.to_rfc3339(),
            unit: session.unit.distance_label().to_string(),
            duration_sec: session.duration_sec(),
            distance: format!("{:.3}", session.distance()),
            avg_hr: session.avg_hr,
            total_steps: session.total_steps,
            notes: session.notes.clone(),
        }
    }
}

/// One segment per row
#[derive(Debug, serde::Serialize)]
struct SegmentRow<'a> {
    session_id: String,
    block_index: usize,
    label: Option<&'a str>,
    speed: f64,
    unit: &'static str,
    duration_sec: u32,
}

fn write_atomically<F>(out: &Path, write_rows: F) -> Result<()>
where
    F: FnOnce(&mut csv::Writer<&std::fs::File>) -> Result<()>,
{
    let parent = match out.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    {
        let mut writer = csv::Writer::from_writer(temp.as_file());
        write_rows(&mut writer)?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(out).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Export sessions with derived duration and distance; returns rows written
pub fn export_sessions_csv(sessions: &[Session], out: &Path) -> Result<usize> {
    write_atomically(out, |writer| {
        for session in sessions {
            writer.serialize(SessionRow::from(session))?;
        }
        Ok(())
    })?;
    tracing::info!("Exported {} sessions to {:?}", sessions.len(), out);
    Ok(sessions.len())
}

/// Export every segment of every session; returns rows written
pub fn export_segments_csv(sessions: &[Session], out: &Path) -> Result<usize> {
    let mut count = 0;
    write_atomically(out, |writer| {
        for session in sessions {
            let session_id = session.id.to_string();
            for segment in &session.segments {
                writer.serialize(SegmentRow {
                    session_id: session_id.clone(),
                    block_index: segment.block_index,
                    label: segment.label.as_deref(),
                    speed: segment.actual_speed,
                    unit: session.unit.speed_label(),
                    duration_sec: segment.duration_sec,
                })?;
                count += 1;
            }
        }
        Ok(())
    })?;
    tracing::info!("Exported {} segments to {:?}", count, out);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CompletedSegment, SpeedUnit};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn create_test_session() -> Session {
        let started_at = Utc::now();
        Session {
            id: Uuid::new_v4(),
            workout_id: Some("easy_20".into()),
            workout_name: Some("Easy 20".into()),
            started_at,
            ended_at: started_at + Duration::seconds(1200),
            unit: SpeedUnit::Mph,
            segments: vec![
                CompletedSegment {
                    block_index: 0,
                    actual_speed: 3.0,
                    duration_sec: 600,
                    label: Some("Walk".into()),
                },
                CompletedSegment {
                    block_index: 1,
                    actual_speed: 2.0,
                    duration_sec: 600,
                    label: None,
                },
            ],
            notes: Some("good, steady".into()),
            avg_hr: Some(118),
            total_steps: Some(2400),
        }
    }

    #[test]
    fn test_export_sessions() {
        let temp_dir = tempfile::tempdir().unwrap();
        let out = temp_dir.path().join("sessions.csv");

        let count = export_sessions_csv(&[create_test_session(), create_test_session()], &out)
            .unwrap();
        assert_eq!(count, 2);

        let mut reader = csv::Reader::from_path(&out).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "id");
        let record = reader.records().next().unwrap().unwrap();
        let distance_col = headers.iter().position(|h| h == "distance").unwrap();
        assert_eq!(&record[distance_col], "0.833");
        let notes_col = headers.iter().position(|h| h == "notes").unwrap();
        assert_eq!(&record[notes_col], "good, steady");
    }

    #[test]
    fn test_export_segments() {
        let temp_dir = tempfile::tempdir().unwrap();
        let out = temp_dir.path().join("segments.csv");

        let count = export_segments_csv(&[create_test_session()], &out).unwrap();
        assert_eq!(count, 2);

        let reader = csv::Reader::from_path(&out).unwrap();
        assert_eq!(reader.into_records().count(), 2);
    }

    #[test]
    fn test_export_overwrites() {
        let temp_dir = tempfile::tempdir().unwrap();
        let out = temp_dir.path().join("sessions.csv");

        export_sessions_csv(&[create_test_session(), create_test_session()], &out).unwrap();
        export_sessions_csv(&[create_test_session()], &out).unwrap();

        let reader = csv::Reader::from_path(&out).unwrap();
        assert_eq!(reader.into_records().count(), 1);
    }
}
