//! Session log.
//!
//! Finished sessions are appended to a JSONL (JSON Lines) file with file
//! locking so a running workout and a history query can share it safely.

use crate::{Result, Session};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Destination for finished sessions
pub trait SessionSink {
    fn append(&mut self, session: &Session) -> Result<()>;
}

/// JSONL-based session sink with file locking
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl SessionSink for JsonlSink {
    fn append(&mut self, session: &Session) -> Result<()> {
        let mut record = serde_json::to_vec(session)?;
        record.push(b'\n');

        self.ensure_parent_dir()?;
        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        // Whole record in a single write while the lock is held
        log.lock_exclusive()?;
        let written = log.write_all(&record).and_then(|()| log.sync_data());
        log.unlock()?;
        written?;

        tracing::debug!(
            "Appended session {} ({} segments) to {:?}",
            session.id,
            session.segments.len(),
            self.path
        );
        Ok(())
    }
}

/// Parse one log record; blank lines and unreadable records yield `None`
fn parse_record(line_no: usize, line: &str) -> Option<Session> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    serde_json::from_str(line)
        .map_err(|e| tracing::warn!("Skipping session log line {}: {}", line_no, e))
        .ok()
}

/// Read all sessions from a log file, skipping lines that fail to parse
pub fn read_sessions(path: &Path) -> Result<Vec<Session>> {
    let log = match File::open(path) {
        Ok(log) => log,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    log.lock_shared()?;

    let mut sessions = Vec::new();
    let mut skipped = 0usize;
    for (idx, line) in BufReader::new(&log).lines().enumerate() {
        let line = line?;
        match parse_record(idx + 1, &line) {
            Some(session) => sessions.push(session),
            None if line.trim().is_empty() => {}
            None => skipped += 1,
        }
    }
    log.unlock()?;

    if skipped > 0 {
        tracing::warn!("Ignored {} corrupt lines in {:?}", skipped, path);
    }
    tracing::debug!("Read {} sessions from {:?}", sessions.len(), path);
    Ok(sessions)
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
            ended_at: started_at + Duration::seconds(300),
            unit: SpeedUnit::Mph,
            segments: vec![CompletedSegment {
                block_index: 0,
                actual_speed: 2.5,
                duration_sec: 300,
                label: Some("Walk".into()),
            }],
            notes: None,
            avg_hr: Some(112),
            total_steps: None,
        }
    }

    #[test]
    fn test_append_and_read_single_session() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("sessions.jsonl");

        let session = create_test_session();

        let mut sink = JsonlSink::new(&log_path);
        sink.append(&session).unwrap();

        let sessions = read_sessions(&log_path).unwrap();
        assert_eq!(sessions, vec![session]);
    }

    #[test]
    fn test_append_multiple_sessions() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("nested/sessions.jsonl");

        let mut sink = JsonlSink::new(&log_path);
        for _ in 0..5 {
            sink.append(&create_test_session()).unwrap();
        }

        assert_eq!(read_sessions(&log_path).unwrap().len(), 5);
    }

    #[test]
    fn test_corrupt_lines_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("sessions.jsonl");

        let mut sink = JsonlSink::new(&log_path);
        sink.append(&create_test_session()).unwrap();
        {
            let mut file = OpenOptions::new().append(true).open(&log_path).unwrap();
            writeln!(file, "{{ not a session").unwrap();
        }
        sink.append(&create_test_session()).unwrap();

        assert_eq!(read_sessions(&log_path).unwrap().len(), 2);
    }

    #[test]
    fn test_read_missing_log() {
        let temp_dir = tempfile::tempdir().unwrap();
        let sessions = read_sessions(&temp_dir.path().join("nonexistent.jsonl")).unwrap();
        assert!(sessions.is_empty());
    }
}
