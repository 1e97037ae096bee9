//! Session history queries over the session log.

use crate::{Error, Result, Session, SpeedUnit};
use chrono::{Duration, Utc};
use std::path::Path;

/// Aggregate totals over a set of sessions
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HistorySummary {
    pub sessions: usize,
    pub total_sec: u64,
    pub miles: f64,
    pub kilometres: f64,
}

/// Load sessions started within the last `days` days, newest first
pub fn load_recent_sessions(log_path: &Path, days: i64) -> Result<Vec<Session>> {
    let cutoff = Duration::try_days(days)
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .ok_or_else(|| Error::Config(format!("history window of {} days is out of range", days)))?;

    let mut sessions: Vec<Session> = crate::wal::read_sessions(log_path)?
        .into_iter()
        .filter(|s| s.started_at >= cutoff)
        .collect();

    sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));

    tracing::info!(
        "Loaded {} sessions from last {} days",
        sessions.len(),
        days
    );
    Ok(sessions)
}

/// Most recent session recorded for a given workout id
pub fn find_last_for_workout<'a>(sessions: &'a [Session], workout_id: &str) -> Option<&'a Session> {
    sessions
        .iter()
        .filter(|s| s.workout_id.as_deref() == Some(workout_id))
        .max_by_key(|s| s.started_at)
}

/// Totals across sessions, keeping distance in each session's own unit
pub fn summarize(sessions: &[Session]) -> HistorySummary {
    let mut summary = HistorySummary::default();
    for session in sessions {
        summary.sessions += 1;
        summary.total_sec += session.duration_sec();
        match session.unit {
            SpeedUnit::Mph => summary.miles += session.distance(),
            SpeedUnit::Kph => summary.kilometres += session.distance(),
        }
    }
    summary
}
