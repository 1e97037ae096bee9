//! Values derived from sessions for display and export.
//!
//! Distance and duration are never stored on a [`Session`]; they are computed
//! from its segments. Distances come out in the session's own unit (miles for
//! mph devices, kilometres for km/h devices).

use crate::{CompletedSegment, Session, SpeedUnit};

/// Distance covered by a run of segments, in the unit of their speeds
pub fn distance(segments: &[CompletedSegment]) -> f64 {
    segments
        .iter()
        .map(|s| s.actual_speed * f64::from(s.duration_sec) / 3600.0)
        .sum()
}

/// Total seconds credited to a run of segments
pub fn duration_sec(segments: &[CompletedSegment]) -> u64 {
    segments.iter().map(|s| u64::from(s.duration_sec)).sum()
}

impl Session {
    pub fn distance(&self) -> f64 {
        distance(&self.segments)
    }

    pub fn duration_sec(&self) -> u64 {
        duration_sec(&self.segments)
    }

    /// Wall-clock span between start and end in milliseconds
    pub fn wall_duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }

    /// Mean mapped speed over the credited time, `None` for an empty session
    pub fn average_speed(&self) -> Option<f64> {
        let secs = self.duration_sec();
        if secs == 0 {
            return None;
        }
        Some(self.distance() * 3600.0 / secs as f64)
    }
}

/// `m:ss` below an hour, `h:mm:ss` above
pub fn format_clock(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

pub fn format_speed(speed: f64, unit: SpeedUnit) -> String {
    format!("{:.1} {}", speed, unit.speed_label())
}

pub fn format_distance(distance: f64, unit: SpeedUnit) -> String {
    format!("{:.2} {}", distance, unit.distance_label())
}

/// Minutes per mile (or kilometre) at a speed; `None` when standing still
pub fn pace_per_unit(speed: f64) -> Option<f64> {
    if speed <= 0.0 || !speed.is_finite() {
        return None;
    }
    Some(60.0 / speed)
}

/// Pace as `m:ss /mi` (or `/km`)
pub fn format_pace(speed: f64, unit: SpeedUnit) -> String {
    match pace_per_unit(speed) {
        Some(minutes) => {
            let secs = (minutes * 60.0).round() as u64;
            format!("{} /{}", format_clock(secs), unit.distance_label())
        }
        None => format!("--:-- /{}", unit.distance_label()),
    }
}
