//! Core domain types for the Stride treadmill system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Device speed envelopes and rounding policy
//! - Workout blocks and plans
//! - Completed sessions and their segments
//! - Health telemetry samples

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Device Types
// ============================================================================

/// Unit every speed on a device is expressed in
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpeedUnit {
    #[default]
    Mph,
    Kph,
}

impl SpeedUnit {
    /// Short label used for speeds ("mph", "km/h")
    pub fn speed_label(self) -> &'static str {
        match self {
            SpeedUnit::Mph => "mph",
            SpeedUnit::Kph => "km/h",
        }
    }

    /// Short label used for distances ("mi", "km")
    pub fn distance_label(self) -> &'static str {
        match self {
            SpeedUnit::Mph => "mi",
            SpeedUnit::Kph => "km",
        }
    }
}

/// How a device exposes its speeds
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpeedMode {
    /// A fixed set of selectable speeds
    Discrete,
    /// A linear ladder from `min` to `max` in steps of `increment`
    #[default]
    Increment,
}

/// Speed envelope of a treadmill.
///
/// Only the fields relevant to `mode` are read; the rest are ignored. Missing
/// required fields are reported when the envelope is turned into a speed pool.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DeviceCapabilities {
    pub unit: SpeedUnit,
    pub mode: SpeedMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub increment: Option<f64>,
}

impl DeviceCapabilities {
    /// Device with an explicit list of selectable speeds
    pub fn discrete(unit: SpeedUnit, allowed: Vec<f64>) -> Self {
        Self {
            unit,
            mode: SpeedMode::Discrete,
            allowed: Some(allowed),
            min: None,
            max: None,
            increment: None,
        }
    }

    /// Device with a stepped speed ladder
    pub fn increment(unit: SpeedUnit, min: f64, max: f64, increment: f64) -> Self {
        Self {
            unit,
            mode: SpeedMode::Increment,
            allowed: None,
            min: Some(min),
            max: Some(max),
            increment: Some(increment),
        }
    }
}

/// Rounding direction when a target falls between two achievable speeds
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoundingStrategy {
    #[default]
    Nearest,
    Down,
    Up,
}

/// Rounding rule applied by the speed mapper
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct SpeedPolicy {
    pub strategy: RoundingStrategy,
    /// Reserved; the mapper does not read it yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
}

impl SpeedPolicy {
    pub fn new(strategy: RoundingStrategy) -> Self {
        Self {
            strategy,
            tolerance: None,
        }
    }
}

// ============================================================================
// Workout Plan Types
// ============================================================================

/// One timed segment of a workout plan
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Constant speed for the whole block
    Steady {
        label: String,
        duration_sec: u32,
        target_speed: f64,
    },
    /// Speed change from `from_speed` to `to_speed`.
    ///
    /// The engine currently runs ramps at `from_speed` for their full duration.
    Ramp {
        label: String,
        duration_sec: u32,
        from_speed: f64,
        to_speed: f64,
    },
}

impl Block {
    pub fn steady(label: impl Into<String>, duration_sec: u32, target_speed: f64) -> Self {
        Block::Steady {
            label: label.into(),
            duration_sec,
            target_speed,
        }
    }

    pub fn ramp(
        label: impl Into<String>,
        duration_sec: u32,
        from_speed: f64,
        to_speed: f64,
    ) -> Self {
        Block::Ramp {
            label: label.into(),
            duration_sec,
            from_speed,
            to_speed,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Block::Steady { label, .. } => label,
            Block::Ramp { label, .. } => label,
        }
    }

    /// Planned length of the block in seconds
    pub fn duration_sec(&self) -> u32 {
        match self {
            Block::Steady { duration_sec, .. } => *duration_sec,
            Block::Ramp { duration_sec, .. } => *duration_sec,
        }
    }

    /// The unmapped speed the engine asks the device for while running this block
    pub fn requested_speed(&self) -> f64 {
        match self {
            Block::Steady { target_speed, .. } => *target_speed,
            Block::Ramp { from_speed, .. } => *from_speed,
        }
    }
}

/// A named, ordered plan of blocks
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Workout {
    pub id: String,
    pub name: String,
    pub blocks: Vec<Block>,
    pub created_at: DateTime<Utc>,
}

impl Workout {
    /// Build a workout with a fresh id
    pub fn new(name: impl Into<String>, blocks: Vec<Block>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            blocks,
            created_at: Utc::now(),
        }
    }

    /// Sum of every block's planned duration
    pub fn planned_duration_sec(&self) -> u64 {
        self.blocks.iter().map(|b| u64::from(b.duration_sec())).sum()
    }
}

// ============================================================================
// Session Types
// ============================================================================

/// The executed part of one block
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CompletedSegment {
    pub block_index: usize,
    /// Mapped speed the device actually ran
    pub actual_speed: f64,
    /// Seconds actually consumed, at most the block's planned duration
    pub duration_sec: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Record of one executed (possibly partial) workout
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub workout_id: Option<String>,
    #[serde(default)]
    pub workout_name: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub unit: SpeedUnit,
    pub segments: Vec<CompletedSegment>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub avg_hr: Option<u16>,
    #[serde(default)]
    pub total_steps: Option<u32>,
}

impl Session {
    pub fn started_at_ms(&self) -> i64 {
        self.started_at.timestamp_millis()
    }

    pub fn ended_at_ms(&self) -> i64 {
        self.ended_at.timestamp_millis()
    }
}

// ============================================================================
// Telemetry Types
// ============================================================================

/// A reading from the external health-data producer.
///
/// `steps` is the cumulative step count since the session started.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TelemetrySample {
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub heart_rate: Option<u16>,
    #[serde(default)]
    pub steps: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_requests_from_speed() {
        let ramp = Block::ramp("build", 60, 2.0, 3.5);
        assert_eq!(ramp.requested_speed(), 2.0);
        assert_eq!(ramp.duration_sec(), 60);
        assert_eq!(ramp.label(), "build");
    }

    #[test]
    fn test_planned_duration() {
        let workout = Workout::new(
            "plan",
            vec![Block::steady("a", 120, 2.0), Block::ramp("b", 60, 2.0, 3.0)],
        );
        assert_eq!(workout.planned_duration_sec(), 180);
    }

    #[test]
    fn test_block_serde_is_tagged() {
        let json = serde_json::to_string(&Block::steady("warm", 30, 1.5)).unwrap();
        assert!(json.contains(r#""type":"steady""#));
    }

    #[test]
    fn test_capabilities_from_toml_without_optional_fields() {
        let caps: DeviceCapabilities = toml::from_str(
            r#"
unit = "kph"
mode = "discrete"
allowed = [1.0, 2.5]
"#,
        )
        .unwrap();
        assert_eq!(caps.unit, SpeedUnit::Kph);
        assert_eq!(caps.allowed, Some(vec![1.0, 2.5]));
        assert!(caps.increment.is_none());
    }
}
