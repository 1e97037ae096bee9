#![forbid(unsafe_code)]

//! Core domain model and workout execution for Stride, a treadmill walking
//! companion.
//!
//! This crate provides:
//! - Domain types (device envelopes, blocks, workouts, sessions)
//! - Speed mapping onto discrete or stepped device speeds
//! - The block-sequencing workout engine
//! - Derived session metrics and formatting
//! - Presets, configuration, preferences
//! - Persistence (session log, history, CSV export)

pub mod types;
pub mod error;
pub mod speed;
pub mod engine;
pub mod metrics;
pub mod telemetry;
pub mod presets;
pub mod config;
pub mod prefs;
pub mod logging;
pub mod wal;
pub mod history;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use speed::{map_speed, SpeedMapper};
pub use engine::{Clock, EngineState, Progress, SystemClock, WorkoutEngine};
pub use presets::{get_default_presets, quick_start, Preset, PresetCatalog};
pub use config::Config;
pub use prefs::Prefs;
pub use wal::{JsonlSink, SessionSink};
pub use history::load_recent_sessions;
pub use telemetry::load_telemetry;
