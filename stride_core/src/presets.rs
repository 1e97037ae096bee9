//! Built-in workout presets and quick-start builders.
//!
//! Preset speeds are authored in mph and converted when a preset is turned
//! into a [`Workout`] for a km/h device.

use crate::{Block, Error, Result, SpeedUnit, Workout};
use chrono::Utc;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

const KM_PER_MILE: f64 = 1.609344;

/// Cached preset catalog - built once and reused across all operations
static DEFAULT_PRESETS: Lazy<PresetCatalog> = Lazy::new(build_default_presets);

/// Get a reference to the cached preset catalog
pub fn get_default_presets() -> &'static PresetCatalog {
    &DEFAULT_PRESETS
}

/// A reusable workout template
#[derive(Clone, Debug)]
pub struct Preset {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Blocks with speeds in mph
    pub blocks: Vec<Block>,
}

impl Preset {
    /// Instantiate the preset for a device running in `unit`.
    ///
    /// The workout id is the preset id so sessions can be traced back to it.
    pub fn to_workout(&self, unit: SpeedUnit) -> Workout {
        let blocks = self
            .blocks
            .iter()
            .map(|b| convert_block(b, unit))
            .collect();
        Workout {
            id: self.id.clone(),
            name: self.name.clone(),
            blocks,
            created_at: Utc::now(),
        }
    }

    pub fn planned_duration_sec(&self) -> u64 {
        self.blocks.iter().map(|b| u64::from(b.duration_sec())).sum()
    }
}

fn convert_speed(mph: f64, unit: SpeedUnit) -> f64 {
    match unit {
        SpeedUnit::Mph => mph,
        SpeedUnit::Kph => mph * KM_PER_MILE,
    }
}

fn convert_block(block: &Block, unit: SpeedUnit) -> Block {
    match block {
        Block::Steady {
            label,
            duration_sec,
            target_speed,
        } => Block::steady(label.clone(), *duration_sec, convert_speed(*target_speed, unit)),
        Block::Ramp {
            label,
            duration_sec,
            from_speed,
            to_speed,
        } => Block::ramp(
            label.clone(),
            *duration_sec,
            convert_speed(*from_speed, unit),
            convert_speed(*to_speed, unit),
        ),
    }
}

/// The set of presets keyed by id
#[derive(Clone, Debug, Default)]
pub struct PresetCatalog {
    pub presets: BTreeMap<String, Preset>,
}

impl PresetCatalog {
    pub fn get(&self, id: &str) -> Result<&Preset> {
        self.presets
            .get(id)
            .ok_or_else(|| Error::UnknownPreset(id.to_string()))
    }

    /// Validate the catalog for consistency
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (id, preset) in &self.presets {
            if id.is_empty() || preset.id.is_empty() {
                errors.push("Preset has empty ID".to_string());
            }
            if id != &preset.id {
                errors.push(format!(
                    "Preset key '{}' doesn't match preset.id '{}'",
                    id, preset.id
                ));
            }
            if preset.name.is_empty() {
                errors.push(format!("Preset '{}' has empty name", id));
            }
            if preset.blocks.is_empty() {
                errors.push(format!("Preset '{}' has no blocks", id));
            }

            for (i, block) in preset.blocks.iter().enumerate() {
                if block.duration_sec() == 0 {
                    errors.push(format!("Preset '{}': block {} has zero duration", id, i));
                }
                let speeds = match block {
                    Block::Steady { target_speed, .. } => vec![*target_speed],
                    Block::Ramp {
                        from_speed,
                        to_speed,
                        ..
                    } => vec![*from_speed, *to_speed],
                };
                if speeds.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
                    errors.push(format!(
                        "Preset '{}': block {} has a non-positive speed",
                        id, i
                    ));
                }
            }
        }

        errors
    }
}

/// Single steady block at `speed` for `minutes`
pub fn quick_start(minutes: u32, speed: f64) -> Workout {
    Workout::new(
        "Quick Start",
        vec![Block::steady("Walk", minutes.saturating_mul(60), speed)],
    )
}

/// Warm-up, `rounds` of work/recovery pairs, then cool-down
pub fn intervals(
    name: &str,
    base_speed: f64,
    work_speed: f64,
    work_sec: u32,
    recover_sec: u32,
    rounds: u32,
) -> Vec<Block> {
    let mut blocks = vec![Block::ramp("Warm-up", 300, base_speed * 0.8, base_speed)];
    for round in 1..=rounds {
        blocks.push(Block::steady(
            format!("{} {}", name, round),
            work_sec,
            work_speed,
        ));
        blocks.push(Block::steady(
            format!("Recover {}", round),
            recover_sec,
            base_speed,
        ));
    }
    blocks.push(Block::ramp("Cool-down", 300, base_speed, base_speed * 0.8));
    blocks
}

fn build_default_presets() -> PresetCatalog {
    let mut presets = BTreeMap::new();

    let mut insert = |id: &str, name: &str, description: &str, blocks: Vec<Block>| {
        presets.insert(
            id.to_string(),
            Preset {
                id: id.into(),
                name: name.into(),
                description: description.into(),
                blocks,
            },
        );
    };

    insert(
        "easy_20",
        "Easy 20",
        "Twenty minutes at a conversational pace",
        vec![
            Block::steady("Warm-up", 180, 2.0),
            Block::steady("Walk", 840, 2.8),
            Block::steady("Cool-down", 180, 2.0),
        ],
    );

    insert(
        "brisk_intervals",
        "Brisk Intervals",
        "Six two-minute brisk efforts with easy recoveries",
        intervals("Brisk", 2.5, 3.5, 120, 120, 6),
    );

    insert(
        "desk_hour",
        "Desk Hour",
        "An hour of slow under-desk walking",
        vec![Block::steady("Work walk", 3600, 1.5)],
    );

    insert(
        "pyramid",
        "Pyramid",
        "Build up in ramps, peak, and ease back down",
        vec![
            Block::ramp("Build 1", 300, 2.0, 2.5),
            Block::ramp("Build 2", 300, 2.5, 3.0),
            Block::steady("Peak", 240, 3.5),
            Block::ramp("Ease 1", 300, 3.0, 2.5),
            Block::ramp("Ease 2", 300, 2.5, 2.0),
        ],
    );

    PresetCatalog { presets }
}
