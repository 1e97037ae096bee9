//! Health telemetry input.
//!
//! Heart-rate and step readings come from an external health bridge. They
//! enrich a session but are never needed to run one, so every failure here
//! degrades to "no telemetry".

use crate::{Result, TelemetrySample};
use std::path::Path;

/// Running aggregate of the samples seen during one session
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TelemetryAccumulator {
    hr_sum: u64,
    hr_count: u64,
    max_steps: Option<u32>,
}

impl TelemetryAccumulator {
    pub fn record(&mut self, sample: &TelemetrySample) {
        if let Some(hr) = sample.heart_rate {
            self.hr_sum += u64::from(hr);
            self.hr_count += 1;
        }
        if let Some(steps) = sample.steps {
            // Step counts are cumulative, so the largest reading is the total
            self.max_steps = Some(self.max_steps.map_or(steps, |m| m.max(steps)));
        }
    }

    /// Mean heart rate, rounded to the nearest beat
    pub fn avg_hr(&self) -> Option<u16> {
        if self.hr_count == 0 {
            return None;
        }
        let avg = (self.hr_sum as f64 / self.hr_count as f64).round();
        Some(avg as u16)
    }

    pub fn total_steps(&self) -> Option<u32> {
        self.max_steps
    }
}

/// Load telemetry samples exported by the health bridge as a JSON array
///
/// Returns an empty list if the file doesn't exist or can't be parsed.
pub fn load_telemetry(path: &Path) -> Result<Vec<TelemetrySample>> {
    if !path.exists() {
        tracing::debug!("No telemetry file found at {:?}", path);
        return Ok(Vec::new());
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!(
                "Failed to read telemetry at {:?}: {}. Ignoring telemetry.",
                path,
                e
            );
            return Ok(Vec::new());
        }
    };

    let mut samples: Vec<TelemetrySample> = match serde_json::from_str(&contents) {
        Ok(samples) => samples,
        Err(e) => {
            tracing::warn!(
                "Failed to parse telemetry at {:?}: {}. Ignoring telemetry.",
                path,
                e
            );
            return Ok(Vec::new());
        }
    };

    samples.sort_by_key(|s| s.at);
    tracing::info!("Loaded {} telemetry samples", samples.len());
    Ok(samples)
}
