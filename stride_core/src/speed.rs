//! Mapping of requested speeds onto the speeds a device can actually run.
//!
//! A device either exposes a fixed set of speeds (discrete mode) or a linear
//! ladder (increment mode). Both are flattened into an ascending pool, and the
//! rounding strategy of the [`SpeedPolicy`] picks one pool entry per target.

use crate::{DeviceCapabilities, Error, Result, RoundingStrategy, SpeedMode, SpeedPolicy};

/// Slack allowed when counting ladder steps up to `max`
const LADDER_EPSILON: f64 = 1e-9;

/// Largest ladder an increment device may describe
pub const MAX_LADDER_LEN: usize = 10_000;

/// Build the ascending pool of achievable speeds for a device
pub fn speed_pool(caps: &DeviceCapabilities) -> Result<Vec<f64>> {
    let pool = match caps.mode {
        SpeedMode::Discrete => {
            let allowed = caps.allowed.as_ref().ok_or(Error::MissingCapability {
                mode: SpeedMode::Discrete,
                field: "allowed",
            })?;
            if let Some(bad) = allowed.iter().find(|v| !v.is_finite()) {
                return Err(Error::InvalidCapabilities(format!(
                    "allowed speed {} is not finite",
                    bad
                )));
            }
            let mut pool = allowed.clone();
            pool.sort_by(f64::total_cmp);
            pool
        }
        SpeedMode::Increment => {
            let min = required(caps.min, "min")?;
            let max = required(caps.max, "max")?;
            let increment = required(caps.increment, "increment")?;
            if increment <= 0.0 {
                return Err(Error::InvalidCapabilities(format!(
                    "increment must be positive, got {}",
                    increment
                )));
            }
            ladder(min, max, increment)?
        }
    };

    if pool.is_empty() {
        return Err(Error::EmptySpeedPool);
    }
    Ok(pool)
}

fn required(value: Option<f64>, field: &'static str) -> Result<f64> {
    let value = value.ok_or(Error::MissingCapability {
        mode: SpeedMode::Increment,
        field,
    })?;
    if !value.is_finite() {
        return Err(Error::InvalidCapabilities(format!(
            "{} is not finite",
            field
        )));
    }
    Ok(value)
}

/// `min, min+inc, ...` up to `max`, each rounded to three decimals.
///
/// Steps are computed from the index rather than by repeated addition so the
/// error does not accumulate along the ladder. Increments finer than the
/// rounding collapse onto the same value and are deduplicated.
fn ladder(min: f64, max: f64, increment: f64) -> Result<Vec<f64>> {
    let steps = ((max - min) / increment + LADDER_EPSILON).floor();
    if steps < 0.0 {
        return Ok(Vec::new());
    }
    if steps >= MAX_LADDER_LEN as f64 {
        return Err(Error::InvalidCapabilities(format!(
            "increment {} between {} and {} gives more than {} speeds",
            increment, min, max, MAX_LADDER_LEN
        )));
    }

    let len = steps as u32 + 1;
    let mut pool: Vec<f64> = (0..len)
        .map(|step| ((min + f64::from(step) * increment) * 1000.0).round() / 1000.0)
        .collect();
    pool.dedup();
    Ok(pool)
}

/// Pick a speed from an ascending, non-empty pool
///
/// - `Nearest`: smallest distance to the target; equidistant candidates resolve
///   to the lower speed.
/// - `Down`: greatest speed not above the target, else the pool minimum.
/// - `Up`: smallest speed not below the target, else the pool maximum.
pub fn select(pool: &[f64], target: f64, strategy: RoundingStrategy) -> f64 {
    debug_assert!(!pool.is_empty());
    let first = pool[0];
    let last = pool[pool.len() - 1];

    match strategy {
        RoundingStrategy::Nearest => {
            let mut best = first;
            let mut best_diff = (first - target).abs();
            for &v in &pool[1..] {
                let diff = (v - target).abs();
                if diff < best_diff {
                    best = v;
                    best_diff = diff;
                }
            }
            best
        }
        RoundingStrategy::Down => pool
            .iter()
            .rev()
            .copied()
            .find(|&v| v <= target)
            .unwrap_or(first),
        RoundingStrategy::Up => pool.iter().copied().find(|&v| v >= target).unwrap_or(last),
    }
}

/// Map a target speed onto the device under the given policy
pub fn map_speed(target: f64, caps: &DeviceCapabilities, policy: &SpeedPolicy) -> Result<f64> {
    let pool = speed_pool(caps)?;
    Ok(select(&pool, target, policy.strategy))
}

/// A validated device envelope with its pool built once.
///
/// Construction fails exactly when [`map_speed`] would; afterwards every
/// mapping succeeds.
#[derive(Clone, Debug, PartialEq)]
pub struct SpeedMapper {
    caps: DeviceCapabilities,
    policy: SpeedPolicy,
    pool: Vec<f64>,
}

impl SpeedMapper {
    pub fn new(caps: DeviceCapabilities, policy: SpeedPolicy) -> Result<Self> {
        let pool = speed_pool(&caps)?;
        tracing::debug!(
            "Built speed pool of {} entries ({:?}, {:?})",
            pool.len(),
            caps.mode,
            policy.strategy
        );
        Ok(Self { caps, policy, pool })
    }

    pub fn map(&self, target: f64) -> f64 {
        let actual = select(&self.pool, target, self.policy.strategy);
        tracing::trace!("Mapped speed {} -> {}", target, actual);
        actual
    }

    pub fn pool(&self) -> &[f64] {
        &self.pool
    }

    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.caps
    }

    pub fn policy(&self) -> &SpeedPolicy {
        &self.policy
    }
}
