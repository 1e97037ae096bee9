//! Workout execution engine.
//!
//! The engine walks a [`Workout`] block by block in response to externally
//! delivered ticks. It owns no timer: a driver calls [`WorkoutEngine::tick`]
//! once per elapsed second while the engine is running and stops once it
//! reports [`EngineState::Finished`].
//!
//! Transitions:
//! - `start`: any state → `Running` at block 0 (rejects workouts without blocks)
//! - `tick`: `Running` → `Running` | next block | `Finished`
//! - `pause` / `resume`: `Running` ⇄ `Paused`, fields kept verbatim
//! - `skip`: `Running` → next block | `Finished`, crediting only consumed time
//! - `finish_now`: any state → `Finished` (idempotent once finished)
//!
//! Calls that have no meaning in the current state are silent no-ops.

use crate::speed::SpeedMapper;
use crate::telemetry::TelemetryAccumulator;
use crate::{
    CompletedSegment, DeviceCapabilities, Error, Result, Session, SpeedPolicy, TelemetrySample,
    Workout,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Source of wall-clock time for session timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Current mode of the engine
#[derive(Clone, Debug, PartialEq)]
pub enum EngineState {
    /// Nothing running; may remember a loaded workout
    Idle { workout: Option<Arc<Workout>> },
    /// Executing block `idx` at the mapped `speed`
    Running {
        workout: Arc<Workout>,
        idx: usize,
        remaining: u32,
        speed: f64,
    },
    /// Suspended with every field frozen from `Running`
    Paused {
        workout: Arc<Workout>,
        idx: usize,
        remaining: u32,
        speed: f64,
    },
    /// Terminal; holds the completed session
    Finished { session: Session },
}

/// Snapshot of how far a running or paused workout has progressed
#[derive(Clone, Debug, PartialEq)]
pub struct Progress {
    pub block_index: usize,
    pub block_count: usize,
    pub block_label: String,
    pub block_remaining_sec: u32,
    pub block_duration_sec: u32,
    pub elapsed_sec: u64,
    pub planned_total_sec: u64,
    pub speed: f64,
    pub paused: bool,
}

impl Progress {
    /// Fraction of the planned workout already done, in `0.0..=1.0`
    pub fn fraction(&self) -> f64 {
        if self.planned_total_sec == 0 {
            return 1.0;
        }
        (self.elapsed_sec as f64 / self.planned_total_sec as f64).min(1.0)
    }
}

/// Block-sequencing state machine.
///
/// Single-owner and synchronous: callers serialize access themselves.
pub struct WorkoutEngine {
    mapper: SpeedMapper,
    clock: Box<dyn Clock>,
    state: EngineState,
    session_id: Uuid,
    started_at: DateTime<Utc>,
    segments: Vec<CompletedSegment>,
    telemetry: TelemetryAccumulator,
    notes: Option<String>,
}

impl WorkoutEngine {
    /// Create an engine for a device, validating its speed envelope
    pub fn new(caps: DeviceCapabilities, policy: SpeedPolicy) -> Result<Self> {
        let mapper = SpeedMapper::new(caps, policy)?;
        Ok(Self::with_clock(mapper, Box::new(SystemClock)))
    }

    /// Create an engine with an explicit mapper and clock
    pub fn with_clock(mapper: SpeedMapper, clock: Box<dyn Clock>) -> Self {
        let started_at = clock.now();
        Self {
            mapper,
            clock,
            state: EngineState::Idle { workout: None },
            session_id: Uuid::new_v4(),
            started_at,
            segments: Vec::new(),
            telemetry: TelemetryAccumulator::default(),
            notes: None,
        }
    }

    pub fn current(&self) -> &EngineState {
        &self.state
    }

    pub fn mapper(&self) -> &SpeedMapper {
        &self.mapper
    }

    pub fn is_started(&self) -> bool {
        match self.state {
            EngineState::Idle { .. } => false,
            EngineState::Running { .. }
            | EngineState::Paused { .. }
            | EngineState::Finished { .. } => true,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, EngineState::Running { .. })
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, EngineState::Finished { .. })
    }

    /// The finished session, if the engine has reached `Finished`
    pub fn session(&self) -> Option<&Session> {
        match &self.state {
            EngineState::Finished { session } => Some(session),
            EngineState::Idle { .. } | EngineState::Running { .. } | EngineState::Paused { .. } => {
                None
            }
        }
    }

    /// Remember a workout without starting it
    pub fn load(&mut self, workout: Workout) -> &EngineState {
        tracing::debug!("Loaded workout '{}' ({})", workout.name, workout.id);
        self.segments.clear();
        self.telemetry = TelemetryAccumulator::default();
        self.notes = None;
        self.state = EngineState::Idle {
            workout: Some(Arc::new(workout)),
        };
        &self.state
    }

    /// Attach free-text notes to the session the current run will produce.
    ///
    /// Notes belong to one run: `start` and `load` clear them.
    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.notes = Some(notes.into());
    }

    /// Start (or restart) the engine at the first block of `workout`
    pub fn start(&mut self, workout: Workout) -> Result<&EngineState> {
        let Some(first) = workout.blocks.first() else {
            tracing::warn!("Refusing to start workout '{}' without blocks", workout.id);
            return Err(Error::EmptyWorkout {
                workout_id: workout.id,
            });
        };

        let remaining = first.duration_sec();
        let speed = self.mapper.map(first.requested_speed());

        self.session_id = Uuid::new_v4();
        self.started_at = self.clock.now();
        self.segments.clear();
        self.telemetry = TelemetryAccumulator::default();
        self.notes = None;

        tracing::info!(
            "Starting workout '{}' with {} blocks (session {})",
            workout.name,
            workout.blocks.len(),
            self.session_id
        );

        self.state = EngineState::Running {
            workout: Arc::new(workout),
            idx: 0,
            remaining,
            speed,
        };
        Ok(&self.state)
    }

    /// Consume `seconds` of the current block; ignored unless running
    pub fn tick(&mut self, seconds: u32) -> &EngineState {
        let exhausted = match &mut self.state {
            EngineState::Running { remaining, .. } => {
                *remaining = remaining.saturating_sub(seconds);
                *remaining == 0
            }
            EngineState::Idle { .. } | EngineState::Paused { .. } | EngineState::Finished { .. } => {
                false
            }
        };

        if exhausted {
            self.advance();
        }
        &self.state
    }

    pub fn pause(&mut self) -> &EngineState {
        let state = std::mem::replace(&mut self.state, EngineState::Idle { workout: None });
        self.state = match state {
            EngineState::Running {
                workout,
                idx,
                remaining,
                speed,
            } => {
                tracing::info!("Paused at block {} with {}s left", idx, remaining);
                EngineState::Paused {
                    workout,
                    idx,
                    remaining,
                    speed,
                }
            }
            s @ (EngineState::Idle { .. }
            | EngineState::Paused { .. }
            | EngineState::Finished { .. }) => s,
        };
        &self.state
    }

    pub fn resume(&mut self) -> &EngineState {
        let state = std::mem::replace(&mut self.state, EngineState::Idle { workout: None });
        self.state = match state {
            EngineState::Paused {
                workout,
                idx,
                remaining,
                speed,
            } => {
                tracing::info!("Resumed at block {} with {}s left", idx, remaining);
                EngineState::Running {
                    workout,
                    idx,
                    remaining,
                    speed,
                }
            }
            s @ (EngineState::Idle { .. }
            | EngineState::Running { .. }
            | EngineState::Finished { .. }) => s,
        };
        &self.state
    }

    /// Move straight to the next block, crediting only the time consumed
    pub fn skip(&mut self) -> &EngineState {
        match &self.state {
            EngineState::Running { idx, remaining, .. } => {
                tracing::info!("Skipping block {} with {}s left", idx, remaining);
                self.advance();
            }
            EngineState::Idle { .. } | EngineState::Paused { .. } | EngineState::Finished { .. } => {}
        }
        &self.state
    }

    /// Stop early and produce the session.
    ///
    /// Calling this again once finished returns the same session.
    pub fn finish_now(&mut self) -> Session {
        let now = self.clock.now();
        let session = match &self.state {
            EngineState::Finished { session } => return session.clone(),
            EngineState::Running {
                workout,
                idx,
                remaining,
                speed,
            }
            | EngineState::Paused {
                workout,
                idx,
                remaining,
                speed,
            } => {
                let workout = Arc::clone(workout);
                let segment = segment_for(&workout, *idx, *remaining, *speed);
                if segment.duration_sec > 0 {
                    self.segments.push(segment);
                }
                tracing::info!(
                    "Finishing '{}' early at block {} of {}",
                    workout.name,
                    idx + 1,
                    workout.blocks.len()
                );
                self.build_session(Some(&workout), self.started_at, now)
            }
            EngineState::Idle { workout } => {
                let workout = workout.clone();
                self.session_id = Uuid::new_v4();
                self.segments.clear();
                tracing::info!("Finishing from idle; recording an empty session");
                self.build_session(workout.as_deref(), now, now)
            }
        };

        self.state = EngineState::Finished {
            session: session.clone(),
        };
        session
    }

    /// Fold an external health sample into the current run
    pub fn record_telemetry(&mut self, sample: &TelemetrySample) {
        match self.state {
            EngineState::Running { .. } | EngineState::Paused { .. } => {
                self.telemetry.record(sample);
            }
            EngineState::Idle { .. } | EngineState::Finished { .. } => {
                tracing::trace!("Dropping telemetry sample outside a run");
            }
        }
    }

    /// Progress through the current run, if one is in flight
    pub fn progress(&self) -> Option<Progress> {
        let (workout, idx, remaining, speed, paused) = match &self.state {
            EngineState::Running {
                workout,
                idx,
                remaining,
                speed,
            } => (workout, *idx, *remaining, *speed, false),
            EngineState::Paused {
                workout,
                idx,
                remaining,
                speed,
            } => (workout, *idx, *remaining, *speed, true),
            EngineState::Idle { .. } | EngineState::Finished { .. } => return None,
        };

        let block = &workout.blocks[idx];
        let done: u64 = self
            .segments
            .iter()
            .map(|s| u64::from(s.duration_sec))
            .sum();
        let consumed = consumed_sec(block.duration_sec(), remaining);

        Some(Progress {
            block_index: idx,
            block_count: workout.blocks.len(),
            block_label: block.label().to_string(),
            block_remaining_sec: remaining,
            block_duration_sec: block.duration_sec(),
            elapsed_sec: done + u64::from(consumed),
            planned_total_sec: workout.planned_duration_sec(),
            speed,
            paused,
        })
    }

    /// Close out the running block and move on
    fn advance(&mut self) {
        let (workout, idx, remaining, speed) = match &self.state {
            EngineState::Running {
                workout,
                idx,
                remaining,
                speed,
            } => (Arc::clone(workout), *idx, *remaining, *speed),
            EngineState::Idle { .. } | EngineState::Paused { .. } | EngineState::Finished { .. } => {
                return;
            }
        };

        let segment = segment_for(&workout, idx, remaining, speed);
        tracing::debug!(
            "Block {} done: {}s at {}",
            idx,
            segment.duration_sec,
            segment.actual_speed
        );
        self.segments.push(segment);

        let next = idx + 1;
        match workout.blocks.get(next) {
            Some(block) => {
                let remaining = block.duration_sec();
                let speed = self.mapper.map(block.requested_speed());
                tracing::info!(
                    "Block {} of {}: '{}' for {}s at {}",
                    next + 1,
                    workout.blocks.len(),
                    block.label(),
                    remaining,
                    speed
                );
                self.state = EngineState::Running {
                    workout,
                    idx: next,
                    remaining,
                    speed,
                };
            }
            None => {
                let session = self.build_session(Some(&workout), self.started_at, self.clock.now());
                tracing::info!(
                    "Workout '{}' finished with {} segments",
                    workout.name,
                    session.segments.len()
                );
                self.state = EngineState::Finished { session };
            }
        }
    }

    fn build_session(
        &self,
        workout: Option<&Workout>,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Session {
        Session {
            id: self.session_id,
            workout_id: workout.map(|w| w.id.clone()),
            workout_name: workout.map(|w| w.name.clone()),
            started_at,
            ended_at,
            unit: self.mapper.capabilities().unit,
            segments: self.segments.clone(),
            notes: self.notes.clone(),
            avg_hr: self.telemetry.avg_hr(),
            total_steps: self.telemetry.total_steps(),
        }
    }
}

/// Seconds actually spent in a block, never negative and never past its plan
fn consumed_sec(planned: u32, remaining: u32) -> u32 {
    planned.saturating_sub(remaining)
}

fn segment_for(workout: &Workout, idx: usize, remaining: u32, speed: f64) -> CompletedSegment {
    let block = &workout.blocks[idx];
    CompletedSegment {
        block_index: idx,
        actual_speed: speed,
        duration_sec: consumed_sec(block.duration_sec(), remaining),
        label: Some(block.label().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Block, RoundingStrategy, SpeedUnit};
    use chrono::{Duration, TimeZone};
    use std::sync::Mutex;

    /// Clock that only moves when told to
    #[derive(Clone)]
    struct ManualClock(Arc<Mutex<DateTime<Utc>>>);

    impl ManualClock {
        fn new() -> Self {
            Self(Arc::new(Mutex::new(
                Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap(),
            )))
        }

        fn advance(&self, secs: i64) {
            *self.0.lock().unwrap() += Duration::seconds(secs);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn mapper() -> SpeedMapper {
        SpeedMapper::new(
            DeviceCapabilities::discrete(SpeedUnit::Mph, vec![1.0, 2.0, 3.0, 3.5]),
            SpeedPolicy::new(RoundingStrategy::Nearest),
        )
        .unwrap()
    }

    fn new_engine() -> (WorkoutEngine, ManualClock) {
        let clock = ManualClock::new();
        (
            WorkoutEngine::with_clock(mapper(), Box::new(clock.clone())),
            clock,
        )
    }

    fn two_blocks() -> Workout {
        Workout::new(
            "two",
            vec![Block::steady("warm", 120, 2.4), Block::steady("brisk", 60, 3.4)],
        )
    }

    fn tick_n(engine: &mut WorkoutEngine, clock: &ManualClock, n: u32) {
        for _ in 0..n {
            clock.advance(1);
            engine.tick(1);
        }
    }

    #[test]
    fn test_single_block_finishes_after_exact_ticks() {
        let (mut engine, clock) = new_engine();
        engine
            .start(Workout::new("one", vec![Block::steady("only", 30, 2.0)]))
            .unwrap();

        tick_n(&mut engine, &clock, 29);
        assert!(engine.is_running());

        tick_n(&mut engine, &clock, 1);
        let session = engine.session().expect("finished");
        assert_eq!(session.segments.len(), 1);
        assert_eq!(session.segments[0].duration_sec, 30);
    }

    #[test]
    fn test_start_maps_first_block() {
        let (mut engine, _clock) = new_engine();
        let state = engine.start(two_blocks()).unwrap().clone();
        match state {
            EngineState::Running {
                idx,
                remaining,
                speed,
                ..
            } => {
                assert_eq!(idx, 0);
                assert_eq!(remaining, 120);
                assert_eq!(speed, 2.0);
            }
            other => panic!("expected Running, got {:?}", other),
        }
    }

    #[test]
    fn test_skip_credits_only_consumed_time() {
        let (mut engine, clock) = new_engine();
        engine.start(two_blocks()).unwrap();
        tick_n(&mut engine, &clock, 10);
        engine.skip();

        match engine.current() {
            EngineState::Running { idx, remaining, speed, .. } => {
                assert_eq!(*idx, 1);
                assert_eq!(*remaining, 60);
                assert_eq!(*speed, 3.5);
            }
            other => panic!("expected Running, got {:?}", other),
        }

        let session = engine.finish_now();
        assert_eq!(session.segments.len(), 1);
        assert_eq!(session.segments[0].duration_sec, 10);
        assert_eq!(session.segments[0].actual_speed, 2.0);
    }

    #[test]
    fn test_skip_last_block_finishes() {
        let (mut engine, clock) = new_engine();
        engine
            .start(Workout::new("one", vec![Block::steady("only", 120, 2.0)]))
            .unwrap();
        tick_n(&mut engine, &clock, 10);
        engine.skip();

        let session = engine.session().expect("finished");
        assert_eq!(session.segments.len(), 1);
        assert_eq!(session.segments[0].duration_sec, 10);
    }

    #[test]
    fn test_pause_resume_preserves_state() {
        let (mut engine, clock) = new_engine();
        engine.start(two_blocks()).unwrap();
        tick_n(&mut engine, &clock, 30);
        let before = engine.current().clone();

        engine.pause();
        assert!(matches!(engine.current(), EngineState::Paused { remaining: 90, .. }));
        engine.resume();

        assert_eq!(engine.current(), &before);
    }

    #[test]
    fn test_ticks_while_paused_are_dropped() {
        let (mut engine, clock) = new_engine();
        engine.start(two_blocks()).unwrap();
        engine.pause();
        let paused = engine.current().clone();

        tick_n(&mut engine, &clock, 500);
        engine.skip();
        assert_eq!(engine.current(), &paused);
    }

    #[test]
    fn test_idle_ignores_transitions() {
        let (mut engine, _clock) = new_engine();
        engine.tick(5);
        engine.pause();
        engine.resume();
        engine.skip();
        assert_eq!(engine.current(), &EngineState::Idle { workout: None });
        assert!(!engine.is_started());
    }

    #[test]
    fn test_large_tick_does_not_spill_into_next_block() {
        let (mut engine, _clock) = new_engine();
        engine.start(two_blocks()).unwrap();
        engine.tick(500);

        match engine.current() {
            EngineState::Running { idx, remaining, .. } => {
                assert_eq!(*idx, 1);
                assert_eq!(*remaining, 60);
            }
            other => panic!("expected Running, got {:?}", other),
        }
    }

    #[test]
    fn test_full_run_segments_match_wall_clock() {
        let (mut engine, clock) = new_engine();
        engine.start(two_blocks()).unwrap();
        tick_n(&mut engine, &clock, 180);

        let session = engine.session().expect("finished").clone();
        assert_eq!(session.segments.len(), 2);
        assert_eq!(session.segments[1].block_index, 1);
        assert_eq!(session.segments[1].label.as_deref(), Some("brisk"));
        let total: i64 = session.segments.iter().map(|s| i64::from(s.duration_sec)).sum();
        assert_eq!(total * 1000, session.ended_at_ms() - session.started_at_ms());
        assert_eq!(session.workout_name.as_deref(), Some("two"));
    }

    #[test]
    fn test_finish_now_records_partial_block() {
        let (mut engine, clock) = new_engine();
        engine.start(two_blocks()).unwrap();
        tick_n(&mut engine, &clock, 125);
        engine.pause();

        let session = engine.finish_now();
        assert_eq!(session.segments.len(), 2);
        assert_eq!(session.segments[0].duration_sec, 120);
        assert_eq!(session.segments[1].duration_sec, 5);
    }

    #[test]
    fn test_finish_now_skips_empty_partial() {
        let (mut engine, _clock) = new_engine();
        engine.start(two_blocks()).unwrap();
        let session = engine.finish_now();
        assert!(session.segments.is_empty());
    }

    #[test]
    fn test_finish_now_is_idempotent() {
        let (mut engine, clock) = new_engine();
        engine.start(two_blocks()).unwrap();
        tick_n(&mut engine, &clock, 40);

        let first = engine.finish_now();
        clock.advance(60);
        let second = engine.finish_now();
        assert_eq!(first, second);
    }

    #[test]
    fn test_finish_from_idle() {
        let (mut engine, _clock) = new_engine();
        let empty = engine.finish_now();
        assert!(empty.workout_id.is_none());
        assert!(empty.segments.is_empty());
        assert_eq!(empty.started_at, empty.ended_at);

        let (mut engine, _clock) = new_engine();
        let workout = two_blocks();
        let id = workout.id.clone();
        engine.load(workout);
        let session = engine.finish_now();
        assert_eq!(session.workout_id, Some(id));
        assert!(session.segments.is_empty());
    }

    #[test]
    fn test_start_empty_workout_leaves_state() {
        let (mut engine, clock) = new_engine();
        engine.start(two_blocks()).unwrap();
        tick_n(&mut engine, &clock, 3);
        let before = engine.current().clone();

        let err = engine.start(Workout::new("empty", vec![])).unwrap_err();
        assert!(matches!(err, Error::EmptyWorkout { .. }));
        assert!(err.is_precondition());
        assert_eq!(engine.current(), &before);
    }

    #[test]
    fn test_restart_clears_segments() {
        let (mut engine, clock) = new_engine();
        engine.start(two_blocks()).unwrap();
        tick_n(&mut engine, &clock, 130);
        let first_id = engine.finish_now().id;

        engine.start(two_blocks()).unwrap();
        let session = engine.finish_now();
        assert!(session.segments.is_empty());
        assert_ne!(session.id, first_id);
    }

    #[test]
    fn test_ramp_runs_at_from_speed() {
        let (mut engine, clock) = new_engine();
        engine
            .start(Workout::new("ramp", vec![Block::ramp("climb", 20, 1.1, 3.5)]))
            .unwrap();
        assert!(matches!(engine.current(), EngineState::Running { speed, .. } if *speed == 1.0));
        tick_n(&mut engine, &clock, 20);
        assert_eq!(engine.session().unwrap().segments[0].actual_speed, 1.0);
    }

    #[test]
    fn test_progress_tracks_elapsed() {
        let (mut engine, clock) = new_engine();
        assert!(engine.progress().is_none());
        engine.start(two_blocks()).unwrap();
        tick_n(&mut engine, &clock, 150);
        engine.pause();

        let progress = engine.progress().unwrap();
        assert_eq!(progress.block_index, 1);
        assert_eq!(progress.block_count, 2);
        assert_eq!(progress.block_remaining_sec, 30);
        assert_eq!(progress.elapsed_sec, 150);
        assert_eq!(progress.planned_total_sec, 180);
        assert!(progress.paused);
        assert!((progress.fraction() - 150.0 / 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_telemetry_folded_into_session() {
        let (mut engine, clock) = new_engine();
        let sample = |hr, steps| TelemetrySample {
            at: clock.now(),
            heart_rate: Some(hr),
            steps: Some(steps),
        };

        engine.record_telemetry(&sample(200, 9999));
        engine.start(two_blocks()).unwrap();
        engine.record_telemetry(&sample(100, 40));
        engine.record_telemetry(&sample(111, 90));
        let session = engine.finish_now();

        assert_eq!(session.avg_hr, Some(106));
        assert_eq!(session.total_steps, Some(90));
    }

    #[test]
    fn test_notes_carried_into_session() {
        let (mut engine, _clock) = new_engine();
        engine.start(two_blocks()).unwrap();
        engine.set_notes("felt easy");
        assert_eq!(engine.finish_now().notes.as_deref(), Some("felt easy"));
    }

    #[test]
    fn test_restart_drops_previous_notes() {
        let (mut engine, _clock) = new_engine();
        engine.start(two_blocks()).unwrap();
        engine.set_notes("first run");
        engine.finish_now();

        engine.start(two_blocks()).unwrap();
        assert_eq!(engine.finish_now().notes, None);

        engine.set_notes("stale");
        engine.load(two_blocks());
        assert_eq!(engine.finish_now().notes, None);
    }
}
