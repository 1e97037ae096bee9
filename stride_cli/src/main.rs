use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use stride_core::metrics::{format_clock, format_distance, format_pace, format_speed};
use stride_core::*;

const SESSION_LOG: &str = "sessions.jsonl";
const PREFS_FILE: &str = "prefs.json";

#[derive(Parser)]
#[command(name = "stride")]
#[command(about = "Treadmill walking workouts with device speed mapping", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workout (default: repeat the last quick start)
    Run {
        /// Run a built-in preset by id
        #[arg(long, conflicts_with_all = ["minutes", "speed"])]
        preset: Option<String>,

        /// Quick start length in minutes
        #[arg(long)]
        minutes: Option<u32>,

        /// Quick start target speed, in the device unit
        #[arg(long)]
        speed: Option<f64>,

        /// Tick through the workout without waiting (for testing)
        #[arg(long)]
        fast: bool,

        /// Show the mapped plan without running or logging
        #[arg(long)]
        dry_run: bool,

        /// JSON file of heart-rate/step samples from a health bridge
        #[arg(long)]
        telemetry: Option<PathBuf>,

        /// Notes to store with the session
        #[arg(long)]
        notes: Option<String>,
    },

    /// List built-in presets
    Presets,

    /// Show which device speed a target maps to
    Map {
        /// Target speed, in the device unit
        speed: f64,

        /// Rounding strategy override (nearest, down, up)
        #[arg(long)]
        strategy: Option<String>,
    },

    /// Show recent sessions
    History {
        /// How many days back to look
        #[arg(long, default_value_t = 7)]
        days: i64,
    },

    /// Export sessions to CSV
    Export {
        /// Destination CSV file
        #[arg(long)]
        out: PathBuf,

        /// One row per segment instead of per session
        #[arg(long)]
        segments: bool,

        /// How many days back to export
        #[arg(long, default_value_t = 36500)]
        days: i64,
    },
}

struct RunOptions {
    preset: Option<String>,
    minutes: Option<u32>,
    speed: Option<f64>,
    fast: bool,
    dry_run: bool,
    telemetry: Option<PathBuf>,
    notes: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    stride_core::logging::init_for_cli(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());

    match cli.command {
        Some(Commands::Run {
            preset,
            minutes,
            speed,
            fast,
            dry_run,
            telemetry,
            notes,
        }) => cmd_run(
            &data_dir,
            &config,
            RunOptions {
                preset,
                minutes,
                speed,
                fast,
                dry_run,
                telemetry,
                notes,
            },
        ),
        Some(Commands::Presets) => cmd_presets(&config),
        Some(Commands::Map { speed, strategy }) => cmd_map(&config, speed, strategy),
        Some(Commands::History { days }) => cmd_history(&data_dir, days),
        Some(Commands::Export {
            out,
            segments,
            days,
        }) => cmd_export(&data_dir, &out, segments, days),
        None => cmd_run(
            &data_dir,
            &config,
            RunOptions {
                preset: None,
                minutes: None,
                speed: None,
                fast: false,
                dry_run: false,
                telemetry: None,
                notes: None,
            },
        ),
    }
}

fn cmd_run(data_dir: &Path, config: &Config, opts: RunOptions) -> Result<()> {
    let prefs_path = data_dir.join(PREFS_FILE);
    let log_path = data_dir.join(SESSION_LOG);

    let mut prefs = Prefs::load(&prefs_path)?;
    let mut engine = WorkoutEngine::new(config.capabilities(), config.policy())?;
    let unit = config.capabilities().unit;

    // A bare `run` repeats whatever was run last
    let remembered = match (&opts.preset, opts.minutes, opts.speed) {
        (None, None, None) => prefs.last_preset_id.clone(),
        _ => None,
    };
    if let Some(id) = &remembered {
        tracing::debug!("Repeating last preset '{}'", id);
    }

    let workout = match opts.preset.clone().or(remembered) {
        Some(id) => {
            let presets = get_default_presets();
            let errors = presets.validate();
            if !errors.is_empty() {
                for error in &errors {
                    eprintln!("  - {}", error);
                }
                return Err(Error::Other("Invalid preset catalog".into()));
            }
            let workout = presets.get(&id)?.to_workout(unit);
            prefs.last_preset_id = Some(id);
            workout
        }
        None => {
            let minutes = opts.minutes.unwrap_or(prefs.quick_start.minutes);
            let speed = opts.speed.unwrap_or(prefs.quick_start.speed);
            prefs.quick_start = stride_core::prefs::QuickStartPrefs { minutes, speed };
            prefs.last_preset_id = None;
            quick_start(minutes, speed)
        }
    };

    display_plan(&workout, engine.mapper(), unit);

    if opts.dry_run {
        println!("\n[Dry run - not running or logging]");
        return Ok(());
    }

    engine.start(workout)?;
    if let Some(notes) = opts.notes {
        engine.set_notes(notes);
    }

    if let Some(path) = &opts.telemetry {
        for sample in load_telemetry(path)? {
            engine.record_telemetry(&sample);
        }
    }

    if opts.fast {
        while engine.is_running() {
            engine.tick(1);
        }
    } else {
        drive_realtime(&mut engine)?;
    }

    let session = engine.finish_now();

    let mut sink = JsonlSink::new(&log_path);
    sink.append(&session)?;
    prefs.save(&prefs_path)?;

    tracing::info!("Logged session {} to {:?}", session.id, log_path);
    display_session(&session);
    println!("\n✓ Session logged!");
    Ok(())
}

enum Control {
    Pause,
    Resume,
    Skip,
    Quit,
}

fn spawn_control_reader() -> Receiver<Control> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let control = match line.trim().to_lowercase().as_str() {
                "p" => Control::Pause,
                "r" => Control::Resume,
                "s" => Control::Skip,
                "q" => Control::Quit,
                _ => continue,
            };
            if tx.send(control).is_err() {
                break;
            }
        }
    });
    rx
}

/// Deliver one tick per elapsed wall-clock second until the engine finishes.
///
/// Seconds that passed while the process was stalled are delivered on the
/// next wake-up, so the workout keeps pace with the clock.
fn drive_realtime(engine: &mut WorkoutEngine) -> Result<()> {
    println!("─────────────────────────────────────────");
    println!("  'p' pause  'r' resume  's' skip  'q' finish (then Enter)");

    let controls = spawn_control_reader();
    let mut input_open = true;
    let mut last = Instant::now();

    while !engine.is_finished() {
        if input_open {
            match controls.recv_timeout(Duration::from_millis(250)) {
                Ok(Control::Pause) => {
                    engine.pause();
                }
                Ok(Control::Resume) => {
                    engine.resume();
                }
                Ok(Control::Skip) => {
                    engine.skip();
                }
                Ok(Control::Quit) => {
                    engine.finish_now();
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::debug!("Control input closed");
                    input_open = false;
                }
            }
        } else {
            std::thread::sleep(Duration::from_millis(250));
        }

        let elapsed = last.elapsed().as_secs();
        if elapsed > 0 {
            last += Duration::from_secs(elapsed);
            for _ in 0..elapsed {
                engine.tick(1);
            }
            if let Some(progress) = engine.progress() {
                display_progress(&progress, engine.mapper().capabilities().unit)?;
            }
        }
    }

    println!();
    Ok(())
}

fn display_progress(progress: &Progress, unit: SpeedUnit) -> Result<()> {
    print!(
        "\r  [{}/{}] {:<12} {} left  {}  {:>3.0}%{}   ",
        progress.block_index + 1,
        progress.block_count,
        progress.block_label,
        format_clock(u64::from(progress.block_remaining_sec)),
        format_speed(progress.speed, unit),
        progress.fraction() * 100.0,
        if progress.paused { "  (paused)" } else { "" }
    );
    io::stdout().flush()?;
    Ok(())
}

fn display_plan(workout: &Workout, mapper: &SpeedMapper, unit: SpeedUnit) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {}", workout.name);
    println!("╰─────────────────────────────────────────╯");
    println!(
        "  Duration: {}",
        format_clock(workout.planned_duration_sec())
    );
    println!();

    for (i, block) in workout.blocks.iter().enumerate() {
        let requested = block.requested_speed();
        let actual = mapper.map(requested);
        let ramp_note = match block {
            Block::Steady { .. } => String::new(),
            Block::Ramp { to_speed, .. } => {
                format!(" (ramp to {} held at start speed)", format_speed(*to_speed, unit))
            }
        };
        println!(
            "  {:>2}. {:<14} {:>8}  {} → {}{}",
            i + 1,
            block.label(),
            format_clock(u64::from(block.duration_sec())),
            format_speed(requested, unit),
            format_speed(actual, unit),
            ramp_note
        );
    }
}

fn display_session(session: &Session) {
    println!();
    println!(
        "  {}",
        session.workout_name.as_deref().unwrap_or("Session")
    );
    println!("  Time:     {}", format_clock(session.duration_sec()));
    println!(
        "  Distance: {}",
        format_distance(session.distance(), session.unit)
    );
    if let Some(speed) = session.average_speed() {
        println!(
            "  Average:  {} ({})",
            format_speed(speed, session.unit),
            format_pace(speed, session.unit)
        );
    }
    if let Some(hr) = session.avg_hr {
        println!("  Avg HR:   {} bpm", hr);
    }
    if let Some(steps) = session.total_steps {
        println!("  Steps:    {}", steps);
    }
    println!("  Segments: {}", session.segments.len());
}

fn cmd_presets(config: &Config) -> Result<()> {
    let unit = config.capabilities().unit;
    for preset in get_default_presets().presets.values() {
        println!(
            "{:<16} {:<18} {:>8}  {}",
            preset.id,
            preset.name,
            format_clock(preset.planned_duration_sec()),
            preset.description
        );
    }
    if unit == SpeedUnit::Kph {
        println!("\n(preset speeds are converted to km/h)");
    }
    Ok(())
}

fn parse_strategy(s: &str) -> Option<RoundingStrategy> {
    match s.to_lowercase().as_str() {
        "nearest" => Some(RoundingStrategy::Nearest),
        "down" => Some(RoundingStrategy::Down),
        "up" => Some(RoundingStrategy::Up),
        _ => None,
    }
}

fn cmd_map(config: &Config, speed: f64, strategy: Option<String>) -> Result<()> {
    let mut policy = config.policy();
    if let Some(s) = strategy {
        match parse_strategy(&s) {
            Some(strategy) => policy.strategy = strategy,
            None => eprintln!("Unknown strategy: {}. Using configured strategy.", s),
        }
    }

    let caps = config.capabilities();
    let actual = map_speed(speed, &caps, &policy)?;
    println!(
        "{} → {} ({:?})",
        format_speed(speed, caps.unit),
        format_speed(actual, caps.unit),
        policy.strategy
    );
    Ok(())
}

fn cmd_history(data_dir: &Path, days: i64) -> Result<()> {
    let sessions = load_recent_sessions(&data_dir.join(SESSION_LOG), days)?;
    if sessions.is_empty() {
        println!("No sessions in the last {} days.", days);
        return Ok(());
    }

    for session in &sessions {
        println!(
            "{}  {:<18} {:>8}  {}",
            session
                .started_at
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M"),
            session.workout_name.as_deref().unwrap_or("-"),
            format_clock(session.duration_sec()),
            format_distance(session.distance(), session.unit)
        );
    }

    let summary = stride_core::history::summarize(&sessions);
    println!();
    println!(
        "{} sessions, {} total",
        summary.sessions,
        format_clock(summary.total_sec)
    );
    if summary.miles > 0.0 {
        println!("  {}", format_distance(summary.miles, SpeedUnit::Mph));
    }
    if summary.kilometres > 0.0 {
        println!("  {}", format_distance(summary.kilometres, SpeedUnit::Kph));
    }
    Ok(())
}

fn cmd_export(data_dir: &Path, out: &Path, segments: bool, days: i64) -> Result<()> {
    let sessions = load_recent_sessions(&data_dir.join(SESSION_LOG), days)?;
    if segments {
        let count = stride_core::export::export_segments_csv(&sessions, out)?;
        println!("✓ Exported {} segments to {}", count, out.display());
    } else {
        let count = stride_core::export::export_sessions_csv(&sessions, out)?;
        println!("✓ Exported {} sessions to {}", count, out.display());
    }
    Ok(())
}
