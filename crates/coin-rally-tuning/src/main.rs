//! Headless coin-rally tuner.
//!
//! Drops the car onto the ground, lets the suspension settle, then drives it
//! with scripted input at a fixed 60 Hz step. Per-step CSV telemetry goes to
//! stdout (or a file) and a summary of ride height, acceleration and coin
//! pickups to stderr.
//!
//! Run with: cargo run -p coin-rally-tuning -- --seconds 10 --steer 0.1

use std::{fs, path::PathBuf, process::ExitCode};

use clap::Parser;
use coin_rally::{
    DriveIntent, Game, GameConfig,
    telemetry::{
        FileTelemetryOutput, StdoutTelemetryOutput, TelemetryOutput, TelemetrySnapshot,
        emit_telemetry_to, reset_telemetry_to,
    },
};

/// Fixed timestep for the simulation (60 Hz).
const FIXED_TIMESTEP: f32 = 1.0 / 60.0;

/// Longest the settle phase may take (seconds).
const MAX_SETTLE_TIME: f32 = 5.0;

/// Speed below which the car counts as at rest.
const REST_SPEED: f32 = 0.01;

#[derive(Parser)]
#[command(about = "Headless scenario runner for the coin-rally vehicle")]
struct CliArgs {
    /// JSON file with a game configuration; missing fields use defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the default configuration as JSON and exit.
    #[arg(long)]
    dump_config: bool,

    /// Length of the drive phase in seconds.
    #[arg(long, default_value_t = 10.0)]
    seconds: f32,

    /// Throttle during the drive phase, in [-1, 1].
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    throttle: f32,

    /// Steering angle during the drive phase (radians, positive turns left).
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    steer: f32,

    /// Write telemetry to this CSV file instead of stdout.
    #[arg(long)]
    telemetry: Option<PathBuf>,
}

/// State of the tuner run.
enum TunerState {
    /// Waiting for the car to land and stop bouncing.
    Settle { elapsed: f32, rest_time: f32 },
    /// Scripted driving.
    Drive { elapsed: f32 },
    /// Run complete.
    Complete,
}

/// Measurements accumulated during the run.
#[derive(Default)]
struct MeasurementResults {
    settle_time: Option<f32>,
    ride_height: f32,
    max_speed: f32,
    time_to_first_coin: Option<f32>,
    coins: Vec<u32>,
    airborne_time: f32,
}

fn load_config(path: Option<&PathBuf>) -> Result<GameConfig, String> {
    let Some(path) = path else {
        return Ok(GameConfig::default());
    };
    let text = fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("failed to parse {}: {e}", path.display()))
}

fn run(args: &CliArgs) -> Result<MeasurementResults, String> {
    let config = load_config(args.config.as_ref())?;
    let mut game = Game::new(config).map_err(|e| e.to_string())?;

    let mut output: Box<dyn TelemetryOutput> = match &args.telemetry {
        Some(path) => Box::new(FileTelemetryOutput::new(path)),
        None => Box::new(StdoutTelemetryOutput),
    };
    reset_telemetry_to(output.as_mut());

    let drive = DriveIntent {
        steer_angle: args.steer,
        throttle: args.throttle,
        ..DriveIntent::default()
    };

    let mut results = MeasurementResults::default();
    let mut state = TunerState::Settle {
        elapsed: 0.0,
        rest_time: 0.0,
    };
    eprintln!("# Settling...");

    loop {
        state = match state {
            TunerState::Settle { elapsed, rest_time } => {
                game.tick(DriveIntent::default(), FIXED_TIMESTEP);
                emit_telemetry_to(
                    &TelemetrySnapshot::capture(&game, FIXED_TIMESTEP),
                    output.as_mut(),
                );

                let vehicle = game.vehicle();
                let at_rest = !vehicle.is_airborne()
                    && (0..4).all(|i| vehicle.is_wheel_grounded(i))
                    && vehicle.state().speed() < REST_SPEED;
                let rest_time = if at_rest { rest_time + FIXED_TIMESTEP } else { 0.0 };
                let elapsed = elapsed + FIXED_TIMESTEP;

                if rest_time >= 0.5 || elapsed >= MAX_SETTLE_TIME {
                    results.settle_time = (rest_time >= 0.5).then_some(elapsed - rest_time);
                    results.ride_height = vehicle.position().y;
                    eprintln!("# Settle phase complete:");
                    eprintln!("#   Ride height: {:.4}", results.ride_height);
                    match results.settle_time {
                        Some(time) => eprintln!("#   Settling time: {time:.2} s"),
                        None => eprintln!("#   Settling time: (not settled)"),
                    }
                    eprintln!("# Driving...");
                    TunerState::Drive { elapsed: 0.0 }
                } else {
                    TunerState::Settle { elapsed, rest_time }
                }
            }
            TunerState::Drive { elapsed } => {
                let collected = game.tick(drive, FIXED_TIMESTEP);
                emit_telemetry_to(
                    &TelemetrySnapshot::capture(&game, FIXED_TIMESTEP),
                    output.as_mut(),
                );
                let elapsed = elapsed + FIXED_TIMESTEP;

                let vehicle = game.vehicle();
                results.max_speed = results.max_speed.max(vehicle.state().speed());
                if vehicle.is_airborne() {
                    results.airborne_time += FIXED_TIMESTEP;
                }
                for event in collected {
                    results.time_to_first_coin.get_or_insert(elapsed);
                    results.coins.push(event.coin_id);
                }

                if elapsed >= args.seconds {
                    TunerState::Complete
                } else {
                    TunerState::Drive { elapsed }
                }
            }
            TunerState::Complete => break,
        };
    }

    tracing::info!(
        "Finished after {} ticks, best combo {}",
        game.clock().tick_count(),
        game.boost().best_combo()
    );
    Ok(results)
}

fn print_summary(results: &MeasurementResults) {
    eprintln!();
    eprintln!("# === coin-rally ===");
    eprintln!("# Ride height: {:.4}", results.ride_height);
    eprintln!("# Max speed: {:.2}", results.max_speed);
    eprintln!("# Airborne while driving: {:.2} s", results.airborne_time);
    eprintln!("# Coins: {} {:?}", results.coins.len(), results.coins);
    if let Some(time) = results.time_to_first_coin {
        eprintln!("#   First coin after: {time:.2} s");
    } else {
        eprintln!("#   First coin after: (none)");
    }
}

fn main() -> ExitCode {
    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .init();
    }

    let args = CliArgs::parse();

    if args.dump_config {
        return match serde_json::to_string_pretty(&GameConfig::default()) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("ERROR: {e}");
                ExitCode::FAILURE
            }
        };
    }

    match run(&args) {
        Ok(results) => {
            print_summary(&results);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("ERROR: {e}");
            ExitCode::FAILURE
        }
    }
}
