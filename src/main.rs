//! # Arm Teleop
//!
//! Drive a 6-axis robot arm with a gamepad.
//!
//! The binary wires a gamepad and a robot link into a [`TeleopSession`] and
//! ticks it at `tick_rate_hz`. Teleoperation starts disabled; type `enable`
//! on stdin (or set `teleop.auto_enable`) and hold any button to claim it as
//! the deadman.

use anyhow::{Context, Result};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use arm_teleop::config::{Config, RobotBackend};
use arm_teleop::console::{self, ConsoleCommand};
use arm_teleop::controller::gamepad::EvdevGamepad;
use arm_teleop::controller::sampler::InputSource;
use arm_teleop::mirror::{self, geofence::ZoneEvent, geofence::ZoneMonitor};
use arm_teleop::robot::protocol::Vector6;
use arm_teleop::robot::sim::SimRobot;
use arm_teleop::robot::ur::UrLink;
use arm_teleop::robot::RobotLink;
use arm_teleop::teleop::session::{SessionView, TeleopSession};
use arm_teleop::telemetry;

/// Used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Ticks between periodic status lines (10 s at 50 Hz)
const STATUS_LOG_TICKS: u64 = 500;

/// Main entry point for Arm Teleop
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, default `config/default.toml`)
///    - Set up logging to the console and a daily log file
///    - Open the gamepad and connect the robot backend
///
/// 2. **Main Loop**
///    - Tick the session at `tick_rate_hz`
///    - Apply operator console commands
///    - Report trigger zone entries
///    - Handle Ctrl+C for graceful shutdown
///
/// 3. **Graceful Shutdown**
///    - Disable teleoperation and stop the robot
///    - Let the mirror and telemetry tasks drain
///
/// # Errors
///
/// Returns error if:
/// - The configuration cannot be loaded or is invalid
/// - The UR backend is selected and the controller is unreachable
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let _log_guard = init_logging(&config);

    info!("Arm Teleop v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", config_path);

    let pad = EvdevGamepad::new(&config.controller);

    match config.robot.backend {
        RobotBackend::Sim => {
            info!("Using simulated robot");
            run(&config, pad, SimRobot::new()).await
        }
        RobotBackend::Ur => {
            let link = UrLink::connect(&config.robot)
                .await
                .context("Failed to connect to robot")?;
            run(&config, pad, link).await
        }
    }
}

/// Console logging plus, with telemetry enabled, a daily file in `log_dir`.
///
/// The returned guard flushes the file writer on drop.
fn init_logging(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = if config.telemetry.enabled {
        let appender = tracing_appender::rolling::daily(&config.telemetry.log_dir, "arm-teleop.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (
            Some(fmt::layer().with_writer(writer).with_ansi(false)),
            Some(guard),
        )
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

async fn run<S, R>(config: &Config, source: S, link: R) -> Result<()>
where
    S: InputSource,
    R: RobotLink,
{
    let mut session = TeleopSession::new(config, source, link);

    let (zone_tx, mut zone_rx) = mpsc::channel(16);
    let mirror_task = if config.mirror.enabled {
        let (feed, view) = mirror::channel();
        session = session.with_mirror(feed);
        let monitor = ZoneMonitor::from_config(&config.mirror.zones);
        Some(tokio::spawn(mirror::run(view, monitor, config.mirror.rate_hz, zone_tx)))
    } else {
        drop(zone_tx);
        None
    };

    let telemetry_task = if config.telemetry.enabled {
        match telemetry::spawn(&config.telemetry) {
            Ok((recorder, handle)) => {
                session = session.with_recorder(recorder);
                Some(handle)
            }
            Err(e) => {
                warn!("Telemetry disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    let (console_tx, mut console_rx) = mpsc::channel(8);
    if let Err(e) = console::spawn_stdin(console_tx) {
        warn!("Console unavailable: {}", e);
    }

    let period = Duration::from_secs_f64(1.0 / f64::from(config.teleop.tick_rate_hz));
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut auto_enable = config.teleop.auto_enable;
    let mut ticks: u64 = 0;

    info!("Teleop loop running at {}Hz", config.teleop.tick_rate_hz);
    info!("Commands: enable, disable, status, joints, freedrive on|off, quit. Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = session.tick(Instant::now()).await;
                ticks += 1;

                // Wait for a readable safety state before the first enable
                if auto_enable && report.flags.is_some() {
                    auto_enable = false;
                    if let Err(e) = session.enable() {
                        warn!("Auto-enable refused: {}", e);
                    }
                }

                if ticks % STATUS_LOG_TICKS == 0 {
                    debug!("{} ticks, status {}", ticks, report.status);
                }
            }

            Some(command) = console_rx.recv() => {
                match command {
                    ConsoleCommand::Enable => {
                        if let Err(e) = session.enable() {
                            warn!("Cannot enable: {}", e);
                        }
                    }
                    ConsoleCommand::Disable => session.disable(),
                    ConsoleCommand::Status => log_status(&session.view()),
                    ConsoleCommand::ReadJoints => match session.read_joints().await {
                        Ok(q) => info!("{}", format_joints(&q)),
                        Err(e) => warn!("Cannot read joints: {}", e),
                    },
                    ConsoleCommand::Freedrive(enabled) => {
                        if let Err(e) = session.set_freedrive(enabled).await {
                            warn!("Cannot switch freedrive: {}", e);
                        }
                    }
                    ConsoleCommand::Quit => {
                        info!("Quit requested");
                        break;
                    }
                }
            }

            Some(ZoneEvent::Entered(name)) = zone_rx.recv() => {
                info!("Trigger zone {} entered", name);
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    if let Err(e) = session.shutdown().await {
        error!("Robot may still be moving: {}", e);
    }
    info!("Total ticks: {}", ticks);

    // Dropping the session closes the mirror feed and the telemetry channel
    drop(session);
    drop(zone_rx);

    if let Some(task) = mirror_task {
        let _ = task.await;
    }
    if let Some(task) = telemetry_task {
        let _ = task.await;
    }

    Ok(())
}

/// Joint positions in degrees, one decimal
fn format_joints(q: &Vector6) -> String {
    let degrees: Vec<String> = q.iter().map(|r| format!("{:.1}", r.to_degrees())).collect();
    format!("q (deg): {}", degrees.join(", "))
}

fn log_status(view: &SessionView) {
    info!(
        "Status: {} | enabled {} | freedrive {} | mode {} | gains {:.3} m/s {:.2} rad/s | deadman {} | last {}{}",
        view.status,
        view.enabled,
        view.freedrive,
        view.mode,
        view.linear_gain,
        view.angular_gain,
        view.deadman_button
            .map_or_else(|| "unbound".to_string(), |b| b.to_string()),
        view.last_command,
        view.last_stop_reason
            .map_or_else(String::new, |r| format!(" (last stop: {})", r)),
    );
}
