//! # Teleop Commands
//!
//! One [`Command`] is produced per tick and consumed in the same tick. Each
//! variant carries exactly the data its robot call needs, so the dispatcher's
//! `match` is checked for exhaustiveness at compile time.

use serde::Serialize;
use std::fmt;

use super::state::ControlMode;

/// Why a tick ended in a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Dedicated stop button held
    StopButton,
    /// Deadman not held (or never bound)
    DeadmanReleased,
    /// First tick of a deadman press; clears stale motion
    DeadmanEngaged,
    /// All velocity components below epsilon
    Idle,
    /// Gamepad unavailable
    NoInput,
    /// Protective or emergency stop reported by the robot
    Interlock,
    /// No fresh velocity dispatch within the watchdog timeout
    Watchdog,
    /// First tick after teleoperation was disabled
    Disabled,
    /// A robot call failed and teleoperation is being shut down
    DispatchFailure,
}

impl StopReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::StopButton => "stop_button",
            StopReason::DeadmanReleased => "deadman_released",
            StopReason::DeadmanEngaged => "deadman_engaged",
            StopReason::Idle => "idle",
            StopReason::NoInput => "no_input",
            StopReason::Interlock => "interlock",
            StopReason::Watchdog => "watchdog",
            StopReason::Disabled => "disabled",
            StopReason::DispatchFailure => "dispatch_failure",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound command for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Noop,
    Stop(StopReason),
    /// Cartesian velocity `[vx, vy, vz, wx, wy, wz]`
    Velocity([f64; 6]),
    /// Pose delta `[dx, dy, dz, drx, dry, drz]`
    StepCartesian([f64; 6]),
    /// Joint delta in radians
    StepJoint([f64; 6]),
    ModeChanged(ControlMode),
    GainChanged { linear: f64, angular: f64 },
}

/// Payload-free discriminant of [`Command`], used for logging and telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Noop,
    Stop,
    Velocity,
    StepCartesian,
    StepJoint,
    ModeChanged,
    GainChanged,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::Noop => "NOOP",
            CommandKind::Stop => "STOP",
            CommandKind::Velocity => "VELOCITY",
            CommandKind::StepCartesian => "STEP_CARTESIAN",
            CommandKind::StepJoint => "STEP_JOINT",
            CommandKind::ModeChanged => "MODE_CHANGED",
            CommandKind::GainChanged => "GAIN_CHANGED",
        };
        f.write_str(name)
    }
}

impl Command {
    #[must_use]
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Noop => CommandKind::Noop,
            Command::Stop(_) => CommandKind::Stop,
            Command::Velocity(_) => CommandKind::Velocity,
            Command::StepCartesian(_) => CommandKind::StepCartesian,
            Command::StepJoint(_) => CommandKind::StepJoint,
            Command::ModeChanged(_) => CommandKind::ModeChanged,
            Command::GainChanged { .. } => CommandKind::GainChanged,
        }
    }

    /// Six-element vector carried by velocity and step commands.
    #[must_use]
    pub fn payload(&self) -> Option<[f64; 6]> {
        match self {
            Command::Velocity(v) | Command::StepCartesian(v) | Command::StepJoint(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn stop_reason(&self) -> Option<StopReason> {
        match self {
            Command::Stop(reason) => Some(*reason),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_stop(&self) -> bool {
        matches!(self, Command::Stop(_))
    }

    /// The stop emitted on the first tick of a deadman press.
    #[must_use]
    pub fn is_cleared(&self) -> bool {
        matches!(self, Command::Stop(StopReason::DeadmanEngaged))
    }

    /// Whether this command results in a robot call.
    #[must_use]
    pub fn moves_robot(&self) -> bool {
        matches!(
            self,
            Command::Stop(_) | Command::Velocity(_) | Command::StepCartesian(_) | Command::StepJoint(_)
        )
    }
}
