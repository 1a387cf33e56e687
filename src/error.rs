//! # Error Types
//!
//! Custom error types for Arm Teleop using `thiserror`.

use std::time::Duration;

use thiserror::Error;

/// Main error type for Arm Teleop
#[derive(Debug, Error)]
pub enum TeleopError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No gamepad present, or the gamepad disappeared mid-session
    #[error("Gamepad unavailable: {0}")]
    DeviceUnavailable(String),

    /// Gamepad present but misbehaving
    #[error("Controller error: {0}")]
    Controller(String),

    /// Malformed real-time packet or URScript encoding problem
    #[error("Robot protocol error: {0}")]
    RobotProtocol(String),

    /// Robot link rejected a call or the connection dropped
    #[error("Robot link error: {0}")]
    RobotLink(String),

    /// Robot call exceeded its time budget
    #[error("Robot call timed out after {0:?}")]
    Timeout(Duration),

    /// No (fresh) robot state available
    #[error("Robot state unavailable: {0}")]
    StateUnavailable(String),

    /// Protective or emergency stop still asserted
    #[error("Safety interlock active: {0}")]
    Interlock(String),

    /// Telemetry recorder errors
    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

/// Result type alias for Arm Teleop
pub type Result<T> = std::result::Result<T, TeleopError>;
