//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every tunable the teleop pipeline uses (deadzones, gain bounds, step sizes,
//! watchdog timing) lives here. Nothing in the control path hardcodes these
//! values, and a misconfigured file fails at load time, never mid-session.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::controller::layout::{LayoutChoice, PadButton};
use crate::error::{Result, TeleopError};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    pub controller: ControllerConfig,
    pub teleop: TeleopConfig,
    pub safety: SafetyConfig,
    pub robot: RobotConfig,
    #[serde(default)]
    pub mirror: MirrorConfig,
    pub telemetry: TelemetryConfig,
}

/// Gamepad configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ControllerConfig {
    /// Explicit `/dev/input/eventN` path; empty means auto-detect
    #[serde(default)]
    pub device_path: String,

    #[serde(default)]
    pub layout: LayoutChoice,

    /// Deadzone for the translational (left) stick
    #[serde(default = "default_deadzone_stick")]
    pub deadzone_stick: f64,

    /// Deadzone for the rotational (right) stick
    #[serde(default = "default_deadzone_fine")]
    pub deadzone_fine: f64,

    /// Deadzone applied to triggers after normalization to 0..1
    #[serde(default = "default_deadzone_trigger")]
    pub deadzone_trigger: f64,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

/// Teleoperation mapping configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TeleopConfig {
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: u32,

    #[serde(default = "default_linear_gain")]
    pub linear_gain: f64,

    #[serde(default = "default_angular_gain")]
    pub angular_gain: f64,

    #[serde(default = "default_linear_gain_min")]
    pub linear_gain_min: f64,

    #[serde(default = "default_linear_gain_max")]
    pub linear_gain_max: f64,

    #[serde(default = "default_angular_gain_min")]
    pub angular_gain_min: f64,

    #[serde(default = "default_angular_gain_max")]
    pub angular_gain_max: f64,

    #[serde(default = "default_gain_step")]
    pub gain_step: f64,

    /// Cartesian step length in meters
    #[serde(default = "default_step_linear_m")]
    pub step_linear_m: f64,

    /// Joint step angle in degrees
    #[serde(default = "default_step_angular_deg")]
    pub step_angular_deg: f64,

    /// Cartesian component moved by a D-pad step (0 = X .. 5 = Rz)
    #[serde(default)]
    pub step_axis: usize,

    /// Joint moved by a D-pad step in joint mode (0 = base)
    #[serde(default)]
    pub step_joint: usize,

    #[serde(default = "default_velocity_epsilon")]
    pub velocity_epsilon: f64,

    /// speedl acceleration
    #[serde(default = "default_acceleration")]
    pub acceleration: f64,

    /// speedl time window in seconds
    #[serde(default = "default_time_window_s")]
    pub time_window_s: f64,

    #[serde(default = "default_stop_button")]
    pub stop_button: PadButton,

    #[serde(default = "default_toggle_button")]
    pub toggle_button: PadButton,

    /// Enable teleoperation immediately at startup
    #[serde(default)]
    pub auto_enable: bool,
}

/// Safety configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SafetyConfig {
    #[serde(default = "default_watchdog_timeout_ms")]
    pub watchdog_timeout_ms: u64,

    #[serde(default = "default_stop_deceleration")]
    pub stop_deceleration: f64,

    /// Budget for every single robot call made from the tick
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

/// Which robot link the binary drives
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RobotBackend {
    /// Universal Robots real-time interface
    Ur,
    /// In-process simulated arm
    #[default]
    Sim,
}

/// Robot link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RobotConfig {
    #[serde(default)]
    pub backend: RobotBackend,

    #[serde(default = "default_robot_host")]
    pub host: String,

    #[serde(default = "default_robot_port")]
    pub port: u16,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Robot state older than this is treated as unavailable
    #[serde(default = "default_state_timeout_ms")]
    pub state_timeout_ms: u64,

    #[serde(default = "default_move_speed")]
    pub move_speed: f64,

    #[serde(default = "default_move_acceleration")]
    pub move_acceleration: f64,

    #[serde(default = "default_move_async")]
    pub move_async: bool,
}

/// Geofence zone definition
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ZoneConfig {
    pub name: String,
    pub min: [f64; 3],
    pub max: [f64; 3],
}

/// State mirror configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MirrorConfig {
    #[serde(default = "default_mirror_enabled")]
    pub enabled: bool,

    #[serde(default = "default_mirror_rate_hz")]
    pub rate_hz: u32,

    #[serde(default)]
    pub zones: Vec<ZoneConfig>,
}

/// Telemetry configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_log_interval_ms")]
    pub log_interval_ms: u64,

    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_deadzone_stick() -> f64 { 0.08 }
fn default_deadzone_fine() -> f64 { 0.12 }
fn default_deadzone_trigger() -> f64 { 0.0 }
fn default_reconnect_interval_ms() -> u64 { 1000 }

fn default_tick_rate_hz() -> u32 { 50 }
fn default_linear_gain() -> f64 { 0.06 }
fn default_angular_gain() -> f64 { 0.50 }
fn default_linear_gain_min() -> f64 { 0.01 }
fn default_linear_gain_max() -> f64 { 0.20 }
fn default_angular_gain_min() -> f64 { 0.10 }
fn default_angular_gain_max() -> f64 { 1.50 }
fn default_gain_step() -> f64 { 0.01 }
fn default_step_linear_m() -> f64 { 0.005 }
fn default_step_angular_deg() -> f64 { 2.0 }
fn default_velocity_epsilon() -> f64 { 1e-3 }
fn default_acceleration() -> f64 { 0.20 }
fn default_time_window_s() -> f64 { 0.02 }
fn default_stop_button() -> PadButton { PadButton::B }
fn default_toggle_button() -> PadButton { PadButton::Y }

fn default_watchdog_timeout_ms() -> u64 { 100 }
fn default_stop_deceleration() -> f64 { 10.0 }
fn default_call_timeout_ms() -> u64 { 10 }
fn default_max_consecutive_failures() -> u32 { 2 }

fn default_robot_host() -> String { "192.168.0.40".to_string() }
fn default_robot_port() -> u16 { 30003 }
fn default_connect_timeout_ms() -> u64 { 2000 }
fn default_state_timeout_ms() -> u64 { 500 }
fn default_move_speed() -> f64 { 0.25 }
fn default_move_acceleration() -> f64 { 0.25 }
fn default_move_async() -> bool { true }

fn default_mirror_enabled() -> bool { true }
fn default_mirror_rate_hz() -> u32 { 30 }

fn default_telemetry_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_log_interval_ms() -> u64 { 100 }
fn default_log_format() -> String { "jsonl".to_string() }

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            device_path: String::new(),
            layout: LayoutChoice::default(),
            deadzone_stick: default_deadzone_stick(),
            deadzone_fine: default_deadzone_fine(),
            deadzone_trigger: default_deadzone_trigger(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
        }
    }
}

impl Default for TeleopConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: default_tick_rate_hz(),
            linear_gain: default_linear_gain(),
            angular_gain: default_angular_gain(),
            linear_gain_min: default_linear_gain_min(),
            linear_gain_max: default_linear_gain_max(),
            angular_gain_min: default_angular_gain_min(),
            angular_gain_max: default_angular_gain_max(),
            gain_step: default_gain_step(),
            step_linear_m: default_step_linear_m(),
            step_angular_deg: default_step_angular_deg(),
            step_axis: 0,
            step_joint: 0,
            velocity_epsilon: default_velocity_epsilon(),
            acceleration: default_acceleration(),
            time_window_s: default_time_window_s(),
            stop_button: default_stop_button(),
            toggle_button: default_toggle_button(),
            auto_enable: false,
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            watchdog_timeout_ms: default_watchdog_timeout_ms(),
            stop_deceleration: default_stop_deceleration(),
            call_timeout_ms: default_call_timeout_ms(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            backend: RobotBackend::default(),
            host: default_robot_host(),
            port: default_robot_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
            state_timeout_ms: default_state_timeout_ms(),
            move_speed: default_move_speed(),
            move_acceleration: default_move_acceleration(),
            move_async: default_move_async(),
        }
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            enabled: default_mirror_enabled(),
            rate_hz: default_mirror_rate_hz(),
            zones: Vec::new(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            log_interval_ms: default_log_interval_ms(),
            format: default_log_format(),
        }
    }
}

/// Builds the configuration error the validator reports
fn invalid(message: impl std::fmt::Display) -> TeleopError {
    TeleopError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use arm_teleop::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        self.validate_finite()?;
        self.validate_controller()?;
        self.validate_teleop()?;
        self.validate_safety()?;
        self.validate_robot()?;
        self.validate_mirror()?;
        self.validate_telemetry()
    }

    /// NaN slips through every range comparison below, so it is rejected first.
    fn validate_finite(&self) -> Result<()> {
        let c = &self.controller;
        let t = &self.teleop;
        let scalars = [
            ("deadzone_stick", c.deadzone_stick),
            ("deadzone_fine", c.deadzone_fine),
            ("deadzone_trigger", c.deadzone_trigger),
            ("linear_gain", t.linear_gain),
            ("angular_gain", t.angular_gain),
            ("linear_gain_min", t.linear_gain_min),
            ("linear_gain_max", t.linear_gain_max),
            ("angular_gain_min", t.angular_gain_min),
            ("angular_gain_max", t.angular_gain_max),
            ("gain_step", t.gain_step),
            ("step_linear_m", t.step_linear_m),
            ("step_angular_deg", t.step_angular_deg),
            ("velocity_epsilon", t.velocity_epsilon),
            ("acceleration", t.acceleration),
            ("time_window_s", t.time_window_s),
            ("stop_deceleration", self.safety.stop_deceleration),
            ("move_speed", self.robot.move_speed),
            ("move_acceleration", self.robot.move_acceleration),
        ];

        if let Some((name, _)) = scalars.iter().find(|(_, value)| !value.is_finite()) {
            return Err(invalid(format!("{} must be a finite number", name)));
        }

        for zone in &self.mirror.zones {
            if zone.min.iter().chain(zone.max.iter()).any(|v| !v.is_finite()) {
                return Err(invalid(format!("zone '{}' bounds must be finite numbers", zone.name)));
            }
        }

        Ok(())
    }

    fn validate_controller(&self) -> Result<()> {
        let c = &self.controller;

        for (name, value) in [
            ("deadzone_stick", c.deadzone_stick),
            ("deadzone_fine", c.deadzone_fine),
            ("deadzone_trigger", c.deadzone_trigger),
        ] {
            if !(0.0..0.5).contains(&value) {
                return Err(invalid(format!("{} must be in [0.0, 0.5)", name)));
            }
        }

        if c.reconnect_interval_ms == 0 || c.reconnect_interval_ms > 60000 {
            return Err(invalid("reconnect_interval_ms must be between 1 and 60000"));
        }

        Ok(())
    }

    fn validate_teleop(&self) -> Result<()> {
        let t = &self.teleop;

        if t.tick_rate_hz == 0 || t.tick_rate_hz > 500 {
            return Err(invalid("tick_rate_hz must be between 1 and 500"));
        }

        // Gain bounds
        if t.linear_gain_min <= 0.0 || t.linear_gain_min >= t.linear_gain_max {
            return Err(invalid("linear_gain_min must be positive and less than linear_gain_max"));
        }

        if t.angular_gain_min <= 0.0 || t.angular_gain_min >= t.angular_gain_max {
            return Err(invalid("angular_gain_min must be positive and less than angular_gain_max"));
        }

        if t.linear_gain < t.linear_gain_min || t.linear_gain > t.linear_gain_max {
            return Err(invalid("linear_gain must be within [linear_gain_min, linear_gain_max]"));
        }

        if t.angular_gain < t.angular_gain_min || t.angular_gain > t.angular_gain_max {
            return Err(invalid("angular_gain must be within [angular_gain_min, angular_gain_max]"));
        }

        if t.gain_step <= 0.0 || t.gain_step > t.linear_gain_max - t.linear_gain_min {
            return Err(invalid("gain_step must be positive and no larger than the linear gain range"));
        }

        // Steps
        if t.step_linear_m <= 0.0 || t.step_linear_m > 0.05 {
            return Err(invalid("step_linear_m must be in (0.0, 0.05]"));
        }

        if t.step_angular_deg <= 0.0 || t.step_angular_deg > 15.0 {
            return Err(invalid("step_angular_deg must be in (0.0, 15.0]"));
        }

        if t.step_axis > 5 {
            return Err(invalid(format!("step_axis {} is out of bounds (must be 0-5)", t.step_axis)));
        }

        if t.step_joint > 5 {
            return Err(invalid(format!("step_joint {} is out of bounds (must be 0-5)", t.step_joint)));
        }

        if t.velocity_epsilon <= 0.0 || t.velocity_epsilon >= t.linear_gain_min {
            return Err(invalid("velocity_epsilon must be positive and below linear_gain_min"));
        }

        if t.acceleration <= 0.0 {
            return Err(invalid("acceleration must be greater than 0"));
        }

        if t.time_window_s <= 0.0 || t.time_window_s > 1.0 {
            return Err(invalid("time_window_s must be in (0.0, 1.0]"));
        }

        if t.stop_button == t.toggle_button {
            return Err(invalid("stop_button and toggle_button must differ"));
        }

        Ok(())
    }

    fn validate_safety(&self) -> Result<()> {
        let s = &self.safety;
        let tick_period_ms = 1000 / u64::from(self.teleop.tick_rate_hz);

        if s.watchdog_timeout_ms == 0 || s.watchdog_timeout_ms > 1000 {
            return Err(invalid("watchdog_timeout_ms must be between 1 and 1000"));
        }

        if s.watchdog_timeout_ms <= tick_period_ms {
            return Err(invalid("watchdog_timeout_ms must exceed the tick period"));
        }

        if s.stop_deceleration <= 0.0 {
            return Err(invalid("stop_deceleration must be greater than 0"));
        }

        if s.call_timeout_ms == 0 || s.call_timeout_ms >= tick_period_ms.max(1) {
            return Err(invalid("call_timeout_ms must be positive and shorter than the tick period"));
        }

        if s.max_consecutive_failures == 0 {
            return Err(invalid("max_consecutive_failures must be greater than 0"));
        }

        Ok(())
    }

    fn validate_robot(&self) -> Result<()> {
        let r = &self.robot;

        if r.backend == RobotBackend::Ur && r.host.is_empty() {
            return Err(invalid("robot host cannot be empty for the ur backend"));
        }

        if r.port == 0 {
            return Err(invalid("robot port cannot be 0"));
        }

        if r.connect_timeout_ms == 0 || r.connect_timeout_ms > 60000 {
            return Err(invalid("connect_timeout_ms must be between 1 and 60000"));
        }

        if r.state_timeout_ms == 0 || r.state_timeout_ms > 10000 {
            return Err(invalid("state_timeout_ms must be between 1 and 10000"));
        }

        if r.move_speed <= 0.0 || r.move_acceleration <= 0.0 {
            return Err(invalid("move_speed and move_acceleration must be greater than 0"));
        }

        Ok(())
    }

    fn validate_mirror(&self) -> Result<()> {
        let m = &self.mirror;

        if m.enabled && (m.rate_hz == 0 || m.rate_hz > 240) {
            return Err(invalid("mirror rate_hz must be between 1 and 240"));
        }

        for (i, zone) in m.zones.iter().enumerate() {
            if zone.name.is_empty() {
                return Err(invalid(format!("zone #{} has an empty name", i)));
            }

            if m.zones[..i].iter().any(|z| z.name == zone.name) {
                return Err(invalid(format!("zone name '{}' is duplicated", zone.name)));
            }

            if (0..3).any(|axis| zone.min[axis] >= zone.max[axis]) {
                return Err(invalid(format!("zone '{}' min must be below max on every axis", zone.name)));
            }
        }

        Ok(())
    }

    fn validate_telemetry(&self) -> Result<()> {
        let t = &self.telemetry;

        if t.enabled && t.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if t.log_interval_ms == 0 || t.log_interval_ms > 60000 {
            return Err(invalid("log_interval_ms must be between 1 and 60000"));
        }

        if t.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if t.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if t.format != "jsonl" {
            return Err(invalid("log format must be 'jsonl' (only supported format)"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_valid_config() -> Config {
        Config::default()
    }

    #[test]
    fn test_default_config() {
        assert!(create_valid_config().validate().is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[controller]

[teleop]

[safety]

[robot]

[telemetry]
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.teleop.tick_rate_hz, 50);
        assert_eq!(config.robot.backend, RobotBackend::Sim);
        assert!(config.mirror.zones.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/arm-teleop.toml");
        assert!(matches!(result, Err(TeleopError::Io(_))));
    }

    #[test]
    fn test_shipped_default_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.robot.backend, RobotBackend::Sim);
        assert_eq!(config.teleop.stop_button, PadButton::B);
        assert_eq!(config.mirror.zones.len(), 2);
        assert_eq!(config.mirror.zones[1].name, "ZONE_2");
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[controller]
device_path = "/dev/input/event7"
layout = "dualsense"
deadzone_stick = 0.10

[teleop]
linear_gain = 0.08
stop_button = "x"
toggle_button = "start"
step_axis = 2

[safety]
watchdog_timeout_ms = 150

[robot]
backend = "ur"
host = "10.0.0.2"

[mirror]
rate_hz = 20

[[mirror.zones]]
name = "ZONE_1"
min = [0.30, -0.20, 0.05]
max = [0.50, 0.00, 0.30]

[telemetry]
enabled = false
"#;

        let config = Config::from_toml_str(toml_content).unwrap();
        assert_eq!(config.controller.layout, LayoutChoice::DualSense);
        assert_eq!(config.teleop.stop_button, PadButton::X);
        assert_eq!(config.teleop.toggle_button, PadButton::Start);
        assert_eq!(config.teleop.step_axis, 2);
        assert_eq!(config.robot.backend, RobotBackend::Ur);
        assert_eq!(config.mirror.zones.len(), 1);
        assert_eq!(config.mirror.zones[0].max, [0.50, 0.00, 0.30]);
    }

    #[test]
    fn test_unknown_button_name_rejected() {
        let toml_content = r#"
[controller]
[teleop]
stop_button = "triangle"
[safety]
[robot]
[telemetry]
"#;
        assert!(matches!(Config::from_toml_str(toml_content), Err(TeleopError::Config(_))));
    }

    #[test]
    fn test_deadzone_stick_negative() {
        let mut config = create_valid_config();
        config.controller.deadzone_stick = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deadzone_fine_too_high() {
        let mut config = create_valid_config();
        config.controller.deadzone_fine = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reconnect_interval_zero() {
        let mut config = create_valid_config();
        config.controller.reconnect_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tick_rate_zero() {
        let mut config = create_valid_config();
        config.teleop.tick_rate_hz = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_linear_gain_bounds_inverted() {
        let mut config = create_valid_config();
        config.teleop.linear_gain_min = 0.30;
        config.teleop.linear_gain_max = 0.20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_angular_gain_bounds_equal() {
        let mut config = create_valid_config();
        config.teleop.angular_gain_min = 1.0;
        config.teleop.angular_gain_max = 1.0;
        config.teleop.angular_gain = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_linear_gain_outside_bounds() {
        let mut config = create_valid_config();
        config.teleop.linear_gain = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_angular_gain_outside_bounds() {
        let mut config = create_valid_config();
        config.teleop.angular_gain = 0.05;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gain_step_zero() {
        let mut config = create_valid_config();
        config.teleop.gain_step = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_step_linear_too_large() {
        let mut config = create_valid_config();
        config.teleop.step_linear_m = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_step_axis_out_of_bounds() {
        let mut config = create_valid_config();
        config.teleop.step_axis = 6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_step_joint_out_of_bounds() {
        let mut config = create_valid_config();
        config.teleop.step_joint = 6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_epsilon_above_min_gain() {
        let mut config = create_valid_config();
        config.teleop.velocity_epsilon = 0.05;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_same_stop_and_toggle_button() {
        let mut config = create_valid_config();
        config.teleop.toggle_button = PadButton::B;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_watchdog_shorter_than_tick() {
        let mut config = create_valid_config();
        config.safety.watchdog_timeout_ms = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_call_timeout_longer_than_tick() {
        let mut config = create_valid_config();
        config.safety.call_timeout_ms = 25;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_consecutive_failures_zero() {
        let mut config = create_valid_config();
        config.safety.max_consecutive_failures = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_host_for_ur_backend() {
        let mut config = create_valid_config();
        config.robot.backend = RobotBackend::Ur;
        config.robot.host = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_host_for_sim_backend() {
        let mut config = create_valid_config();
        config.robot.host = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zone_min_not_below_max() {
        let mut config = create_valid_config();
        config.mirror.zones.push(ZoneConfig {
            name: "bad".to_string(),
            min: [0.0, 0.0, 0.3],
            max: [0.1, 0.1, 0.3],
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_zone_names() {
        let mut config = create_valid_config();
        let zone = ZoneConfig {
            name: "ZONE_1".to_string(),
            min: [0.0; 3],
            max: [0.1; 3],
        };
        config.mirror.zones.push(zone.clone());
        config.mirror.zones.push(zone);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_nan_gain_rejected() {
        let mut config = create_valid_config();
        config.teleop.linear_gain = f64::NAN;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("linear_gain"));

        let mut config = create_valid_config();
        config.teleop.linear_gain_min = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let mut config = create_valid_config();
        config.safety.stop_deceleration = f64::INFINITY;
        assert!(config.validate().is_err());

        let mut config = create_valid_config();
        config.controller.deadzone_stick = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = create_valid_config();
        config.mirror.zones.push(ZoneConfig {
            name: "nan".to_string(),
            min: [0.0, f64::NAN, 0.0],
            max: [0.1; 3],
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_nan_in_toml_rejected() {
        let toml_content = r#"
[controller]
[teleop]
linear_gain = nan
[safety]
[robot]
[telemetry]
"#;
        assert!(Config::from_toml_str(toml_content).is_err());
    }

    #[test]
    fn test_mirror_rate_ignored_when_disabled() {
        let mut config = create_valid_config();
        config.mirror.enabled = false;
        config.mirror.rate_hz = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_log_dir_when_enabled() {
        let mut config = create_valid_config();
        config.telemetry.enabled = true;
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_disabled() {
        let mut config = create_valid_config();
        config.telemetry.enabled = false;
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = create_valid_config();
        config.telemetry.format = "csv".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_files_to_keep_zero() {
        let mut config = create_valid_config();
        config.telemetry.max_files_to_keep = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_deadzone_stick(), 0.08);
        assert_eq!(default_deadzone_fine(), 0.12);
        assert_eq!(default_tick_rate_hz(), 50);
        assert_eq!(default_linear_gain(), 0.06);
        assert_eq!(default_angular_gain(), 0.50);
        assert_eq!(default_linear_gain_min(), 0.01);
        assert_eq!(default_linear_gain_max(), 0.20);
        assert_eq!(default_angular_gain_min(), 0.10);
        assert_eq!(default_angular_gain_max(), 1.50);
        assert_eq!(default_gain_step(), 0.01);
        assert_eq!(default_step_linear_m(), 0.005);
        assert_eq!(default_step_angular_deg(), 2.0);
        assert_eq!(default_watchdog_timeout_ms(), 100);
        assert_eq!(default_stop_deceleration(), 10.0);
        assert_eq!(default_robot_port(), 30003);
        assert_eq!(default_mirror_rate_hz(), 30);
        assert_eq!(default_log_format(), "jsonl");
    }
}
