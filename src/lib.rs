//! # Arm Teleop Library
//!
//! Teleoperate a 6-axis robot arm from a gamepad.
//!
//! This library provides the tick pipeline that turns gamepad state into
//! robot commands behind a deadman button and safety interlocks:
//!
//! ```text
//! gamepad → sampler → synthesizer → supervisor → dispatcher → robot
//! ```
//!
//! plus the robot links (Universal Robots real-time interface and a
//! simulator), a state mirror with trigger zones, and JSONL telemetry.

pub mod config;
pub mod console;
pub mod controller;
pub mod error;
pub mod mirror;
pub mod robot;
pub mod teleop;
pub mod telemetry;
