//! # Teleop Module
//!
//! Turns gamepad snapshots into robot motion, one command per tick.
//!
//! This module handles:
//! - The command vocabulary and its stop reasons
//! - Mode and gain state carried across ticks
//! - Priority-ordered command synthesis
//! - Safety supervision (enable state, interlock latch, watchdog)
//! - Dispatch to the robot link with timeouts and failure counting
//! - The session that runs all of the above in order

pub mod command;
pub mod dispatcher;
pub mod session;
pub mod state;
pub mod supervisor;
pub mod synthesizer;
