//! # Controller Module
//!
//! Gamepad input handling.
//!
//! This module handles:
//! - Gamepad detection and connection via evdev
//! - Mapping Xbox and DualSense layouts onto logical buttons and axes
//! - Deadzone suppression and trigger normalization
//! - Deadman auto-binding and rising-edge detection
//! - Producing one immutable snapshot per tick

pub mod deadman;
pub mod gamepad;
pub mod layout;
pub mod mapper;
pub mod normalize;
pub mod sampler;
