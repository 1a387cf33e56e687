//! # Mode & Gain State
//!
//! The mutable part of teleoperation that persists across ticks. It is owned
//! by the synthesizer and only ever touched from the tick loop; observers get
//! copies through the session view.

use serde::Serialize;
use std::fmt;

use crate::config::TeleopConfig;
use crate::controller::deadman::{HatEdge, RisingEdge};

/// Control mode selected with the toggle button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    #[default]
    Cartesian,
    Joint,
}

impl ControlMode {
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            ControlMode::Cartesian => ControlMode::Joint,
            ControlMode::Joint => ControlMode::Cartesian,
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMode::Cartesian => f.write_str("cartesian"),
            ControlMode::Joint => f.write_str("joint"),
        }
    }
}

/// Inclusive bounds for one gain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainBounds {
    pub min: f64,
    pub max: f64,
}

impl GainBounds {
    #[must_use]
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// Linear and angular gains, always within their bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gains {
    linear: f64,
    angular: f64,
    linear_bounds: GainBounds,
    angular_bounds: GainBounds,
}

impl Gains {
    /// Creates gains, clamping the initial values into their bounds.
    #[must_use]
    pub fn new(linear: f64, angular: f64, linear_bounds: GainBounds, angular_bounds: GainBounds) -> Self {
        Self {
            linear: linear_bounds.clamp(linear),
            angular: angular_bounds.clamp(angular),
            linear_bounds,
            angular_bounds,
        }
    }

    #[must_use]
    pub fn from_config(config: &TeleopConfig) -> Self {
        Self::new(
            config.linear_gain,
            config.angular_gain,
            GainBounds::new(config.linear_gain_min, config.linear_gain_max),
            GainBounds::new(config.angular_gain_min, config.angular_gain_max),
        )
    }

    #[must_use]
    pub fn linear(&self) -> f64 {
        self.linear
    }

    #[must_use]
    pub fn angular(&self) -> f64 {
        self.angular
    }

    /// Adds `delta` to the linear gain, clamped.
    ///
    /// Returns the new value.
    pub fn adjust_linear(&mut self, delta: f64) -> f64 {
        self.linear = self.linear_bounds.clamp(self.linear + delta);
        self.linear
    }

    #[must_use]
    pub fn linear_bounds(&self) -> GainBounds {
        self.linear_bounds
    }

    #[must_use]
    pub fn angular_bounds(&self) -> GainBounds {
        self.angular_bounds
    }
}

impl Default for Gains {
    fn default() -> Self {
        Self::from_config(&TeleopConfig::default())
    }
}

/// Everything the synthesizer remembers between ticks.
#[derive(Debug, Clone, Default)]
pub struct TeleopState {
    pub mode: ControlMode,
    pub gains: Gains,
    pub(crate) toggle: RisingEdge,
    pub(crate) hat: HatEdge,
    pub(crate) deadman: RisingEdge,
}

impl TeleopState {
    #[must_use]
    pub fn new(gains: Gains) -> Self {
        Self {
            gains,
            ..Self::default()
        }
    }

    /// Deadman state seen on the previous tick.
    #[must_use]
    pub fn was_deadman(&self) -> bool {
        self.deadman.previous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gains() -> Gains {
        Gains::new(0.06, 0.5, GainBounds::new(0.01, 0.20), GainBounds::new(0.10, 1.50))
    }

    #[test]
    fn test_mode_toggles_between_two_values() {
        assert_eq!(ControlMode::Cartesian.toggled(), ControlMode::Joint);
        assert_eq!(ControlMode::Joint.toggled(), ControlMode::Cartesian);
        assert_eq!(ControlMode::default(), ControlMode::Cartesian);
    }

    #[test]
    fn test_initial_gains_clamped() {
        let g = Gains::new(5.0, 0.0, GainBounds::new(0.01, 0.20), GainBounds::new(0.10, 1.50));
        assert_eq!(g.linear(), 0.20);
        assert_eq!(g.angular(), 0.10);
    }

    #[test]
    fn test_adjust_linear_clamps_at_max() {
        let mut g = gains();
        for _ in 0..100 {
            g.adjust_linear(0.01);
        }
        assert_eq!(g.linear(), 0.20);
    }

    #[test]
    fn test_adjust_linear_clamps_at_min() {
        let mut g = gains();
        for _ in 0..100 {
            g.adjust_linear(-0.01);
        }
        assert_eq!(g.linear(), 0.01);
    }

    #[test]
    fn test_adjust_linear_leaves_angular() {
        let mut g = gains();
        let new = g.adjust_linear(0.01);
        assert!((new - 0.07).abs() < 1e-12);
        assert_eq!(g.angular(), 0.5);
    }

    #[test]
    fn test_gains_stay_in_bounds_for_any_sequence() {
        let mut g = gains();
        // Deterministic pseudo-random walk
        let mut seed: u32 = 12345;
        for _ in 0..1000 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
            let delta = if seed & 0x100 == 0 { 0.01 } else { -0.01 };
            g.adjust_linear(delta);
            assert!(g.linear() >= 0.01 && g.linear() <= 0.20);
            assert!(g.angular() >= 0.10 && g.angular() <= 1.50);
        }
    }

    #[test]
    fn test_default_gains_from_config_defaults() {
        let g = Gains::default();
        assert_eq!(g.linear(), 0.06);
        assert_eq!(g.angular(), 0.50);
        assert_eq!(g.linear_bounds(), GainBounds::new(0.01, 0.20));
    }
}
