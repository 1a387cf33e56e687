//! # Deadzone & Trigger Normalization
//!
//! Pure numeric transforms applied to analog inputs before they become
//! velocities.
//!
//! ## Deadzone
//!
//! Values whose magnitude is below the threshold are suppressed to 0.0.
//! Values at or above it pass through **unchanged**: the remaining range is
//! not rescaled, so a half-deflected stick always reads 0.5.
//!
//! ## Triggers
//!
//! Triggers arrive bipolar, -1.0 at rest and 1.0 fully pressed, and are
//! remapped to 0.0..1.0 with `(raw + 1) / 2`. The result is clamped, so a pad
//! that already reports 0.0..1.0 with rest at 0.0 still lands in range.
//!
//! ```
//! use arm_teleop::controller::normalize::{deadzone, trigger_normalize};
//!
//! assert_eq!(deadzone(0.05, 0.08), 0.0);
//! assert_eq!(deadzone(0.5, 0.08), 0.5);
//! assert_eq!(trigger_normalize(-1.0), 0.0);
//! assert_eq!(trigger_normalize(1.0), 1.0);
//! ```

/// Suppresses `x` to zero when `|x| < threshold`.
#[inline]
#[must_use]
pub fn deadzone(x: f64, threshold: f64) -> f64 {
    if x.abs() < threshold {
        0.0
    } else {
        x
    }
}

/// Maps a bipolar trigger reading onto 0.0..1.0.
#[inline]
#[must_use]
pub fn trigger_normalize(raw: f64) -> f64 {
    ((raw + 1.0) * 0.5).clamp(0.0, 1.0)
}

/// Per-input deadzone thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deadzones {
    /// Translational (left) stick.
    pub stick: f64,
    /// Rotational (right) stick, usually tighter.
    pub fine: f64,
    /// Normalized triggers.
    pub trigger: f64,
}

impl Default for Deadzones {
    fn default() -> Self {
        Self {
            stick: 0.08,
            fine: 0.12,
            trigger: 0.0,
        }
    }
}

impl Deadzones {
    #[must_use]
    pub fn new(stick: f64, fine: f64, trigger: f64) -> Self {
        Self { stick, fine, trigger }
    }

    #[inline]
    #[must_use]
    pub fn stick(&self, x: f64) -> f64 {
        deadzone(x, self.stick)
    }

    #[inline]
    #[must_use]
    pub fn fine(&self, x: f64) -> f64 {
        deadzone(x, self.fine)
    }

    /// Deadzone for an already-normalized trigger value.
    #[inline]
    #[must_use]
    pub fn trigger(&self, x: f64) -> f64 {
        deadzone(x, self.trigger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Deadzone Tests ====================

    #[test]
    fn test_deadzone_suppresses_below_threshold() {
        for x in [0.0, 0.01, -0.01, 0.079, -0.079] {
            assert_eq!(deadzone(x, 0.08), 0.0, "x = {}", x);
        }
    }

    #[test]
    fn test_deadzone_passes_through_unscaled() {
        for x in [0.08, -0.08, 0.3, -0.7, 1.0, -1.0] {
            assert_eq!(deadzone(x, 0.08), x, "x = {}", x);
        }
    }

    #[test]
    fn test_deadzone_at_threshold_passes() {
        // Boundary belongs to the live range
        assert_eq!(deadzone(0.12, 0.12), 0.12);
    }

    #[test]
    fn test_zero_threshold_is_identity() {
        assert_eq!(deadzone(0.0001, 0.0), 0.0001);
        assert_eq!(deadzone(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_deadzone_sweep() {
        let threshold = 0.1;
        let mut x = -1.0;
        while x <= 1.0 {
            let out = deadzone(x, threshold);
            if x.abs() < threshold {
                assert_eq!(out, 0.0);
            } else {
                assert_eq!(out, x);
            }
            x += 0.001;
        }
    }

    // ==================== Trigger Tests ====================

    #[test]
    fn test_trigger_endpoints() {
        assert_eq!(trigger_normalize(-1.0), 0.0);
        assert_eq!(trigger_normalize(0.0), 0.5);
        assert_eq!(trigger_normalize(1.0), 1.0);
    }

    #[test]
    fn test_trigger_monotonic_and_bounded() {
        let mut prev = trigger_normalize(-1.0);
        let mut raw = -1.0;
        while raw <= 1.0 {
            let out = trigger_normalize(raw);
            assert!((0.0..=1.0).contains(&out));
            assert!(out >= prev, "not monotonic at raw = {}", raw);
            prev = out;
            raw += 0.01;
        }
    }

    #[test]
    fn test_trigger_clamps_out_of_range() {
        assert_eq!(trigger_normalize(-3.0), 0.0);
        assert_eq!(trigger_normalize(2.5), 1.0);
    }

    // ==================== Deadzones Tests ====================

    #[test]
    fn test_deadzones_use_independent_thresholds() {
        let dz = Deadzones::new(0.08, 0.12, 0.05);
        assert_eq!(dz.stick(0.10), 0.10);
        assert_eq!(dz.fine(0.10), 0.0);
        assert_eq!(dz.trigger(0.04), 0.0);
        assert_eq!(dz.trigger(0.06), 0.06);
    }

    #[test]
    fn test_deadzones_default() {
        let dz = Deadzones::default();
        assert_eq!(dz.stick, 0.08);
        assert_eq!(dz.fine, 0.12);
        assert_eq!(dz.trigger, 0.0);
    }
}
