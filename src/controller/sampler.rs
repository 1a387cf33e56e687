//! # Input Sampler
//!
//! Turns one [`PadReading`] per tick into an immutable [`GamepadSnapshot`]:
//! triggers are normalized to 0.0..1.0 and the deadman latch is resolved.
//!
//! Deadzones are *not* applied here. The snapshot carries what the device
//! reported so the synthesizer can apply per-axis thresholds.
//!
//! ## Deadman binding and the stop button
//!
//! A tick where the stop button is held ends in a stop before any other input
//! is looked at, so such a tick never binds the deadman. Pressing the stop
//! button first therefore cannot make it the deadman.

use tracing::debug;

use super::deadman::DeadmanLatch;
use super::layout::{PadButton, BUTTON_COUNT};
use super::mapper::PadReading;
use super::normalize::trigger_normalize;
use crate::error::Result;

/// Anything that can report the current pad state without blocking.
pub trait InputSource: Send {
    /// Reads the current device state.
    ///
    /// # Errors
    ///
    /// `DeviceUnavailable` when no device is connected.
    fn read(&mut self) -> Result<PadReading>;
}

/// Pad state for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct GamepadSnapshot {
    /// Pressed state per [`PadButton`] index; the deadman candidate set.
    pub buttons: [bool; BUTTON_COUNT],
    pub left_x: f64,
    pub left_y: f64,
    pub right_x: f64,
    pub right_y: f64,
    /// 0.0 released .. 1.0 fully pressed
    pub left_trigger: f64,
    /// 0.0 released .. 1.0 fully pressed
    pub right_trigger: f64,
    /// D-pad, x: +1 right, y: +1 up
    pub hat: (i32, i32),
    pub deadman_active: bool,
    pub deadman_button: Option<usize>,
}

impl GamepadSnapshot {
    /// Builds a snapshot from a reading and the current deadman binding.
    #[must_use]
    pub fn from_reading(reading: &PadReading, latch: &DeadmanLatch) -> Self {
        Self {
            buttons: reading.buttons,
            left_x: reading.left_x,
            left_y: reading.left_y,
            right_x: reading.right_x,
            right_y: reading.right_y,
            left_trigger: trigger_normalize(reading.left_trigger),
            right_trigger: trigger_normalize(reading.right_trigger),
            hat: reading.hat,
            deadman_active: latch.is_active(&reading.buttons),
            deadman_button: latch.bound(),
        }
    }

    #[must_use]
    pub fn pressed(&self, button: PadButton) -> bool {
        self.buttons[button.index()]
    }
}

/// Reads an [`InputSource`] and resolves the deadman latch.
pub struct Sampler<S> {
    source: S,
    latch: DeadmanLatch,
    stop_button: PadButton,
}

impl<S: InputSource> Sampler<S> {
    #[must_use]
    pub fn new(source: S, stop_button: PadButton) -> Self {
        Self {
            source,
            latch: DeadmanLatch::new(),
            stop_button,
        }
    }

    /// Samples the device once.
    ///
    /// # Errors
    ///
    /// Propagates the source error; callers treat it as deadman released.
    pub fn sample(&mut self) -> Result<GamepadSnapshot> {
        let reading = self.source.read()?;

        if !reading.pressed(self.stop_button) {
            self.latch.resolve(&reading.buttons);
        } else if self.latch.bound().is_none() {
            debug!("Stop button held, deadman binding deferred");
        }

        Ok(GamepadSnapshot::from_reading(&reading, &self.latch))
    }

    /// Resolved deadman button, if any.
    #[must_use]
    pub fn deadman_button(&self) -> Option<usize> {
        self.latch.bound()
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}


#[cfg(test)]
mod tests {
    use super::scripted::ScriptedInput;
    use super::*;
    use crate::error::TeleopError;

    fn sampler() -> (Sampler<ScriptedInput>, ScriptedInput) {
        let input = ScriptedInput::connected();
        (Sampler::new(input.clone(), PadButton::B), input)
    }

    // ==================== Snapshot Tests ====================

    #[test]
    fn test_snapshot_normalizes_triggers() {
        let (mut sampler, input) = sampler();
        input.set(PadReading {
            left_trigger: -1.0,
            right_trigger: 0.0,
            ..PadReading::default()
        });

        let snap = sampler.sample().unwrap();
        assert_eq!(snap.left_trigger, 0.0);
        assert_eq!(snap.right_trigger, 0.5);
    }

    #[test]
    fn test_snapshot_keeps_raw_sticks() {
        let (mut sampler, input) = sampler();
        input.set(PadReading {
            left_x: 0.05,
            right_y: -0.3,
            hat: (1, 0),
            ..PadReading::default()
        });

        let snap = sampler.sample().unwrap();
        assert_eq!(snap.left_x, 0.05);
        assert_eq!(snap.right_y, -0.3);
        assert_eq!(snap.hat, (1, 0));
    }

    // ==================== Deadman Tests ====================

    #[test]
    fn test_no_press_no_deadman() {
        let (mut sampler, _input) = sampler();
        let snap = sampler.sample().unwrap();
        assert!(!snap.deadman_active);
        assert_eq!(snap.deadman_button, None);
    }

    #[test]
    fn test_first_press_binds_deadman() {
        let (mut sampler, input) = sampler();
        input.set(PadReading::default().with_button(PadButton::Lb, true));

        let snap = sampler.sample().unwrap();
        assert!(snap.deadman_active);
        assert_eq!(snap.deadman_button, Some(PadButton::Lb.index()));
        assert!(snap.pressed(PadButton::Lb));
    }

    #[test]
    fn test_deadman_binding_survives_other_presses() {
        let (mut sampler, input) = sampler();
        input.set(PadReading::default().with_button(PadButton::Lb, true));
        sampler.sample().unwrap();

        input.set(PadReading::default().with_button(PadButton::A, true));
        let snap = sampler.sample().unwrap();
        assert!(!snap.deadman_active);
        assert_eq!(snap.deadman_button, Some(PadButton::Lb.index()));
    }

    #[test]
    fn test_stop_button_does_not_bind() {
        let (mut sampler, input) = sampler();
        input.set(
            PadReading::default()
                .with_button(PadButton::B, true)
                .with_button(PadButton::Rb, true),
        );
        let snap = sampler.sample().unwrap();
        assert_eq!(snap.deadman_button, None);

        input.set(PadReading::default().with_button(PadButton::Rb, true));
        let snap = sampler.sample().unwrap();
        assert_eq!(snap.deadman_button, Some(PadButton::Rb.index()));
    }

    // ==================== Unavailable Tests ====================

    #[test]
    fn test_disconnect_is_unavailable() {
        let (mut sampler, input) = sampler();
        input.set(PadReading::default().with_button(PadButton::X, true));
        sampler.sample().unwrap();

        input.disconnect();
        let err = sampler.sample().unwrap_err();
        assert!(matches!(err, TeleopError::DeviceUnavailable(_)));
        assert_eq!(sampler.deadman_button(), Some(PadButton::X.index()));
    }
}
