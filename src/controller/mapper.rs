//! # Controller Input Mapper Module
//!
//! Converts the raw evdev key and absolute-axis state of a pad into a
//! [`PadReading`]: buttons by logical index, sticks normalized to -1.0..1.0,
//! triggers in their bipolar form and the D-pad as a `(x, y)` pair.
//!
//! ## Axis Normalization
//!
//! Each axis is scaled from the `minimum..maximum` range the device reports:
//!
//! ```text
//! normalized = 2 * (value - minimum) / (maximum - minimum) - 1
//! ```
//!
//! so an Xbox stick (-32768..32767) and a DualSense stick (0..255) end up in
//! the same range. Triggers go through the same formula, which puts them at
//! -1.0 when released.
//!
//! ## D-Pad
//!
//! evdev reports `ABS_HAT0Y = -1` for *up*. [`PadReading::hat`] flips that so
//! up is `+1`, matching how gain-up/gain-down is described everywhere else.
//!
//! ## Usage
//!
//! ```
//! use arm_teleop::controller::layout::{PadButton, PadLayout};
//! use arm_teleop::controller::mapper::{map_reading, AxisRange};
//! use evdev::{AbsoluteAxisType, Key};
//!
//! let reading = map_reading(
//!     PadLayout::Xbox,
//!     |key| key == Key::BTN_SOUTH,
//!     |axis| (axis == AbsoluteAxisType::ABS_X).then(|| AxisRange::new(32767, -32768, 32767)),
//! );
//!
//! assert!(reading.pressed(PadButton::A));
//! assert!((reading.left_x - 1.0).abs() < 1e-9);
//! ```

use evdev::{AbsoluteAxisType, Key};

use super::layout::{PadButton, PadLayout, BUTTON_COUNT};

/// Trigger reading when released (bipolar convention).
pub const TRIGGER_RELEASED: f64 = -1.0;

/// One absolute axis sample together with the range the device reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    pub value: i32,
    pub minimum: i32,
    pub maximum: i32,
}

impl AxisRange {
    #[must_use]
    pub fn new(value: i32, minimum: i32, maximum: i32) -> Self {
        Self { value, minimum, maximum }
    }

    /// Scales the value to -1.0..1.0. A degenerate range reads as centered.
    #[must_use]
    pub fn normalized(&self) -> f64 {
        if self.maximum <= self.minimum {
            return 0.0;
        }

        let span = f64::from(self.maximum) - f64::from(self.minimum);
        let offset = f64::from(self.value) - f64::from(self.minimum);
        (2.0 * offset / span - 1.0).clamp(-1.0, 1.0)
    }
}

/// Device state for one tick, before deadman resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct PadReading {
    /// Pressed state per [`PadButton`] index.
    pub buttons: [bool; BUTTON_COUNT],
    /// Left stick X, -1.0 = full left.
    pub left_x: f64,
    /// Left stick Y, -1.0 = full up.
    pub left_y: f64,
    /// Right stick X, -1.0 = full left.
    pub right_x: f64,
    /// Right stick Y, -1.0 = full up.
    pub right_y: f64,
    /// Left trigger, bipolar (-1.0 released).
    pub left_trigger: f64,
    /// Right trigger, bipolar (-1.0 released).
    pub right_trigger: f64,
    /// D-pad, x: +1 right, y: +1 up.
    pub hat: (i32, i32),
}

impl Default for PadReading {
    /// Sticks centered, triggers and buttons released.
    fn default() -> Self {
        Self {
            buttons: [false; BUTTON_COUNT],
            left_x: 0.0,
            left_y: 0.0,
            right_x: 0.0,
            right_y: 0.0,
            left_trigger: TRIGGER_RELEASED,
            right_trigger: TRIGGER_RELEASED,
            hat: (0, 0),
        }
    }
}

impl PadReading {
    /// Whether `button` is held.
    #[must_use]
    pub fn pressed(&self, button: PadButton) -> bool {
        self.buttons[button.index()]
    }

    /// Lowest pressed button index, if any.
    #[must_use]
    pub fn first_pressed(&self) -> Option<usize> {
        self.buttons.iter().position(|&b| b)
    }

    /// Builder-style helper for constructing readings in tests and demos.
    #[must_use]
    pub fn with_button(mut self, button: PadButton, pressed: bool) -> Self {
        self.buttons[button.index()] = pressed;
        self
    }
}

/// Builds a [`PadReading`] from key and axis lookups.
///
/// `pressed` answers whether an evdev key is down; `axis` returns the sample
/// for an absolute axis, or `None` when the device lacks it. Missing sticks
/// read as centered, missing triggers as released.
pub fn map_reading<P, A>(layout: PadLayout, pressed: P, axis: A) -> PadReading
where
    P: Fn(Key) -> bool,
    A: Fn(AbsoluteAxisType) -> Option<AxisRange>,
{
    let mut buttons = [false; BUTTON_COUNT];
    for button in PadButton::ALL {
        buttons[button.index()] = pressed(layout.key(button));
    }

    let map = layout.axes();
    let stick = |code: AbsoluteAxisType| axis(code).map_or(0.0, |range: AxisRange| range.normalized());
    let trigger = |code: AbsoluteAxisType| axis(code).map_or(TRIGGER_RELEASED, |range: AxisRange| range.normalized());
    let hat = |code: AbsoluteAxisType| axis(code).map_or(0, |range: AxisRange| range.value.signum());

    PadReading {
        buttons,
        left_x: stick(map.left_x),
        left_y: stick(map.left_y),
        right_x: stick(map.right_x),
        right_y: stick(map.right_y),
        left_trigger: trigger(map.left_trigger),
        right_trigger: trigger(map.right_trigger),
        hat: (hat(map.hat_x), -hat(map.hat_y)),
    }
}
