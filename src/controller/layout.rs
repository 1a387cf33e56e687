//! # Gamepad Layouts
//!
//! Maps the logical buttons and axes the teleop pipeline uses onto evdev codes
//! for the supported pads.
//!
//! ## Button Indices
//!
//! | Index | Button | Xbox (xpad) | DualSense |
//! |-------|--------|-------------|-----------|
//! | 0 | A | BTN_SOUTH | BTN_SOUTH (×) |
//! | 1 | B | BTN_EAST | BTN_EAST (○) |
//! | 2 | X | BTN_NORTH | BTN_WEST (□) |
//! | 3 | Y | BTN_WEST | BTN_NORTH (△) |
//! | 4 | LB | BTN_TL | BTN_TL (L1) |
//! | 5 | RB | BTN_TR | BTN_TR (R1) |
//! | 6 | BACK | BTN_SELECT | BTN_SELECT (Share) |
//! | 7 | START | BTN_START | BTN_START (Options) |
//! | 8 | GUIDE | BTN_MODE | BTN_MODE (PS) |
//! | 9 | L3 | BTN_THUMBL | BTN_THUMBL |
//! | 10 | R3 | BTN_THUMBR | BTN_THUMBR |
//!
//! xpad reports X as `BTN_X` (an alias of `BTN_NORTH`) and Y as `BTN_Y`
//! (alias of `BTN_WEST`), which is why the face buttons differ per layout.

use evdev::{AbsoluteAxisType, Key};
use serde::{Deserialize, Serialize};

/// Sony vendor ID
pub const SONY_VENDOR_ID: u16 = 0x054c;

/// Number of logical buttons tracked per snapshot
pub const BUTTON_COUNT: usize = 11;

/// Logical gamepad buttons, in deadman-candidate index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PadButton {
    A,
    B,
    X,
    Y,
    Lb,
    Rb,
    Back,
    Start,
    Guide,
    L3,
    R3,
}

impl PadButton {
    /// All buttons, ordered by index.
    pub const ALL: [PadButton; BUTTON_COUNT] = [
        PadButton::A,
        PadButton::B,
        PadButton::X,
        PadButton::Y,
        PadButton::Lb,
        PadButton::Rb,
        PadButton::Back,
        PadButton::Start,
        PadButton::Guide,
        PadButton::L3,
        PadButton::R3,
    ];

    /// Index of this button in [`GamepadSnapshot::buttons`](super::sampler::GamepadSnapshot).
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Button at `index`, if any.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Layout selection as written in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutChoice {
    /// Pick from the device vendor ID
    #[default]
    Auto,
    Xbox,
    DualSense,
}

/// Absolute axes carrying each analog input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisMap {
    pub left_x: AbsoluteAxisType,
    pub left_y: AbsoluteAxisType,
    pub right_x: AbsoluteAxisType,
    pub right_y: AbsoluteAxisType,
    pub left_trigger: AbsoluteAxisType,
    pub right_trigger: AbsoluteAxisType,
    pub hat_x: AbsoluteAxisType,
    pub hat_y: AbsoluteAxisType,
}

/// Concrete pad layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadLayout {
    Xbox,
    DualSense,
}

impl PadLayout {
    /// Resolves a configured choice against the device vendor ID.
    ///
    /// # Examples
    ///
    /// ```
    /// use arm_teleop::controller::layout::{LayoutChoice, PadLayout, SONY_VENDOR_ID};
    ///
    /// assert_eq!(PadLayout::resolve(LayoutChoice::Auto, SONY_VENDOR_ID), PadLayout::DualSense);
    /// assert_eq!(PadLayout::resolve(LayoutChoice::Auto, 0x045e), PadLayout::Xbox);
    /// assert_eq!(PadLayout::resolve(LayoutChoice::Xbox, SONY_VENDOR_ID), PadLayout::Xbox);
    /// ```
    #[must_use]
    pub fn resolve(choice: LayoutChoice, vendor: u16) -> Self {
        match choice {
            LayoutChoice::Xbox => PadLayout::Xbox,
            LayoutChoice::DualSense => PadLayout::DualSense,
            LayoutChoice::Auto if vendor == SONY_VENDOR_ID => PadLayout::DualSense,
            LayoutChoice::Auto => PadLayout::Xbox,
        }
    }

    /// evdev key reporting `button` on this layout.
    #[must_use]
    pub fn key(self, button: PadButton) -> Key {
        match (self, button) {
            (_, PadButton::A) => Key::BTN_SOUTH,
            (_, PadButton::B) => Key::BTN_EAST,
            (PadLayout::Xbox, PadButton::X) => Key::BTN_NORTH,
            (PadLayout::Xbox, PadButton::Y) => Key::BTN_WEST,
            (PadLayout::DualSense, PadButton::X) => Key::BTN_WEST,
            (PadLayout::DualSense, PadButton::Y) => Key::BTN_NORTH,
            (_, PadButton::Lb) => Key::BTN_TL,
            (_, PadButton::Rb) => Key::BTN_TR,
            (_, PadButton::Back) => Key::BTN_SELECT,
            (_, PadButton::Start) => Key::BTN_START,
            (_, PadButton::Guide) => Key::BTN_MODE,
            (_, PadButton::L3) => Key::BTN_THUMBL,
            (_, PadButton::R3) => Key::BTN_THUMBR,
        }
    }

    /// Axis assignment for this layout.
    ///
    /// The DualSense reports its right stick on `ABS_Z`/`ABS_RZ` and the analog
    /// triggers on `ABS_RX`/`ABS_RY`; xpad does the opposite.
    #[must_use]
    pub fn axes(self) -> AxisMap {
        match self {
            PadLayout::Xbox => AxisMap {
                left_x: AbsoluteAxisType::ABS_X,
                left_y: AbsoluteAxisType::ABS_Y,
                right_x: AbsoluteAxisType::ABS_RX,
                right_y: AbsoluteAxisType::ABS_RY,
                left_trigger: AbsoluteAxisType::ABS_Z,
                right_trigger: AbsoluteAxisType::ABS_RZ,
                hat_x: AbsoluteAxisType::ABS_HAT0X,
                hat_y: AbsoluteAxisType::ABS_HAT0Y,
            },
            PadLayout::DualSense => AxisMap {
                left_x: AbsoluteAxisType::ABS_X,
                left_y: AbsoluteAxisType::ABS_Y,
                right_x: AbsoluteAxisType::ABS_Z,
                right_y: AbsoluteAxisType::ABS_RZ,
                left_trigger: AbsoluteAxisType::ABS_RX,
                right_trigger: AbsoluteAxisType::ABS_RY,
                hat_x: AbsoluteAxisType::ABS_HAT0X,
                hat_y: AbsoluteAxisType::ABS_HAT0Y,
            },
        }
    }
}
