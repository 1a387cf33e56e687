//! # Deadman & Edge Detection
//!
//! The deadman button is not configured: the first button the operator
//! presses becomes the deadman for the rest of the session. Once bound it
//! never moves, even if another button is pressed first on a later tick.
//!
//! Edge detectors fire on the inactive → active transition only and must be
//! fed every tick, fired or not, so a held input never repeats and a quick
//! press between two ticks is not counted twice.

use tracing::info;

use super::layout::PadButton;

/// Sticky deadman binding.
#[derive(Debug, Clone, Default)]
pub struct DeadmanLatch {
    button: Option<usize>,
}

impl DeadmanLatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolved deadman button index, if bound yet.
    #[must_use]
    pub fn bound(&self) -> Option<usize> {
        self.button
    }

    /// Binds the lowest pressed button if nothing is bound yet.
    ///
    /// Returns the binding after the call.
    pub fn resolve(&mut self, buttons: &[bool]) -> Option<usize> {
        if self.button.is_none() {
            if let Some(index) = buttons.iter().position(|&b| b) {
                self.button = Some(index);
                match PadButton::from_index(index) {
                    Some(name) => info!("Deadman bound to button {} ({:?})", index, name),
                    None => info!("Deadman bound to button {}", index),
                }
            }
        }
        self.button
    }

    /// Current state of the bound button; always false while unbound.
    #[must_use]
    pub fn is_active(&self, buttons: &[bool]) -> bool {
        self.button
            .and_then(|index| buttons.get(index).copied())
            .unwrap_or(false)
    }
}

/// Rising-edge detector for a digital input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RisingEdge {
    previous: bool,
}

impl RisingEdge {
    /// Feeds the current value; true only on false → true.
    pub fn update(&mut self, current: bool) -> bool {
        let fired = current && !self.previous;
        self.previous = current;
        fired
    }

    #[must_use]
    pub fn previous(&self) -> bool {
        self.previous
    }

    /// Forces the remembered value, e.g. to re-arm after a disable.
    pub fn set(&mut self, value: bool) {
        self.previous = value;
    }
}

/// Rising-edge detector for the D-pad.
///
/// Fires when the pad leaves neutral. Sliding from one direction to another
/// without passing through neutral does not fire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HatEdge {
    previous: (i32, i32),
}

impl HatEdge {
    /// Feeds the current hat value; returns it when the edge fires.
    pub fn update(&mut self, current: (i32, i32)) -> Option<(i32, i32)> {
        let fired = self.previous == (0, 0) && current != (0, 0);
        self.previous = current;
        fired.then_some(current)
    }

    #[must_use]
    pub fn previous(&self) -> (i32, i32) {
        self.previous
    }
}
