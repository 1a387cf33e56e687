//! # Command Synthesizer
//!
//! Maps one [`GamepadSnapshot`] to exactly one [`Command`] per tick. The
//! checks run in a fixed order and the first match wins:
//!
//! | # | Condition | Command |
//! |---|-----------|---------|
//! | 1 | stop button held | `Stop(StopButton)` |
//! | 2 | deadman not held | `Stop(DeadmanReleased)` |
//! | 3 | deadman rising edge | `Stop(DeadmanEngaged)` |
//! | 4 | toggle button rising edge | `ModeChanged` |
//! | 5 | D-pad up/down edge | `GainChanged` |
//! | 6 | D-pad left/right edge | `StepCartesian` / `StepJoint` |
//! | 7 | otherwise | `Velocity`, or `Stop(Idle)` below epsilon |
//!
//! Edge detectors are fed at the top of every call, before any check, so an
//! edge that loses to a higher-priority rule is consumed rather than replayed
//! on a later tick.
//!
//! ## Continuous Mapping
//!
//! ```text
//! vx = lin * lx          wx = ang * -ry
//! vy = lin * -ly         wy = ang * rx
//! vz = lin * (rt - lt)   wz = ang * (RB - LB)
//! ```
//!
//! Sticks report +Y for *down*, hence the negations.

use tracing::{debug, info, warn};

use super::command::{Command, StopReason};
use super::state::{ControlMode, Gains, TeleopState};
use crate::config::TeleopConfig;
use crate::controller::layout::PadButton;
use crate::controller::normalize::Deadzones;
use crate::controller::sampler::GamepadSnapshot;

/// Static parameters of the mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizerConfig {
    pub deadzones: Deadzones,
    pub stop_button: PadButton,
    pub toggle_button: PadButton,
    pub gain_step: f64,
    pub step_linear_m: f64,
    pub step_angular_rad: f64,
    pub step_axis: usize,
    pub step_joint: usize,
    pub velocity_epsilon: f64,
}

impl SynthesizerConfig {
    #[must_use]
    pub fn from_config(teleop: &TeleopConfig, deadzones: Deadzones) -> Self {
        Self {
            deadzones,
            stop_button: teleop.stop_button,
            toggle_button: teleop.toggle_button,
            gain_step: teleop.gain_step,
            step_linear_m: teleop.step_linear_m,
            step_angular_rad: teleop.step_angular_deg.to_radians(),
            step_axis: teleop.step_axis,
            step_joint: teleop.step_joint,
            velocity_epsilon: teleop.velocity_epsilon,
        }
    }
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self::from_config(&TeleopConfig::default(), Deadzones::default())
    }
}

/// Stateful snapshot → command mapper.
#[derive(Debug, Clone)]
pub struct Synthesizer {
    config: SynthesizerConfig,
    state: TeleopState,
}

impl Synthesizer {
    #[must_use]
    pub fn new(config: SynthesizerConfig, gains: Gains) -> Self {
        Self {
            config,
            state: TeleopState::new(gains),
        }
    }

    #[must_use]
    pub fn state(&self) -> &TeleopState {
        &self.state
    }

    #[must_use]
    pub fn mode(&self) -> ControlMode {
        self.state.mode
    }

    #[must_use]
    pub fn gains(&self) -> Gains {
        self.state.gains
    }

    /// Forgets the deadman history so the next held tick is a cleared stop.
    ///
    /// Used when input disappears and when teleoperation is re-enabled.
    pub fn rearm(&mut self) {
        self.state.deadman.set(false);
    }

    /// Produces the command for this tick.
    ///
    /// # Examples
    ///
    /// ```
    /// use arm_teleop::controller::deadman::DeadmanLatch;
    /// use arm_teleop::controller::mapper::PadReading;
    /// use arm_teleop::controller::sampler::GamepadSnapshot;
    /// use arm_teleop::teleop::command::{Command, StopReason};
    /// use arm_teleop::teleop::synthesizer::Synthesizer;
    ///
    /// let mut synth = Synthesizer::default();
    /// let idle = GamepadSnapshot::from_reading(&PadReading::default(), &DeadmanLatch::new());
    ///
    /// assert_eq!(synth.synthesize(&idle), Command::Stop(StopReason::DeadmanReleased));
    /// ```
    pub fn synthesize(&mut self, snap: &GamepadSnapshot) -> Command {
        let deadman_edge = self.state.deadman.update(snap.deadman_active);
        let toggle_edge = self.state.toggle.update(snap.pressed(self.config.toggle_button));
        let hat_edge = self.state.hat.update(snap.hat);

        if snap.pressed(self.config.stop_button) {
            return Command::Stop(StopReason::StopButton);
        }

        if !snap.deadman_active {
            return Command::Stop(StopReason::DeadmanReleased);
        }

        if deadman_edge {
            debug!("Deadman engaged, clearing stale motion");
            return Command::Stop(StopReason::DeadmanEngaged);
        }

        if toggle_edge {
            self.state.mode = self.state.mode.toggled();
            info!("Control mode: {}", self.state.mode);
            return Command::ModeChanged(self.state.mode);
        }

        // Diagonals are ignored
        match hat_edge {
            Some((0, y @ (1 | -1))) => {
                let linear = self.state.gains.adjust_linear(f64::from(y) * self.config.gain_step);
                info!("Linear gain: {:.3} m/s", linear);
                return Command::GainChanged {
                    linear,
                    angular: self.state.gains.angular(),
                };
            }
            Some((x @ (1 | -1), 0)) => return self.step(f64::from(x)),
            _ => {}
        }

        self.continuous(snap)
    }

    fn step(&self, sign: f64) -> Command {
        let mut delta = [0.0; 6];
        match self.state.mode {
            ControlMode::Cartesian => {
                let axis = self.config.step_axis;
                // Orientation components step by angle
                let magnitude = if axis < 3 {
                    self.config.step_linear_m
                } else {
                    self.config.step_angular_rad
                };
                delta[axis] = sign * magnitude;
                Command::StepCartesian(delta)
            }
            ControlMode::Joint => {
                delta[self.config.step_joint] = sign * self.config.step_angular_rad;
                Command::StepJoint(delta)
            }
        }
    }

    fn continuous(&self, snap: &GamepadSnapshot) -> Command {
        let dz = &self.config.deadzones;
        let lx = dz.stick(snap.left_x);
        let ly = dz.stick(snap.left_y);
        let rx = dz.fine(snap.right_x);
        let ry = dz.fine(snap.right_y);
        let lt = dz.trigger(snap.left_trigger);
        let rt = dz.trigger(snap.right_trigger);

        let button = |b: PadButton| if snap.pressed(b) { 1.0 } else { 0.0 };
        let yaw = button(PadButton::Rb) - button(PadButton::Lb);

        let lin = self.state.gains.linear();
        let ang = self.state.gains.angular();
        let v = [
            lin * lx,
            lin * -ly,
            lin * (rt - lt),
            ang * -ry,
            ang * rx,
            ang * yaw,
        ];

        if v.iter().any(|c| !c.is_finite()) {
            warn!("Non-finite velocity {:?}, stopping", v);
            return Command::Stop(StopReason::Idle);
        }

        if v.iter().all(|c| c.abs() < self.config.velocity_epsilon) {
            return Command::Stop(StopReason::Idle);
        }

        Command::Velocity(v)
    }
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new(SynthesizerConfig::default(), Gains::default())
    }
}
