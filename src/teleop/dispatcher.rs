//! # Command Dispatcher
//!
//! Delivers one [`Command`] per tick to a [`RobotLink`].
//!
//! | Command | Link call |
//! |---------|-----------|
//! | `Stop` | `stop(deceleration)` |
//! | `Velocity` | `speed_l(v, acceleration, time_window)` |
//! | `StepCartesian` | `tcp_pose()`, then `move_to(Pose(pose + delta))` |
//! | `StepJoint` | `joint_positions()`, then `move_to(Joints(q + delta))` |
//! | `Noop`, `ModeChanged`, `GainChanged` | none |
//!
//! Every link call runs under `call_timeout_ms`; expiry is a failure like any
//! other. After a failure a stop is attempted straight away. Failures are
//! counted until a call succeeds, and reaching `max_consecutive_failures`
//! marks the outcome as a fault.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::command::Command;
use crate::config::Config;
use crate::error::{Result, TeleopError};
use crate::robot::protocol::Vector6;
use crate::robot::{MoveTarget, RobotLink, SafetyFlags};

/// Parameters for the link calls
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSettings {
    pub deceleration: f64,
    pub acceleration: f64,
    pub time_window: f64,
    pub move_speed: f64,
    pub move_acceleration: f64,
    pub move_async: bool,
    pub call_timeout: Duration,
    pub max_consecutive_failures: u32,
}

impl DispatchSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            deceleration: config.safety.stop_deceleration,
            acceleration: config.teleop.acceleration,
            time_window: config.teleop.time_window_s,
            move_speed: config.robot.move_speed,
            move_acceleration: config.robot.move_acceleration,
            move_async: config.robot.move_async,
            call_timeout: Duration::from_millis(config.safety.call_timeout_ms),
            max_consecutive_failures: config.safety.max_consecutive_failures,
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Result of dispatching one command
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Command needs no robot call
    Skipped,
    Delivered,
    Failed {
        error: String,
        /// Whether the follow-up stop went through
        stop_delivered: bool,
        /// Consecutive failures reached the limit
        faulted: bool,
    },
}

impl DispatchOutcome {
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered)
    }

    #[must_use]
    pub fn is_faulted(&self) -> bool {
        matches!(self, DispatchOutcome::Failed { faulted: true, .. })
    }
}

/// Runs `call` with a time limit; expiry maps to `TeleopError::Timeout`.
async fn within<T>(limit: Duration, call: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| TeleopError::Timeout(limit))?
}

fn offset(base: Vector6, delta: Vector6) -> Vector6 {
    let mut out = base;
    for (o, d) in out.iter_mut().zip(delta.iter()) {
        *o += d;
    }
    out
}

/// Owns the robot link for the session
pub struct Dispatcher<R> {
    link: R,
    settings: DispatchSettings,
    consecutive_failures: u32,
}

impl<R: RobotLink> Dispatcher<R> {
    #[must_use]
    pub fn new(link: R, settings: DispatchSettings) -> Self {
        Self {
            link,
            settings,
            consecutive_failures: 0,
        }
    }

    pub fn link_mut(&mut self) -> &mut R {
        &mut self.link
    }

    #[must_use]
    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Clears the failure count, e.g. when the operator re-enables.
    pub fn reset_failures(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Reads both safety flags under the call timeout.
    ///
    /// # Errors
    ///
    /// Propagates link errors and timeouts.
    pub async fn safety_flags(&mut self) -> Result<SafetyFlags> {
        let limit = self.settings.call_timeout;
        let protective_stop = within(limit, self.link.is_protective_stopped()).await?;
        let emergency_stop = within(limit, self.link.is_emergency_stopped()).await?;
        Ok(SafetyFlags {
            protective_stop,
            emergency_stop,
        })
    }

    /// Current joint positions under the call timeout.
    ///
    /// # Errors
    ///
    /// Propagates link errors and timeouts.
    pub async fn joint_positions(&mut self) -> Result<Vector6> {
        within(self.settings.call_timeout, self.link.joint_positions()).await
    }

    /// Current TCP pose under the call timeout.
    ///
    /// # Errors
    ///
    /// Propagates link errors and timeouts.
    pub async fn tcp_pose(&mut self) -> Result<Vector6> {
        within(self.settings.call_timeout, self.link.tcp_pose()).await
    }

    /// Stop outside the tick, e.g. on shutdown. Does not touch the failure count.
    ///
    /// # Errors
    ///
    /// Propagates link errors and timeouts.
    pub async fn stop(&mut self) -> Result<()> {
        within(self.settings.call_timeout, self.link.stop(self.settings.deceleration)).await
    }

    /// Switches freedrive under the call timeout.
    ///
    /// # Errors
    ///
    /// Propagates link errors and timeouts.
    pub async fn set_freedrive(&mut self, enabled: bool) -> Result<()> {
        within(self.settings.call_timeout, self.link.set_freedrive(enabled)).await
    }

    /// Delivers `command` to the link.
    pub async fn dispatch(&mut self, command: &Command) -> DispatchOutcome {
        let limit = self.settings.call_timeout;
        let s = &self.settings;

        let result = match *command {
            Command::Noop | Command::ModeChanged(_) | Command::GainChanged { .. } => {
                return DispatchOutcome::Skipped;
            }
            Command::Stop(_) => within(limit, self.link.stop(s.deceleration)).await,
            Command::Velocity(v) => {
                within(limit, self.link.speed_l(v, s.acceleration, s.time_window)).await
            }
            Command::StepCartesian(delta) => {
                let (speed, accel, asynchronous) = (s.move_speed, s.move_acceleration, s.move_async);
                match within(limit, self.link.tcp_pose()).await {
                    Ok(pose) => {
                        let target = MoveTarget::Pose(offset(pose, delta));
                        within(limit, self.link.move_to(target, speed, accel, asynchronous)).await
                    }
                    Err(e) => Err(e),
                }
            }
            Command::StepJoint(delta) => {
                let (speed, accel, asynchronous) = (s.move_speed, s.move_acceleration, s.move_async);
                match within(limit, self.link.joint_positions()).await {
                    Ok(q) => {
                        let target = MoveTarget::Joints(offset(q, delta));
                        within(limit, self.link.move_to(target, speed, accel, asynchronous)).await
                    }
                    Err(e) => Err(e),
                }
            }
        };

        match result {
            Ok(()) => {
                if self.consecutive_failures > 0 {
                    debug!("Robot link recovered after {} failure(s)", self.consecutive_failures);
                }
                self.consecutive_failures = 0;
                DispatchOutcome::Delivered
            }
            Err(e) => self.handle_failure(command, e).await,
        }
    }

    async fn handle_failure(&mut self, command: &Command, err: TeleopError) -> DispatchOutcome {
        self.consecutive_failures += 1;
        warn!(
            "{} dispatch failed ({} consecutive): {}",
            command.kind(),
            self.consecutive_failures,
            err
        );

        let stop_delivered = match self.stop().await {
            Ok(()) => true,
            Err(stop_err) => {
                error!("Stop after dispatch failure also failed: {}", stop_err);
                false
            }
        };

        let faulted = self.consecutive_failures >= self.settings.max_consecutive_failures;
        if faulted {
            error!(
                "Robot link failed {} times in a row, teleoperation faulted",
                self.consecutive_failures
            );
        }

        DispatchOutcome::Failed {
            error: err.to_string(),
            stop_delivered,
            faulted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot::sim::{SimCall, SimRobot};
    use crate::robot::MockRobotLink;
    use crate::teleop::command::StopReason;
    use crate::teleop::state::ControlMode;
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn settings() -> DispatchSettings {
        DispatchSettings {
            call_timeout: Duration::from_millis(20),
            ..DispatchSettings::default()
        }
    }

    // ==================== Routing Tests ====================

    #[tokio::test]
    async fn test_stop_calls_stop_with_deceleration() {
        let mut link = MockRobotLink::new();
        link.expect_stop().with(eq(10.0)).times(1).returning(|_| Ok(()));

        let mut d = Dispatcher::new(link, settings());
        let outcome = d.dispatch(&Command::Stop(StopReason::Idle)).await;
        assert_eq!(outcome, DispatchOutcome::Delivered);
    }

    #[tokio::test]
    async fn test_velocity_calls_speed_l() {
        let v = [0.03, 0.0, 0.0, 0.0, 0.0, 0.0];
        let mut link = MockRobotLink::new();
        link.expect_speed_l()
            .with(eq(v), eq(0.20), eq(0.02))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut d = Dispatcher::new(link, settings());
        assert!(d.dispatch(&Command::Velocity(v)).await.is_delivered());
    }

    #[tokio::test]
    async fn test_status_commands_make_no_call() {
        // Any call on this mock panics
        let link = MockRobotLink::new();
        let mut d = Dispatcher::new(link, settings());

        for cmd in [
            Command::Noop,
            Command::ModeChanged(ControlMode::Joint),
            Command::GainChanged { linear: 0.07, angular: 0.5 },
        ] {
            assert_eq!(d.dispatch(&cmd).await, DispatchOutcome::Skipped);
        }
    }

    #[tokio::test]
    async fn test_step_cartesian_offsets_current_pose() {
        let pose = [0.4, -0.1, 0.2, 3.14, 0.0, 0.0];
        let mut seq = Sequence::new();
        let mut link = MockRobotLink::new();
        link.expect_tcp_pose()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move || Ok(pose));
        link.expect_move_to()
            .withf(|target, speed, accel, asynchronous| {
                *target == MoveTarget::Pose([0.405, -0.1, 0.2, 3.14, 0.0, 0.0])
                    && *speed == 0.25
                    && *accel == 0.25
                    && *asynchronous
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(()));

        let mut d = Dispatcher::new(link, settings());
        let outcome = d
            .dispatch(&Command::StepCartesian([0.005, 0.0, 0.0, 0.0, 0.0, 0.0]))
            .await;
        assert!(outcome.is_delivered());
    }

    #[tokio::test]
    async fn test_step_joint_offsets_current_joints() {
        let sim = SimRobot::with_state([0.0, -1.0, 1.0, 0.0, 0.0, 0.0], [0.0; 6]);
        let mut d = Dispatcher::new(sim.clone(), settings());
        let dq = 2.0_f64.to_radians();

        let outcome = d.dispatch(&Command::StepJoint([dq, 0.0, 0.0, 0.0, 0.0, 0.0])).await;
        assert!(outcome.is_delivered());

        assert_eq!(sim.joints(), [dq, -1.0, 1.0, 0.0, 0.0, 0.0]);
        assert!(matches!(
            sim.calls().last(),
            Some(SimCall::MoveTo { target: MoveTarget::Joints(_), .. })
        ));
    }

    // ==================== Failure Tests ====================

    #[tokio::test]
    async fn test_failure_attempts_stop() {
        let mut link = MockRobotLink::new();
        link.expect_speed_l()
            .times(1)
            .returning(|_, _, _| Err(TeleopError::RobotLink("rejected".into())));
        link.expect_stop().times(1).returning(|_| Ok(()));

        let mut d = Dispatcher::new(link, settings());
        let outcome = d.dispatch(&Command::Velocity([0.1; 6])).await;

        match outcome {
            DispatchOutcome::Failed { stop_delivered, faulted, .. } => {
                assert!(stop_delivered);
                assert!(!faulted);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(d.consecutive_failures(), 1);
    }

    #[tokio::test]
    async fn test_second_consecutive_failure_faults() {
        let sim = SimRobot::new();
        sim.set_failing(true);
        let mut d = Dispatcher::new(sim.clone(), settings());

        let first = d.dispatch(&Command::Velocity([0.1; 6])).await;
        assert!(!first.is_faulted());
        let second = d.dispatch(&Command::Velocity([0.1; 6])).await;
        assert!(second.is_faulted());

        // Each failure was followed by a stop attempt
        let stops = sim
            .calls()
            .iter()
            .filter(|c| matches!(c, SimCall::Stop { .. }))
            .count();
        assert_eq!(stops, 2);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let sim = SimRobot::new();
        let mut d = Dispatcher::new(sim.clone(), settings());

        sim.fail_next(1);
        assert!(!d.dispatch(&Command::Velocity([0.1; 6])).await.is_delivered());
        assert_eq!(d.consecutive_failures(), 1);

        assert!(d.dispatch(&Command::Velocity([0.1; 6])).await.is_delivered());
        assert_eq!(d.consecutive_failures(), 0);

        sim.fail_next(1);
        assert!(!d.dispatch(&Command::Velocity([0.1; 6])).await.is_faulted());
    }

    #[tokio::test]
    async fn test_hanging_call_times_out() {
        let sim = SimRobot::new();
        sim.set_hanging(true);
        let mut d = Dispatcher::new(sim.clone(), settings());

        let started = std::time::Instant::now();
        let outcome = d.dispatch(&Command::Velocity([0.1; 6])).await;
        assert!(started.elapsed() < Duration::from_secs(1));

        match outcome {
            DispatchOutcome::Failed { error, stop_delivered, .. } => {
                assert!(error.contains("timed out"), "{}", error);
                assert!(!stop_delivered);
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_step_fails_when_pose_unavailable() {
        let mut link = MockRobotLink::new();
        link.expect_tcp_pose()
            .returning(|| Err(TeleopError::StateUnavailable("stale".into())));
        link.expect_move_to().never();
        link.expect_stop().times(1).returning(|_| Ok(()));

        let mut d = Dispatcher::new(link, settings());
        let outcome = d.dispatch(&Command::StepCartesian([0.005, 0.0, 0.0, 0.0, 0.0, 0.0])).await;
        assert!(matches!(outcome, DispatchOutcome::Failed { .. }));
    }

    // ==================== Query Tests ====================

    #[tokio::test]
    async fn test_safety_flags_read_both() {
        let mut link = MockRobotLink::new();
        link.expect_is_protective_stopped().returning(|| Ok(false));
        link.expect_is_emergency_stopped().returning(|| Ok(true));

        let mut d = Dispatcher::new(link, settings());
        let flags = d.safety_flags().await.unwrap();
        assert!(!flags.protective_stop);
        assert!(flags.emergency_stop);
    }

    #[tokio::test]
    async fn test_shutdown_stop_keeps_failure_count() {
        let sim = SimRobot::new();
        let mut d = Dispatcher::new(sim.clone(), settings());
        sim.fail_next(1);
        d.dispatch(&Command::Velocity([0.1; 6])).await;
        d.stop().await.unwrap();
        assert_eq!(d.consecutive_failures(), 1);
    }
}
