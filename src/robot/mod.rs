//! # Robot Module
//!
//! The robot side of teleoperation: the [`RobotLink`] trait the dispatcher
//! talks to, and two implementations.
//!
//! This module handles:
//! - Universal Robots real-time interface (URScript out, state packets in)
//! - An in-process simulated arm for dry runs and tests
//! - Safety flag queries (protective / emergency stop)

pub mod decoder;
pub mod encoder;
pub mod protocol;
pub mod sim;
pub mod ur;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use protocol::Vector6;

/// Safety flags read once per tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SafetyFlags {
    pub protective_stop: bool,
    pub emergency_stop: bool,
}

impl SafetyFlags {
    /// Either flag asserted
    #[must_use]
    pub fn any(&self) -> bool {
        self.protective_stop || self.emergency_stop
    }
}

/// Absolute target of a position move
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveTarget {
    /// Joint positions in radians (`movej`)
    Joints(Vector6),
    /// TCP pose (`movel`)
    Pose(Vector6),
}

/// Motion and state interface of a robot controller
///
/// Calls may take arbitrarily long on a misbehaving link; callers on the
/// tick path wrap every call in a timeout.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RobotLink: Send {
    /// Actual joint positions in radians
    async fn joint_positions(&mut self) -> Result<Vector6>;

    /// Actual TCP pose `[x, y, z, rx, ry, rz]`
    async fn tcp_pose(&mut self) -> Result<Vector6>;

    /// Cartesian velocity command, active for `time_window` seconds
    async fn speed_l(&mut self, velocity: Vector6, acceleration: f64, time_window: f64) -> Result<()>;

    /// Decelerate to standstill
    async fn stop(&mut self, deceleration: f64) -> Result<()>;

    async fn is_protective_stopped(&mut self) -> Result<bool>;

    async fn is_emergency_stopped(&mut self) -> Result<bool>;

    /// Position move to an absolute target
    async fn move_to(
        &mut self,
        target: MoveTarget,
        speed: f64,
        acceleration: f64,
        asynchronous: bool,
    ) -> Result<()>;

    /// Hand-guiding on or off
    async fn set_freedrive(&mut self, enabled: bool) -> Result<()>;
}
