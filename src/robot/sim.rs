//! # Simulated Robot
//!
//! In-process stand-in for a robot controller. Cartesian velocity commands
//! are integrated over their time window, position moves jump straight to the
//! target. There is no kinematic model linking joints and pose.
//!
//! Clones share state, so a test can keep a handle to inject faults and
//! inspect the call log while the session owns the link. The log keeps only
//! the most recent calls.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::protocol::Vector6;
use super::{MoveTarget, RobotLink, SafetyFlags};
use crate::error::{Result, TeleopError};

/// UR5e-like home position
const HOME_JOINTS: Vector6 = [0.0, -1.5708, 1.5708, -1.5708, -1.5708, 0.0];
const HOME_POSE: Vector6 = [0.40, -0.10, 0.20, 3.1416, 0.0, 0.0];

/// Calls kept in the log
pub const CALL_LOG_CAPACITY: usize = 256;

/// One recorded link call
#[derive(Debug, Clone, PartialEq)]
pub enum SimCall {
    JointPositions,
    TcpPose,
    SpeedL {
        velocity: Vector6,
        acceleration: f64,
        time_window: f64,
    },
    Stop {
        deceleration: f64,
    },
    MoveTo {
        target: MoveTarget,
        speed: f64,
        acceleration: f64,
        asynchronous: bool,
    },
    Freedrive {
        enabled: bool,
    },
}

#[derive(Debug)]
struct SimState {
    joints: Vector6,
    pose: Vector6,
    flags: SafetyFlags,
    freedrive: bool,
    calls: VecDeque<SimCall>,
    fail_next: u32,
    failing: bool,
    hanging: bool,
}

/// Simulated arm with fault injection
#[derive(Debug, Clone)]
pub struct SimRobot {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimRobot {
    fn default() -> Self {
        Self::new()
    }
}

impl SimRobot {
    /// Arm at its home position with no faults
    #[must_use]
    pub fn new() -> Self {
        Self::with_state(HOME_JOINTS, HOME_POSE)
    }

    #[must_use]
    pub fn with_state(joints: Vector6, pose: Vector6) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                joints,
                pose,
                flags: SafetyFlags::default(),
                freedrive: false,
                calls: VecDeque::with_capacity(CALL_LOG_CAPACITY),
                fail_next: 0,
                failing: false,
                hanging: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_flags(&self, flags: SafetyFlags) {
        self.lock().flags = flags;
    }

    /// Makes the next `count` calls fail
    pub fn fail_next(&self, count: u32) {
        self.lock().fail_next = count;
    }

    /// Makes every call fail until cleared
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Makes every motion call hang until cleared
    pub fn set_hanging(&self, hanging: bool) {
        self.lock().hanging = hanging;
    }

    #[must_use]
    pub fn joints(&self) -> Vector6 {
        self.lock().joints
    }

    #[must_use]
    pub fn pose(&self) -> Vector6 {
        self.lock().pose
    }

    #[must_use]
    pub fn is_freedrive(&self) -> bool {
        self.lock().freedrive
    }

    /// Recorded calls, oldest first
    #[must_use]
    pub fn calls(&self) -> Vec<SimCall> {
        self.lock().calls.iter().cloned().collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Records the call and applies injected faults.
    async fn enter(&self, call: SimCall) -> Result<()> {
        let motion = !matches!(call, SimCall::JointPositions | SimCall::TcpPose);
        let hanging = {
            let mut state = self.lock();
            if state.calls.len() == CALL_LOG_CAPACITY {
                state.calls.pop_front();
            }
            state.calls.push_back(call);

            if state.failing {
                return Err(TeleopError::RobotLink("simulated link failure".into()));
            }
            if state.fail_next > 0 {
                state.fail_next -= 1;
                return Err(TeleopError::RobotLink("simulated link failure".into()));
            }
            state.hanging && motion
        };

        if hanging {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

#[async_trait]
impl RobotLink for SimRobot {
    async fn joint_positions(&mut self) -> Result<Vector6> {
        self.enter(SimCall::JointPositions).await?;
        Ok(self.joints())
    }

    async fn tcp_pose(&mut self) -> Result<Vector6> {
        self.enter(SimCall::TcpPose).await?;
        Ok(self.pose())
    }

    async fn speed_l(&mut self, velocity: Vector6, acceleration: f64, time_window: f64) -> Result<()> {
        self.enter(SimCall::SpeedL {
            velocity,
            acceleration,
            time_window,
        })
        .await?;

        let mut state = self.lock();
        for (p, v) in state.pose.iter_mut().zip(velocity.iter()) {
            *p += v * time_window;
        }
        Ok(())
    }

    async fn stop(&mut self, deceleration: f64) -> Result<()> {
        self.enter(SimCall::Stop { deceleration }).await?;
        debug!("Sim robot stopped");
        Ok(())
    }

    async fn is_protective_stopped(&mut self) -> Result<bool> {
        Ok(self.lock().flags.protective_stop)
    }

    async fn is_emergency_stopped(&mut self) -> Result<bool> {
        Ok(self.lock().flags.emergency_stop)
    }

    async fn move_to(
        &mut self,
        target: MoveTarget,
        speed: f64,
        acceleration: f64,
        asynchronous: bool,
    ) -> Result<()> {
        self.enter(SimCall::MoveTo {
            target,
            speed,
            acceleration,
            asynchronous,
        })
        .await?;

        let mut state = self.lock();
        match target {
            MoveTarget::Joints(q) => state.joints = q,
            MoveTarget::Pose(p) => state.pose = p,
        }
        Ok(())
    }

    async fn set_freedrive(&mut self, enabled: bool) -> Result<()> {
        self.enter(SimCall::Freedrive { enabled }).await?;
        self.lock().freedrive = enabled;
        Ok(())
    }
}
