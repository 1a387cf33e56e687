//! # Teleop Session
//!
//! Owns every stage of the pipeline for one gamepad and one robot, and runs
//! them in order once per tick:
//!
//! ```text
//! safety flags → sample → synthesize → supervise → dispatch → record → mirror
//! ```
//!
//! The session is driven from a single task. Observers never touch it
//! directly: they read [`SessionView`] from a `watch` channel, the mirror gets
//! poses through its feed, and telemetry through a bounded channel.

use serde::Serialize;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::command::{Command, CommandKind, StopReason};
use super::dispatcher::{DispatchOutcome, DispatchSettings, Dispatcher};
use super::state::{ControlMode, Gains};
use super::supervisor::{Supervisor, TeleopStatus};
use super::synthesizer::{Synthesizer, SynthesizerConfig};
use crate::config::Config;
use crate::controller::normalize::Deadzones;
use crate::controller::sampler::{InputSource, Sampler};
use crate::error::{Result, TeleopError};
use crate::mirror::{ArmPose, MirrorFeed};
use crate::robot::protocol::Vector6;
use crate::robot::{RobotLink, SafetyFlags};
use crate::telemetry::logger::TickRecord;
use crate::telemetry::Recorder;

/// Session state as seen by headless observers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub enabled: bool,
    pub status: TeleopStatus,
    pub mode: ControlMode,
    pub linear_gain: f64,
    pub angular_gain: f64,
    pub deadman_button: Option<usize>,
    pub last_command: CommandKind,
    pub last_stop_reason: Option<StopReason>,
    pub consecutive_failures: u32,
    pub freedrive: bool,
}

/// Everything that happened in one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Command after supervision, i.e. what went to the dispatcher
    pub command: Command,
    pub outcome: DispatchOutcome,
    pub status: TeleopStatus,
    pub mode: ControlMode,
    pub gains: Gains,
    pub deadman_button: Option<usize>,
    /// `None` when the flags could not be read
    pub flags: Option<SafetyFlags>,
    pub input_ok: bool,
}

/// One gamepad driving one robot
pub struct TeleopSession<S, R> {
    sampler: Sampler<S>,
    synthesizer: Synthesizer,
    supervisor: Supervisor,
    dispatcher: Dispatcher<R>,
    view_tx: watch::Sender<SessionView>,
    mirror: Option<MirrorFeed>,
    recorder: Option<Recorder>,
    input_ok: bool,
    flags_ok: bool,
    freedrive: bool,
    last_stop_reason: Option<StopReason>,
}

impl<S: InputSource, R: RobotLink> TeleopSession<S, R> {
    /// Builds a disabled session from configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use arm_teleop::config::Config;
    /// use arm_teleop::controller::gamepad::EvdevGamepad;
    /// use arm_teleop::robot::sim::SimRobot;
    /// use arm_teleop::teleop::session::TeleopSession;
    /// use arm_teleop::teleop::supervisor::TeleopStatus;
    ///
    /// let config = Config::default();
    /// let pad = EvdevGamepad::new(&config.controller);
    /// let session = TeleopSession::new(&config, pad, SimRobot::new());
    /// assert_eq!(session.status(), TeleopStatus::Disabled);
    /// ```
    #[must_use]
    pub fn new(config: &Config, source: S, link: R) -> Self {
        let c = &config.controller;
        let deadzones = Deadzones::new(c.deadzone_stick, c.deadzone_fine, c.deadzone_trigger);
        let gains = Gains::from_config(&config.teleop);

        let synthesizer = Synthesizer::new(SynthesizerConfig::from_config(&config.teleop, deadzones), gains);
        let supervisor = Supervisor::new(std::time::Duration::from_millis(config.safety.watchdog_timeout_ms));

        let view = SessionView {
            enabled: false,
            status: supervisor.status(),
            mode: synthesizer.mode(),
            linear_gain: gains.linear(),
            angular_gain: gains.angular(),
            deadman_button: None,
            last_command: CommandKind::Noop,
            last_stop_reason: None,
            consecutive_failures: 0,
            freedrive: false,
        };
        let (view_tx, _) = watch::channel(view);

        Self {
            sampler: Sampler::new(source, config.teleop.stop_button),
            synthesizer,
            supervisor,
            dispatcher: Dispatcher::new(link, DispatchSettings::from_config(config)),
            view_tx,
            mirror: None,
            recorder: None,
            input_ok: true,
            flags_ok: true,
            freedrive: false,
            last_stop_reason: None,
        }
    }

    /// Publishes the arm pose to `feed` after every tick.
    #[must_use]
    pub fn with_mirror(mut self, feed: MirrorFeed) -> Self {
        self.mirror = Some(feed);
        self
    }

    /// Offers every tick to `recorder`.
    #[must_use]
    pub fn with_recorder(mut self, recorder: Recorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Observer channel, updated after every tick and state change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view_tx.subscribe()
    }

    #[must_use]
    pub fn status(&self) -> TeleopStatus {
        self.supervisor.status()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.supervisor.is_enabled()
    }

    #[must_use]
    pub fn view(&self) -> SessionView {
        self.view_tx.borrow().clone()
    }

    /// Enables teleoperation.
    ///
    /// The deadman has to be pressed afresh: the first held tick after
    /// enabling is a cleared stop.
    ///
    /// # Errors
    ///
    /// Returns `Interlock` while a protective or emergency stop is reported,
    /// the safety state could not be read on the last tick, or freedrive is
    /// on.
    pub fn enable(&mut self) -> Result<()> {
        if self.freedrive {
            return Err(TeleopError::Interlock("freedrive is on".into()));
        }
        self.supervisor.enable()?;
        self.synthesizer.rearm();
        self.dispatcher.reset_failures();
        self.publish_view();
        Ok(())
    }

    /// Disables teleoperation; the next tick sends a stop.
    pub fn disable(&mut self) {
        self.supervisor.disable();
        self.publish_view();
    }

    #[must_use]
    pub fn is_freedrive(&self) -> bool {
        self.freedrive
    }

    /// Current joint positions, for the operator.
    ///
    /// # Errors
    ///
    /// Propagates link errors and timeouts.
    pub async fn read_joints(&mut self) -> Result<Vector6> {
        self.dispatcher.joint_positions().await
    }

    /// Switches hand-guiding. Only allowed while teleoperation is disabled,
    /// and enabling is refused until it is switched off again.
    ///
    /// # Errors
    ///
    /// Returns `Interlock` when turning freedrive on while enabled, otherwise
    /// propagates link errors and timeouts.
    pub async fn set_freedrive(&mut self, enabled: bool) -> Result<()> {
        if enabled && self.supervisor.is_enabled() {
            return Err(TeleopError::Interlock("disable teleoperation before freedrive".into()));
        }

        self.dispatcher.set_freedrive(enabled).await?;
        self.freedrive = enabled;
        info!("Freedrive {}", if enabled { "on" } else { "off" });
        self.publish_view();
        Ok(())
    }

    /// Runs the pipeline once.
    pub async fn tick(&mut self, now: Instant) -> TickReport {
        let flags = self.read_flags().await;
        self.supervisor.observe_flags(flags);

        let sampled = self.sampler.sample();
        let input_ok = sampled.is_ok();
        if input_ok != self.input_ok {
            match &sampled {
                Ok(_) => info!("Gamepad input restored"),
                Err(e) => warn!("Gamepad input lost: {}", e),
            }
            self.input_ok = input_ok;
        }

        let proposed = if self.supervisor.is_enabled() {
            match sampled {
                Ok(snapshot) => self.synthesizer.synthesize(&snapshot),
                Err(_) => {
                    self.synthesizer.rearm();
                    Command::Stop(StopReason::NoInput)
                }
            }
        } else {
            Command::Noop
        };

        let command = self.supervisor.gate(now, proposed, input_ok);
        let outcome = self.dispatcher.dispatch(&command).await;
        self.supervisor.record_dispatch(now, &command, &outcome);

        if let Some(reason) = command.stop_reason() {
            self.last_stop_reason = Some(reason);
        }
        debug!("Tick: {:?} -> {:?}", command, outcome);

        let report = TickReport {
            command,
            outcome,
            status: self.supervisor.status(),
            mode: self.synthesizer.mode(),
            gains: self.synthesizer.gains(),
            deadman_button: self.sampler.deadman_button(),
            flags,
            input_ok,
        };

        self.publish_view_for(&report.command);
        self.record(now, &report);
        self.mirror_pose().await;

        report
    }

    /// Disables and stops the robot. Called on every exit path.
    ///
    /// # Errors
    ///
    /// Returns the link error if the final stop could not be delivered.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.supervisor.disable();
        if self.freedrive {
            if let Err(e) = self.set_freedrive(false).await {
                warn!("Freedrive still on: {}", e);
            }
        }
        self.publish_view();
        let result = self.dispatcher.stop().await;
        match &result {
            Ok(()) => info!("Robot stopped"),
            Err(e) => warn!("Final stop failed: {}", e),
        }
        result
    }

    async fn read_flags(&mut self) -> Option<SafetyFlags> {
        match self.dispatcher.safety_flags().await {
            Ok(flags) => {
                if !self.flags_ok {
                    info!("Robot safety state readable again");
                    self.flags_ok = true;
                }
                Some(flags)
            }
            Err(e) => {
                if self.flags_ok {
                    warn!("Cannot read robot safety state: {}", e);
                    self.flags_ok = false;
                }
                None
            }
        }
    }

    fn publish_view(&self) {
        let last = self.view_tx.borrow().last_command;
        self.view_tx.send_replace(self.make_view(last));
    }

    fn publish_view_for(&self, command: &Command) {
        self.view_tx.send_replace(self.make_view(command.kind()));
    }

    fn make_view(&self, last_command: CommandKind) -> SessionView {
        let gains = self.synthesizer.gains();
        SessionView {
            enabled: self.supervisor.is_enabled(),
            status: self.supervisor.status(),
            mode: self.synthesizer.mode(),
            linear_gain: gains.linear(),
            angular_gain: gains.angular(),
            deadman_button: self.sampler.deadman_button(),
            last_command,
            last_stop_reason: self.last_stop_reason,
            consecutive_failures: self.dispatcher.consecutive_failures(),
            freedrive: self.freedrive,
        }
    }

    fn record(&mut self, now: Instant, report: &TickReport) {
        if let Some(recorder) = self.recorder.as_mut() {
            let record = TickRecord::new(
                &report.command,
                report.status,
                report.mode,
                (report.gains.linear(), report.gains.angular()),
                report.deadman_button,
                report.input_ok,
            );
            recorder.record(now, record);
        }
    }

    async fn mirror_pose(&mut self) {
        if self.mirror.is_none() {
            return;
        }

        let pose = match (self.dispatcher.joint_positions().await, self.dispatcher.tcp_pose().await) {
            (Ok(joints), Ok(tcp)) => ArmPose { joints, tcp },
            (Err(e), _) | (_, Err(e)) => {
                debug!("Mirror skipped: {}", e);
                return;
            }
        };

        if let Some(feed) = self.mirror.as_ref() {
            feed.publish(pose);
        }
    }
}
