//! # Safety Supervisor
//!
//! Sits between the synthesizer and the dispatcher and may replace the
//! proposed command with a stop. Checked in this order every tick:
//!
//! 1. A stop queued by [`Supervisor::disable`] goes out first, once.
//! 2. While disabled every tick is `Noop`.
//! 3. Protective or emergency stop reported (or unreadable): stop, disable,
//!    latch [`TeleopStatus::Interlock`].
//! 4. Watchdog expired: `Stop(Watchdog)`.
//! 5. Otherwise the proposed command passes.
//!
//! ## Watchdog
//!
//! Armed by every successfully dispatched `Velocity` and disarmed by any
//! other successful robot call. When armed and older than the timeout, the
//! tick is forced to a stop whatever the synthesizer produced.

use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::command::{Command, StopReason};
use super::dispatcher::DispatchOutcome;
use crate::error::{Result, TeleopError};
use crate::robot::SafetyFlags;

/// Externally visible teleoperation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TeleopStatus {
    /// Not enabled by the operator
    Disabled,
    /// Enabled, nothing moving
    Ready,
    /// Enabled and commanding motion
    Active,
    /// Enabled but the gamepad is gone
    NoInput,
    /// Disabled by a protective or emergency stop
    Interlock,
    /// Disabled after repeated robot call failures
    Fault,
}

impl fmt::Display for TeleopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TeleopStatus::Disabled => "disabled",
            TeleopStatus::Ready => "ready",
            TeleopStatus::Active => "active",
            TeleopStatus::NoInput => "no input",
            TeleopStatus::Interlock => "interlock",
            TeleopStatus::Fault => "fault",
        };
        f.write_str(name)
    }
}

/// Forces a stop when velocity commands stop arriving.
#[derive(Debug, Clone, Copy)]
pub struct Watchdog {
    timeout: Duration,
    last_velocity: Option<Instant>,
}

impl Watchdog {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_velocity: None,
        }
    }

    /// Records a delivered velocity command.
    pub fn feed(&mut self, now: Instant) {
        self.last_velocity = Some(now);
    }

    pub fn disarm(&mut self) {
        self.last_velocity = None;
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.last_velocity.is_some()
    }

    /// Armed and not fed for longer than the timeout.
    #[must_use]
    pub fn expired(&self, now: Instant) -> bool {
        self.last_velocity
            .map_or(false, |at| now.saturating_duration_since(at) > self.timeout)
    }

    #[must_use]
    pub fn last_velocity(&self) -> Option<Instant> {
        self.last_velocity
    }
}

/// Enable state, interlock latch and watchdog.
#[derive(Debug, Clone)]
pub struct Supervisor {
    enabled: bool,
    status: TeleopStatus,
    pending_stop: Option<StopReason>,
    /// `None` when the last read failed
    last_flags: Option<SafetyFlags>,
    watchdog: Watchdog,
}

impl Supervisor {
    #[must_use]
    pub fn new(watchdog_timeout: Duration) -> Self {
        Self {
            enabled: false,
            status: TeleopStatus::Disabled,
            pending_stop: None,
            last_flags: Some(SafetyFlags::default()),
            watchdog: Watchdog::new(watchdog_timeout),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn status(&self) -> TeleopStatus {
        self.status
    }

    #[must_use]
    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    /// Enables teleoperation.
    ///
    /// Idempotent while enabled.
    ///
    /// # Errors
    ///
    /// Returns `Interlock` while the last observed safety flags are still
    /// asserted or could not be read.
    pub fn enable(&mut self) -> Result<()> {
        match self.last_flags {
            Some(flags) if flags.any() => {
                return Err(TeleopError::Interlock(format!(
                    "protective stop: {}, emergency stop: {}",
                    flags.protective_stop, flags.emergency_stop
                )));
            }
            None => {
                return Err(TeleopError::Interlock("safety state unknown".into()));
            }
            Some(_) => {}
        }

        if !self.enabled {
            info!("Teleoperation enabled");
            self.enabled = true;
            self.status = TeleopStatus::Ready;
            self.pending_stop = None;
        }
        Ok(())
    }

    /// Disables teleoperation; the next tick sends one stop.
    ///
    /// Idempotent: disabling twice queues a single stop.
    pub fn disable(&mut self) {
        if self.enabled {
            info!("Teleoperation disabled");
            self.enabled = false;
            self.status = TeleopStatus::Disabled;
            self.pending_stop = Some(StopReason::Disabled);
        }
    }

    /// Records the flags read this tick (`None` if the read failed).
    pub fn observe_flags(&mut self, flags: Option<SafetyFlags>) {
        self.last_flags = flags;
    }

    /// Decides the command that goes to the dispatcher this tick.
    ///
    /// `proposed` is the synthesizer output; `input_ok` is false when the
    /// gamepad was unavailable.
    pub fn gate(&mut self, now: Instant, proposed: Command, input_ok: bool) -> Command {
        if let Some(reason) = self.pending_stop.take() {
            return Command::Stop(reason);
        }

        if !self.enabled {
            return Command::Noop;
        }

        let tripped = match self.last_flags {
            Some(flags) if flags.any() => {
                warn!(
                    "Safety interlock: protective stop {}, emergency stop {}",
                    flags.protective_stop, flags.emergency_stop
                );
                true
            }
            None => {
                warn!("Safety interlock: robot safety state unreadable");
                true
            }
            Some(_) => false,
        };

        if tripped {
            self.enabled = false;
            self.status = TeleopStatus::Interlock;
            return Command::Stop(StopReason::Interlock);
        }

        if self.watchdog.expired(now) {
            warn!(
                "Watchdog: no velocity dispatch for over {:?}",
                self.watchdog.timeout
            );
            self.status = TeleopStatus::Ready;
            return Command::Stop(StopReason::Watchdog);
        }

        self.status = if !input_ok {
            TeleopStatus::NoInput
        } else if matches!(
            proposed,
            Command::Velocity(_) | Command::StepCartesian(_) | Command::StepJoint(_)
        ) {
            TeleopStatus::Active
        } else {
            TeleopStatus::Ready
        };

        proposed
    }

    /// Feeds the dispatch result back: watchdog bookkeeping and faults.
    pub fn record_dispatch(&mut self, now: Instant, command: &Command, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Delivered => {
                if matches!(command, Command::Velocity(_)) {
                    self.watchdog.feed(now);
                } else {
                    self.watchdog.disarm();
                }
            }
            DispatchOutcome::Failed {
                stop_delivered,
                faulted,
                ..
            } => {
                if *stop_delivered {
                    self.watchdog.disarm();
                }
                if *faulted {
                    self.fault(*stop_delivered);
                }
            }
            DispatchOutcome::Skipped => {}
        }
    }

    /// Disables after repeated dispatch failures.
    ///
    /// The failing dispatch already tried to stop; one more stop is queued
    /// only if that attempt did not go through.
    pub fn fault(&mut self, stop_delivered: bool) {
        self.enabled = false;
        self.status = TeleopStatus::Fault;
        self.pending_stop = (!stop_delivered).then_some(StopReason::DispatchFailure);
    }
}
