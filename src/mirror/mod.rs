//! # State Mirror Module
//!
//! Publishes the arm's latest pose from the control loop to a consumer that
//! runs at its own rate, typically a visualiser or the geofence.
//!
//! This module handles:
//! - A single-writer snapshot channel ([`MirrorFeed`] / [`MirrorView`])
//! - The mirror task that checks trigger zones at `mirror.rate_hz`
//! - Forwarding zone entries to the application
//!
//! Publishing never blocks the tick: the channel keeps only the newest pose
//! and a slow reader simply skips intermediate ones.

pub mod geofence;

use serde::Serialize;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::robot::protocol::Vector6;
use geofence::{ZoneEvent, ZoneMonitor};

/// Arm state as mirrored to observers
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArmPose {
    /// Joint positions in radians
    pub joints: Vector6,
    /// TCP pose `[x, y, z, rx, ry, rz]`
    pub tcp: Vector6,
}

impl ArmPose {
    /// TCP position only
    #[must_use]
    pub fn position(&self) -> [f64; 3] {
        [self.tcp[0], self.tcp[1], self.tcp[2]]
    }
}

/// Writer half, owned by the session
#[derive(Debug)]
pub struct MirrorFeed {
    tx: watch::Sender<Option<ArmPose>>,
}

impl MirrorFeed {
    /// Replaces the mirrored pose. Succeeds whether or not anyone listens.
    pub fn publish(&self, pose: ArmPose) {
        self.tx.send_replace(Some(pose));
    }
}

/// Reader half
#[derive(Debug, Clone)]
pub struct MirrorView {
    rx: watch::Receiver<Option<ArmPose>>,
}

impl MirrorView {
    /// Newest published pose, if any
    #[must_use]
    pub fn latest(&self) -> Option<ArmPose> {
        *self.rx.borrow()
    }
}

/// Creates a connected feed and view.
#[must_use]
pub fn channel() -> (MirrorFeed, MirrorView) {
    let (tx, rx) = watch::channel(None);
    (MirrorFeed { tx }, MirrorView { rx })
}

/// Mirror task: checks the newest pose against the trigger zones at
/// `rate_hz` and forwards entries on `events`.
///
/// Returns when the feed is dropped or nobody receives events any more.
pub async fn run(
    mut view: MirrorView,
    mut monitor: ZoneMonitor,
    rate_hz: u32,
    events: mpsc::Sender<ZoneEvent>,
) {
    let period = Duration::from_secs_f64(1.0 / f64::from(rate_hz.max(1)));
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        "Mirror running at {} Hz with {} trigger zone(s)",
        rate_hz,
        monitor.zones().len()
    );

    loop {
        ticker.tick().await;

        match view.rx.has_changed() {
            Ok(false) => continue,
            Ok(true) => {}
            Err(_) => {
                debug!("Mirror feed closed");
                return;
            }
        }

        let Some(pose) = *view.rx.borrow_and_update() else {
            continue;
        };

        for event in monitor.update(pose.position()) {
            let ZoneEvent::Entered(name) = &event;
            info!("TCP entered zone {}", name);
            if events.send(event).await.is_err() {
                debug!("Zone event receiver dropped");
                return;
            }
        }
    }
}
