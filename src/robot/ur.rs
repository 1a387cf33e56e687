//! # Universal Robots Link
//!
//! [`RobotLink`] over the UR real-time interface. A single TCP connection
//! carries both directions:
//!
//! - **In**: the controller streams state packets continuously. A reader task
//!   decodes them and publishes the latest [`RealtimeState`] on a `watch`
//!   channel, so queries never wait on the socket.
//! - **Out**: commands are queued as complete URScript lines to a writer
//!   task. A call only enqueues, so a timed-out call never leaves half a
//!   line on the socket. When the writer stalls and the queue fills, calls
//!   fail instead of waiting.
//!
//! State older than `state_timeout_ms` counts as unavailable. When the
//! connection drops the reader task ends, state goes stale and every call
//! fails until a new link is created.

use async_trait::async_trait;
use bytes::BytesMut;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::decoder::{decode_state, split_packet};
use super::encoder::{
    encode_freedrive_off, encode_freedrive_on, encode_movej, encode_movel, encode_speedl, encode_stopl,
};
use super::protocol::{RealtimeState, Vector6};
use super::{MoveTarget, RobotLink};
use crate::config::RobotConfig;
use crate::error::{Result, TeleopError};

/// Socket read size
const READ_CHUNK: usize = 4096;

/// URScript lines waiting for the writer
const WRITE_QUEUE: usize = 8;

/// Decoded state with its arrival time
#[derive(Debug, Clone, Copy)]
pub struct StampedState {
    pub received_at: Instant,
    pub state: RealtimeState,
}

/// Connection to a UR controller
pub struct UrLink {
    lines: mpsc::Sender<String>,
    state_rx: watch::Receiver<Option<StampedState>>,
    reader: JoinHandle<()>,
    state_timeout: Duration,
    peer: String,
}

impl UrLink {
    /// Connect to the controller's real-time port
    ///
    /// # Errors
    ///
    /// Returns `RobotLink` if the connection fails, `Timeout` if it does not
    /// complete within `connect_timeout_ms`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use arm_teleop::config::RobotConfig;
    /// use arm_teleop::robot::ur::UrLink;
    ///
    /// # async fn demo() -> arm_teleop::error::Result<()> {
    /// let link = UrLink::connect(&RobotConfig::default()).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(config: &RobotConfig) -> Result<Self> {
        let peer = format!("{}:{}", config.host, config.port);
        let connect_timeout = Duration::from_millis(config.connect_timeout_ms);

        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(&peer))
            .await
            .map_err(|_| TeleopError::Timeout(connect_timeout))?
            .map_err(|e| TeleopError::RobotLink(format!("Failed to connect to {}: {}", peer, e)))?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!("TCP_NODELAY not set: {}", e);
        }

        info!("Connected to robot at {}", peer);
        Ok(Self::from_stream(
            stream,
            Duration::from_millis(config.state_timeout_ms),
            peer,
        ))
    }

    fn from_stream(stream: TcpStream, state_timeout: Duration, peer: String) -> Self {
        let (read_half, write_half) = stream.into_split();
        let (state_tx, state_rx) = watch::channel(None);
        let reader = tokio::spawn(read_loop(read_half, state_tx));

        let (lines, queue) = mpsc::channel(WRITE_QUEUE);
        tokio::spawn(write_loop(write_half, queue, peer.clone()));

        Self {
            lines,
            state_rx,
            reader,
            state_timeout,
            peer,
        }
    }

    /// Subscribe to decoded state as it arrives
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<StampedState>> {
        self.state_rx.clone()
    }

    /// Latest state, if fresh enough
    fn fresh_state(&self) -> Result<RealtimeState> {
        let stamped = (*self.state_rx.borrow())
            .ok_or_else(|| TeleopError::StateUnavailable(format!("no state received from {}", self.peer)))?;

        let age = stamped.received_at.elapsed();
        if age > self.state_timeout {
            return Err(TeleopError::StateUnavailable(format!(
                "state from {} is {} ms old",
                self.peer,
                age.as_millis()
            )));
        }

        Ok(stamped.state)
    }

    fn send(&self, script: String) -> Result<()> {
        debug!("URScript: {}", script.trim_end());
        self.lines.try_send(script).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                TeleopError::RobotLink(format!("Write queue to {} is full", self.peer))
            }
            mpsc::error::TrySendError::Closed(_) => {
                TeleopError::RobotLink(format!("Connection to {} is closed", self.peer))
            }
        })
    }
}

impl Drop for UrLink {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Writes whole lines until the link is dropped or a write fails.
///
/// Lines already queued are still written after the link is dropped.
async fn write_loop(mut writer: OwnedWriteHalf, mut queue: mpsc::Receiver<String>, peer: String) {
    while let Some(script) = queue.recv().await {
        if let Err(e) = writer.write_all(script.as_bytes()).await {
            warn!("Write to {} failed: {}", peer, e);
            return;
        }
    }
    debug!("Command writer for {} finished", peer);
}

async fn read_loop(mut reader: OwnedReadHalf, state_tx: watch::Sender<Option<StampedState>>) {
    let mut buffer = BytesMut::with_capacity(READ_CHUNK * 2);

    loop {
        match reader.read_buf(&mut buffer).await {
            Ok(0) => {
                warn!("Robot closed the real-time connection");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Real-time read failed: {}", e);
                return;
            }
        }

        loop {
            match split_packet(&mut buffer) {
                Ok(Some(packet)) => match decode_state(&packet) {
                    Ok(state) => {
                        // Fails only once every receiver is gone
                        if state_tx
                            .send(Some(StampedState {
                                received_at: Instant::now(),
                                state,
                            }))
                            .is_err()
                        {
                            return;
                        }
                    }
                    Err(e) => debug!("Skipping packet: {}", e),
                },
                Ok(None) => break,
                Err(e) => {
                    warn!("Real-time stream out of sync: {}", e);
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl RobotLink for UrLink {
    async fn joint_positions(&mut self) -> Result<Vector6> {
        Ok(self.fresh_state()?.q_actual)
    }

    async fn tcp_pose(&mut self) -> Result<Vector6> {
        Ok(self.fresh_state()?.tcp_pose)
    }

    async fn speed_l(&mut self, velocity: Vector6, acceleration: f64, time_window: f64) -> Result<()> {
        self.send(encode_speedl(&velocity, acceleration, time_window))
    }

    async fn stop(&mut self, deceleration: f64) -> Result<()> {
        self.send(encode_stopl(deceleration))
    }

    /// Any mode that is neither safe nor an emergency stop reads as a
    /// protective stop, so faults and unknown codes lock teleop out.
    async fn is_protective_stopped(&mut self) -> Result<bool> {
        let mode = self.fresh_state()?.safety_mode;
        Ok(!mode.is_safe() && !mode.is_emergency_stop())
    }

    async fn is_emergency_stopped(&mut self) -> Result<bool> {
        Ok(self.fresh_state()?.safety_mode.is_emergency_stop())
    }

    async fn move_to(
        &mut self,
        target: MoveTarget,
        speed: f64,
        acceleration: f64,
        asynchronous: bool,
    ) -> Result<()> {
        let script = match target {
            MoveTarget::Joints(q) => encode_movej(&q, acceleration, speed),
            MoveTarget::Pose(p) => encode_movel(&p, acceleration, speed),
        };
        self.send(script)?;

        if !asynchronous {
            // The real-time port gives no completion signal
            debug!("Blocking move requested; returning after send");
        }
        Ok(())
    }

    async fn set_freedrive(&mut self, enabled: bool) -> Result<()> {
        if enabled {
            self.send(encode_freedrive_on())
        } else {
            self.send(encode_freedrive_off())
        }
    }
}
