//! # URScript Encoder
//!
//! Encodes motion commands as single-line URScript statements. The
//! controller interprets each line sent to the real-time port as a one-line
//! program, so every command must end in `\n`.
//!
//! Freedrive is the exception: it only lasts while a program runs, so it is
//! sent as a small `def` program that idles until the next command replaces
//! it.

use std::fmt::Write;

use super::protocol::Vector6;

/// Formats a vector as `[a,b,c,d,e,f]` with fixed precision.
fn vector(values: &Vector6) -> String {
    let mut out = String::with_capacity(6 * 10);
    out.push('[');
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        // Writing to a String cannot fail
        let _ = write!(out, "{:.6}", v);
    }
    out.push(']');
    out
}

/// Encode a Cartesian velocity command
///
/// # Arguments
///
/// * `velocity` - `[vx, vy, vz, wx, wy, wz]` in m/s and rad/s
/// * `acceleration` - tool acceleration in m/s²
/// * `time_window` - seconds the command stays active without a refresh
///
/// # Examples
///
/// ```
/// use arm_teleop::robot::encoder::encode_speedl;
///
/// let line = encode_speedl(&[0.03, 0.0, 0.0, 0.0, 0.0, 0.0], 0.2, 0.02);
/// assert_eq!(
///     line,
///     "speedl([0.030000,0.000000,0.000000,0.000000,0.000000,0.000000],a=0.200000,t=0.020000)\n"
/// );
/// ```
#[must_use]
pub fn encode_speedl(velocity: &Vector6, acceleration: f64, time_window: f64) -> String {
    format!(
        "speedl({},a={:.6},t={:.6})\n",
        vector(velocity),
        acceleration,
        time_window
    )
}

/// Encode a linear stop with the given deceleration (m/s²)
#[must_use]
pub fn encode_stopl(deceleration: f64) -> String {
    format!("stopl({:.6})\n", deceleration)
}

/// Encode a joint-space move to absolute joint positions
#[must_use]
pub fn encode_movej(joints: &Vector6, acceleration: f64, speed: f64) -> String {
    format!("movej({},a={:.6},v={:.6})\n", vector(joints), acceleration, speed)
}

/// Encode a linear move to an absolute pose
#[must_use]
pub fn encode_movel(pose: &Vector6, acceleration: f64, speed: f64) -> String {
    format!("movel(p{},a={:.6},v={:.6})\n", vector(pose), acceleration, speed)
}

/// Program holding the arm in freedrive until another command arrives
#[must_use]
pub fn encode_freedrive_on() -> String {
    "def teleop_freedrive():\n  freedrive_mode()\n  while True:\n    sync()\n  end\nend\n".to_string()
}

/// Ends freedrive; also replaces a running freedrive program
#[must_use]
pub fn encode_freedrive_off() -> String {
    "end_freedrive_mode()\n".to_string()
}
