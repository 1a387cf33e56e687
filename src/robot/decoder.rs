//! # UR Real-Time Packet Decoder
//!
//! Splits the byte stream from the real-time port into packets and decodes
//! the fields listed in [`protocol`](super::protocol).

use bytes::{Buf, BytesMut};

use super::protocol::*;
use crate::error::{Result, TeleopError};

/// Takes one complete packet off the front of `buffer`, if available.
///
/// # Returns
///
/// * `Ok(Some(packet))` - a full packet, length prefix included
/// * `Ok(None)` - more bytes are needed
///
/// # Errors
///
/// Returns error if the length prefix is outside the accepted range. The
/// stream cannot be resynchronized after that; the caller should reconnect.
pub fn split_packet(buffer: &mut BytesMut) -> Result<Option<BytesMut>> {
    if buffer.len() < UR_LENGTH_PREFIX_SIZE {
        return Ok(None);
    }

    let length = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;

    if !(UR_LENGTH_PREFIX_SIZE..=UR_MAX_PACKET_SIZE).contains(&length) {
        return Err(TeleopError::RobotProtocol(format!(
            "Invalid packet length: {}",
            length
        )));
    }

    if buffer.len() < length {
        return Ok(None);
    }

    Ok(Some(buffer.split_to(length)))
}

/// Decode a complete real-time packet
///
/// # Arguments
///
/// * `packet` - Packet bytes including the 4-byte length prefix
///
/// # Returns
///
/// * `Result<RealtimeState>` - Decoded state
///
/// # Errors
///
/// Returns error if:
/// - The packet is shorter than [`UR_MIN_PACKET_SIZE`]
/// - The length prefix disagrees with the packet size
pub fn decode_state(packet: &[u8]) -> Result<RealtimeState> {
    if packet.len() < UR_MIN_PACKET_SIZE {
        return Err(TeleopError::RobotProtocol(format!(
            "Packet too short: {} bytes",
            packet.len()
        )));
    }

    let declared = u32::from_be_bytes([packet[0], packet[1], packet[2], packet[3]]) as usize;
    if declared != packet.len() {
        return Err(TeleopError::RobotProtocol(format!(
            "Length mismatch: header says {}, got {}",
            declared,
            packet.len()
        )));
    }

    let safety_code = read_f64(packet, UR_OFFSET_SAFETY_MODE);
    let safety_mode = if (0.0..=255.0).contains(&safety_code) && safety_code.fract() == 0.0 {
        SafetyMode::from_code(safety_code as u8)
    } else {
        SafetyMode::Unknown(u8::MAX)
    };

    Ok(RealtimeState {
        timestamp: read_f64(packet, UR_OFFSET_TIME),
        q_actual: read_vector6(packet, UR_OFFSET_Q_ACTUAL),
        tcp_pose: read_vector6(packet, UR_OFFSET_TCP_POSE),
        robot_mode: read_f64(packet, UR_OFFSET_ROBOT_MODE) as i32,
        safety_mode,
    })
}

fn read_f64(packet: &[u8], offset: usize) -> f64 {
    let mut field = &packet[offset..offset + 8];
    field.get_f64()
}

fn read_vector6(packet: &[u8], offset: usize) -> Vector6 {
    let mut field = &packet[offset..offset + 8 * UR_NUM_JOINTS];
    let mut out = [0.0; UR_NUM_JOINTS];
    for value in out.iter_mut() {
        *value = field.get_f64();
    }
    out
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Packet builder shared by decoder and link tests.

    use bytes::{BufMut, BytesMut};

    use crate::robot::protocol::*;

    /// Full-size packet (1116 bytes, current firmware)
    pub const PACKET_SIZE: usize = 1116;

    pub fn packet(q: Vector6, pose: Vector6, safety_mode: u8) -> BytesMut {
        let mut buf = BytesMut::zeroed(PACKET_SIZE);
        (&mut buf[0..4]).put_u32(PACKET_SIZE as u32);
        (&mut buf[UR_OFFSET_TIME..]).put_f64(12.5);
        let mut at = &mut buf[UR_OFFSET_Q_ACTUAL..];
        for v in q {
            at.put_f64(v);
        }
        let mut at = &mut buf[UR_OFFSET_TCP_POSE..];
        for v in pose {
            at.put_f64(v);
        }
        (&mut buf[UR_OFFSET_ROBOT_MODE..]).put_f64(7.0);
        (&mut buf[UR_OFFSET_SAFETY_MODE..]).put_f64(f64::from(safety_mode));
        buf
    }
}
