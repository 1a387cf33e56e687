//! # UR Real-Time Protocol Constants and Types
//!
//! Layout of the state packets a Universal Robots controller streams on its
//! real-time port, and the decoded state they carry.
//!
//! ## Packet Layout
//!
//! Every packet starts with a 4-byte big-endian total length (including the
//! length field itself) followed by big-endian `f64` fields at fixed offsets.
//! Only the fields the teleop pipeline needs are decoded:
//!
//! | Offset | Field |
//! |--------|-------|
//! | 0 | message size (`u32`) |
//! | 4 | controller time (`f64`, s) |
//! | 252 | q actual (6 × `f64`, rad) |
//! | 444 | tool vector actual (6 × `f64`, m / axis-angle rad) |
//! | 756 | robot mode (`f64`) |
//! | 812 | safety mode (`f64`) |

use serde::Serialize;

/// Default real-time interface port (500 Hz on e-Series)
pub const UR_REALTIME_PORT: u16 = 30003;

/// Size of the length prefix
pub const UR_LENGTH_PREFIX_SIZE: usize = 4;

/// Byte offset of the controller timestamp
pub const UR_OFFSET_TIME: usize = 4;

/// Byte offset of the actual joint positions
pub const UR_OFFSET_Q_ACTUAL: usize = 252;

/// Byte offset of the actual TCP pose
pub const UR_OFFSET_TCP_POSE: usize = 444;

/// Byte offset of the robot mode
pub const UR_OFFSET_ROBOT_MODE: usize = 756;

/// Byte offset of the safety mode
pub const UR_OFFSET_SAFETY_MODE: usize = 812;

/// Smallest packet carrying every decoded field
pub const UR_MIN_PACKET_SIZE: usize = UR_OFFSET_SAFETY_MODE + 8;

/// Upper bound accepted for the length prefix (current firmware sends 1116)
pub const UR_MAX_PACKET_SIZE: usize = 4096;

/// Number of joints
pub const UR_NUM_JOINTS: usize = 6;

/// Six-element vector (joints or pose)
pub type Vector6 = [f64; UR_NUM_JOINTS];

/// Controller safety mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyMode {
    Normal,
    Reduced,
    ProtectiveStop,
    Recovery,
    SafeguardStop,
    SystemEmergencyStop,
    RobotEmergencyStop,
    Violation,
    Fault,
    ValidateJointId,
    Undefined,
    AutomaticModeSafeguardStop,
    SystemThreePositionEnablingStop,
    /// Code not known to this decoder
    Unknown(u8),
}

impl SafetyMode {
    /// Maps the numeric code reported by the controller.
    ///
    /// # Examples
    ///
    /// ```
    /// use arm_teleop::robot::protocol::SafetyMode;
    ///
    /// assert_eq!(SafetyMode::from_code(3), SafetyMode::ProtectiveStop);
    /// assert!(SafetyMode::from_code(3).is_protective_stop());
    /// assert!(SafetyMode::from_code(7).is_emergency_stop());
    /// ```
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => SafetyMode::Normal,
            2 => SafetyMode::Reduced,
            3 => SafetyMode::ProtectiveStop,
            4 => SafetyMode::Recovery,
            5 => SafetyMode::SafeguardStop,
            6 => SafetyMode::SystemEmergencyStop,
            7 => SafetyMode::RobotEmergencyStop,
            8 => SafetyMode::Violation,
            9 => SafetyMode::Fault,
            10 => SafetyMode::ValidateJointId,
            11 => SafetyMode::Undefined,
            12 => SafetyMode::AutomaticModeSafeguardStop,
            13 => SafetyMode::SystemThreePositionEnablingStop,
            other => SafetyMode::Unknown(other),
        }
    }

    /// Protective stop and the safeguard-stop variants.
    #[must_use]
    pub fn is_protective_stop(self) -> bool {
        matches!(
            self,
            SafetyMode::ProtectiveStop
                | SafetyMode::SafeguardStop
                | SafetyMode::AutomaticModeSafeguardStop
                | SafetyMode::SystemThreePositionEnablingStop
        )
    }

    #[must_use]
    pub fn is_emergency_stop(self) -> bool {
        matches!(
            self,
            SafetyMode::SystemEmergencyStop | SafetyMode::RobotEmergencyStop
        )
    }

    /// Modes in which teleoperation may command motion.
    ///
    /// Everything else, unknown codes included, locks teleoperation out.
    #[must_use]
    pub fn is_safe(self) -> bool {
        matches!(
            self,
            SafetyMode::Normal | SafetyMode::Reduced | SafetyMode::Recovery
        )
    }
}

/// Decoded real-time state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RealtimeState {
    /// Controller uptime in seconds
    pub timestamp: f64,

    /// Actual joint positions in radians
    pub q_actual: Vector6,

    /// Actual TCP pose `[x, y, z, rx, ry, rz]`
    pub tcp_pose: Vector6,

    /// Raw robot mode code
    pub robot_mode: i32,

    pub safety_mode: SafetyMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_packet_covers_safety_mode() {
        assert_eq!(UR_MIN_PACKET_SIZE, 820);
        assert!(UR_OFFSET_TCP_POSE + 6 * 8 <= UR_OFFSET_ROBOT_MODE);
        assert!(UR_OFFSET_Q_ACTUAL + 6 * 8 <= UR_OFFSET_TCP_POSE);
    }

    #[test]
    fn test_protective_codes() {
        for code in [3, 5, 12, 13] {
            let mode = SafetyMode::from_code(code);
            assert!(mode.is_protective_stop(), "code {}", code);
            assert!(!mode.is_emergency_stop(), "code {}", code);
        }
    }

    #[test]
    fn test_emergency_codes() {
        for code in [6, 7] {
            let mode = SafetyMode::from_code(code);
            assert!(mode.is_emergency_stop(), "code {}", code);
            assert!(!mode.is_protective_stop(), "code {}", code);
        }
    }

    #[test]
    fn test_normal_and_reduced_are_clear() {
        for code in [1, 2, 4] {
            let mode = SafetyMode::from_code(code);
            assert!(mode.is_safe(), "code {}", code);
            assert!(!mode.is_protective_stop());
            assert!(!mode.is_emergency_stop());
        }
    }

    #[test]
    fn test_fault_violation_and_unknown_are_not_safe() {
        for code in [0, 3, 5, 6, 7, 8, 9, 10, 11, 12, 13, 42, 255] {
            assert!(!SafetyMode::from_code(code).is_safe(), "code {}", code);
        }
    }

    #[test]
    fn test_unknown_code() {
        assert_eq!(SafetyMode::from_code(42), SafetyMode::Unknown(42));
    }
}
