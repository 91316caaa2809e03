//! MIT-style cascade protocol (DaMiao motors).
//!
//! Command frame, 64 bits exactly:
//! ```text
//! byte:  0        1        2        3        4        5        6        7
//!        [ P 15:8][ P 7:0 ][ V 11:4][V3:0|Kp11:8][Kp 7:0][Kd 11:4][Kd3:0|T11:8][ T 7:0]
//! ```
//! Feedback frame: status nibble and id in byte 0, then P (16), V (12),
//! T (12), temperature.

use rm_common::consts::{CAN_PAYLOAD_LEN, MIT_DISABLE_CODE, MIT_ENABLE_CODE};
use rm_common::control_unit::config::MitRange;
use rm_common::control_unit::measurement::{MitCommand, MotorMeasurement};

use super::CodecError;
use super::scaling::{float_to_uint, uint_to_float};

pub const POSITION_BITS: u32 = 16;
pub const VELOCITY_BITS: u32 = 12;
pub const KP_BITS: u32 = 12;
pub const KD_BITS: u32 = 12;
pub const TORQUE_BITS: u32 = 12;

/// Status nibble values that mean the motor is healthy.
const STATUS_DISABLED: u8 = 0x0;
const STATUS_ENABLED: u8 = 0x1;

/// Decoded MIT feedback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MitFeedback {
    pub status: u8,
    pub position: f64,
    pub velocity: f64,
    pub torque: f64,
    pub temperature: u8,
}

impl MitFeedback {
    /// Whole-record measurement built on top of the previous one.
    #[inline]
    pub fn to_measurement(&self, previous: &MotorMeasurement) -> MotorMeasurement {
        MotorMeasurement {
            position: self.position,
            velocity: self.velocity,
            effort: self.torque,
            temperature: self.temperature,
            last_position: previous.position,
        }
    }
}

/// Flip a command into motor coordinates for a reversed mount.
#[inline]
pub fn mount_command(cmd: &MitCommand, reversed: bool) -> MitCommand {
    if !reversed {
        return *cmd;
    }
    MitCommand {
        position: -cmd.position,
        velocity: -cmd.velocity,
        torque: -cmd.torque,
        ..*cmd
    }
}

/// Pack a command into the eight-byte wire layout.
pub fn encode_mit(cmd: &MitCommand, range: &MitRange) -> [u8; CAN_PAYLOAD_LEN] {
    let p = float_to_uint(cmd.position, range.p_min, range.p_max, POSITION_BITS);
    let v = float_to_uint(cmd.velocity, range.v_min, range.v_max, VELOCITY_BITS);
    let kp = float_to_uint(cmd.kp, range.kp_min, range.kp_max, KP_BITS);
    let kd = float_to_uint(cmd.kd, range.kd_min, range.kd_max, KD_BITS);
    let t = float_to_uint(cmd.torque, range.t_min, range.t_max, TORQUE_BITS);

    [
        (p >> 8) as u8,
        p as u8,
        (v >> 4) as u8,
        (((v & 0xF) << 4) | (kp >> 8)) as u8,
        kp as u8,
        (kd >> 4) as u8,
        (((kd & 0xF) << 4) | (t >> 8)) as u8,
        t as u8,
    ]
}

/// Decode a feedback frame.
///
/// A status nibble other than disabled/enabled is a motor fault; nothing
/// is decoded in that case.
pub fn decode_mit(
    data: &[u8; CAN_PAYLOAD_LEN],
    range: &MitRange,
    reversed: bool,
) -> Result<MitFeedback, CodecError> {
    let status = data[0] >> 4;
    if status != STATUS_DISABLED && status != STATUS_ENABLED {
        return Err(CodecError::MotorFault(status));
    }

    let p = (u32::from(data[1]) << 8) | u32::from(data[2]);
    let v = (u32::from(data[3]) << 4) | (u32::from(data[4]) >> 4);
    let t = ((u32::from(data[4]) & 0xF) << 8) | u32::from(data[5]);

    let sign = if reversed { -1.0 } else { 1.0 };
    Ok(MitFeedback {
        status,
        position: sign * uint_to_float(p, range.p_min, range.p_max, POSITION_BITS),
        velocity: sign * uint_to_float(v, range.v_min, range.v_max, VELOCITY_BITS),
        torque: sign * uint_to_float(t, range.t_min, range.t_max, TORQUE_BITS),
        temperature: data[6],
    })
}

/// Enter (`true`) or exit motor mode.
#[inline]
pub const fn mit_mode_frame(enable: bool) -> [u8; CAN_PAYLOAD_LEN] {
    let code = if enable { MIT_ENABLE_CODE } else { MIT_DISABLE_CODE };
    [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, code]
}
