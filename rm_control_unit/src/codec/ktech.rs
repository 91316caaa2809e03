//! Ktech MG/MS 4005 protocol.
//!
//! Replies echo the command byte in byte 0. The torque-loop reply carries
//! temperature, current, speed and single-turn angle; the multi-turn reply
//! carries a signed 32-bit angle. All multi-byte fields are little-endian.
//! MG and MS variants differ only in gear ratio.

use core::f64::consts::{PI, TAU};

use rm_common::consts::{
    CAN_PAYLOAD_LEN, KTECH_CMD_MULTI_TURN_ANGLE, KTECH_CMD_SOFT_DISABLE, KTECH_CMD_TORQUE,
};
use rm_common::control_unit::measurement::MotorMeasurement;

use super::CodecError;

/// Radians per multi-turn LSB on the motor shaft (0.01°).
pub const MULTI_TURN_RAD_PER_LSB: f64 = PI / 18_000.0;

/// Decoded torque-loop reply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KtechFeedback {
    pub temperature: u8,
    pub current: i16,
    /// Output-shaft speed, rad/s.
    pub velocity: f64,
    /// Single-turn encoder angle, rad.
    pub angle: f64,
}

impl KtechFeedback {
    #[inline]
    pub fn to_measurement(&self, previous: &MotorMeasurement) -> MotorMeasurement {
        MotorMeasurement {
            position: self.angle,
            velocity: self.velocity,
            effort: f64::from(self.current),
            temperature: self.temperature,
            last_position: previous.position,
        }
    }
}

/// Decode a torque-loop reply. Other replies are `UnexpectedCommand`.
pub fn decode_ktech_torque(
    data: &[u8; CAN_PAYLOAD_LEN],
    gear: f64,
) -> Result<KtechFeedback, CodecError> {
    if data[0] != KTECH_CMD_TORQUE {
        return Err(CodecError::UnexpectedCommand(data[0]));
    }
    let deg_per_s = f64::from(i16::from_le_bytes([data[4], data[5]]));
    let raw_angle = f64::from(i16::from_le_bytes([data[6], data[7]]));
    Ok(KtechFeedback {
        temperature: data[1],
        current: i16::from_le_bytes([data[2], data[3]]),
        velocity: (deg_per_s / gear).to_radians(),
        angle: raw_angle / 65_536.0 * TAU,
    })
}

/// Decode a multi-turn angle reply into output-shaft radians.
///
/// `scale` is radians per LSB at the output, `reversed` flips the sign.
pub fn decode_multi_turn(
    data: &[u8; CAN_PAYLOAD_LEN],
    scale: f64,
    reversed: bool,
) -> Result<f64, CodecError> {
    if data[0] != KTECH_CMD_MULTI_TURN_ANGLE {
        return Err(CodecError::UnexpectedCommand(data[0]));
    }
    let raw = i32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    let angle = f64::from(raw) * scale;
    Ok(if reversed { -angle } else { angle })
}

/// Request frame for a multi-turn angle reply.
#[inline]
pub const fn multi_turn_request_frame() -> [u8; CAN_PAYLOAD_LEN] {
    [KTECH_CMD_MULTI_TURN_ANGLE, 0, 0, 0, 0, 0, 0, 0]
}

/// Soft-disable: stop output but keep the motor's state.
#[inline]
pub const fn soft_disable_frame() -> [u8; CAN_PAYLOAD_LEN] {
    [KTECH_CMD_SOFT_DISABLE, 0, 0, 0, 0, 0, 0, 0]
}

/// Pack four current commands into a broadcast frame, clamped to `±max`.
/// Non-finite values are sent as zero.
pub fn encode_ktech_broadcast(currents: [f64; 4], max: f64) -> [u8; CAN_PAYLOAD_LEN] {
    let mut data = [0u8; CAN_PAYLOAD_LEN];
    let max = max.abs().min(f64::from(i16::MAX));
    for (chunk, &value) in data.chunks_exact_mut(2).zip(currents.iter()) {
        let code = if value.is_finite() {
            value.clamp(-max, max).round() as i16
        } else {
            0
        };
        chunk.copy_from_slice(&code.to_le_bytes());
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn torque_reply_fields() {
        // temp 30, current -100, speed 360 deg/s, angle 16384 (quarter turn)
        let mut data = [KTECH_CMD_TORQUE, 30, 0, 0, 0, 0, 0, 0];
        data[2..4].copy_from_slice(&(-100i16).to_le_bytes());
        data[4..6].copy_from_slice(&360i16.to_le_bytes());
        data[6..8].copy_from_slice(&16_384i16.to_le_bytes());
        let fb = decode_ktech_torque(&data, 10.0).unwrap();
        assert_eq!(fb.temperature, 30);
        assert_eq!(fb.current, -100);
        assert!((fb.velocity - 36f64.to_radians()).abs() < 1e-12);
        assert!((fb.angle - PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn other_replies_are_not_torque_feedback() {
        let data = [0x9C, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            decode_ktech_torque(&data, 1.0),
            Err(CodecError::UnexpectedCommand(0x9C))
        );
    }

    #[test]
    fn multi_turn_scaled_and_reversed() {
        let mut data = multi_turn_request_frame();
        data[4..8].copy_from_slice(&(-36_000i32).to_le_bytes());
        let angle = decode_multi_turn(&data, MULTI_TURN_RAD_PER_LSB, false).unwrap();
        assert!((angle + TAU).abs() < 1e-9);
        let flipped = decode_multi_turn(&data, MULTI_TURN_RAD_PER_LSB, true).unwrap();
        assert!((flipped - TAU).abs() < 1e-9);
    }

    #[test]
    fn broadcast_is_little_endian_and_clamped() {
        let data = encode_ktech_broadcast([100.0, -5000.0, f64::INFINITY, 0.0], 2000.0);
        assert_eq!(&data[0..2], &100i16.to_le_bytes());
        assert_eq!(&data[2..4], &(-2000i16).to_le_bytes());
        assert_eq!(&data[4..6], &[0, 0]);
    }

    #[test]
    fn soft_disable_layout() {
        assert_eq!(soft_disable_frame(), [0x81, 0, 0, 0, 0, 0, 0, 0]);
    }
}
