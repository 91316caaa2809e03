//! RM motor protocol (C620 / GM6020 style).
//!
//! Feedback, big-endian:
//! ```text
//! [ecd 15:8][ecd 7:0][rpm 15:8][rpm 7:0][cur 15:8][cur 7:0][temp][-]
//! ```
//! Commands address four motors per group frame, two bytes each.

use core::f64::consts::TAU;

use rm_common::consts::{
    CAN_PAYLOAD_LEN, RM_FEEDBACK_BASE_ID, RM_GROUP_HIGH_FRAME_ID, RM_GROUP_LOW_FRAME_ID,
};
use rm_common::control_unit::measurement::MotorMeasurement;

use crate::control::angle::ecd_to_rad;

/// Raw RM feedback fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RmFeedback {
    pub ecd: u16,
    pub speed_rpm: i16,
    pub given_current: i16,
    pub temperature: u8,
}

/// Parse a feedback payload. Every byte pattern is valid.
#[inline]
pub const fn decode_rm(data: &[u8; CAN_PAYLOAD_LEN]) -> RmFeedback {
    RmFeedback {
        ecd: u16::from_be_bytes([data[0], data[1]]),
        speed_rpm: i16::from_be_bytes([data[2], data[3]]),
        given_current: i16::from_be_bytes([data[4], data[5]]),
        temperature: data[6],
    }
}

impl RmFeedback {
    /// Whole-record measurement built on top of the previous one.
    #[inline]
    pub fn to_measurement(&self, previous: &MotorMeasurement) -> MotorMeasurement {
        MotorMeasurement {
            position: ecd_to_rad(self.ecd),
            velocity: f64::from(self.speed_rpm) * TAU / 60.0,
            effort: f64::from(self.given_current),
            temperature: self.temperature,
            last_position: previous.position,
        }
    }
}

/// Pack four current codes into a group frame, clamped to `±limit`.
/// Non-finite values are sent as zero.
pub fn encode_rm_group(currents: [f64; 4], limit: f64) -> [u8; CAN_PAYLOAD_LEN] {
    let mut data = [0u8; CAN_PAYLOAD_LEN];
    let limit = limit.abs().min(f64::from(i16::MAX));
    for (chunk, &value) in data.chunks_exact_mut(2).zip(currents.iter()) {
        let code = if value.is_finite() {
            value.clamp(-limit, limit).round() as i16
        } else {
            0
        };
        chunk.copy_from_slice(&code.to_be_bytes());
    }
    data
}

/// Group frame id and slot addressing the motor with `feedback_id`.
#[inline]
pub const fn rm_command_slot(feedback_id: u16) -> Option<(u16, usize)> {
    if feedback_id < RM_FEEDBACK_BASE_ID || feedback_id > RM_FEEDBACK_BASE_ID + 7 {
        return None;
    }
    let index = (feedback_id - RM_FEEDBACK_BASE_ID) as usize;
    if index < 4 {
        Some((RM_GROUP_LOW_FRAME_ID, index))
    } else {
        Some((RM_GROUP_HIGH_FRAME_ID, index - 4))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_big_endian_fields() {
        let fb = decode_rm(&[0x1F, 0xFF, 0xFF, 0x38, 0x03, 0xE8, 35, 0]);
        assert_eq!(fb.ecd, 8191);
        assert_eq!(fb.speed_rpm, -200);
        assert_eq!(fb.given_current, 1000);
        assert_eq!(fb.temperature, 35);
    }

    #[test]
    fn measurement_is_decoded_quantity() {
        let previous = MotorMeasurement {
            position: 1.0,
            ..Default::default()
        };
        let m = decode_rm(&[0x10, 0x00, 0x00, 60, 0, 0, 0, 0]).to_measurement(&previous);
        assert!((m.position - core::f64::consts::PI).abs() < 1e-12);
        assert!((m.velocity - TAU).abs() < 1e-12);
        assert_eq!(m.last_position, 1.0);
    }

    #[test]
    fn group_frame_clamps_and_guards() {
        let data = encode_rm_group([1000.0, -20_000.0, f64::NAN, -1.0], 16_000.0);
        assert_eq!(&data[0..2], &1000i16.to_be_bytes());
        assert_eq!(&data[2..4], &(-16_000i16).to_be_bytes());
        assert_eq!(&data[4..6], &[0, 0]);
        assert_eq!(&data[6..8], &(-1i16).to_be_bytes());
    }

    #[test]
    fn command_slots() {
        assert_eq!(rm_command_slot(0x201), Some((0x200, 0)));
        assert_eq!(rm_command_slot(0x204), Some((0x200, 3)));
        assert_eq!(rm_command_slot(0x207), Some((0x1FF, 2)));
        assert_eq!(rm_command_slot(0x209), None);
        assert_eq!(rm_command_slot(0x141), None);
    }
}
