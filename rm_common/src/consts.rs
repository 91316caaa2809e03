//! System-wide constants for the robot control core.
//!
//! Single source of truth for encoder ranges, bus identifiers and
//! loop timing. Imported by all crates.

use static_assertions::const_assert;

// ─── Encoder ────────────────────────────────────────────────────────

/// Counts per mechanical revolution of the 13-bit absolute encoder.
pub const ECD_RANGE: u16 = 8192;

/// Half of [`ECD_RANGE`], the wrap threshold for relative encoder deltas.
pub const HALF_ECD_RANGE: u16 = ECD_RANGE / 2;

/// Radians per encoder count.
pub const ECD_TO_RAD: f64 = 2.0 * core::f64::consts::PI / ECD_RANGE as f64;

// ─── Bus Frames ─────────────────────────────────────────────────────

/// Payload length of a classic CAN data frame.
pub const CAN_PAYLOAD_LEN: usize = 8;

/// RM group command frame addressing feedback ids 0x201..=0x204.
pub const RM_GROUP_LOW_FRAME_ID: u16 = 0x200;

/// RM group command frame addressing feedback ids 0x205..=0x208.
pub const RM_GROUP_HIGH_FRAME_ID: u16 = 0x1FF;

/// First RM feedback id.
pub const RM_FEEDBACK_BASE_ID: u16 = 0x201;

/// Ktech broadcast current frame (four motors, 2 bytes each).
pub const KTECH_BROADCAST_FRAME_ID: u16 = 0x280;

/// Ktech command byte: torque closed loop (and its reply).
pub const KTECH_CMD_TORQUE: u8 = 0xA1;

/// Ktech command byte: read multi-turn angle (and its reply).
pub const KTECH_CMD_MULTI_TURN_ANGLE: u8 = 0x92;

/// Ktech command byte: stop motor, keeps state so it can be resumed.
pub const KTECH_CMD_SOFT_DISABLE: u8 = 0x81;

/// Trailing byte of a DaMiao "enter motor mode" frame.
pub const MIT_ENABLE_CODE: u8 = 0xFC;

/// Trailing byte of a DaMiao "exit motor mode" frame.
pub const MIT_DISABLE_CODE: u8 = 0xFD;

// ─── Operator Input ─────────────────────────────────────────────────

/// Maximum absolute joystick channel value around centre.
pub const RC_CHANNEL_HALF_RANGE: i16 = 660;

/// Joystick values with absolute value at or below this read as zero.
pub const RC_DEADBAND: i16 = 10;

// ─── Timing ─────────────────────────────────────────────────────────

/// Scheduler base tick in milliseconds. Every loop period is a multiple.
pub const BASE_TICK_MS: u64 = 1;

/// Default chassis loop period in milliseconds.
pub const CHASSIS_PERIOD_MS: u64 = 4;

/// Default gimbal (and shooter) loop period in milliseconds.
pub const GIMBAL_PERIOD_MS: u64 = 1;

/// Default arm loop period in milliseconds.
pub const ARM_PERIOD_MS: u64 = 5;

/// Number of joints on the manipulator arm.
pub const ARM_JOINT_COUNT: usize = 7;

/// Number of driven wheels on the chassis.
pub const CHASSIS_WHEEL_COUNT: usize = 4;

const_assert!(ECD_RANGE.is_power_of_two());
const_assert!(CHASSIS_PERIOD_MS % BASE_TICK_MS == 0);
const_assert!(ARM_PERIOD_MS % BASE_TICK_MS == 0);
