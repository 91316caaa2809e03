//! Operator and sensor snapshots refreshed once per cycle.
//!
//! Joystick values arrive raw: dead-band handling belongs to the behaviour
//! layer. Key edges are derived from the previous snapshot's key set.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Three-position toggle switch on the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SwitchPosition {
    Up = 1,
    Down = 2,
    Mid = 3,
}

impl SwitchPosition {
    /// Convert from the raw receiver value. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Up),
            2 => Some(Self::Down),
            3 => Some(Self::Mid),
            _ => None,
        }
    }
}

impl Default for SwitchPosition {
    fn default() -> Self {
        Self::Down
    }
}

bitflags! {
    /// Keyboard state, bit order as reported by the receiver.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct KeyFlags: u16 {
        const W     = 1 << 0;
        const S     = 1 << 1;
        const A     = 1 << 2;
        const D     = 1 << 3;
        const SHIFT = 1 << 4;
        const CTRL  = 1 << 5;
        const Q     = 1 << 6;
        const E     = 1 << 7;
        const R     = 1 << 8;
        const F     = 1 << 9;
        const G     = 1 << 10;
        const Z     = 1 << 11;
        const X     = 1 << 12;
        const C     = 1 << 13;
        const V     = 1 << 14;
        const B     = 1 << 15;
    }
}

/// Mouse movement and buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MouseState {
    pub x: i16,
    pub y: i16,
    pub z: i16,
    pub press_left: bool,
    pub press_right: bool,
}

/// Joystick channel indices.
pub mod channel {
    pub const RIGHT_HORIZONTAL: usize = 0;
    pub const RIGHT_VERTICAL: usize = 1;
    pub const LEFT_HORIZONTAL: usize = 2;
    pub const LEFT_VERTICAL: usize = 3;
    pub const DIAL: usize = 4;
}

/// One remote-control snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OperatorInput {
    /// Raw stick and dial values around zero, ±660 nominal.
    pub channels: [i16; 5],
    pub switch_right: SwitchPosition,
    pub switch_left: SwitchPosition,
    pub mouse: MouseState,
    pub keys: KeyFlags,
    /// Key set of the previous snapshot.
    pub last_keys: KeyFlags,
}

impl OperatorInput {
    /// Key went from released to pressed since the previous snapshot.
    #[inline]
    pub fn key_rising(&self, key: KeyFlags) -> bool {
        self.keys.contains(key) && !self.last_keys.contains(key)
    }

    /// Build the next snapshot, carrying the current keys as `last_keys`.
    pub fn next(&self, channels: [i16; 5], keys: KeyFlags) -> Self {
        Self {
            channels,
            keys,
            last_keys: self.keys,
            ..*self
        }
    }
}

/// Attitude and body rates from the IMU, radians.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImuSample {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    /// Body rates about x, y, z in rad/s.
    pub gyro: [f64; 3],
}

/// Barrel heat reported by the referee system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefereeHeat {
    pub heat: u16,
    pub limit: u16,
}

/// Everything external read at the start of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RobotInputs {
    pub operator: OperatorInput,
    pub imu: ImuSample,
    /// `None` while the referee link is offline.
    pub heat: Option<RefereeHeat>,
    /// Bullet microswitch in front of the trigger wheel.
    pub bullet_in_place: bool,
}
