//! Behaviour mode enums for every subsystem.
//!
//! All enums use `#[repr(u8)]` so they can be logged and compared cheaply.
//! Exactly one mode per subsystem is active in any cycle. The safe idle
//! mode of each subsystem is its `Default`.

use serde::{Deserialize, Serialize};

// ─── Chassis ────────────────────────────────────────────────────────

/// Chassis behaviour mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ChassisMode {
    /// No current to any wheel. Entered on any fault.
    ZeroForce = 0,
    /// Wheels actively held at zero speed.
    NoMove = 1,
    /// Chassis rotation servoes to the gimbal's relative yaw.
    FollowGimbalYaw = 2,
    /// Chassis holds its own IMU heading, operator rotates it.
    NoFollowYaw = 3,
    /// Continuous rotation while translating in the gimbal frame.
    Spinning = 4,
    /// Translation from the vision link's speed command.
    CvAssisted = 5,
    /// Stick values pass straight through to wheel currents.
    Raw = 6,
}

impl ChassisMode {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::ZeroForce),
            1 => Some(Self::NoMove),
            2 => Some(Self::FollowGimbalYaw),
            3 => Some(Self::NoFollowYaw),
            4 => Some(Self::Spinning),
            5 => Some(Self::CvAssisted),
            6 => Some(Self::Raw),
            _ => None,
        }
    }
}

impl Default for ChassisMode {
    fn default() -> Self {
        Self::ZeroForce
    }
}

// ─── Gimbal ─────────────────────────────────────────────────────────

/// Gimbal behaviour, selected from operator input once per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum GimbalBehaviour {
    ZeroForce = 0,
    Absolute = 1,
    Relative = 2,
    VisionAssisted = 3,
}

impl GimbalBehaviour {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::ZeroForce),
            1 => Some(Self::Absolute),
            2 => Some(Self::Relative),
            3 => Some(Self::VisionAssisted),
            _ => None,
        }
    }

    /// Per-axis motor mode implied by this behaviour.
    #[inline]
    pub const fn motor_mode(self) -> GimbalMotorMode {
        match self {
            Self::ZeroForce => GimbalMotorMode::Raw,
            Self::Absolute => GimbalMotorMode::GyroAbsolute,
            Self::Relative => GimbalMotorMode::EncoderRelative,
            Self::VisionAssisted => GimbalMotorMode::VisionAssisted,
        }
    }
}

impl Default for GimbalBehaviour {
    fn default() -> Self {
        Self::ZeroForce
    }
}

/// Control mode of one gimbal axis motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum GimbalMotorMode {
    /// Command passes through without closed loop.
    Raw = 0,
    /// Angle loop on IMU attitude.
    GyroAbsolute = 1,
    /// Angle loop on encoder relative angle.
    EncoderRelative = 2,
    /// Absolute loop chasing the vision link's angle deltas.
    VisionAssisted = 3,
}

impl GimbalMotorMode {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Raw),
            1 => Some(Self::GyroAbsolute),
            2 => Some(Self::EncoderRelative),
            3 => Some(Self::VisionAssisted),
            _ => None,
        }
    }
}

impl Default for GimbalMotorMode {
    fn default() -> Self {
        Self::Raw
    }
}

// ─── Shooter ────────────────────────────────────────────────────────

/// Shooter mode. Order matters: modes below `ReadyTrigger` keep the
/// trigger motor unpowered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum ShooterMode {
    Stop = 0,
    /// Friction wheels spinning up.
    ReadyFric = 1,
    /// Trigger advancing a bullet to the microswitch.
    ReadyTrigger = 2,
    /// Bullet in place, waiting for a fire command.
    Ready = 3,
    /// Trigger rotating one bullet's worth.
    SemiAutoFire = 4,
    /// Trigger turning continuously.
    AutoFire = 5,
}

impl ShooterMode {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Stop),
            1 => Some(Self::ReadyFric),
            2 => Some(Self::ReadyTrigger),
            3 => Some(Self::Ready),
            4 => Some(Self::SemiAutoFire),
            5 => Some(Self::AutoFire),
            _ => None,
        }
    }
}

impl Default for ShooterMode {
    fn default() -> Self {
        Self::Stop
    }
}

// ─── Arm ────────────────────────────────────────────────────────────

/// Manipulator arm state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ArmState {
    /// Motors disabled, zero torque.
    ZeroForce = 0,
    /// Position loops running toward a commanded target.
    Moving = 1,
    /// Position loops holding the last reached target.
    Fixed = 2,
}

impl ArmState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::ZeroForce),
            1 => Some(Self::Moving),
            2 => Some(Self::Fixed),
            _ => None,
        }
    }
}

impl Default for ArmState {
    fn default() -> Self {
        Self::ZeroForce
    }
}
