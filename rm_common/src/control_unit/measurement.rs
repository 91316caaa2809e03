//! Canonical measurement and command records.
//!
//! `MotorMeasurement` is what every codec decodes into, whatever the wire
//! protocol. `ActuatorCommand` is what every controller produces before an
//! encoder turns it back into bytes.

// ─── Device Identity ────────────────────────────────────────────────

/// Subsystem that owns a device. Fault isolation is per subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Subsystem {
    Chassis = 0,
    Gimbal = 1,
    Shooter = 2,
    Arm = 3,
    /// Sensors and links consulted by several subsystems.
    Shared = 4,
}

/// Identity of every device the core tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceId {
    /// Chassis drive motor, index 0..4.
    ChassisWheel(u8),
    /// Swerve steering motor, index 0..4.
    ChassisSteer(u8),
    GimbalYaw,
    GimbalPitch,
    Trigger,
    FrictionLeft,
    FrictionRight,
    /// Arm joint, index 0..7.
    Joint(u8),
    RemoteControl,
    Imu,
    VisionLink,
    Referee,
}

impl DeviceId {
    /// Number of dense slots covered by [`DeviceId::index`].
    pub const COUNT: usize = 24;

    /// Dense slot index, or `None` for an out-of-range wheel/joint number.
    #[inline]
    pub const fn index(self) -> Option<usize> {
        match self {
            Self::ChassisWheel(i) if i < 4 => Some(i as usize),
            Self::ChassisSteer(i) if i < 4 => Some(4 + i as usize),
            Self::GimbalYaw => Some(8),
            Self::GimbalPitch => Some(9),
            Self::Trigger => Some(10),
            Self::FrictionLeft => Some(11),
            Self::FrictionRight => Some(12),
            Self::Joint(i) if i < 7 => Some(13 + i as usize),
            Self::RemoteControl => Some(20),
            Self::Imu => Some(21),
            Self::VisionLink => Some(22),
            Self::Referee => Some(23),
            _ => None,
        }
    }

    /// Inverse of [`DeviceId::index`].
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0..=3 => Some(Self::ChassisWheel(index as u8)),
            4..=7 => Some(Self::ChassisSteer((index - 4) as u8)),
            8 => Some(Self::GimbalYaw),
            9 => Some(Self::GimbalPitch),
            10 => Some(Self::Trigger),
            11 => Some(Self::FrictionLeft),
            12 => Some(Self::FrictionRight),
            13..=19 => Some(Self::Joint((index - 13) as u8)),
            20 => Some(Self::RemoteControl),
            21 => Some(Self::Imu),
            22 => Some(Self::VisionLink),
            23 => Some(Self::Referee),
            _ => None,
        }
    }

    /// Iterate every valid device.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..Self::COUNT).filter_map(Self::from_index)
    }

    /// Owning subsystem.
    pub const fn subsystem(self) -> Subsystem {
        match self {
            Self::ChassisWheel(_) | Self::ChassisSteer(_) => Subsystem::Chassis,
            Self::GimbalYaw | Self::GimbalPitch => Subsystem::Gimbal,
            Self::Trigger | Self::FrictionLeft | Self::FrictionRight => Subsystem::Shooter,
            Self::Joint(_) => Subsystem::Arm,
            Self::RemoteControl | Self::Imu | Self::VisionLink | Self::Referee => Subsystem::Shared,
        }
    }
}

// ─── Measurement ────────────────────────────────────────────────────

/// Decoded state of one actuator.
///
/// Published as a whole record by the codec; never mutated field by field
/// by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotorMeasurement {
    /// Decoded angle in radians. Single-turn encoders report [0, 2π).
    pub position: f64,
    /// Angular velocity in rad/s, mount orientation already applied.
    pub velocity: f64,
    /// Measured effort: raw current code or Nm depending on protocol.
    pub effort: f64,
    /// Raw temperature byte, °C.
    pub temperature: u8,
    /// `position` of the previous record, for wrap and multi-turn detection.
    pub last_position: f64,
}

// ─── Commands ───────────────────────────────────────────────────────

/// Set-point for an MIT-style cascade motor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MitCommand {
    pub position: f64,
    pub velocity: f64,
    pub kp: f64,
    pub kd: f64,
    /// Feed-forward torque, Nm.
    pub torque: f64,
}

impl MitCommand {
    /// Pure torque command with both gains zero.
    #[inline]
    pub const fn torque_only(torque: f64) -> Self {
        Self {
            position: 0.0,
            velocity: 0.0,
            kp: 0.0,
            kd: 0.0,
            torque,
        }
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.velocity.is_finite()
            && self.kp.is_finite()
            && self.kd.is_finite()
            && self.torque.is_finite()
    }
}

/// Outbound actuator target, built fresh every cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActuatorCommand {
    /// Scaled current or voltage for simple protocols.
    Current(f64),
    /// Full cascade set-point.
    Mit(MitCommand),
}

impl ActuatorCommand {
    #[inline]
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Current(c) => c.is_finite(),
            Self::Mit(m) => m.is_finite(),
        }
    }

    /// Same protocol, every field zero.
    #[inline]
    pub const fn null_of(&self) -> Self {
        match self {
            Self::Current(_) => Self::Current(0.0),
            Self::Mit(_) => Self::Mit(MitCommand::torque_only(0.0)),
        }
    }
}

impl Default for ActuatorCommand {
    fn default() -> Self {
        Self::Current(0.0)
    }
}

// ─── Motion ─────────────────────────────────────────────────────────

/// Unified planar motion command, body frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionVector {
    /// m/s, positive forward.
    pub forward: f64,
    /// m/s, positive left.
    pub strafe: f64,
    /// rad/s, positive counter-clockwise.
    pub rotate: f64,
}

impl MotionVector {
    #[inline]
    pub const fn new(forward: f64, strafe: f64, rotate: f64) -> Self {
        Self {
            forward,
            strafe,
            rotate,
        }
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.forward.is_finite() && self.strafe.is_finite() && self.rotate.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_index_roundtrip_covers_all_slots() {
        let all: Vec<DeviceId> = DeviceId::all().collect();
        assert_eq!(all.len(), DeviceId::COUNT);
        for (i, id) in all.iter().enumerate() {
            assert_eq!(id.index(), Some(i));
        }
    }

    #[test]
    fn out_of_range_device_has_no_slot() {
        assert_eq!(DeviceId::Joint(7).index(), None);
        assert_eq!(DeviceId::ChassisWheel(4).index(), None);
    }

    #[test]
    fn subsystem_ownership() {
        assert_eq!(DeviceId::Joint(2).subsystem(), Subsystem::Arm);
        assert_eq!(DeviceId::Trigger.subsystem(), Subsystem::Shooter);
        assert_eq!(DeviceId::Imu.subsystem(), Subsystem::Shared);
    }

    #[test]
    fn null_command_keeps_protocol() {
        let cmd = ActuatorCommand::Mit(MitCommand::torque_only(f64::NAN));
        assert!(!cmd.is_finite());
        assert_eq!(cmd.null_of(), ActuatorCommand::Mit(MitCommand::default()));
    }
}
