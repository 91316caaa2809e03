//! Prelude module for common re-exports.
//!
//! ```rust
//! use rm_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel};
pub use crate::control_unit::config::{
    ArmConfig, ChassisConfig, DriveConfig, GimbalConfig, MitMotorModel, MitRange, PidConfig,
    RobotConfig, ShooterConfig, VisionConfig,
};

// ─── Data Model ─────────────────────────────────────────────────────
pub use crate::control_unit::error::DeviceFault;
pub use crate::control_unit::input::{
    ImuSample, KeyFlags, OperatorInput, RefereeHeat, RobotInputs, SwitchPosition,
};
pub use crate::control_unit::measurement::{
    ActuatorCommand, DeviceId, MitCommand, MotionVector, MotorMeasurement, Subsystem,
};
pub use crate::control_unit::state::{
    ArmState, ChassisMode, GimbalBehaviour, GimbalMotorMode, ShooterMode,
};

// ─── Hardware Seams ─────────────────────────────────────────────────
pub use crate::hal::bus::{BusError, BusId, BusTransport, CanFrame};
pub use crate::hal::liveness::LivenessTracker;
