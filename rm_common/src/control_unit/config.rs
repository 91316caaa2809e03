//! Robot configuration structures.
//!
//! All config types use `serde::Deserialize` for TOML loading. Every field
//! carries a default matching the reference infantry robot, so a config
//! file only lists what differs. Subsystems are optional: a robot without
//! an `[arm]` table has no arm loop. Loaded once at init, immutable after.

use core::f64::consts::{FRAC_PI_2, FRAC_PI_4, FRAC_PI_8, PI};

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, LogLevel};
use crate::consts::{ARM_JOINT_COUNT, ARM_PERIOD_MS, CHASSIS_PERIOD_MS, GIMBAL_PERIOD_MS};

// ─── Top-Level Config ───────────────────────────────────────────────

/// Complete description of one robot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotConfig {
    /// Human-readable robot name used in logs.
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub log_level: LogLevel,

    #[serde(default)]
    pub periods: PeriodConfig,

    #[serde(default)]
    pub bus_retry: BusRetryConfig,

    #[serde(default)]
    pub liveness: LivenessConfig,

    #[serde(default)]
    pub can: CanMapConfig,

    pub chassis: Option<ChassisConfig>,
    pub gimbal: Option<GimbalConfig>,
    pub shooter: Option<ShooterConfig>,
    pub arm: Option<ArmConfig>,
    pub vision: Option<VisionConfig>,
}

fn default_name() -> String {
    "infantry".to_string()
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: LogLevel::default(),
            periods: PeriodConfig::default(),
            bus_retry: BusRetryConfig::default(),
            liveness: LivenessConfig::default(),
            can: CanMapConfig::default(),
            chassis: Some(ChassisConfig::default()),
            gimbal: Some(GimbalConfig::default()),
            shooter: Some(ShooterConfig::default()),
            arm: None,
            vision: Some(VisionConfig::default()),
        }
    }
}

impl RobotConfig {
    /// Validate every present section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let wrap = |section: &str, r: Result<(), String>| {
            r.map_err(|e| ConfigError::ValidationError(format!("{section}: {e}")))
        };
        if self.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "name cannot be empty".to_string(),
            ));
        }
        wrap("periods", self.periods.validate())?;
        wrap("bus_retry", self.bus_retry.validate())?;
        if let Some(c) = &self.chassis {
            wrap("chassis", c.validate())?;
        }
        if let Some(g) = &self.gimbal {
            wrap("gimbal", g.validate())?;
        }
        if let Some(s) = &self.shooter {
            wrap("shooter", s.validate())?;
            if self.gimbal.is_none() {
                return Err(ConfigError::ValidationError(
                    "shooter: runs inside the gimbal loop and needs a [gimbal] section".to_string(),
                ));
            }
        }
        if let Some(a) = &self.arm {
            wrap("arm", a.validate())?;
        }
        if let Some(v) = &self.vision {
            wrap("vision", v.validate())?;
        }
        Ok(())
    }
}

// ─── Timing ─────────────────────────────────────────────────────────

/// Loop periods in milliseconds. Each must be a multiple of the 1 ms base tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PeriodConfig {
    #[serde(default = "default_chassis_period")]
    pub chassis_ms: u64,
    /// Shared by the gimbal and the shooter.
    #[serde(default = "default_gimbal_period")]
    pub gimbal_ms: u64,
    #[serde(default = "default_arm_period")]
    pub arm_ms: u64,
}

fn default_chassis_period() -> u64 {
    CHASSIS_PERIOD_MS
}
fn default_gimbal_period() -> u64 {
    GIMBAL_PERIOD_MS
}
fn default_arm_period() -> u64 {
    ARM_PERIOD_MS
}

impl Default for PeriodConfig {
    fn default() -> Self {
        Self {
            chassis_ms: CHASSIS_PERIOD_MS,
            gimbal_ms: GIMBAL_PERIOD_MS,
            arm_ms: ARM_PERIOD_MS,
        }
    }
}

impl PeriodConfig {
    pub fn validate(&self) -> Result<(), String> {
        for (name, v) in [
            ("chassis_ms", self.chassis_ms),
            ("gimbal_ms", self.gimbal_ms),
            ("arm_ms", self.arm_ms),
        ] {
            if v == 0 || v > 1000 {
                return Err(format!("{name} {v} out of range [1, 1000]"));
            }
        }
        Ok(())
    }
}

/// Bounded retry policy for blocking frame sends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BusRetryConfig {
    /// Pause between attempts (default: 1 ms).
    #[serde(default = "default_retry_interval")]
    pub interval_ms: u64,
    /// Give up after this long (default: 5000 ms).
    #[serde(default = "default_retry_budget")]
    pub budget_ms: u64,
}

fn default_retry_interval() -> u64 {
    1
}
fn default_retry_budget() -> u64 {
    5000
}

impl Default for BusRetryConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_retry_interval(),
            budget_ms: default_retry_budget(),
        }
    }
}

impl BusRetryConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.interval_ms == 0 {
            return Err("interval_ms must be > 0".to_string());
        }
        if self.budget_ms < self.interval_ms {
            return Err(format!(
                "budget_ms {} shorter than interval_ms {}",
                self.budget_ms, self.interval_ms
            ));
        }
        Ok(())
    }
}

/// Offline timeouts per device class, milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LivenessConfig {
    #[serde(default = "default_motor_timeout")]
    pub motor_ms: u64,
    #[serde(default = "default_remote_timeout")]
    pub remote_ms: u64,
    #[serde(default = "default_imu_timeout")]
    pub imu_ms: u64,
    #[serde(default = "default_link_timeout")]
    pub vision_ms: u64,
    #[serde(default = "default_link_timeout")]
    pub referee_ms: u64,
}

fn default_motor_timeout() -> u64 {
    20
}
fn default_remote_timeout() -> u64 {
    30
}
fn default_imu_timeout() -> u64 {
    20
}
fn default_link_timeout() -> u64 {
    1000
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            motor_ms: default_motor_timeout(),
            remote_ms: default_remote_timeout(),
            imu_ms: default_imu_timeout(),
            vision_ms: default_link_timeout(),
            referee_ms: default_link_timeout(),
        }
    }
}

// ─── Bus Map ────────────────────────────────────────────────────────

/// Which bus and feedback identifier every actuator answers on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanMapConfig {
    #[serde(default = "default_bus_1")]
    pub chassis_bus: u8,
    #[serde(default = "default_wheel_ids")]
    pub wheel_ids: [u16; 4],
    #[serde(default = "default_steer_ids")]
    pub steer_ids: [u16; 4],

    #[serde(default)]
    pub gimbal_bus: u8,
    #[serde(default = "default_yaw_id")]
    pub yaw_id: u16,
    #[serde(default = "default_pitch_id")]
    pub pitch_id: u16,
    #[serde(default = "default_trigger_id")]
    pub trigger_id: u16,
    #[serde(default = "default_friction_ids")]
    pub friction_ids: [u16; 2],

    #[serde(default = "default_bus_1")]
    pub arm_bus: u8,
    /// Command identifiers of the MIT joints.
    #[serde(default = "default_mit_cmd_ids")]
    pub mit_command_ids: [u16; 3],
    /// Feedback identifiers of the MIT joints.
    #[serde(default = "default_mit_fb_ids")]
    pub mit_feedback_ids: [u16; 3],
    /// Node identifiers of the Ktech joints.
    #[serde(default = "default_ktech_ids")]
    pub ktech_ids: [u16; 4],
}

fn default_bus_1() -> u8 {
    1
}
fn default_wheel_ids() -> [u16; 4] {
    [0x201, 0x202, 0x203, 0x204]
}
fn default_steer_ids() -> [u16; 4] {
    [0x205, 0x206, 0x207, 0x208]
}
fn default_yaw_id() -> u16 {
    0x205
}
fn default_pitch_id() -> u16 {
    0x206
}
fn default_trigger_id() -> u16 {
    0x207
}
fn default_friction_ids() -> [u16; 2] {
    [0x201, 0x202]
}
fn default_mit_cmd_ids() -> [u16; 3] {
    [0x01, 0x02, 0x03]
}
fn default_mit_fb_ids() -> [u16; 3] {
    [0x11, 0x12, 0x13]
}
fn default_ktech_ids() -> [u16; 4] {
    [0x141, 0x142, 0x143, 0x144]
}

impl Default for CanMapConfig {
    fn default() -> Self {
        Self {
            chassis_bus: 1,
            wheel_ids: default_wheel_ids(),
            steer_ids: default_steer_ids(),
            gimbal_bus: 0,
            yaw_id: default_yaw_id(),
            pitch_id: default_pitch_id(),
            trigger_id: default_trigger_id(),
            friction_ids: default_friction_ids(),
            arm_bus: 1,
            mit_command_ids: default_mit_cmd_ids(),
            mit_feedback_ids: default_mit_fb_ids(),
            ktech_ids: default_ktech_ids(),
        }
    }
}

// ─── Controllers ────────────────────────────────────────────────────

/// Gains and limits of one PID loop.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PidConfig {
    #[serde(default)]
    pub kp: f64,
    #[serde(default)]
    pub ki: f64,
    #[serde(default)]
    pub kd: f64,
    /// Hard clamp on the summed output.
    pub max_out: f64,
    /// Hard clamp on the integral term.
    #[serde(default)]
    pub max_iout: f64,
}

impl PidConfig {
    pub const fn new(kp: f64, ki: f64, kd: f64, max_out: f64, max_iout: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            max_out,
            max_iout,
        }
    }

    pub fn validate(&self, name: &str) -> Result<(), String> {
        if !(self.kp.is_finite() && self.ki.is_finite() && self.kd.is_finite()) {
            return Err(format!("{name}: gains must be finite"));
        }
        if !(self.max_out.is_finite() && self.max_out > 0.0) {
            return Err(format!("{name}: max_out {} must be > 0", self.max_out));
        }
        if !(self.max_iout.is_finite() && self.max_iout >= 0.0) {
            return Err(format!("{name}: max_iout {} must be >= 0", self.max_iout));
        }
        Ok(())
    }
}

fn check_unit_interval(name: &str, v: f64) -> Result<(), String> {
    if !(0.0..1.0).contains(&v) {
        return Err(format!("{name} {v} out of range [0, 1)"));
    }
    Ok(())
}

fn check_positive(name: &str, v: f64) -> Result<(), String> {
    if !(v.is_finite() && v > 0.0) {
        return Err(format!("{name} {v} must be > 0"));
    }
    Ok(())
}

// ─── MIT Range Tables ───────────────────────────────────────────────

/// Supported MIT-protocol motor models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MitMotorModel {
    #[default]
    Dm4310,
    /// ±45 rad/s, ±24 Nm variant.
    HighSpeed,
    /// ±30 rad/s, ±10 Nm variant.
    LowTorque,
}

/// Wire ranges of the five fixed-point fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MitRange {
    pub p_min: f64,
    pub p_max: f64,
    pub v_min: f64,
    pub v_max: f64,
    pub kp_min: f64,
    pub kp_max: f64,
    pub kd_min: f64,
    pub kd_max: f64,
    pub t_min: f64,
    pub t_max: f64,
}

impl MitRange {
    const fn symmetric(p: f64, v: f64, t: f64) -> Self {
        Self {
            p_min: -p,
            p_max: p,
            v_min: -v,
            v_max: v,
            kp_min: 0.0,
            kp_max: 500.0,
            kd_min: 0.0,
            kd_max: 5.0,
            t_min: -t,
            t_max: t,
        }
    }
}

impl MitMotorModel {
    /// Range table for this model.
    pub const fn range(self) -> MitRange {
        match self {
            Self::Dm4310 => MitRange::symmetric(12.5, 25.0, 20.0),
            Self::HighSpeed => MitRange::symmetric(12.5, 45.0, 24.0),
            Self::LowTorque => MitRange::symmetric(12.5, 30.0, 10.0),
        }
    }
}

// ─── Chassis ────────────────────────────────────────────────────────

/// Wheel layout and its geometry constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DriveConfig {
    Mecanum(MecanumConfig),
    Swerve(SwerveConfig),
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self::Mecanum(MecanumConfig::default())
    }
}

/// Mecanum geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MecanumConfig {
    /// Distance from chassis centre to each wheel, m.
    #[serde(default = "default_rotation_radii")]
    pub rotation_radii: [f64; 4],
    /// Front/rear rotation bias `S`: front wheels get `S - 1`, rear `-S - 1`.
    #[serde(default)]
    pub rotation_scale: f64,
}

fn default_rotation_radii() -> [f64; 4] {
    [0.2; 4]
}

impl Default for MecanumConfig {
    fn default() -> Self {
        Self {
            rotation_radii: default_rotation_radii(),
            rotation_scale: 0.0,
        }
    }
}

/// Swerve geometry with an optional active suspension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwerveConfig {
    /// Angle between the body x axis and each leg, rad.
    #[serde(default = "default_leg_angle")]
    pub leg_angle: f64,
    /// Front/rear rotation bias `S`.
    #[serde(default)]
    pub rotation_scale: f64,
    /// Wheel radius about the centre when the suspension is idle, m.
    #[serde(default = "default_swerve_radius")]
    pub default_radius: f64,
    #[serde(default = "default_swerve_deadzone")]
    pub translation_deadzone: f64,
    #[serde(default = "default_swerve_deadzone")]
    pub rotation_deadzone: f64,
    #[serde(default = "default_swerve_deadzone")]
    pub hip_rate_deadzone: f64,
    /// Largest suspension tilt along either diagonal, rad.
    #[serde(default = "default_tilt_limit")]
    pub tilt_limit: f64,
    /// Drive direction sign per wheel after kinematics.
    #[serde(default = "default_drive_reversed")]
    pub drive_reversed: [bool; 4],
    /// Encoder angle of each steer motor when its wheel points forward, rad.
    #[serde(default)]
    pub steer_offsets: [f64; 4],
    #[serde(default = "default_steer_pid")]
    pub steer_pid: PidConfig,
}

fn default_leg_angle() -> f64 {
    FRAC_PI_4
}
fn default_swerve_radius() -> f64 {
    0.25
}
fn default_swerve_deadzone() -> f64 {
    0.01
}
fn default_tilt_limit() -> f64 {
    0.15
}
fn default_drive_reversed() -> [bool; 4] {
    [true, false, false, true]
}
fn default_steer_pid() -> PidConfig {
    PidConfig::new(20_000.0, 0.0, 0.0, 30_000.0, 5_000.0)
}

impl Default for SwerveConfig {
    fn default() -> Self {
        Self {
            leg_angle: default_leg_angle(),
            rotation_scale: 0.0,
            default_radius: default_swerve_radius(),
            translation_deadzone: default_swerve_deadzone(),
            rotation_deadzone: default_swerve_deadzone(),
            hip_rate_deadzone: default_swerve_deadzone(),
            tilt_limit: default_tilt_limit(),
            drive_reversed: default_drive_reversed(),
            steer_offsets: [0.0; 4],
            steer_pid: default_steer_pid(),
        }
    }
}

/// Chassis behaviour and control parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChassisConfig {
    #[serde(default)]
    pub drive: DriveConfig,

    /// Forward speed limit, m/s.
    #[serde(default = "default_max_vx")]
    pub max_vx: f64,
    /// Strafe speed limit, m/s.
    #[serde(default = "default_max_vy")]
    pub max_vy: f64,
    /// Per-wheel speed limit, m/s. Wheel targets are scaled down together.
    #[serde(default = "default_max_wheel_speed")]
    pub max_wheel_speed: f64,
    /// Operator rotation rate at full stick, rad/s.
    #[serde(default = "default_max_wz")]
    pub max_wz: f64,

    /// Spin rate of `Spinning`, rad/s.
    #[serde(default = "default_spin_rate")]
    pub spin_rate: f64,
    /// Spin rate change per dial flick, rad/s.
    #[serde(default = "default_spin_dial_step")]
    pub spin_dial_step: f64,

    /// First-order filter time constants of vx and vy, s.
    #[serde(default = "default_accel_num")]
    pub accel_filter_vx: f64,
    #[serde(default = "default_accel_num")]
    pub accel_filter_vy: f64,

    /// Wheel rim speed (m/s) per motor shaft rad/s.
    #[serde(default = "default_wheel_speed_ratio")]
    pub wheel_speed_ratio: f64,
    /// Motion-from-wheels scale for odometry.
    #[serde(default = "default_odometry_scale")]
    pub odometry_scale: f64,

    /// Largest current code sent to a wheel.
    #[serde(default = "default_wheel_current_limit")]
    pub wheel_current_limit: f64,

    #[serde(default = "default_wheel_pid")]
    pub wheel_pid: PidConfig,
    #[serde(default = "default_follow_pid")]
    pub follow_pid: PidConfig,
}

fn default_max_vx() -> f64 {
    2.0
}
fn default_max_vy() -> f64 {
    1.5
}
fn default_max_wheel_speed() -> f64 {
    4.0
}
fn default_max_wz() -> f64 {
    6.0
}
fn default_spin_rate() -> f64 {
    6.0
}
fn default_spin_dial_step() -> f64 {
    1.0
}
fn default_accel_num() -> f64 {
    0.166_666_666_7
}
fn default_wheel_speed_ratio() -> f64 {
    0.003_970_6
}
fn default_odometry_scale() -> f64 {
    0.25
}
fn default_wheel_current_limit() -> f64 {
    16_000.0
}
fn default_wheel_pid() -> PidConfig {
    PidConfig::new(15_000.0, 10.0, 0.0, 16_000.0, 2_000.0)
}
fn default_follow_pid() -> PidConfig {
    PidConfig::new(40.0, 0.0, 0.0, 6.0, 0.2)
}

impl Default for ChassisConfig {
    fn default() -> Self {
        Self {
            drive: DriveConfig::default(),
            max_vx: default_max_vx(),
            max_vy: default_max_vy(),
            max_wheel_speed: default_max_wheel_speed(),
            max_wz: default_max_wz(),
            spin_rate: default_spin_rate(),
            spin_dial_step: default_spin_dial_step(),
            accel_filter_vx: default_accel_num(),
            accel_filter_vy: default_accel_num(),
            wheel_speed_ratio: default_wheel_speed_ratio(),
            odometry_scale: default_odometry_scale(),
            wheel_current_limit: default_wheel_current_limit(),
            wheel_pid: default_wheel_pid(),
            follow_pid: default_follow_pid(),
        }
    }
}

impl ChassisConfig {
    pub fn validate(&self) -> Result<(), String> {
        check_positive("max_vx", self.max_vx)?;
        check_positive("max_vy", self.max_vy)?;
        check_positive("max_wheel_speed", self.max_wheel_speed)?;
        check_positive("max_wz", self.max_wz)?;
        check_positive("wheel_speed_ratio", self.wheel_speed_ratio)?;
        check_positive("wheel_current_limit", self.wheel_current_limit)?;
        if !(self.accel_filter_vx >= 0.0 && self.accel_filter_vy >= 0.0) {
            return Err("accel filter constants must be >= 0".to_string());
        }
        self.wheel_pid.validate("wheel_pid")?;
        self.follow_pid.validate("follow_pid")?;
        match &self.drive {
            DriveConfig::Mecanum(m) => {
                for (i, r) in m.rotation_radii.iter().enumerate() {
                    check_positive(&format!("rotation_radii[{i}]"), *r)?;
                }
            }
            DriveConfig::Swerve(s) => {
                check_positive("default_radius", s.default_radius)?;
                if !(0.0..FRAC_PI_2).contains(&s.tilt_limit) {
                    return Err(format!("tilt_limit {} out of range [0, π/2)", s.tilt_limit));
                }
                s.steer_pid.validate("steer_pid")?;
            }
        }
        Ok(())
    }
}

// ─── Gimbal ─────────────────────────────────────────────────────────

/// One gimbal axis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GimbalAxisConfig {
    /// Encoder count at the mechanical zero.
    #[serde(default = "default_offset_ecd")]
    pub offset_ecd: u16,
    /// Relative angle limits, rad.
    pub min_relative: f64,
    pub max_relative: f64,
    /// Axis sits on a slip ring and may turn without limit.
    #[serde(default)]
    pub slip_ring: bool,
    /// Motor mounted so that encoder and body angle run opposite.
    #[serde(default)]
    pub reversed: bool,
    /// Set-point change per joystick unit per cycle, rad.
    pub rc_sensitivity: f64,
    /// Set-point change per mouse count per cycle, rad.
    pub mouse_sensitivity: f64,
    /// Largest current code sent to the motor.
    #[serde(default = "default_gimbal_current_limit")]
    pub current_limit: f64,

    pub gyro_angle_pid: PidConfig,
    pub gyro_speed_pid: PidConfig,
    pub camera_angle_pid: PidConfig,
    pub camera_speed_pid: PidConfig,
    pub encoder_angle_pid: PidConfig,
}

fn default_offset_ecd() -> u16 {
    4096
}
fn default_gimbal_current_limit() -> f64 {
    30_000.0
}

impl GimbalAxisConfig {
    pub fn default_yaw() -> Self {
        Self {
            offset_ecd: default_offset_ecd(),
            min_relative: -PI,
            max_relative: PI,
            slip_ring: true,
            reversed: false,
            rc_sensitivity: 0.000_005,
            mouse_sensitivity: 0.000_05,
            current_limit: default_gimbal_current_limit(),
            gyro_angle_pid: PidConfig::new(26.0, 0.0, 0.0, 10.0, 0.0),
            gyro_speed_pid: PidConfig::new(3600.0, 20.0, 0.0, 30_000.0, 5_000.0),
            camera_angle_pid: PidConfig::new(18.0, 0.0, 0.0, 10.0, 0.0),
            camera_speed_pid: PidConfig::new(3000.0, 10.0, 0.0, 30_000.0, 5_000.0),
            encoder_angle_pid: PidConfig::new(8.0, 0.0, 0.0, 10.0, 0.0),
        }
    }

    pub fn default_pitch() -> Self {
        Self {
            offset_ecd: default_offset_ecd(),
            min_relative: -0.35,
            max_relative: 0.35,
            slip_ring: false,
            reversed: false,
            rc_sensitivity: 0.000_006,
            mouse_sensitivity: 0.000_05,
            current_limit: default_gimbal_current_limit(),
            gyro_angle_pid: PidConfig::new(15.0, 0.0, 0.0, 10.0, 0.0),
            gyro_speed_pid: PidConfig::new(2900.0, 60.0, 0.0, 30_000.0, 10_000.0),
            camera_angle_pid: PidConfig::new(12.0, 0.0, 0.0, 10.0, 0.0),
            camera_speed_pid: PidConfig::new(2500.0, 30.0, 0.0, 30_000.0, 10_000.0),
            encoder_angle_pid: PidConfig::new(15.0, 0.0, 0.0, 10.0, 0.0),
        }
    }

    pub fn validate(&self, name: &str) -> Result<(), String> {
        if self.min_relative >= self.max_relative {
            return Err(format!(
                "{name}: min_relative {} must be below max_relative {}",
                self.min_relative, self.max_relative
            ));
        }
        if self.offset_ecd >= crate::consts::ECD_RANGE {
            return Err(format!("{name}: offset_ecd {} out of range", self.offset_ecd));
        }
        check_positive(&format!("{name}.current_limit"), self.current_limit)?;
        self.gyro_angle_pid.validate(&format!("{name}.gyro_angle_pid"))?;
        self.gyro_speed_pid.validate(&format!("{name}.gyro_speed_pid"))?;
        self.camera_angle_pid.validate(&format!("{name}.camera_angle_pid"))?;
        self.camera_speed_pid.validate(&format!("{name}.camera_speed_pid"))?;
        self.encoder_angle_pid.validate(&format!("{name}.encoder_angle_pid"))?;
        Ok(())
    }
}

/// Gimbal parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GimbalConfig {
    #[serde(default = "GimbalAxisConfig::default_yaw")]
    pub yaw: GimbalAxisConfig,
    #[serde(default = "GimbalAxisConfig::default_pitch")]
    pub pitch: GimbalAxisConfig,
    /// Measured current at or above this latches the emergency stop.
    #[serde(default = "default_estop_current")]
    pub estop_current: f64,
}

fn default_estop_current() -> f64 {
    30_000.0
}

impl Default for GimbalConfig {
    fn default() -> Self {
        Self {
            yaw: GimbalAxisConfig::default_yaw(),
            pitch: GimbalAxisConfig::default_pitch(),
            estop_current: default_estop_current(),
        }
    }
}

impl GimbalConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.yaw.validate("yaw")?;
        self.pitch.validate("pitch")?;
        check_positive("estop_current", self.estop_current)
    }
}

// ─── Shooter ────────────────────────────────────────────────────────

/// Trigger and friction wheel parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ShooterConfig {
    /// Trigger gearbox reduction.
    #[serde(default = "default_trigger_gear")]
    pub trigger_gear: f64,
    /// Output-shaft turn per bullet, rad.
    #[serde(default = "default_angle_increment")]
    pub angle_increment: f64,
    /// Trigger speed while loading, rad/s.
    #[serde(default = "default_ready_trigger_speed")]
    pub ready_trigger_speed: f64,
    /// Trigger speed of a semi-auto shot, rad/s.
    #[serde(default = "default_trigger_speed")]
    pub trigger_speed: f64,
    /// Trigger speed in auto fire, rad/s.
    #[serde(default = "default_auto_trigger_speed")]
    pub auto_trigger_speed: f64,
    /// Below this trigger speed the trigger counts as stalled, rad/s.
    #[serde(default = "default_block_speed")]
    pub block_speed: f64,
    /// Stall ticks before reversing.
    #[serde(default = "default_block_ticks")]
    pub block_ticks: u32,
    /// Ticks spent reversing after a stall.
    #[serde(default = "default_reverse_ticks")]
    pub reverse_ticks: u32,
    /// Slowest trigger speed while reversing, rad/s.
    #[serde(default = "default_unjam_speed")]
    pub unjam_speed: f64,
    /// Ticks a fire input must be held for auto fire.
    #[serde(default = "default_long_press_ticks")]
    pub long_press_ticks: u32,
    /// Heat headroom that must remain for a shot.
    #[serde(default = "default_heat_margin")]
    pub heat_margin: u16,

    /// Friction wheel rim target speed, m/s.
    #[serde(default = "default_friction_speed")]
    pub friction_speed: f64,
    /// Friction ramp change per tick, m/s.
    #[serde(default = "default_friction_ramp")]
    pub friction_ramp_step: f64,
    /// Rim speed (m/s) per friction motor rad/s.
    #[serde(default = "default_friction_ratio")]
    pub friction_speed_ratio: f64,

    #[serde(default = "default_trigger_pid")]
    pub trigger_pid: PidConfig,
    #[serde(default = "default_friction_pid")]
    pub friction_pid: PidConfig,
}

fn default_trigger_gear() -> f64 {
    36.0
}
fn default_angle_increment() -> f64 {
    FRAC_PI_8
}
fn default_ready_trigger_speed() -> f64 {
    5.0
}
fn default_trigger_speed() -> f64 {
    10.0
}
fn default_auto_trigger_speed() -> f64 {
    15.0
}
fn default_block_speed() -> f64 {
    1.0
}
fn default_block_ticks() -> u32 {
    700
}
fn default_unjam_speed() -> f64 {
    default_ready_trigger_speed()
}
fn default_reverse_ticks() -> u32 {
    500
}
fn default_long_press_ticks() -> u32 {
    800
}
fn default_heat_margin() -> u16 {
    50
}
fn default_friction_speed() -> f64 {
    25.0
}
fn default_friction_ramp() -> f64 {
    0.05
}
fn default_friction_ratio() -> f64 {
    0.03
}
fn default_trigger_pid() -> PidConfig {
    PidConfig::new(800.0, 500.0, 0.002, 10_000.0, 9_000.0)
}
fn default_friction_pid() -> PidConfig {
    PidConfig::new(2000.0, 20.0, 0.0, 16_000.0, 200.0)
}

impl Default for ShooterConfig {
    fn default() -> Self {
        Self {
            trigger_gear: default_trigger_gear(),
            angle_increment: default_angle_increment(),
            ready_trigger_speed: default_ready_trigger_speed(),
            trigger_speed: default_trigger_speed(),
            auto_trigger_speed: default_auto_trigger_speed(),
            block_speed: default_block_speed(),
            block_ticks: default_block_ticks(),
            reverse_ticks: default_reverse_ticks(),
            unjam_speed: default_unjam_speed(),
            long_press_ticks: default_long_press_ticks(),
            heat_margin: default_heat_margin(),
            friction_speed: default_friction_speed(),
            friction_ramp_step: default_friction_ramp(),
            friction_speed_ratio: default_friction_ratio(),
            trigger_pid: default_trigger_pid(),
            friction_pid: default_friction_pid(),
        }
    }
}

impl ShooterConfig {
    pub fn validate(&self) -> Result<(), String> {
        check_positive("trigger_gear", self.trigger_gear)?;
        check_positive("angle_increment", self.angle_increment)?;
        check_positive("friction_speed", self.friction_speed)?;
        check_positive("unjam_speed", self.unjam_speed)?;
        check_positive("friction_ramp_step", self.friction_ramp_step)?;
        check_positive("friction_speed_ratio", self.friction_speed_ratio)?;
        if self.angle_increment >= PI {
            return Err(format!(
                "angle_increment {} must be below π",
                self.angle_increment
            ));
        }
        self.trigger_pid.validate("trigger_pid")?;
        self.friction_pid.validate("friction_pid")
    }
}

// ─── Arm ────────────────────────────────────────────────────────────

/// Mechanical limits kept clear of by this margin, rad.
pub const JOINT_LIMIT_CLEARANCE: f64 = 0.08;

/// One arm joint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointConfig {
    pub min: f64,
    pub max: f64,
    pub home: f64,
    /// Encoder and joint angle run opposite.
    #[serde(default)]
    pub reversed: bool,
    pub pid: PidConfig,
}

/// Manipulator arm parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmConfig {
    /// Seven joints, base first. Joints 0..3 are MIT motors, the rest Ktech.
    #[serde(default = "default_joints")]
    pub joints: Vec<JointConfig>,
    #[serde(default)]
    pub mit_model: MitMotorModel,
    /// Gear ratio of each Ktech joint, joint 3 first (MG4005 = 10, MS4005 = 1).
    #[serde(default = "default_ktech_gears")]
    pub ktech_gears: [f64; 4],
    /// Largest Ktech current code.
    #[serde(default = "default_ktech_max_current")]
    pub ktech_max_current: f64,
    /// All joints within this distance of the target completes a move, rad.
    #[serde(default = "default_reach_tolerance")]
    pub reach_tolerance: f64,
}

fn default_ktech_gears() -> [f64; 4] {
    [10.0, 1.0, 1.0, 1.0]
}
fn default_ktech_max_current() -> f64 {
    2000.0
}
fn default_reach_tolerance() -> f64 {
    0.05
}

fn default_joints() -> Vec<JointConfig> {
    let c = JOINT_LIMIT_CLEARANCE;
    let deg = PI / 180.0;
    let mit = PidConfig::new(20.0, 0.5, 0.5, 10.0, 2.0);
    let ktech = PidConfig::new(2000.0, 20.0, 50.0, 2000.0, 500.0);
    let joint = |min: f64, max: f64, home: f64, reversed: bool, pid: PidConfig| JointConfig {
        min,
        max,
        home,
        reversed,
        pid,
    };
    vec![
        joint(-PI + c, PI - c, 0.0, true, mit),
        joint(-30.0 * deg + c, 35.0 * deg - c, 35.0 * deg - c, false, mit),
        joint(-150.0 * deg + c, -c, -150.0 * deg + c, false, mit),
        joint(-80.0 * deg + c, 80.0 * deg - c, 0.0, false, ktech),
        joint(-FRAC_PI_2 + c, FRAC_PI_2 - c, 0.0, false, ktech),
        joint(10.0 * deg + c, 170.0 * deg - c, 170.0 * deg - c, false, ktech),
        joint(-PI + c, PI - c, 0.0, false, ktech),
    ]
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            joints: default_joints(),
            mit_model: MitMotorModel::default(),
            ktech_gears: default_ktech_gears(),
            ktech_max_current: default_ktech_max_current(),
            reach_tolerance: default_reach_tolerance(),
        }
    }
}

impl ArmConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.joints.len() != ARM_JOINT_COUNT {
            return Err(format!(
                "expected {ARM_JOINT_COUNT} joints, found {}",
                self.joints.len()
            ));
        }
        for (i, j) in self.joints.iter().enumerate() {
            if j.min >= j.max {
                return Err(format!("joint {i}: min {} must be below max {}", j.min, j.max));
            }
            if j.home < j.min || j.home > j.max {
                return Err(format!("joint {i}: home {} outside limits", j.home));
            }
            j.pid.validate(&format!("joint {i}"))?;
        }
        for (k, &gear) in self.ktech_gears.iter().enumerate() {
            check_positive(&format!("ktech_gears[{k}]"), gear)?;
        }
        check_positive("ktech_max_current", self.ktech_max_current)?;
        check_positive("reach_tolerance", self.reach_tolerance)
    }
}

// ─── Vision Link ────────────────────────────────────────────────────

/// Vision link timing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VisionConfig {
    /// Commander poll interval, ms.
    #[serde(default = "default_vision_poll")]
    pub poll_ms: u64,
    /// SHOOT mode bit clears itself after this long, ms.
    #[serde(default = "default_shoot_timeout")]
    pub shoot_timeout_ms: u64,
    /// Vision angle deltas are scaled by this before use.
    #[serde(default = "default_vision_gain")]
    pub angle_gain: f64,
    /// Low-pass coefficient applied to the vision angle deltas.
    #[serde(default)]
    pub angle_filter: f64,
}

fn default_vision_poll() -> u64 {
    1500
}
fn default_shoot_timeout() -> u64 {
    2000
}
fn default_vision_gain() -> f64 {
    1.0
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            poll_ms: default_vision_poll(),
            shoot_timeout_ms: default_shoot_timeout(),
            angle_gain: default_vision_gain(),
            angle_filter: 0.0,
        }
    }
}

impl VisionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_ms == 0 {
            return Err("poll_ms must be > 0".to_string());
        }
        check_positive("angle_gain", self.angle_gain)?;
        check_unit_interval("angle_filter", self.angle_filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        RobotConfig::default().validate().unwrap();
    }

    #[test]
    fn default_arm_is_valid() {
        let arm = ArmConfig::default();
        arm.validate().unwrap();
        assert!(arm.joints[0].reversed);
        assert!((arm.joints[2].max + JOINT_LIMIT_CLEARANCE).abs() < 1e-12);
    }

    #[test]
    fn arm_needs_seven_joints() {
        let mut arm = ArmConfig::default();
        arm.joints.pop();
        assert!(arm.validate().is_err());
    }

    #[test]
    fn mit_ranges_per_model() {
        let r = MitMotorModel::Dm4310.range();
        assert_eq!((r.p_min, r.p_max), (-12.5, 12.5));
        assert_eq!((r.v_min, r.v_max), (-25.0, 25.0));
        assert_eq!((r.t_min, r.t_max), (-20.0, 20.0));
        assert_eq!((r.kp_min, r.kp_max), (0.0, 500.0));
        assert_eq!((r.kd_min, r.kd_max), (0.0, 5.0));
        assert_eq!(MitMotorModel::HighSpeed.range().v_max, 45.0);
        assert_eq!(MitMotorModel::LowTorque.range().t_max, 10.0);
    }

    #[test]
    fn pid_requires_positive_output_limit() {
        let pid = PidConfig::new(1.0, 0.0, 0.0, 0.0, 0.0);
        assert!(pid.validate("p").is_err());
    }

    #[test]
    fn shooter_without_gimbal_rejected() {
        let cfg = RobotConfig {
            gimbal: None,
            ..RobotConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn gimbal_limits_must_be_ordered() {
        let mut g = GimbalConfig::default();
        g.pitch.min_relative = 0.5;
        assert!(g.validate().is_err());
    }
}
