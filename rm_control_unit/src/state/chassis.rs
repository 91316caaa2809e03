//! Chassis behaviour machine.
//!
//! Mode table (right switch, left switch):
//!
//! | right | left | mode |
//! |-------|------|------|
//! | Down  | any  | ZeroForce |
//! | Mid   | Down | NoMove |
//! | Mid   | Mid  | FollowGimbalYaw |
//! | Mid   | Up   | Spinning |
//! | Up    | Down | Raw |
//! | Up    | Mid  | NoFollowYaw |
//! | Up    | Up   | CvAssisted (NoFollowYaw while the vision link is down) |
//!
//! The E key toggles spinning on top of either follow mode.

use heapless::Vec;
use rm_common::consts::{RC_CHANNEL_HALF_RANGE, RC_DEADBAND};
use rm_common::control_unit::config::{CanMapConfig, ChassisConfig, DriveConfig, SwerveConfig};
use rm_common::control_unit::input::{KeyFlags, RobotInputs, SwitchPosition, channel};
use rm_common::control_unit::measurement::{DeviceId, MotionVector};
use rm_common::control_unit::state::ChassisMode;
use rm_common::hal::bus::BusId;
use rm_common::hal::liveness::LivenessTracker;

use super::{ModeLatch, TxScratch, stage_rm_currents};
use crate::codec::table::MotorTable;
use crate::control::angle::{angle_to_ecd, deadband, rad_format};
use crate::control::filters::{FirstOrderState, first_order_apply};
use crate::control::pid::Pid;
use crate::kinematics::limit_wheel_speeds;
use crate::kinematics::mecanum::{motion_from_wheel_speeds, wheel_speeds_from_motion};
use crate::kinematics::platform::{
    PlatformAttitude, constrain_attitude, diagonal_radii, rpy_to_alpha,
};
use crate::kinematics::swerve::{HipMotion, SwerveState, wheel_targets_from_motion};
use crate::vision::CvCommand;

/// Dial deflection that counts as a flick.
const DIAL_FLICK: i16 = 500;
/// Dial deflection below which the flick latch releases.
const DIAL_RELEASE: i16 = 100;

/// Everything the chassis reads in one cycle.
pub struct ChassisInputs<'a> {
    pub robot: &'a RobotInputs,
    pub motors: &'a MotorTable,
    pub health: &'a dyn LivenessTracker,
    /// Gimbal yaw relative to the chassis, rad. Zero without a gimbal.
    pub gimbal_relative_yaw: f64,
    /// Valid vision command, if any.
    pub vision: Option<CvCommand>,
    /// Cycle period, s.
    pub dt: f64,
}

/// Result of one chassis cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChassisOutput {
    pub mode: ChassisMode,
    /// Filtered and limited motion command.
    pub motion: MotionVector,
    /// Wheel rim speed targets, m/s.
    pub wheel_speed_set: [f64; 4],
    /// Wheel current codes.
    pub wheel_currents: [f64; 4],
    /// Steer angle targets, rad (swerve only).
    pub steer_angles: [f64; 4],
    /// Steer targets as encoder counts (swerve only).
    pub steer_ecd: [u16; 4],
    /// Steer motor voltage codes (swerve only).
    pub steer_voltages: [f64; 4],
    /// Motion measured from the wheels.
    pub odometry: MotionVector,
}

#[derive(Debug, Clone)]
pub struct ChassisMachine {
    cfg: ChassisConfig,
    bus: BusId,
    wheel_ids: [u16; 4],
    steer_ids: [u16; 4],
    latch: ModeLatch<ChassisMode>,
    spin_override: bool,
    spin_rate: f64,
    dial_latched: bool,
    yaw_set: f64,
    vx_filter: FirstOrderState,
    vy_filter: FirstOrderState,
    wheel_pids: [Pid; 4],
    follow_pid: Pid,
    steer_pids: Option<[Pid; 4]>,
    swerve: SwerveState,
    platform: Platform,
    critical: Vec<DeviceId, 10>,
    output: ChassisOutput,
}

impl ChassisMachine {
    pub fn new(cfg: ChassisConfig, can: &CanMapConfig) -> Self {
        let mut critical = Vec::new();
        let is_swerve = matches!(cfg.drive, DriveConfig::Swerve(_));
        for i in 0..4u8 {
            let _ = critical.push(DeviceId::ChassisWheel(i));
            if is_swerve {
                let _ = critical.push(DeviceId::ChassisSteer(i));
            }
        }
        let _ = critical.push(DeviceId::RemoteControl);
        let _ = critical.push(DeviceId::Imu);

        let (steer_pids, platform) = match &cfg.drive {
            DriveConfig::Swerve(s) => (Some([Pid::angle(s.steer_pid); 4]), Platform::level(s)),
            DriveConfig::Mecanum(_) => (None, Platform::default()),
        };

        Self {
            bus: BusId(can.chassis_bus),
            wheel_ids: can.wheel_ids,
            steer_ids: can.steer_ids,
            latch: ModeLatch::default(),
            spin_override: false,
            spin_rate: cfg.spin_rate,
            dial_latched: false,
            yaw_set: 0.0,
            vx_filter: FirstOrderState::default(),
            vy_filter: FirstOrderState::default(),
            wheel_pids: [Pid::raw(cfg.wheel_pid); 4],
            follow_pid: Pid::angle(cfg.follow_pid),
            steer_pids,
            swerve: SwerveState::default(),
            platform,
            critical,
            output: ChassisOutput::default(),
            cfg,
        }
    }

    #[inline]
    pub fn mode(&self) -> ChassisMode {
        self.latch.current()
    }

    #[inline]
    pub fn transition_count(&self) -> u32 {
        self.latch.transition_count()
    }

    #[inline]
    pub fn output(&self) -> &ChassisOutput {
        &self.output
    }

    #[inline]
    pub fn yaw_set(&self) -> f64 {
        self.yaw_set
    }

    #[inline]
    pub fn spin_rate(&self) -> f64 {
        self.spin_rate
    }

    /// Suspension platform request. `None` levels the platform and
    /// releases the hips. Ignored on a mecanum base.
    pub fn set_platform_attitude(&mut self, attitude: Option<PlatformAttitude>) {
        self.platform.request = attitude;
    }

    /// Attitude the platform was last driven to, after the tilt limit.
    #[inline]
    pub fn platform_attitude(&self) -> PlatformAttitude {
        self.platform.reached
    }

    /// Wheel radii used by the last swerve cycle, m.
    #[inline]
    pub fn platform_radii(&self) -> &[f64; 4] {
        &self.platform.radii
    }

    /// Run one cycle: select, transition, control.
    pub fn update(&mut self, inp: &ChassisInputs<'_>) -> &ChassisOutput {
        let next = self.select_mode(inp);
        if self.latch.update("chassis", next).is_some() {
            self.on_enter(next, inp);
        }
        self.control(inp);
        &self.output
    }

    // ─── Mode Selection ─────────────────────────────────────────────

    fn select_mode(&mut self, inp: &ChassisInputs<'_>) -> ChassisMode {
        if inp.health.any_faulted(&self.critical) {
            self.spin_override = false;
            return ChassisMode::ZeroForce;
        }
        let op = &inp.robot.operator;
        if op.key_rising(KeyFlags::E) {
            self.spin_override = !self.spin_override;
        }

        let mode = match (op.switch_right, op.switch_left) {
            (SwitchPosition::Down, _) => ChassisMode::ZeroForce,
            (SwitchPosition::Mid, SwitchPosition::Down) => ChassisMode::NoMove,
            (SwitchPosition::Mid, SwitchPosition::Mid) => ChassisMode::FollowGimbalYaw,
            (SwitchPosition::Mid, SwitchPosition::Up) => ChassisMode::Spinning,
            (SwitchPosition::Up, SwitchPosition::Down) => ChassisMode::Raw,
            (SwitchPosition::Up, SwitchPosition::Mid) => ChassisMode::NoFollowYaw,
            (SwitchPosition::Up, SwitchPosition::Up) => {
                if inp.health.is_faulted(DeviceId::VisionLink) {
                    ChassisMode::NoFollowYaw
                } else {
                    ChassisMode::CvAssisted
                }
            }
        };

        match mode {
            ChassisMode::ZeroForce => {
                self.spin_override = false;
                mode
            }
            ChassisMode::FollowGimbalYaw | ChassisMode::NoFollowYaw if self.spin_override => {
                ChassisMode::Spinning
            }
            _ => mode,
        }
    }

    // ─── Transitions ────────────────────────────────────────────────

    fn on_enter(&mut self, mode: ChassisMode, inp: &ChassisInputs<'_>) {
        self.dial_latched = false;
        self.vx_filter.reset();
        self.vy_filter.reset();
        for pid in self.wheel_pids.iter_mut() {
            pid.reset();
        }
        if let Some(pids) = self.steer_pids.as_mut() {
            for pid in pids.iter_mut() {
                pid.reset();
            }
        }
        match mode {
            ChassisMode::FollowGimbalYaw => self.follow_pid.reset(),
            ChassisMode::NoFollowYaw => {
                self.yaw_set = inp.robot.imu.yaw;
                self.follow_pid.reset();
            }
            ChassisMode::Spinning => self.spin_rate = self.cfg.spin_rate,
            ChassisMode::Raw => self.swerve.reset(),
            ChassisMode::ZeroForce | ChassisMode::NoMove | ChassisMode::CvAssisted => {}
        }
    }

    // ─── Control ────────────────────────────────────────────────────

    /// Operator translation request in the gimbal frame, m/s. Left strafe
    /// is positive.
    fn operator_translation(&self, inp: &ChassisInputs<'_>) -> (f64, f64) {
        let op = &inp.robot.operator;
        let half = f64::from(RC_CHANNEL_HALF_RANGE);
        let stick = |ch: usize| f64::from(deadband(op.channels[ch], RC_DEADBAND)) / half;
        let mut vx = stick(channel::LEFT_VERTICAL) * self.cfg.max_vx;
        let mut vy = -stick(channel::LEFT_HORIZONTAL) * self.cfg.max_vy;
        if op.keys.contains(KeyFlags::W) {
            vx = self.cfg.max_vx;
        } else if op.keys.contains(KeyFlags::S) {
            vx = -self.cfg.max_vx;
        }
        if op.keys.contains(KeyFlags::A) {
            vy = self.cfg.max_vy;
        } else if op.keys.contains(KeyFlags::D) {
            vy = -self.cfg.max_vy;
        }
        (vx, vy)
    }

    fn filtered_translation(&mut self, inp: &ChassisInputs<'_>) -> (f64, f64) {
        let (vx, vy) = self.operator_translation(inp);
        self.smooth_translation(vx, vy, inp.dt)
    }

    /// Acceleration filter shared by every translating mode.
    fn smooth_translation(&mut self, vx: f64, vy: f64, dt: f64) -> (f64, f64) {
        (
            first_order_apply(&mut self.vx_filter, self.cfg.accel_filter_vx, vx, dt),
            first_order_apply(&mut self.vy_filter, self.cfg.accel_filter_vy, vy, dt),
        )
    }

    fn adjust_spin_from_dial(&mut self, dial: i16) {
        if dial.abs() >= DIAL_FLICK && !self.dial_latched {
            self.spin_rate += f64::from(dial.signum()) * self.cfg.spin_dial_step;
            self.spin_rate = self.spin_rate.clamp(-self.cfg.max_wz, self.cfg.max_wz);
            self.dial_latched = true;
        } else if dial.abs() < DIAL_RELEASE {
            self.dial_latched = false;
        }
    }

    /// Motion command of the active mode, before limiting.
    fn mode_motion(&mut self, mode: ChassisMode, inp: &ChassisInputs<'_>) -> MotionVector {
        let relative = inp.gimbal_relative_yaw;
        match mode {
            ChassisMode::ZeroForce | ChassisMode::NoMove => MotionVector::default(),
            ChassisMode::FollowGimbalYaw => {
                let (vx, vy) = self.filtered_translation(inp);
                let (fwd, strafe) = rotate_by(vx, vy, relative);
                let wz = -self.follow_pid.calc(relative, 0.0, inp.dt);
                MotionVector::new(fwd, strafe, wz)
            }
            ChassisMode::NoFollowYaw => {
                let (vx, vy) = self.filtered_translation(inp);
                let op = &inp.robot.operator;
                let turn = f64::from(deadband(op.channels[channel::RIGHT_HORIZONTAL], RC_DEADBAND))
                    / f64::from(RC_CHANNEL_HALF_RANGE);
                self.yaw_set = rad_format(self.yaw_set - turn * self.cfg.max_wz * inp.dt);
                let error = rad_format(self.yaw_set - inp.robot.imu.yaw);
                let wz = self.follow_pid.calc(0.0, error, inp.dt);
                MotionVector::new(vx, vy, wz)
            }
            ChassisMode::Spinning => {
                self.adjust_spin_from_dial(inp.robot.operator.channels[channel::DIAL]);
                let (vx, vy) = self.filtered_translation(inp);
                let (fwd, strafe) = rotate_by(vx, vy, relative);
                MotionVector::new(fwd, strafe, self.spin_rate)
            }
            ChassisMode::CvAssisted => {
                let (vx, vy) = inp.vision.map_or((0.0, 0.0), |c| (c.speed_x, c.speed_y));
                let (vx, vy) = self.smooth_translation(vx, vy, inp.dt);
                MotionVector::new(vx, vy, 0.0)
            }
            ChassisMode::Raw => {
                let op = &inp.robot.operator;
                let scale = self.cfg.wheel_current_limit / f64::from(RC_CHANNEL_HALF_RANGE);
                let ch = |c: usize| f64::from(deadband(op.channels[c], RC_DEADBAND)) * scale;
                MotionVector::new(
                    ch(channel::LEFT_VERTICAL),
                    -ch(channel::LEFT_HORIZONTAL),
                    -ch(channel::RIGHT_HORIZONTAL),
                )
            }
        }
    }

    fn limit_motion(&self, m: MotionVector) -> MotionVector {
        if !m.is_finite() {
            return MotionVector::default();
        }
        MotionVector::new(
            m.forward.clamp(-self.cfg.max_vx, self.cfg.max_vx),
            m.strafe.clamp(-self.cfg.max_vy, self.cfg.max_vy),
            m.rotate.clamp(-self.cfg.max_wz, self.cfg.max_wz),
        )
    }

    fn control(&mut self, inp: &ChassisInputs<'_>) {
        let mode = self.latch.current();
        let raw_motion = self.mode_motion(mode, inp);
        let motion = match mode {
            ChassisMode::Raw if raw_motion.is_finite() => raw_motion,
            ChassisMode::Raw => MotionVector::default(),
            _ => self.limit_motion(raw_motion),
        };

        let measured = self.measured_rim_speeds(inp.motors);
        let mut out = ChassisOutput {
            mode,
            motion,
            ..ChassisOutput::default()
        };

        let (mut speeds, steer) = match &self.cfg.drive {
            DriveConfig::Mecanum(geo) => {
                out.odometry = motion_from_wheel_speeds(&measured, geo, self.cfg.odometry_scale);
                (wheel_speeds_from_motion(&motion, geo), None)
            }
            DriveConfig::Swerve(geo) => {
                let engaged = mode != ChassisMode::ZeroForce;
                let hip = self.platform.step(engaged, inp.gimbal_relative_yaw, inp.dt, geo);
                let targets = wheel_targets_from_motion(
                    &mut self.swerve,
                    &motion,
                    &self.platform.radii,
                    hip,
                    geo,
                );
                out.odometry = self.swerve_odometry(inp.motors, &measured, geo.steer_offsets);
                (targets.speeds, Some((targets.angles, geo.steer_offsets)))
            }
        };

        match mode {
            ChassisMode::ZeroForce => {}
            ChassisMode::Raw => {
                let limit = self.cfg.wheel_current_limit;
                for (cur, s) in out.wheel_currents.iter_mut().zip(speeds.iter()) {
                    *cur = s.clamp(-limit, limit);
                }
            }
            _ => {
                limit_wheel_speeds(&mut speeds, self.cfg.max_wheel_speed);
                out.wheel_speed_set = speeds;
                for i in 0..4 {
                    out.wheel_currents[i] =
                        self.wheel_pids[i].calc(measured[i], speeds[i], inp.dt);
                }
            }
        }

        if let (Some((angles, offsets)), Some(pids)) = (steer, self.steer_pids.as_mut()) {
            out.steer_angles = angles;
            for i in 0..4 {
                out.steer_ecd[i] = angle_to_ecd(angles[i] + offsets[i]);
                if mode != ChassisMode::ZeroForce {
                    let steer_pos = inp.motors.get(DeviceId::ChassisSteer(i as u8)).position;
                    let current = rad_format(steer_pos - offsets[i]);
                    out.steer_voltages[i] = pids[i].calc(current, angles[i], inp.dt);
                }
            }
        }

        self.output = out;
    }

    fn measured_rim_speeds(&self, motors: &MotorTable) -> [f64; 4] {
        core::array::from_fn(|i| {
            motors.get(DeviceId::ChassisWheel(i as u8)).velocity * self.cfg.wheel_speed_ratio
        })
    }

    /// Mean of the four wheel velocity vectors.
    fn swerve_odometry(&self, motors: &MotorTable, rim: &[f64; 4], offsets: [f64; 4]) -> MotionVector {
        let DriveConfig::Swerve(geo) = &self.cfg.drive else {
            return MotionVector::default();
        };
        let (mut fwd, mut strafe) = (0.0, 0.0);
        for i in 0..4 {
            let angle = rad_format(motors.get(DeviceId::ChassisSteer(i as u8)).position - offsets[i]);
            let speed = if geo.drive_reversed[i] { -rim[i] } else { rim[i] };
            fwd += speed * angle.cos();
            strafe -= speed * angle.sin();
        }
        MotionVector::new(fwd / 4.0, strafe / 4.0, 0.0)
    }

    // ─── Encode ─────────────────────────────────────────────────────

    /// Stage this cycle's wheel and steer frames.
    pub fn encode(&self, out: &mut TxScratch) {
        let mut commands: Vec<(u16, f64), 8> = Vec::new();
        for (id, cur) in self.wheel_ids.iter().zip(self.output.wheel_currents.iter()) {
            let _ = commands.push((*id, *cur));
        }
        if let Some(pids) = &self.steer_pids {
            for ((id, v), pid) in self
                .steer_ids
                .iter()
                .zip(self.output.steer_voltages.iter())
                .zip(pids.iter())
            {
                let limit = pid.gains().max_out;
                let _ = commands.push((*id, v.clamp(-limit, limit)));
            }
        }
        stage_rm_currents(out, self.bus, &commands);
    }
}

/// Suspension platform between cycles.
#[derive(Debug, Clone, Copy, Default)]
struct Platform {
    request: Option<PlatformAttitude>,
    reached: PlatformAttitude,
    radii: [f64; 4],
    active: bool,
}

impl Platform {
    fn level(geo: &SwerveConfig) -> Self {
        Self {
            radii: [geo.default_radius; 4],
            ..Self::default()
        }
    }

    /// Move the radii to the requested attitude and report the hip motion
    /// that produced them. The platform only follows a request while
    /// `engaged`.
    fn step(&mut self, engaged: bool, relative_yaw: f64, dt: f64, geo: &SwerveConfig) -> HipMotion {
        let request = self.request.filter(|_| engaged);
        let target = match request {
            Some(a) => {
                let (roll, pitch) = constrain_attitude(a.roll, a.pitch, relative_yaw, geo.tilt_limit);
                self.reached = PlatformAttitude { roll, pitch };
                diagonal_radii(rpy_to_alpha(roll, pitch, relative_yaw), geo.default_radius)
            }
            None => {
                self.reached = PlatformAttitude::default();
                [geo.default_radius; 4]
            }
        };
        let rates: [f64; 4] = core::array::from_fn(|i| {
            if dt > 0.0 { (target[i] - self.radii[i]) / dt } else { 0.0 }
        });
        self.radii = target;

        let was_active = core::mem::replace(&mut self.active, request.is_some());
        match (request.is_some(), was_active) {
            (true, _) => HipMotion::Active(rates),
            (false, true) => HipMotion::ReleaseEdge,
            (false, false) => HipMotion::Idle,
        }
    }
}

/// Rotate a gimbal-frame translation into the chassis frame.
#[inline]
fn rotate_by(vx: f64, vy: f64, relative_yaw: f64) -> (f64, f64) {
    let (s, c) = relative_yaw.sin_cos();
    (c * vx - s * vy, s * vx + c * vy)
}
