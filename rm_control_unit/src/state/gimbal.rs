//! Gimbal behaviour machine.
//!
//! The behaviour (`ZeroForce`, `Absolute`, `Relative`, `VisionAssisted`)
//! maps onto a motor mode per axis. Each axis runs a cascade: an angle loop
//! produces a rate set-point from the angle error, with the gyro rate as its
//! derivative, and a speed loop turns that into current.

use rm_common::consts::{ECD_TO_RAD, RC_DEADBAND};
use rm_common::control_unit::config::{CanMapConfig, GimbalAxisConfig, GimbalConfig, VisionConfig};
use rm_common::control_unit::input::{RobotInputs, SwitchPosition, channel};
use rm_common::control_unit::measurement::DeviceId;
use rm_common::control_unit::state::{GimbalBehaviour, GimbalMotorMode};
use rm_common::hal::liveness::LivenessTracker;

use super::ModeLatch;
use crate::codec::guard::finite_or_zero;
use crate::codec::table::MotorTable;
use crate::control::angle::{deadband, ecd_format, ecd_to_angle_change, ecd_to_rad, rad_format};
use crate::control::pid::Pid;
use crate::safety::estop::EstopLatch;
use crate::vision::CvCommand;

const CRITICAL: [DeviceId; 4] = [
    DeviceId::GimbalYaw,
    DeviceId::GimbalPitch,
    DeviceId::RemoteControl,
    DeviceId::Imu,
];

/// Everything the gimbal reads in one cycle.
pub struct GimbalInputs<'a> {
    pub robot: &'a RobotInputs,
    pub motors: &'a MotorTable,
    pub health: &'a dyn LivenessTracker,
    /// Aim command, present only while auto-aim is on and the command valid.
    pub vision: Option<CvCommand>,
    pub dt: f64,
}

/// Per-axis result of one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisOutput {
    pub mode: GimbalMotorMode,
    pub absolute_set: f64,
    pub relative_set: f64,
    pub absolute: f64,
    pub relative: f64,
    pub current: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GimbalOutput {
    pub behaviour: GimbalBehaviour,
    pub yaw: AxisOutput,
    pub pitch: AxisOutput,
    pub estop: bool,
}

// ─── Axis ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct GimbalAxis {
    cfg: GimbalAxisConfig,
    mode: GimbalMotorMode,
    absolute_set: f64,
    relative_set: f64,
    absolute: f64,
    relative: f64,
    rate: f64,
    angle_pid: Pid,
    encoder_pid: Pid,
    speed_pid: Pid,
    current: f64,
}

impl GimbalAxis {
    fn new(cfg: GimbalAxisConfig) -> Self {
        Self {
            mode: GimbalMotorMode::Raw,
            absolute_set: 0.0,
            relative_set: 0.0,
            absolute: 0.0,
            relative: 0.0,
            rate: 0.0,
            angle_pid: Pid::angle(cfg.gyro_angle_pid),
            encoder_pid: Pid::angle(cfg.encoder_angle_pid),
            speed_pid: Pid::raw(cfg.gyro_speed_pid),
            current: 0.0,
            cfg,
        }
    }

    /// Relative angle from the motor's encoder position.
    fn relative_from(&self, motor_position: f64) -> f64 {
        let rel = rad_format(motor_position - ecd_to_rad(self.cfg.offset_ecd));
        if self.cfg.reversed { -rel } else { rel }
    }

    fn measure(&mut self, absolute: f64, relative: f64, rate: f64) {
        self.absolute = absolute;
        self.relative = relative;
        self.rate = rate;
    }

    fn enter(&mut self, mode: GimbalMotorMode) {
        self.mode = mode;
        match mode {
            GimbalMotorMode::Raw => self.current = 0.0,
            GimbalMotorMode::GyroAbsolute | GimbalMotorMode::VisionAssisted => {
                let (angle, speed) = if mode == GimbalMotorMode::GyroAbsolute {
                    (self.cfg.gyro_angle_pid, self.cfg.gyro_speed_pid)
                } else {
                    (self.cfg.camera_angle_pid, self.cfg.camera_speed_pid)
                };
                self.angle_pid.set_gains(angle);
                self.speed_pid.set_gains(speed);
                self.angle_pid.reset();
                self.speed_pid.reset();
                self.absolute_set = self.absolute;
            }
            GimbalMotorMode::EncoderRelative => {
                self.speed_pid.set_gains(self.cfg.gyro_speed_pid);
                self.encoder_pid.reset();
                self.speed_pid.reset();
                self.relative_set = self.relative;
            }
        }
    }

    /// Integrate an absolute set-point change, keeping the relative angle
    /// inside its limits unless the axis sits on a slip ring.
    fn add_absolute(&mut self, add: f64) {
        let mut add = finite_or_zero(add);
        if !self.cfg.slip_ring {
            let bias = rad_format(self.absolute_set - self.absolute);
            let reach = self.relative + bias + add;
            if reach > self.cfg.max_relative && add > 0.0 {
                add = self.cfg.max_relative - bias - self.relative;
            } else if reach < self.cfg.min_relative && add < 0.0 {
                add = self.cfg.min_relative - bias - self.relative;
            }
        }
        self.absolute_set = rad_format(self.absolute_set + add);
    }

    fn add_relative(&mut self, add: f64) {
        let next = self.relative_set + finite_or_zero(add);
        self.relative_set = if self.cfg.slip_ring {
            rad_format(next)
        } else {
            next.clamp(self.cfg.min_relative, self.cfg.max_relative)
        };
    }

    fn control(&mut self, dt: f64) {
        let rate_set = match self.mode {
            GimbalMotorMode::Raw => {
                self.current = 0.0;
                return;
            }
            GimbalMotorMode::GyroAbsolute | GimbalMotorMode::VisionAssisted => self
                .angle_pid
                .calc_with_rate(self.absolute, self.absolute_set, dt, self.rate),
            GimbalMotorMode::EncoderRelative => self
                .encoder_pid
                .calc_with_rate(self.relative, self.relative_set, dt, self.rate),
        };
        let current = self.speed_pid.calc(self.rate, rate_set, dt);
        let limit = self.cfg.current_limit;
        let current = current.clamp(-limit, limit);
        self.current = if self.cfg.reversed { -current } else { current };
    }

    fn output(&self) -> AxisOutput {
        AxisOutput {
            mode: self.mode,
            absolute_set: self.absolute_set,
            relative_set: self.relative_set,
            absolute: self.absolute,
            relative: self.relative,
            current: self.current,
        }
    }
}

// ─── Machine ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GimbalMachine {
    cfg: GimbalConfig,
    yaw_id: u16,
    pitch_id: u16,
    latch: ModeLatch<GimbalBehaviour>,
    yaw: GimbalAxis,
    pitch: GimbalAxis,
    estop: EstopLatch,
    aim_gain: f64,
    aim_filter: f64,
    output: GimbalOutput,
}

impl GimbalMachine {
    pub fn new(cfg: GimbalConfig, can: &CanMapConfig) -> Self {
        Self {
            yaw_id: can.yaw_id,
            pitch_id: can.pitch_id,
            latch: ModeLatch::default(),
            yaw: GimbalAxis::new(cfg.yaw),
            pitch: GimbalAxis::new(cfg.pitch),
            estop: EstopLatch::new(),
            aim_gain: 1.0,
            aim_filter: 0.0,
            output: GimbalOutput::default(),
            cfg,
        }
    }

    /// Take the aim gain and smoothing from the vision link settings.
    pub fn with_vision(mut self, vision: &VisionConfig) -> Self {
        self.aim_gain = vision.angle_gain;
        self.aim_filter = vision.angle_filter;
        self
    }

    #[inline]
    pub fn behaviour(&self) -> GimbalBehaviour {
        self.latch.current()
    }

    #[inline]
    pub fn transition_count(&self) -> u32 {
        self.latch.transition_count()
    }

    #[inline]
    pub fn output(&self) -> &GimbalOutput {
        &self.output
    }

    /// Yaw relative to the chassis from the last cycle, rad.
    #[inline]
    pub fn yaw_relative(&self) -> f64 {
        self.yaw.relative
    }

    /// True while the gimbal cannot be relied on; the shooter stops.
    #[inline]
    pub fn is_safe_stopped(&self) -> bool {
        self.latch.current() == GimbalBehaviour::ZeroForce
    }

    /// Operator acknowledgement of a latched emergency stop.
    pub fn clear_estop(&mut self) {
        self.estop.clear();
    }

    pub fn update(&mut self, inp: &GimbalInputs<'_>) -> &GimbalOutput {
        self.measure(inp);
        let next = self.select_behaviour(inp);
        if self.latch.update("gimbal", next).is_some() {
            self.yaw.enter(next.motor_mode());
            self.pitch.enter(next.motor_mode());
        }
        self.integrate_set_points(inp);
        self.yaw.control(inp.dt);
        self.pitch.control(inp.dt);
        self.output = GimbalOutput {
            behaviour: self.latch.current(),
            yaw: self.yaw.output(),
            pitch: self.pitch.output(),
            estop: self.estop.is_latched(),
        };
        &self.output
    }

    /// `(feedback id, current)` pairs for the shared RM group frame.
    pub fn rm_commands(&self) -> [(u16, f64); 2] {
        [
            (self.yaw_id, self.output.yaw.current),
            (self.pitch_id, self.output.pitch.current),
        ]
    }

    fn measure(&mut self, inp: &GimbalInputs<'_>) {
        let imu = &inp.robot.imu;
        let yaw_rel = self.yaw.relative_from(inp.motors.get(DeviceId::GimbalYaw).position);
        let pitch_rel = self
            .pitch
            .relative_from(inp.motors.get(DeviceId::GimbalPitch).position);
        let (s, c) = pitch_rel.sin_cos();
        let yaw_rate = c * imu.gyro[2] - s * imu.gyro[0];
        self.yaw.measure(imu.yaw, yaw_rel, yaw_rate);
        self.pitch.measure(imu.pitch, pitch_rel, imu.gyro[1]);
    }

    fn select_behaviour(&mut self, inp: &GimbalInputs<'_>) -> GimbalBehaviour {
        let efforts = [
            inp.motors.get(DeviceId::GimbalYaw).effort,
            inp.motors.get(DeviceId::GimbalPitch).effort,
        ];
        let remote_offline = inp.health.is_faulted(DeviceId::RemoteControl);
        let stopped = self
            .estop
            .evaluate(&efforts, self.cfg.estop_current, remote_offline);
        if stopped || inp.health.any_faulted(&CRITICAL) {
            return GimbalBehaviour::ZeroForce;
        }
        let op = &inp.robot.operator;
        if op.switch_right == SwitchPosition::Down {
            GimbalBehaviour::ZeroForce
        } else if inp.vision.is_some() {
            GimbalBehaviour::VisionAssisted
        } else if op.switch_left == SwitchPosition::Down {
            GimbalBehaviour::Relative
        } else {
            GimbalBehaviour::Absolute
        }
    }

    fn integrate_set_points(&mut self, inp: &GimbalInputs<'_>) {
        let op = &inp.robot.operator;
        let stick = |ch: usize| f64::from(deadband(op.channels[ch], RC_DEADBAND));
        let yaw_add = -(stick(channel::RIGHT_HORIZONTAL) * self.yaw.cfg.rc_sensitivity
            + f64::from(op.mouse.x) * self.yaw.cfg.mouse_sensitivity);
        let pitch_add = -(stick(channel::RIGHT_VERTICAL) * self.pitch.cfg.rc_sensitivity
            + f64::from(op.mouse.y) * self.pitch.cfg.mouse_sensitivity);

        match self.latch.current() {
            GimbalBehaviour::ZeroForce => {}
            GimbalBehaviour::Absolute => {
                self.yaw.add_absolute(yaw_add);
                self.pitch.add_absolute(pitch_add);
            }
            GimbalBehaviour::Relative => {
                self.yaw.add_relative(yaw_add);
                self.pitch.add_relative(pitch_add);
            }
            GimbalBehaviour::VisionAssisted => {
                if let Some(cmd) = inp.vision {
                    let (gain, keep) = (self.aim_gain, self.aim_filter);
                    for (axis, delta) in [
                        (&mut self.yaw, cmd.delta_yaw),
                        (&mut self.pitch, cmd.delta_pitch),
                    ] {
                        let target = rad_format(axis.absolute + finite_or_zero(delta) * gain);
                        let step = rad_format(target - axis.absolute_set) * (1.0 - keep);
                        axis.add_absolute(step);
                    }
                }
            }
        }
    }
}

// ─── Calibration ────────────────────────────────────────────────────

/// Yaw offset as the midpoint of the arc from `min_ecd` up to `max_ecd`.
pub fn yaw_offset_from_extremes(max_ecd: u16, min_ecd: u16) -> u16 {
    let span = ecd_format(i32::from(max_ecd) - i32::from(min_ecd));
    ecd_format(i32::from(max_ecd) - i32::from(span) / 2)
}

/// Pitch offset from the two mechanical stops.
///
/// Each stop's encoder count minus its IMU pitch gives an estimate of the
/// level count; the offset is their mean taken the short way round.
pub fn pitch_offset_from_extremes(max_ecd: u16, max_pitch: f64, min_ecd: u16, min_pitch: f64) -> u16 {
    let level = |ecd: u16, pitch: f64| ecd_format(i32::from(ecd) - (pitch / ECD_TO_RAD).round() as i32);
    let a = level(max_ecd, max_pitch);
    let b = level(min_ecd, min_pitch);
    let half = ecd_to_angle_change(b, a) / 2.0;
    ecd_format(i32::from(a) + (half / ECD_TO_RAD).round() as i32)
}
