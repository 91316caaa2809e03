//! Shooter behaviour machine.
//!
//! | from           | to             | when                                        |
//! |----------------|----------------|---------------------------------------------|
//! | any            | `Stop`         | fault, gimbal stopped, or friction toggled off |
//! | `Stop`         | `ReadyFric`    | friction toggled on                         |
//! | `ReadyFric`    | `ReadyTrigger` | friction ramp at target                     |
//! | `ReadyTrigger` | `Ready`        | bullet microswitch closed                   |
//! | `Ready`        | `SemiAutoFire` | fire pressed and heat headroom left         |
//! | `SemiAutoFire` | `ReadyTrigger` | trigger turned one increment                |
//! | `Ready`, `SemiAutoFire` | `AutoFire` | fire held for `long_press_ticks`       |
//! | `AutoFire`     | `ReadyTrigger` | fire released or heat exhausted             |
//!
//! The friction toggle is the F key or a dial flick up; fire is the left
//! mouse button or a dial flick down.

use rm_common::control_unit::config::{CanMapConfig, ShooterConfig};
use rm_common::control_unit::input::{KeyFlags, RefereeHeat, RobotInputs, channel};
use rm_common::control_unit::measurement::DeviceId;
use rm_common::control_unit::state::ShooterMode;
use rm_common::hal::liveness::LivenessTracker;
use tracing::warn;

use super::ModeLatch;
use crate::codec::guard::finite_or_zero;
use crate::codec::table::MotorTable;
use crate::control::angle::{loop_constrain, rad_format};
use crate::control::filters::{IirState, RampState, TRIGGER_SPEED_IIR, iir_apply, ramp_apply};
use crate::control::pid::Pid;

const CRITICAL: [DeviceId; 4] = [
    DeviceId::Trigger,
    DeviceId::FrictionLeft,
    DeviceId::FrictionRight,
    DeviceId::RemoteControl,
];

/// Dial deflection treated as a flick.
pub const DIAL_FLICK: i16 = 500;

/// A semi-auto shot is complete within this angle of its target, rad.
pub const SHOT_ANGLE_TOLERANCE: f64 = 0.05;

const FRICTION_READY_TOLERANCE: f64 = 1e-6;

pub struct ShooterInputs<'a> {
    pub robot: &'a RobotInputs,
    pub motors: &'a MotorTable,
    pub health: &'a dyn LivenessTracker,
    /// The gimbal is in its safe mode this cycle.
    pub gimbal_stopped: bool,
    pub dt: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShooterOutput {
    pub mode: ShooterMode,
    /// Ramped friction rim speed target, m/s.
    pub friction_set: f64,
    /// Left and right friction current codes.
    pub friction_currents: [f64; 2],
    /// Trigger output-shaft speed target, rad/s.
    pub trigger_speed_set: f64,
    /// Filtered trigger output-shaft speed, rad/s.
    pub trigger_speed: f64,
    /// Trigger output-shaft angle, rad.
    pub trigger_angle: f64,
    pub trigger_current: f64,
    /// Stall recovery in progress.
    pub reversing: bool,
}

// ─── Multi-Turn Tracking ────────────────────────────────────────────

/// Output-shaft angle of a geared motor from its single-turn encoder.
///
/// Motor turns are accumulated inside ±gear·π, so the output angle wraps
/// in (−π, π] like every other stored angle.
#[derive(Debug, Clone, Copy)]
pub struct GearedAngle {
    gear: f64,
    motor_total: f64,
    last_motor: Option<f64>,
}

impl GearedAngle {
    pub const fn new(gear: f64) -> Self {
        Self {
            gear,
            motor_total: 0.0,
            last_motor: None,
        }
    }

    /// Feed the motor's single-turn position and return the output angle.
    pub fn update(&mut self, motor_position: f64) -> f64 {
        let motor_position = finite_or_zero(motor_position);
        if let Some(last) = self.last_motor {
            let span = self.gear * core::f64::consts::PI;
            let delta = rad_format(motor_position - last);
            self.motor_total = loop_constrain(self.motor_total + delta, -span, span);
        }
        self.last_motor = Some(motor_position);
        self.angle()
    }

    #[inline]
    pub fn angle(&self) -> f64 {
        self.motor_total / self.gear
    }
}

// ─── Machine ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ShooterMachine {
    cfg: ShooterConfig,
    trigger_id: u16,
    friction_ids: [u16; 2],
    latch: ModeLatch<ShooterMode>,
    friction_on: bool,
    dial_up: bool,
    dial_down: bool,
    fire_last: bool,
    fire_held: u32,
    ramp: RampState,
    trigger_filter: IirState,
    trigger: GearedAngle,
    angle_set: f64,
    block_count: u32,
    reverse_left: u32,
    trigger_pid: Pid,
    friction_pids: [Pid; 2],
    output: ShooterOutput,
}

impl ShooterMachine {
    pub fn new(cfg: ShooterConfig, can: &CanMapConfig) -> Self {
        Self {
            trigger_id: can.trigger_id,
            friction_ids: can.friction_ids,
            latch: ModeLatch::default(),
            friction_on: false,
            dial_up: false,
            dial_down: false,
            fire_last: false,
            fire_held: 0,
            ramp: RampState::default(),
            trigger_filter: IirState::default(),
            trigger: GearedAngle::new(cfg.trigger_gear),
            angle_set: 0.0,
            block_count: 0,
            reverse_left: 0,
            trigger_pid: Pid::raw(cfg.trigger_pid),
            friction_pids: [Pid::raw(cfg.friction_pid), Pid::raw(cfg.friction_pid)],
            output: ShooterOutput::default(),
            cfg,
        }
    }

    #[inline]
    pub fn mode(&self) -> ShooterMode {
        self.latch.current()
    }

    #[inline]
    pub fn transition_count(&self) -> u32 {
        self.latch.transition_count()
    }

    #[inline]
    pub fn output(&self) -> &ShooterOutput {
        &self.output
    }

    pub fn update(&mut self, inp: &ShooterInputs<'_>) -> &ShooterOutput {
        let trigger = inp.motors.get(DeviceId::Trigger);
        let angle = self.trigger.update(trigger.position);
        let speed = iir_apply(
            &mut self.trigger_filter,
            &TRIGGER_SPEED_IIR,
            trigger.velocity / self.cfg.trigger_gear,
        );

        let next = self.select_mode(inp, angle);
        if self.latch.update("shooter", next).is_some() {
            self.on_enter(next, angle);
        }
        self.control(inp, angle, speed);
        &self.output
    }

    /// `(feedback id, current)` pairs for the shared RM group frame.
    pub fn rm_commands(&self) -> [(u16, f64); 3] {
        [
            (self.trigger_id, self.output.trigger_current),
            (self.friction_ids[0], self.output.friction_currents[0]),
            (self.friction_ids[1], self.output.friction_currents[1]),
        ]
    }

    // ─── Mode Selection ─────────────────────────────────────────────

    fn select_mode(&mut self, inp: &ShooterInputs<'_>, angle: f64) -> ShooterMode {
        let op = &inp.robot.operator;
        let dial = op.channels[channel::DIAL];
        let dial_up = dial > DIAL_FLICK;
        let dial_down = dial < -DIAL_FLICK;
        let toggle = op.key_rising(KeyFlags::F) || (dial_up && !self.dial_up);
        self.dial_up = dial_up;
        self.dial_down = dial_down;

        let fire = op.mouse.press_left || dial_down;
        let fire_rising = fire && !self.fire_last;
        self.fire_last = fire;
        self.fire_held = if fire { self.fire_held.saturating_add(1) } else { 0 };

        if inp.gimbal_stopped || inp.health.any_faulted(&CRITICAL) {
            self.friction_on = false;
            return ShooterMode::Stop;
        }
        if toggle {
            self.friction_on = !self.friction_on;
        }
        if !self.friction_on {
            return ShooterMode::Stop;
        }

        let heat_ok = heat_allows(inp.robot.heat, self.cfg.heat_margin);
        let long_press = fire && self.fire_held >= self.cfg.long_press_ticks && heat_ok;
        match self.latch.current() {
            ShooterMode::Stop => ShooterMode::ReadyFric,
            ShooterMode::ReadyFric => {
                if self.ramp.output() >= self.cfg.friction_speed - FRICTION_READY_TOLERANCE {
                    ShooterMode::ReadyTrigger
                } else {
                    ShooterMode::ReadyFric
                }
            }
            ShooterMode::ReadyTrigger => {
                if inp.robot.bullet_in_place {
                    ShooterMode::Ready
                } else {
                    ShooterMode::ReadyTrigger
                }
            }
            ShooterMode::Ready => {
                if long_press {
                    ShooterMode::AutoFire
                } else if !inp.robot.bullet_in_place {
                    ShooterMode::ReadyTrigger
                } else if fire_rising && heat_ok {
                    ShooterMode::SemiAutoFire
                } else {
                    ShooterMode::Ready
                }
            }
            ShooterMode::SemiAutoFire => {
                if long_press {
                    ShooterMode::AutoFire
                } else if rad_format(self.angle_set - angle) <= SHOT_ANGLE_TOLERANCE {
                    ShooterMode::ReadyTrigger
                } else {
                    ShooterMode::SemiAutoFire
                }
            }
            ShooterMode::AutoFire => {
                if fire && heat_ok {
                    ShooterMode::AutoFire
                } else {
                    ShooterMode::ReadyTrigger
                }
            }
        }
    }

    fn on_enter(&mut self, mode: ShooterMode, angle: f64) {
        match mode {
            ShooterMode::Stop => {
                self.ramp.reset();
                self.trigger_pid.reset();
                for pid in &mut self.friction_pids {
                    pid.reset();
                }
                self.block_count = 0;
                self.reverse_left = 0;
            }
            ShooterMode::SemiAutoFire => {
                self.angle_set = rad_format(angle + self.cfg.angle_increment);
            }
            _ => {}
        }
    }

    // ─── Control ────────────────────────────────────────────────────

    fn control(&mut self, inp: &ShooterInputs<'_>, angle: f64, speed: f64) {
        let mode = self.latch.current();
        if mode == ShooterMode::Stop {
            self.output = ShooterOutput {
                mode,
                trigger_speed: speed,
                trigger_angle: angle,
                ..ShooterOutput::default()
            };
            return;
        }

        let friction_set = ramp_apply(
            &mut self.ramp,
            self.cfg.friction_speed,
            self.cfg.friction_ramp_step,
            0.0,
            self.cfg.friction_speed,
        );
        let ratio = self.cfg.friction_speed_ratio;
        let left = inp.motors.get(DeviceId::FrictionLeft).velocity * ratio;
        let right = inp.motors.get(DeviceId::FrictionRight).velocity * ratio;
        let friction_currents = [
            finite_or_zero(self.friction_pids[0].calc(left, friction_set, inp.dt)),
            finite_or_zero(self.friction_pids[1].calc(right, -friction_set, inp.dt)),
        ];

        let (trigger_speed_set, trigger_current, reversing) = if mode < ShooterMode::ReadyTrigger {
            (0.0, 0.0, false)
        } else {
            let base = match mode {
                ShooterMode::ReadyTrigger => self.cfg.ready_trigger_speed,
                ShooterMode::SemiAutoFire
                    if rad_format(self.angle_set - angle) > SHOT_ANGLE_TOLERANCE =>
                {
                    self.cfg.trigger_speed
                }
                ShooterMode::AutoFire => self.cfg.auto_trigger_speed,
                _ => 0.0,
            };
            let (set, reversing) = self.unjam(base, speed);
            let current = finite_or_zero(self.trigger_pid.calc(speed, set, inp.dt));
            (set, current, reversing)
        };

        self.output = ShooterOutput {
            mode,
            friction_set,
            friction_currents,
            trigger_speed_set,
            trigger_speed: speed,
            trigger_angle: angle,
            trigger_current,
            reversing,
        };
    }

    /// Stall recovery: a trigger commanded to turn but stuck below
    /// `block_speed` for `block_ticks` is reversed for `reverse_ticks`.
    /// The reversal turns at least `unjam_speed` even when the mode has
    /// since stopped asking for motion. Returns the speed set-point and
    /// whether it is reversed.
    fn unjam(&mut self, base: f64, speed: f64) -> (f64, bool) {
        if self.reverse_left == 0 {
            if base != 0.0 && speed.abs() < self.cfg.block_speed {
                self.block_count += 1;
                if self.block_count >= self.cfg.block_ticks {
                    warn!(ticks = self.block_count, "trigger stalled, reversing");
                    self.block_count = 0;
                    self.reverse_left = self.cfg.reverse_ticks;
                }
            } else {
                self.block_count = 0;
            }
        }
        if self.reverse_left > 0 {
            self.reverse_left -= 1;
            return (-base.abs().max(self.cfg.unjam_speed), true);
        }
        (base, false)
    }
}

/// A shot is allowed while the referee reports enough heat headroom, or
/// while no referee data is available.
fn heat_allows(heat: Option<RefereeHeat>, margin: u16) -> bool {
    heat.map_or(true, |h| h.heat.saturating_add(margin) <= h.limit)
}
