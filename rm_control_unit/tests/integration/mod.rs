//! Shared rig for the integration scenarios.
//!
//! [`Rig`] wraps a [`ControlUnit`] and a [`RecordingBus`] and, before every
//! tick, answers for every configured device the way a healthy robot at
//! rest would: RM feedback at the gimbal offset, MIT and Ktech replies at
//! zero, a fresh remote snapshot and a level IMU.

pub mod fault_isolation;
pub mod mecanum;
pub mod mit_boundary;
pub mod pid_saturation;
pub mod swerve;
pub mod transitions;
pub mod vision_ack;

use rm_common::control_unit::config::{ArmConfig, DriveConfig, RobotConfig};
use rm_common::control_unit::input::{ImuSample, OperatorInput, SwitchPosition};
use rm_common::control_unit::measurement::DeviceId;
use rm_common::hal::bus::{BusId, CanFrame};

use rm_control_unit::bus::RecordingBus;
use rm_control_unit::codec::mit::{POSITION_BITS, TORQUE_BITS, VELOCITY_BITS};
use rm_control_unit::codec::scaling::float_to_uint;
use rm_control_unit::cycle::{ControlUnit, TickReport};

// ── Frame builders ──────────────────────────────────────────────────

/// RM feedback, big-endian encoder, rpm and current.
pub fn rm_feedback(bus: u8, id: u16, ecd: u16, rpm: i16, current: i16) -> CanFrame {
    let mut data = [0u8; 8];
    data[0..2].copy_from_slice(&ecd.to_be_bytes());
    data[2..4].copy_from_slice(&rpm.to_be_bytes());
    data[4..6].copy_from_slice(&current.to_be_bytes());
    data[6] = 30;
    CanFrame::new(BusId(bus), id, data)
}

/// MIT feedback with the given status nibble, all fields at zero.
pub fn mit_feedback(cfg: &RobotConfig, joint: usize, status: u8) -> Option<CanFrame> {
    let arm = cfg.arm.as_ref()?;
    let id = *cfg.can.mit_feedback_ids.get(joint)?;
    let r = arm.mit_model.range();
    let p = float_to_uint(0.0, r.p_min, r.p_max, POSITION_BITS);
    let v = float_to_uint(0.0, r.v_min, r.v_max, VELOCITY_BITS);
    let t = float_to_uint(0.0, r.t_min, r.t_max, TORQUE_BITS);
    let data = [
        (status << 4) | (joint as u8 + 1),
        (p >> 8) as u8,
        p as u8,
        (v >> 4) as u8,
        (((v & 0xF) << 4) | (t >> 8)) as u8,
        t as u8,
        30,
        0,
    ];
    Some(CanFrame::new(BusId(cfg.can.arm_bus), id, data))
}

/// Ktech torque-loop reply at rest.
pub fn ktech_feedback(bus: u8, id: u16) -> CanFrame {
    CanFrame::new(BusId(bus), id, [0xA1, 30, 0, 0, 0, 0, 0, 0])
}

// ── Rig ─────────────────────────────────────────────────────────────

pub struct Rig {
    pub unit: ControlUnit,
    pub bus: RecordingBus,
    pub operator: OperatorInput,
    /// Devices that stop answering.
    pub silenced: Vec<DeviceId>,
    pub remote_online: bool,
    pub yaw_ecd: u16,
    pub pitch_ecd: u16,
}

impl Rig {
    pub fn new(cfg: RobotConfig) -> Self {
        let yaw_ecd = cfg.gimbal.map_or(0, |g| g.yaw.offset_ecd);
        let pitch_ecd = cfg.gimbal.map_or(0, |g| g.pitch.offset_ecd);
        Self {
            unit: ControlUnit::new(cfg).expect("routing table"),
            bus: RecordingBus::new(),
            operator: switches(SwitchPosition::Mid, SwitchPosition::Mid),
            silenced: Vec::new(),
            remote_online: true,
            yaw_ecd,
            pitch_ecd,
        }
    }

    pub fn with_arm() -> Self {
        let mut cfg = RobotConfig::default();
        cfg.arm = Some(ArmConfig::default());
        Self::new(cfg)
    }

    fn answer(&self, device: DeviceId) -> bool {
        !self.silenced.contains(&device)
    }

    /// One round of device replies.
    pub fn feed(&mut self) {
        let cfg = self.unit.config().clone();
        let can = &cfg.can;
        let mut frames = Vec::new();

        if let Some(chassis) = &cfg.chassis {
            for (i, &id) in can.wheel_ids.iter().enumerate() {
                if self.answer(DeviceId::ChassisWheel(i as u8)) {
                    frames.push(rm_feedback(can.chassis_bus, id, 0, 0, 0));
                }
            }
            if matches!(chassis.drive, DriveConfig::Swerve(_)) {
                for (i, &id) in can.steer_ids.iter().enumerate() {
                    if self.answer(DeviceId::ChassisSteer(i as u8)) {
                        frames.push(rm_feedback(can.chassis_bus, id, 0, 0, 0));
                    }
                }
            }
        }
        if cfg.gimbal.is_some() {
            if self.answer(DeviceId::GimbalYaw) {
                frames.push(rm_feedback(can.gimbal_bus, can.yaw_id, self.yaw_ecd, 0, 0));
            }
            if self.answer(DeviceId::GimbalPitch) {
                frames.push(rm_feedback(can.gimbal_bus, can.pitch_id, self.pitch_ecd, 0, 0));
            }
        }
        if cfg.shooter.is_some() {
            for (device, id) in [
                (DeviceId::Trigger, can.trigger_id),
                (DeviceId::FrictionLeft, can.friction_ids[0]),
                (DeviceId::FrictionRight, can.friction_ids[1]),
            ] {
                if self.answer(device) {
                    frames.push(rm_feedback(can.gimbal_bus, id, 0, 0, 0));
                }
            }
        }
        if cfg.arm.is_some() {
            for joint in 0..can.mit_feedback_ids.len() {
                if self.answer(DeviceId::Joint(joint as u8)) {
                    frames.extend(mit_feedback(&cfg, joint, 1));
                }
            }
            for (k, &id) in can.ktech_ids.iter().enumerate() {
                let joint = (can.mit_feedback_ids.len() + k) as u8;
                if self.answer(DeviceId::Joint(joint)) {
                    frames.push(ktech_feedback(can.arm_bus, id));
                }
            }
        }

        for frame in &frames {
            self.unit.on_can_frame(frame);
        }
        if self.remote_online {
            self.unit.on_remote(self.operator);
        }
        if self.answer(DeviceId::Imu) {
            self.unit.on_imu(ImuSample::default());
        }
    }

    pub fn step(&mut self) -> TickReport {
        self.feed();
        self.unit.tick(&mut self.bus, |_| {})
    }

    pub fn steps(&mut self, n: usize) -> TickReport {
        let mut last = TickReport::default();
        for _ in 0..n {
            last = self.step();
        }
        last
    }
}

pub fn switches(right: SwitchPosition, left: SwitchPosition) -> OperatorInput {
    OperatorInput {
        switch_right: right,
        switch_left: left,
        ..OperatorInput::default()
    }
}
