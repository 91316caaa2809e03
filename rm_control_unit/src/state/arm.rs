//! Seven-joint arm machine.
//!
//! Joints 0..3 are MIT motors driven torque-only; joints 3..7 are Ktech
//! motors sharing one broadcast current frame. Moves are commanded from
//! outside the cycle with [`ArmMachine::command_move`] and
//! [`ArmMachine::command_home`].

use rm_common::consts::{ARM_JOINT_COUNT, KTECH_BROADCAST_FRAME_ID};
use rm_common::control_unit::config::{ArmConfig, CanMapConfig, MitRange};
use rm_common::control_unit::measurement::{ActuatorCommand, DeviceId, MitCommand};
use rm_common::control_unit::state::ArmState;
use rm_common::hal::bus::{BusId, CanFrame};
use rm_common::hal::liveness::LivenessTracker;
use tracing::{info, warn};

use super::{ModeLatch, TxScratch, stage};
use crate::codec::guard::{finite_or_zero, guard};
use crate::codec::ktech::{encode_ktech_broadcast, multi_turn_request_frame, soft_disable_frame};
use crate::codec::mit::{encode_mit, mit_mode_frame, mount_command};
use crate::codec::table::MotorTable;
use crate::control::angle::rad_format;
use crate::control::pid::Pid;

/// Joints driven over the MIT protocol.
pub const MIT_JOINTS: usize = 3;
/// Joints driven by Ktech broadcast current.
pub const KTECH_JOINTS: usize = ARM_JOINT_COUNT - MIT_JOINTS;

pub struct ArmInputs<'a> {
    pub motors: &'a MotorTable,
    pub health: &'a dyn LivenessTracker,
    pub dt: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ArmOutput {
    pub state: ArmState,
    pub targets: [f64; ARM_JOINT_COUNT],
    /// Torques of the MIT joints, joint frame, Nm.
    pub torques: [f64; MIT_JOINTS],
    /// Current codes of the Ktech joints, joint frame.
    pub currents: [f64; KTECH_JOINTS],
    /// A non-finite target was received and output is forced to zero.
    pub master_open: bool,
    pub homing: bool,
}

#[derive(Debug, Clone)]
pub struct ArmMachine {
    cfg: ArmConfig,
    range: MitRange,
    bus: BusId,
    mit_ids: [u16; MIT_JOINTS],
    ktech_ids: [u16; KTECH_JOINTS],
    latch: ModeLatch<ArmState>,
    pids: Vec<Pid>,
    targets: [f64; ARM_JOINT_COUNT],
    pending: Option<[f64; ARM_JOINT_COUNT]>,
    homing: bool,
    master_open: bool,
    /// Power switch to send with the next frames: `true` enables.
    power: Option<bool>,
    output: ArmOutput,
}

impl ArmMachine {
    pub fn new(cfg: ArmConfig, can: &CanMapConfig) -> Self {
        let pids = cfg.joints.iter().map(|j| Pid::angle(j.pid)).collect();
        Self {
            range: cfg.mit_model.range(),
            bus: BusId(can.arm_bus),
            mit_ids: can.mit_command_ids,
            ktech_ids: can.ktech_ids,
            latch: ModeLatch::default(),
            pids,
            targets: [0.0; ARM_JOINT_COUNT],
            pending: None,
            homing: false,
            master_open: false,
            power: None,
            output: ArmOutput::default(),
            cfg,
        }
    }

    #[inline]
    pub fn state(&self) -> ArmState {
        self.latch.current()
    }

    #[inline]
    pub fn output(&self) -> &ArmOutput {
        &self.output
    }

    /// Request a move to `targets`, joint frame, rad.
    ///
    /// Any non-finite target opens the master switch instead: output drops
    /// to zero until the next valid command.
    pub fn command_move(&mut self, targets: [f64; ARM_JOINT_COUNT]) {
        if targets.iter().any(|t| !t.is_finite()) {
            if !self.master_open {
                warn!("non-finite arm target, master switch opened");
            }
            self.master_open = true;
            self.pending = None;
            return;
        }
        if self.master_open {
            info!("arm master switch closed");
        }
        self.master_open = false;
        let mut clamped = targets;
        for (t, j) in clamped.iter_mut().zip(self.cfg.joints.iter()) {
            *t = t.clamp(j.min, j.max);
        }
        self.pending = Some(clamped);
    }

    /// Move to the home pose, then power down.
    pub fn command_home(&mut self) {
        let mut home = [0.0; ARM_JOINT_COUNT];
        for (h, j) in home.iter_mut().zip(self.cfg.joints.iter()) {
            *h = j.home;
        }
        self.command_move(home);
        if self.pending.is_some() {
            self.homing = true;
        }
    }

    pub fn update(&mut self, inp: &ArmInputs<'_>) -> &ArmOutput {
        let positions = self.positions(inp.motors);
        let next = self.select_state(inp, &positions);
        if let Some(previous) = self.latch.update("arm", next) {
            self.on_transition(previous, next);
        }
        self.control(inp, &positions);
        &self.output
    }

    fn positions(&self, motors: &MotorTable) -> [f64; ARM_JOINT_COUNT] {
        let mut out = [0.0; ARM_JOINT_COUNT];
        for (i, p) in out.iter_mut().enumerate() {
            *p = motors.get(DeviceId::Joint(i as u8)).position;
        }
        out
    }

    fn select_state(&mut self, inp: &ArmInputs<'_>, positions: &[f64; ARM_JOINT_COUNT]) -> ArmState {
        let joint_fault = (0..ARM_JOINT_COUNT as u8).any(|i| inp.health.is_faulted(DeviceId::Joint(i)));
        if joint_fault || self.master_open {
            return ArmState::ZeroForce;
        }
        if let Some(targets) = self.pending.take() {
            self.targets = targets;
            return ArmState::Moving;
        }
        match self.latch.current() {
            ArmState::Moving if self.reached(positions) => {
                if self.homing {
                    ArmState::ZeroForce
                } else {
                    ArmState::Fixed
                }
            }
            other => other,
        }
    }

    fn reached(&self, positions: &[f64; ARM_JOINT_COUNT]) -> bool {
        positions
            .iter()
            .zip(self.targets.iter())
            .all(|(p, t)| rad_format(t - p).abs() < self.cfg.reach_tolerance)
    }

    fn on_transition(&mut self, previous: ArmState, next: ArmState) {
        if next == ArmState::ZeroForce || previous == ArmState::ZeroForce {
            self.power = Some(next != ArmState::ZeroForce);
            for pid in &mut self.pids {
                pid.reset();
            }
        }
        if matches!(next, ArmState::ZeroForce | ArmState::Fixed) {
            self.homing = false;
        }
    }

    fn control(&mut self, inp: &ArmInputs<'_>, positions: &[f64; ARM_JOINT_COUNT]) {
        let state = self.latch.current();
        let mut efforts = [0.0; ARM_JOINT_COUNT];
        if state != ArmState::ZeroForce {
            for (i, effort) in efforts.iter_mut().enumerate() {
                // Targets hold still within a move, so the error rate is the
                // negated joint velocity.
                let error_rate = -inp.motors.get(DeviceId::Joint(i as u8)).velocity;
                if let Some(pid) = self.pids.get_mut(i) {
                    *effort = finite_or_zero(pid.calc_with_rate(
                        positions[i],
                        self.targets[i],
                        inp.dt,
                        error_rate,
                    ));
                }
            }
        }
        let mut torques = [0.0; MIT_JOINTS];
        torques.copy_from_slice(&efforts[..MIT_JOINTS]);
        let mut currents = [0.0; KTECH_JOINTS];
        currents.copy_from_slice(&efforts[MIT_JOINTS..]);
        self.output = ArmOutput {
            state,
            targets: self.targets,
            torques,
            currents,
            master_open: self.master_open,
            homing: self.homing,
        };
    }

    /// Stage this cycle's frames: any pending power switch, the MIT torque
    /// commands, the Ktech current broadcast and the Ktech angle requests.
    pub fn encode(&mut self, out: &mut TxScratch) {
        if let Some(enable) = self.power.take() {
            for &id in &self.mit_ids {
                stage(out, CanFrame::new(self.bus, id, mit_mode_frame(enable)));
            }
            if !enable {
                for &id in &self.ktech_ids {
                    stage(out, CanFrame::new(self.bus, id, soft_disable_frame()));
                }
            }
        }

        for ((&id, &torque), joint) in self
            .mit_ids
            .iter()
            .zip(self.output.torques.iter())
            .zip(self.cfg.joints.iter())
        {
            let cmd = match guard(ActuatorCommand::Mit(mount_command(
                &MitCommand::torque_only(torque),
                joint.reversed,
            ))) {
                ActuatorCommand::Mit(cmd) => cmd,
                ActuatorCommand::Current(_) => MitCommand::torque_only(0.0),
            };
            stage(out, CanFrame::new(self.bus, id, encode_mit(&cmd, &self.range)));
        }

        let mut currents = self.output.currents;
        for (c, joint) in currents.iter_mut().zip(self.cfg.joints.iter().skip(MIT_JOINTS)) {
            if joint.reversed {
                *c = -*c;
            }
        }
        stage(
            out,
            CanFrame::new(
                self.bus,
                KTECH_BROADCAST_FRAME_ID,
                encode_ktech_broadcast(currents, self.cfg.ktech_max_current),
            ),
        );

        for &id in &self.ktech_ids {
            stage(out, CanFrame::new(self.bus, id, multi_turn_request_frame()));
        }
    }
}
