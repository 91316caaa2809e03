//! Integration test: a faulted device drops its own subsystem only.
//!
//! 1. MIT joint reports a motor fault → arm ZeroForce, motors disabled
//! 2. Chassis wheel goes silent → chassis ZeroForce after its timeout
//! 3. In both cases the other subsystems keep their operator modes

use rm_common::control_unit::input::KeyFlags;
use rm_common::control_unit::measurement::DeviceId;
use rm_common::control_unit::state::{ArmState, ChassisMode, GimbalBehaviour, ShooterMode};
use rm_common::hal::bus::BusId;
use rm_common::hal::liveness::LivenessTracker;

use rm_control_unit::codec::mit::mit_mode_frame;
use rm_control_unit::codec::router::DecodeOutcome;

use super::{Rig, mit_feedback};

fn arm_state(rig: &Rig) -> ArmState {
    rig.unit.arm().map(|a| a.state()).expect("arm configured")
}

#[test]
fn faulted_joint_drops_arm_only() {
    let mut rig = Rig::with_arm();
    rig.steps(10);
    rig.unit.arm_mut().expect("arm").command_move([0.0; 7]);
    rig.steps(10);
    assert_ne!(arm_state(&rig), ArmState::ZeroForce);
    assert_eq!(
        rig.unit.gimbal().map(|g| g.behaviour()),
        Some(GimbalBehaviour::Absolute)
    );
    let chassis_before = rig.unit.chassis().map(|c| c.mode());
    assert_eq!(chassis_before, Some(ChassisMode::FollowGimbalYaw));

    // Joint 1 reports an over-temperature code and stays silent after.
    let cfg = rig.unit.config().clone();
    let bad = mit_feedback(&cfg, 1, 0x8).expect("mit frame");
    assert_eq!(
        rig.unit.on_can_frame(&bad),
        DecodeOutcome::Faulted {
            device: DeviceId::Joint(1),
            code: 0x8
        }
    );
    rig.silenced.push(DeviceId::Joint(1));
    rig.bus.clear();
    rig.steps(10);

    assert_eq!(arm_state(&rig), ArmState::ZeroForce);
    let out = rig.unit.arm().expect("arm").output();
    assert_eq!(out.torques, [0.0; 3]);
    assert_eq!(out.currents, [0.0; 4]);

    let arm_bus = BusId(cfg.can.arm_bus);
    let disables = rig
        .bus
        .sent()
        .iter()
        .filter(|f| f.bus == arm_bus && f.data == mit_mode_frame(false))
        .count();
    assert_eq!(disables, 3);

    assert_eq!(
        rig.unit.gimbal().map(|g| g.behaviour()),
        Some(GimbalBehaviour::Absolute)
    );
    assert_eq!(rig.unit.chassis().map(|c| c.mode()), chassis_before);
}

#[test]
fn silent_wheel_drops_chassis_only() {
    let mut rig = Rig::with_arm();
    rig.steps(10);
    rig.unit.arm_mut().expect("arm").command_move([0.0; 7]);
    rig.steps(10);
    let arm_before = arm_state(&rig);

    rig.silenced.push(DeviceId::ChassisWheel(3));
    let timeout = rig.unit.config().liveness.motor_ms as usize;
    rig.steps(timeout + 10);

    assert!(rig.unit.liveness().is_faulted(DeviceId::ChassisWheel(3)));
    let chassis = rig.unit.chassis().expect("chassis");
    assert_eq!(chassis.mode(), ChassisMode::ZeroForce);
    assert_eq!(chassis.output().wheel_currents, [0.0; 4]);

    assert_eq!(
        rig.unit.gimbal().map(|g| g.behaviour()),
        Some(GimbalBehaviour::Absolute)
    );
    assert_eq!(arm_state(&rig), arm_before);
}

#[test]
fn recovered_wheel_restores_chassis() {
    let mut rig = Rig::new(Default::default());
    rig.silenced.push(DeviceId::ChassisWheel(0));
    rig.steps(40);
    assert_eq!(rig.unit.chassis().map(|c| c.mode()), Some(ChassisMode::ZeroForce));

    rig.silenced.clear();
    rig.steps(8);
    assert_eq!(
        rig.unit.chassis().map(|c| c.mode()),
        Some(ChassisMode::FollowGimbalYaw)
    );
}

#[test]
fn trigger_fault_leaves_gimbal_running() {
    let mut rig = Rig::new(Default::default());
    rig.steps(5);
    rig.operator.keys = KeyFlags::F;
    rig.step();
    rig.operator.keys = KeyFlags::empty();
    rig.steps(5);
    assert_ne!(rig.unit.shooter().map(|s| s.mode()), Some(ShooterMode::Stop));

    rig.silenced.push(DeviceId::Trigger);
    rig.steps(40);
    assert_eq!(rig.unit.shooter().map(|s| s.mode()), Some(ShooterMode::Stop));
    assert_eq!(
        rig.unit.gimbal().map(|g| g.behaviour()),
        Some(GimbalBehaviour::Absolute)
    );
}
