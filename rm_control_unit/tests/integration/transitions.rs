//! Integration test: operator-driven mode changes across subsystems.
//!
//! Entry actions run once per actual change; a repeated identical cycle
//! leaves set-points alone. Remote loss and the right switch Down put every
//! subsystem in its safe mode.

use rm_common::control_unit::input::SwitchPosition;
use rm_common::control_unit::state::{ChassisMode, GimbalBehaviour, ShooterMode};
use rm_common::hal::bus::BusId;

use super::{Rig, switches};

#[test]
fn gimbal_entry_runs_once_per_change() {
    let mut rig = Rig::new(Default::default());
    rig.step();
    let gimbal = rig.unit.gimbal().expect("gimbal");
    assert_eq!(gimbal.behaviour(), GimbalBehaviour::Absolute);
    let count = gimbal.transition_count();
    let set = gimbal.output().yaw.absolute_set;

    rig.steps(3);
    let gimbal = rig.unit.gimbal().expect("gimbal");
    assert_eq!(gimbal.transition_count(), count);
    assert_eq!(gimbal.output().yaw.absolute_set, set);

    rig.operator = switches(SwitchPosition::Mid, SwitchPosition::Down);
    rig.steps(2);
    let gimbal = rig.unit.gimbal().expect("gimbal");
    assert_eq!(gimbal.behaviour(), GimbalBehaviour::Relative);
    assert_eq!(gimbal.transition_count(), count + 1);
}

#[test]
fn right_switch_down_zeroes_everything() {
    let mut rig = Rig::new(Default::default());
    rig.steps(8);
    rig.operator = switches(SwitchPosition::Down, SwitchPosition::Mid);
    rig.bus.clear();
    rig.steps(8);

    assert_eq!(
        rig.unit.gimbal().map(|g| g.behaviour()),
        Some(GimbalBehaviour::ZeroForce)
    );
    assert_eq!(rig.unit.chassis().map(|c| c.mode()), Some(ChassisMode::ZeroForce));
    assert_eq!(rig.unit.shooter().map(|s| s.mode()), Some(ShooterMode::Stop));

    let gimbal_bus = BusId(rig.unit.config().can.gimbal_bus);
    let last_gimbal_group = rig
        .bus
        .sent()
        .iter()
        .rev()
        .find(|f| f.bus == gimbal_bus && f.id == 0x1FF)
        .expect("gimbal group frame");
    assert_eq!(&last_gimbal_group.data[0..4], &[0, 0, 0, 0]);
}

#[test]
fn remote_loss_stops_gimbal_shooter_and_chassis() {
    let mut rig = Rig::new(Default::default());
    rig.steps(8);
    assert_eq!(
        rig.unit.gimbal().map(|g| g.behaviour()),
        Some(GimbalBehaviour::Absolute)
    );

    rig.remote_online = false;
    let timeout = rig.unit.config().liveness.remote_ms as usize;
    rig.steps(timeout + 8);

    assert_eq!(
        rig.unit.gimbal().map(|g| g.behaviour()),
        Some(GimbalBehaviour::ZeroForce)
    );
    assert_eq!(rig.unit.shooter().map(|s| s.mode()), Some(ShooterMode::Stop));
    assert_eq!(rig.unit.chassis().map(|c| c.mode()), Some(ChassisMode::ZeroForce));

    rig.remote_online = true;
    rig.steps(8);
    assert_eq!(
        rig.unit.gimbal().map(|g| g.behaviour()),
        Some(GimbalBehaviour::Absolute)
    );
}

#[test]
fn chassis_switch_modes_through_the_loop() {
    let cases = [
        (SwitchPosition::Mid, SwitchPosition::Down, ChassisMode::NoMove),
        (SwitchPosition::Mid, SwitchPosition::Up, ChassisMode::Spinning),
        (SwitchPosition::Up, SwitchPosition::Mid, ChassisMode::NoFollowYaw),
        (SwitchPosition::Up, SwitchPosition::Down, ChassisMode::Raw),
    ];
    for (right, left, expected) in cases {
        let mut rig = Rig::new(Default::default());
        rig.operator = switches(right, left);
        rig.steps(4);
        assert_eq!(
            rig.unit.chassis().map(|c| c.mode()),
            Some(expected),
            "switches {right:?}/{left:?}"
        );
    }
}

#[test]
fn cv_assisted_needs_a_live_vision_link() {
    let mut rig = Rig::new(Default::default());
    rig.operator = switches(SwitchPosition::Up, SwitchPosition::Up);
    rig.steps(4);
    assert_eq!(
        rig.unit.chassis().map(|c| c.mode()),
        Some(ChassisMode::NoFollowYaw)
    );
}
