//! Integration test: mecanum kinematics and the chassis loop on top of it.

use rm_common::control_unit::config::MecanumConfig;
use rm_common::control_unit::input::channel;
use rm_common::control_unit::measurement::MotionVector;

use rm_control_unit::kinematics::mecanum::{motion_from_wheel_speeds, wheel_speeds_from_motion};

use super::Rig;

const EPS: f64 = 1e-9;

#[test]
fn pure_forward_gives_fixed_sign_pattern() {
    let w = wheel_speeds_from_motion(&MotionVector::new(1.0, 0.0, 0.0), &MecanumConfig::default());
    for (got, want) in w.iter().zip([-1.0, 1.0, 1.0, -1.0]) {
        assert!((got - want).abs() < EPS, "{w:?}");
    }
}

#[test]
fn pure_rotation_spins_all_wheels_equally() {
    let geo = MecanumConfig::default();
    let w = wheel_speeds_from_motion(&MotionVector::new(0.0, 0.0, 1.0), &geo);
    let m = w[0].abs();
    assert!(m > 0.0);
    for s in w {
        assert!((s.abs() - m).abs() < EPS, "{w:?}");
        assert!(s < 0.0);
    }
}

#[test]
fn odometry_inverts_kinematics() {
    let geo = MecanumConfig::default();
    let motion = MotionVector::new(0.8, -0.3, 1.2);
    let w = wheel_speeds_from_motion(&motion, &geo);
    let back = motion_from_wheel_speeds(&w, &geo, 0.25);
    assert!((back.forward - motion.forward).abs() < 1e-9);
    assert!((back.strafe - motion.strafe).abs() < 1e-9);
    assert!((back.rotate - motion.rotate).abs() < 1e-9);
}

#[test]
fn forward_stick_reaches_the_wheels() {
    let mut rig = Rig::new(Default::default());
    rig.operator.channels[channel::LEFT_VERTICAL] = 660;
    rig.steps(400);

    let out = *rig.unit.chassis().expect("chassis").output();
    let w = out.wheel_speed_set;
    assert!(w[0] < 0.0 && w[1] > 0.0 && w[2] > 0.0 && w[3] < 0.0, "{w:?}");
    assert!(out.motion.forward > 0.0);
    assert!(out.wheel_currents[1] > 0.0 && out.wheel_currents[0] < 0.0);

    let chassis_bus = rig.unit.config().can.chassis_bus;
    let group = rig
        .bus
        .sent()
        .iter()
        .rev()
        .find(|f| f.bus.0 == chassis_bus && f.id == 0x200)
        .expect("wheel group frame");
    let first = i16::from_be_bytes([group.data[0], group.data[1]]);
    let second = i16::from_be_bytes([group.data[2], group.data[3]]);
    assert!(first < 0 && second > 0);
}
