//! Integration test: swerve chassis through the control loop.
//!
//! Steer motors join the chassis' critical set, the steer voltages share a
//! group frame with nothing else, and a robot at rest keeps its steer
//! targets bit-for-bit. A platform tilt request moves the wheels once
//! while the hips travel, then the steering freezes again.

use rm_common::control_unit::config::{
    ChassisConfig, DriveConfig, RobotConfig, SwerveConfig,
};
use rm_common::control_unit::measurement::{DeviceId, MotionVector};
use rm_common::control_unit::state::ChassisMode;

use rm_control_unit::kinematics::platform::PlatformAttitude;
use rm_control_unit::kinematics::swerve::{HipMotion, SwerveState, wheel_targets_from_motion};

use super::Rig;

fn swerve_config() -> RobotConfig {
    RobotConfig {
        chassis: Some(ChassisConfig {
            drive: DriveConfig::Swerve(SwerveConfig::default()),
            ..ChassisConfig::default()
        }),
        ..RobotConfig::default()
    }
}

#[test]
fn identical_standstill_inputs_keep_angles_exactly() {
    let geo = SwerveConfig::default();
    let radii = [geo.default_radius; 4];
    let mut state = SwerveState::default();
    wheel_targets_from_motion(
        &mut state,
        &MotionVector::new(-0.5, 0.7, 0.2),
        &radii,
        HipMotion::Idle,
        &geo,
    );
    let still = MotionVector::new(0.0, 0.0, 0.0);
    let first = wheel_targets_from_motion(&mut state, &still, &radii, HipMotion::Idle, &geo);
    let second = wheel_targets_from_motion(&mut state, &still, &radii, HipMotion::Idle, &geo);
    assert_eq!(first.angles, second.angles);
    assert_eq!(first.speeds, second.speeds);
}

#[test]
fn steer_frames_follow_the_wheel_frames() {
    let mut rig = Rig::new(swerve_config());
    rig.steps(8);
    assert_eq!(
        rig.unit.chassis().map(|c| c.mode()),
        Some(ChassisMode::FollowGimbalYaw)
    );
    let chassis_bus = rig.unit.config().can.chassis_bus;
    let ids: Vec<u16> = rig
        .bus
        .sent()
        .iter()
        .filter(|f| f.bus.0 == chassis_bus)
        .map(|f| f.id)
        .collect();
    assert!(ids.contains(&0x200));
    assert!(ids.contains(&0x1FF));
}

#[test]
fn silent_steer_motor_stops_the_chassis() {
    let mut rig = Rig::new(swerve_config());
    rig.silenced.push(DeviceId::ChassisSteer(2));
    rig.steps(8);
    assert_eq!(rig.unit.chassis().map(|c| c.mode()), Some(ChassisMode::ZeroForce));
    let out = rig.unit.chassis().expect("chassis").output();
    assert_eq!(out.wheel_currents, [0.0; 4]);
    assert_eq!(out.steer_voltages, [0.0; 4]);
}

#[test]
fn resting_robot_holds_steer_targets() {
    let mut rig = Rig::new(swerve_config());
    rig.steps(16);
    let before = rig.unit.chassis().expect("chassis").output().steer_ecd;
    rig.steps(16);
    let after = rig.unit.chassis().expect("chassis").output().steer_ecd;
    assert_eq!(before, after);
}

#[test]
fn platform_tilt_drives_hips_through_the_loop() {
    let mut rig = Rig::new(swerve_config());
    rig.steps(8);
    let flat = SwerveConfig::default().default_radius;
    assert_eq!(rig.unit.chassis().expect("chassis").platform_radii(), &[flat; 4]);

    rig.unit.on_platform(Some(PlatformAttitude { roll: 0.0, pitch: 0.06 }));
    rig.steps(4);
    let chassis = rig.unit.chassis().expect("chassis");
    assert!(chassis.platform_radii().iter().all(|&r| r < flat));
    let moving = *chassis.output();
    assert!(moving.wheel_speed_set.iter().all(|s| s.abs() > 0.0));
    assert!(moving.wheel_currents.iter().all(|c| c.abs() > 0.0));

    rig.steps(4);
    let held = *rig.unit.chassis().expect("chassis").output();
    assert_eq!(held.wheel_speed_set, [0.0; 4]);
    assert_eq!(held.steer_ecd, moving.steer_ecd);

    rig.unit.on_platform(None);
    rig.steps(4);
    assert_eq!(rig.unit.chassis().expect("chassis").platform_radii(), &[flat; 4]);
}
