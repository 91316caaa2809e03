//! Mecanum inverse and forward kinematics.
//!
//! Wheel order is right-front, left-front, left-rear, right-rear. The sign
//! pattern encodes the 45° roller geometry and the motor mounting; front
//! wheels rotate with `S − 1`, rear wheels with `−S − 1`, where `S` is the
//! configured rotation bias.

use rm_common::control_unit::config::MecanumConfig;
use rm_common::control_unit::measurement::MotionVector;

/// Motion vector to wheel rim speeds.
pub fn wheel_speeds_from_motion(motion: &MotionVector, geometry: &MecanumConfig) -> [f64; 4] {
    let MotionVector {
        forward: vx,
        strafe: vy,
        rotate: wz,
    } = *motion;
    let s = geometry.rotation_scale;
    let r = &geometry.rotation_radii;
    [
        -vx - vy + (s - 1.0) * r[0] * wz,
        vx - vy + (s - 1.0) * r[1] * wz,
        vx + vy + (-s - 1.0) * r[2] * wz,
        -vx + vy + (-s - 1.0) * r[3] * wz,
    ]
}

/// Odometry: measured wheel rim speeds back to a motion vector.
///
/// `scale` is the per-wheel share (0.25 for four wheels). Exact inverse of
/// [`wheel_speeds_from_motion`] when the rotation bias is zero.
pub fn motion_from_wheel_speeds(speeds: &[f64; 4], geometry: &MecanumConfig, scale: f64) -> MotionVector {
    let [w0, w1, w2, w3] = *speeds;
    let mean_radius = geometry.rotation_radii.iter().sum::<f64>() / 4.0;
    let rotate = if mean_radius > 0.0 {
        (-w0 - w1 - w2 - w3) * scale / mean_radius
    } else {
        0.0
    };
    MotionVector {
        forward: (-w0 + w1 + w2 - w3) * scale,
        strafe: (-w0 - w1 + w2 + w3) * scale,
        rotate,
    }
}
