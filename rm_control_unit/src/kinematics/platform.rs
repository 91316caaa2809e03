//! Suspension platform attitude.
//!
//! The two suspension axes sit on the chassis diagonals, so a roll/pitch
//! request in the gimbal frame is rotated by `π/4 + relative_yaw` into the
//! diagonal tilts `alpha1` (front-right) and `alpha2` (rear-right).
//! A tilted diagonal shortens the ground projection of both of its wheels'
//! radii, which is what the swerve kinematics sees as hip motion.

use core::f64::consts::FRAC_PI_4;

/// Platform roll/pitch in the gimbal frame, rad.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlatformAttitude {
    pub roll: f64,
    pub pitch: f64,
}

/// Diagonal tilts of the platform, rad.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DiagonalTilt {
    pub alpha1: f64,
    pub alpha2: f64,
}

pub fn rpy_to_alpha(roll: f64, pitch: f64, relative_yaw: f64) -> DiagonalTilt {
    let (s, c) = (FRAC_PI_4 + relative_yaw).sin_cos();
    DiagonalTilt {
        alpha1: s * roll + c * pitch,
        alpha2: c * roll - s * pitch,
    }
}

/// Inverse of [`rpy_to_alpha`]. Returns `(roll, pitch)`.
pub fn alpha_to_rpy(tilt: DiagonalTilt, relative_yaw: f64) -> (f64, f64) {
    let (s, c) = (FRAC_PI_4 + relative_yaw).sin_cos();
    (
        c * tilt.alpha2 + s * tilt.alpha1,
        -s * tilt.alpha2 + c * tilt.alpha1,
    )
}

/// Clamp a roll/pitch request to `±limit` on both diagonals and return the
/// roll/pitch actually reachable.
pub fn constrain_attitude(roll: f64, pitch: f64, relative_yaw: f64, limit: f64) -> (f64, f64) {
    let limit = limit.abs();
    let mut tilt = rpy_to_alpha(roll, pitch, relative_yaw);
    tilt.alpha1 = tilt.alpha1.clamp(-limit, limit);
    tilt.alpha2 = tilt.alpha2.clamp(-limit, limit);
    alpha_to_rpy(tilt, relative_yaw)
}

/// Ground-plane wheel radii for a tilt. Wheels 0 and 2 (front-right,
/// rear-left) sit on the `alpha1` diagonal, wheels 1 and 3 on `alpha2`.
pub fn diagonal_radii(tilt: DiagonalTilt, flat_radius: f64) -> [f64; 4] {
    let r1 = flat_radius * tilt.alpha1.cos();
    let r2 = flat_radius * tilt.alpha2.cos();
    [r1, r2, r1, r2]
}
