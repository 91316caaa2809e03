//! Swerve inverse kinematics with an active suspension.
//!
//! Each wheel's velocity is the sum of the body translation, the tangential
//! velocity from rotation about that wheel's own radius, and the radial
//! velocity of the hip mechanism. The steer angle is `atan2(vy, vx)` of the
//! sum and the drive speed is its magnitude.
//!
//! Two rules keep the steering quiet:
//! - a target more than 90° from the last one is replaced by its opposite
//!   with the drive direction reversed;
//! - below the deadzones, with the hip still, the last angle is kept.

use core::f64::consts::{FRAC_PI_2, PI};

use rm_common::control_unit::config::SwerveConfig;
use rm_common::control_unit::measurement::MotionVector;

use crate::control::angle::rad_format;

/// Hip share of the radial deadzone used while the suspension is idle, so
/// the wheels keep a slight outward preload.
const IDLE_HIP_BIAS: f64 = 0.9;

/// Sign of the hip radial velocity along (x, y) per wheel.
const HIP_SIGNS: [(f64, f64); 4] = [(1.0, 1.0), (1.0, -1.0), (-1.0, -1.0), (-1.0, 1.0)];
/// Sign of the rotation tangential velocity along (x, y) per wheel.
const SPIN_SIGNS: [(f64, f64); 4] = [(1.0, -1.0), (-1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)];

/// What the suspension does this cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HipMotion {
    /// Suspension disabled and settled.
    Idle,
    /// First cycle after the suspension was disabled. Steering is allowed
    /// to move once more to release the leg tension.
    ReleaseEdge,
    /// Suspension active with these radial rates, m/s.
    Active([f64; 4]),
}

/// Steering memory between cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SwerveState {
    last_angle: [f64; 4],
    reversed: [bool; 4],
}

impl SwerveState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline]
    pub const fn last_angles(&self) -> &[f64; 4] {
        &self.last_angle
    }
}

/// Per-wheel drive speeds (m/s) and steer angles (rad).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SwerveTargets {
    pub speeds: [f64; 4],
    pub angles: [f64; 4],
}

/// Motion vector to drive speeds and steer angles.
///
/// `radii` is the current wheel-to-centre distance of each wheel. The strafe
/// axis is flipped internally so that right is positive.
pub fn wheel_targets_from_motion(
    state: &mut SwerveState,
    motion: &MotionVector,
    radii: &[f64; 4],
    hip: HipMotion,
    geometry: &SwerveConfig,
) -> SwerveTargets {
    let vx = motion.forward;
    let vy = -motion.strafe;
    let wz = motion.rotate;
    let (sin_g, cos_g) = geometry.leg_angle.sin_cos();

    let front = (1.0 + geometry.rotation_scale) * wz;
    let rear = (1.0 - geometry.rotation_scale) * wz;

    let hip_rates = match hip {
        HipMotion::Active(rates) => rates,
        HipMotion::Idle | HipMotion::ReleaseEdge => {
            [geometry.hip_rate_deadzone * IDLE_HIP_BIAS; 4]
        }
    };

    let standing = hip != HipMotion::ReleaseEdge
        && vx.abs() < geometry.translation_deadzone
        && vy.abs() < geometry.translation_deadzone
        && wz.abs() < geometry.rotation_deadzone;

    let mut out = SwerveTargets::default();
    for i in 0..4 {
        let w = if i < 2 { front } else { rear };
        let (spx, spy) = SPIN_SIGNS[i];
        let (hx, hy) = HIP_SIGNS[i];
        let wheel_x = vx + spx * w * radii[i] * sin_g + hx * hip_rates[i] * sin_g;
        let wheel_y = vy + spy * w * radii[i] * cos_g + hy * hip_rates[i] * cos_g;

        let hip_still = match hip {
            HipMotion::Active(rates) => rates[i].abs() < geometry.hip_rate_deadzone,
            HipMotion::ReleaseEdge => false,
            HipMotion::Idle => true,
        };

        let mut speed = wheel_x.hypot(wheel_y);
        if standing && hip_still {
            out.angles[i] = state.last_angle[i];
        } else {
            let mut angle = wheel_y.atan2(wheel_x);
            state.reversed[i] = rad_format(angle - state.last_angle[i]).abs() > FRAC_PI_2;
            if state.reversed[i] {
                angle = rad_format(angle + PI);
            }
            state.last_angle[i] = angle;
            out.angles[i] = angle;
        }
        if state.reversed[i] {
            speed = -speed;
        }
        if geometry.drive_reversed[i] {
            speed = -speed;
        }
        out.speeds[i] = speed;
    }
    out
}
