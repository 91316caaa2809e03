//! Chassis kinematics.
//!
//! Pure conversions between a [`MotionVector`](rm_common::control_unit::measurement::MotionVector)
//! and per-wheel targets. Geometry comes from configuration; nothing here
//! knows which robot it runs on.

pub mod mecanum;
pub mod platform;
pub mod swerve;

/// Scale all four wheel speeds down together so the largest magnitude is at
/// most `max_speed`. Direction of travel is preserved.
pub fn limit_wheel_speeds(speeds: &mut [f64; 4], max_speed: f64) {
    let peak = speeds.iter().fold(0.0_f64, |m, s| m.max(s.abs()));
    if peak > max_speed && peak > 0.0 {
        let rate = max_speed / peak;
        for s in speeds.iter_mut() {
            *s *= rate;
        }
    }
}
