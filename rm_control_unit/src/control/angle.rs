//! Angle and encoder-count arithmetic.
//!
//! Every angle sum in the control core goes through [`rad_format`] before
//! it is stored, so stored angles always lie in (−π, π].

use core::f64::consts::{PI, TAU};

use rm_common::consts::{ECD_RANGE, ECD_TO_RAD, HALF_ECD_RANGE};

/// Wrap an angle into (−π, π].
///
/// NaN stays NaN; callers guard non-finite inputs before control math.
#[inline]
pub fn rad_format(angle: f64) -> f64 {
    let r = angle.rem_euclid(TAU);
    if r > PI { r - TAU } else { r }
}

/// Wrap `value` into the half-open interval `[min, max)`.
///
/// An empty or inverted interval returns `value` unchanged.
#[inline]
pub fn loop_constrain(value: f64, min: f64, max: f64) -> f64 {
    let len = max - min;
    if !(len > 0.0) {
        return value;
    }
    let wrapped = min + (value - min).rem_euclid(len);
    if wrapped >= max { min } else { wrapped }
}

/// Wrap a signed encoder count into `0..ECD_RANGE`.
#[inline]
pub fn ecd_format(raw: i32) -> u16 {
    raw.rem_euclid(ECD_RANGE as i32) as u16
}

/// Signed angle from `offset` to `ecd`, taking the short way round.
#[inline]
pub fn ecd_to_angle_change(ecd: u16, offset: u16) -> f64 {
    let mut delta = ecd as i32 - offset as i32;
    let half = HALF_ECD_RANGE as i32;
    if delta > half {
        delta -= ECD_RANGE as i32;
    } else if delta < -half {
        delta += ECD_RANGE as i32;
    }
    delta as f64 * ECD_TO_RAD
}

/// Encoder count pointing at `angle`.
#[inline]
pub fn angle_to_ecd(angle: f64) -> u16 {
    let turn = loop_constrain(angle, 0.0, TAU);
    let count = (turn / ECD_TO_RAD).round() as i32;
    ecd_format(count)
}

/// Raw encoder count to a single-turn angle in [0, 2π).
#[inline]
pub fn ecd_to_rad(ecd: u16) -> f64 {
    ecd_format(ecd as i32) as f64 * ECD_TO_RAD
}

/// Zero a joystick value inside `band`.
#[inline]
pub fn deadband(value: i16, band: i16) -> i16 {
    if value.unsigned_abs() <= band.unsigned_abs() { 0 } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn rad_format_range_is_half_open() {
        assert_eq!(rad_format(PI), PI);
        assert!((rad_format(-PI) - PI).abs() < EPS);
        assert!((rad_format(1.5 * PI) + 0.5 * PI).abs() < EPS);
        assert_eq!(rad_format(0.0), 0.0);
    }

    #[test]
    fn rad_format_is_periodic() {
        for i in -50..=50 {
            let a = i as f64 * 0.137;
            let base = rad_format(a);
            assert!(base > -PI && base <= PI, "{a} -> {base}");
            for k in -5..=5 {
                let shifted = rad_format(a + TAU * k as f64);
                let diff = rad_format(shifted - base);
                assert!(diff.abs() < EPS, "a={a} k={k}");
            }
        }
    }

    #[test]
    fn rad_format_of_tiny_negative_stays_in_range() {
        let r = rad_format(-1e-18);
        assert!(r > -PI && r <= PI);
        assert!(r.abs() < EPS);
    }

    #[test]
    fn loop_constrain_wraps_both_ways() {
        assert!((loop_constrain(-0.5, 0.0, TAU) - (TAU - 0.5)).abs() < EPS);
        assert!((loop_constrain(TAU + 0.25, 0.0, TAU) - 0.25).abs() < EPS);
        assert_eq!(loop_constrain(TAU, 0.0, TAU), 0.0);
        assert_eq!(loop_constrain(3.0, 1.0, 1.0), 3.0);
    }

    #[test]
    fn encoder_change_takes_short_path() {
        assert!((ecd_to_angle_change(100, 8100) - 192.0 * ECD_TO_RAD).abs() < EPS);
        assert!((ecd_to_angle_change(8100, 100) + 192.0 * ECD_TO_RAD).abs() < EPS);
        assert_eq!(ecd_to_angle_change(4096, 4096), 0.0);
    }

    #[test]
    fn angle_to_ecd_wraps_negative_angles() {
        assert_eq!(angle_to_ecd(0.0), 0);
        assert_eq!(angle_to_ecd(PI), HALF_ECD_RANGE);
        assert_eq!(angle_to_ecd(-PI / 2.0), 6144);
        assert_eq!(ecd_format(-1), ECD_RANGE - 1);
    }

    #[test]
    fn deadband_zeroes_small_values() {
        assert_eq!(deadband(10, 10), 0);
        assert_eq!(deadband(-10, 10), 0);
        assert_eq!(deadband(11, 10), 11);
        assert_eq!(deadband(i16::MIN, 10), i16::MIN);
    }
}
