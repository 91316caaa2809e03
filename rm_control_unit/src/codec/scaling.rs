//! Fixed-point scaling shared by the MIT fields.

/// Map an unsigned `bits`-wide code onto `[min, max]`.
#[inline]
pub fn uint_to_float(raw: u32, min: f64, max: f64, bits: u32) -> f64 {
    let full = ((1u64 << bits) - 1) as f64;
    raw as f64 * (max - min) / full + min
}

/// Map `x` in `[min, max]` onto an unsigned `bits`-wide code, rounding to
/// the nearest step.
///
/// Saturates instead of wrapping: `x >= max` gives the all-ones code and
/// `x <= min` gives zero. NaN encodes as zero.
#[inline]
pub fn float_to_uint(x: f64, min: f64, max: f64, bits: u32) -> u32 {
    let full = (1u64 << bits) - 1;
    if !(x > min) {
        return 0;
    }
    if x >= max {
        return full as u32;
    }
    let code = ((x - min) * full as f64 / (max - min)).round() as u64;
    code.min(full) as u32
}
