//! PID engine with a fixed error function and integral clamping.
//!
//! Two control laws, chosen at construction and never mixed:
//! - **Position**: `out = P + I + D`, recomputed every cycle.
//! - **Delta**: `out += ΔP + I + ΔD`, accumulated across cycles.
//!
//! The integral term is clamped to `±max_iout` before it is summed, and the
//! sum is clamped to `±max_out`. The error function (raw or angle-wrapped,
//! optionally low-pass filtered) is part of the controller's identity and
//! cannot be swapped after construction.

use rm_common::control_unit::config::PidConfig;

use super::angle::rad_format;
use super::filters::first_order_blend;

/// Control law.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidMode {
    Position,
    Delta,
}

/// How the error is formed from set-point and measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ErrorFn {
    /// `set - measured`.
    Raw,
    /// `rad_format(set - measured)`.
    Angle,
    /// Raw error blended with the previous error by the coefficient.
    Filtered(f64),
    /// Angle error blended with the previous error by the coefficient.
    FilteredAngle(f64),
}

impl ErrorFn {
    #[inline]
    fn apply(self, set: f64, measured: f64, previous: f64) -> f64 {
        match self {
            Self::Raw => set - measured,
            Self::Angle => rad_format(set - measured),
            Self::Filtered(coeff) => first_order_blend(set - measured, previous, coeff),
            Self::FilteredAngle(coeff) => {
                rad_format(first_order_blend(rad_format(set - measured), previous, coeff))
            }
        }
    }
}

/// Internal state, cleared by [`Pid::reset`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PidState {
    /// Error history, newest first.
    error: [f64; 3],
    /// Derivative signal history, newest first. Finite difference of the
    /// error, or the measured rate when one is supplied.
    dbuf: [f64; 3],
    p_out: f64,
    i_out: f64,
    d_out: f64,
    out: f64,
}

impl PidState {
    /// Reset all internal state to zero.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// One PID loop.
#[derive(Debug, Clone, Copy)]
pub struct Pid {
    mode: PidMode,
    gains: PidConfig,
    error_fn: ErrorFn,
    state: PidState,
}

impl Pid {
    pub const fn new(mode: PidMode, gains: PidConfig, error_fn: ErrorFn) -> Self {
        Self {
            mode,
            gains,
            error_fn,
            state: PidState {
                error: [0.0; 3],
                dbuf: [0.0; 3],
                p_out: 0.0,
                i_out: 0.0,
                d_out: 0.0,
                out: 0.0,
            },
        }
    }

    /// Position-mode loop on a plain quantity.
    pub const fn raw(gains: PidConfig) -> Self {
        Self::new(PidMode::Position, gains, ErrorFn::Raw)
    }

    /// Position-mode loop on an angle.
    pub const fn angle(gains: PidConfig) -> Self {
        Self::new(PidMode::Position, gains, ErrorFn::Angle)
    }

    /// One cycle with a finite-difference derivative.
    ///
    /// Non-finite inputs produce a zero output and leave the state untouched.
    /// `dt <= 0` returns the previous output.
    pub fn calc(&mut self, measured: f64, set: f64, dt: f64) -> f64 {
        if !(measured.is_finite() && set.is_finite()) {
            return 0.0;
        }
        if !(dt > 0.0) {
            return self.state.out;
        }
        self.push_error(measured, set);
        let s = &mut self.state;
        s.dbuf = [(s.error[0] - s.error[1]) / dt, s.dbuf[0], s.dbuf[1]];
        self.finish(dt)
    }

    /// One cycle whose derivative is a directly measured rate (e.g. a gyro).
    ///
    /// The derivative term is `kd * rate`; no finite difference is taken.
    pub fn calc_with_rate(&mut self, measured: f64, set: f64, dt: f64, rate: f64) -> f64 {
        if !(measured.is_finite() && set.is_finite() && rate.is_finite()) {
            return 0.0;
        }
        if !(dt > 0.0) {
            return self.state.out;
        }
        self.push_error(measured, set);
        let s = &mut self.state;
        s.dbuf = [rate, s.dbuf[0], s.dbuf[1]];
        self.finish(dt)
    }

    #[inline]
    fn push_error(&mut self, measured: f64, set: f64) {
        let s = &mut self.state;
        s.error = [0.0, s.error[0], s.error[1]];
        s.error[0] = self.error_fn.apply(set, measured, s.error[1]);
    }

    #[inline]
    fn finish(&mut self, dt: f64) -> f64 {
        let g = &self.gains;
        let s = &mut self.state;
        let max_iout = g.max_iout.abs();
        let max_out = g.max_out.abs();
        match self.mode {
            PidMode::Position => {
                s.p_out = g.kp * s.error[0];
                s.i_out = (s.i_out + g.ki * s.error[0] * dt).clamp(-max_iout, max_iout);
                s.d_out = g.kd * s.dbuf[0];
                s.out = (s.p_out + s.i_out + s.d_out).clamp(-max_out, max_out);
            }
            PidMode::Delta => {
                s.p_out = g.kp * (s.error[0] - s.error[1]);
                s.i_out = (g.ki * s.error[0] * dt).clamp(-max_iout, max_iout);
                s.d_out = g.kd * (s.dbuf[0] - s.dbuf[1]);
                s.out = (s.out + s.p_out + s.i_out + s.d_out).clamp(-max_out, max_out);
            }
        }
        s.out
    }

    /// Zero integral, error and derivative history, and the cached output.
    #[inline]
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Replace gains and limits. Mode and error function are kept.
    #[inline]
    pub fn set_gains(&mut self, gains: PidConfig) {
        self.gains = gains;
    }

    #[inline]
    pub const fn gains(&self) -> &PidConfig {
        &self.gains
    }

    #[inline]
    pub const fn error_fn(&self) -> ErrorFn {
        self.error_fn
    }

    #[inline]
    pub const fn mode(&self) -> PidMode {
        self.mode
    }

    /// Last output.
    #[inline]
    pub const fn output(&self) -> f64 {
        self.state.out
    }

    /// Last integral term (already multiplied by `ki`).
    #[inline]
    pub const fn integral_term(&self) -> f64 {
        self.state.i_out
    }

    /// Last error as seen by the loop.
    #[inline]
    pub const fn error(&self) -> f64 {
        self.state.error[0]
    }
}

/// Run `pid` if it exists. A missing controller outputs zero.
#[inline]
pub fn pid_calc(pid: Option<&mut Pid>, measured: f64, set: f64, dt: f64) -> f64 {
    pid.map_or(0.0, |p| p.calc(measured, set, dt))
}

// ─── Tests ──────────────────────────────────────────────────────────
