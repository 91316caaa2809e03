//! Signal conditioning filters.
//!
//! First-order low-pass for operator commands, a ramp for friction wheel
//! spin-up, a second-order IIR for trigger speed, and a fixed-window moving
//! average for link latency samples. Each filter keeps its state in a small
//! struct that is reset on mode transitions.

use heapless::Deque;

// ─── First-Order Low-Pass ───────────────────────────────────────────

/// Blend `input` with `previous`: `coeff·previous + (1 − coeff)·input`.
///
/// `coeff = 0` passes the input straight through.
#[inline]
pub fn first_order_blend(input: f64, previous: f64, coeff: f64) -> f64 {
    coeff * previous + (1.0 - coeff) * input
}

/// State of a first-order low-pass filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstOrderState {
    out: f64,
}

impl FirstOrderState {
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline]
    pub const fn output(&self) -> f64 {
        self.out
    }
}

/// Apply a first-order low-pass with time constant `tau` (s).
///
/// `out = tau/(tau+dt)·out + dt/(tau+dt)·input`. `tau = 0` disables the
/// filter. Non-finite input resets the output to zero.
#[inline]
pub fn first_order_apply(state: &mut FirstOrderState, tau: f64, input: f64, dt: f64) -> f64 {
    if !input.is_finite() {
        state.out = 0.0;
        return 0.0;
    }
    if tau <= 0.0 || dt <= 0.0 {
        state.out = input;
        return input;
    }
    let k = tau / (tau + dt);
    state.out = first_order_blend(input, state.out, k);
    state.out
}

// ─── Ramp ───────────────────────────────────────────────────────────

/// Rate-limited approach to a target, clamped to `[min, max]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RampState {
    out: f64,
}

impl RampState {
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline]
    pub const fn output(&self) -> f64 {
        self.out
    }
}

/// Move toward `target` by at most `step`, then clamp to `[min, max]`.
#[inline]
pub fn ramp_apply(state: &mut RampState, target: f64, step: f64, min: f64, max: f64) -> f64 {
    let delta = (target - state.out).clamp(-step.abs(), step.abs());
    state.out = (state.out + delta).clamp(min, max);
    state.out
}

// ─── Second-Order IIR ───────────────────────────────────────────────

/// Coefficients of the trigger speed filter:
/// `y[n] = c0·y[n−1] + c1·y[n−2] + c2·x[n]`.
pub const TRIGGER_SPEED_IIR: [f64; 3] = [
    1.725_709_860_247_969,
    -0.755_947_771_091_634_4,
    0.030_237_910_843_665_373,
];

/// Two-pole recursive low-pass state.
#[derive(Debug, Clone, Copy, Default)]
pub struct IirState {
    y1: f64,
    y2: f64,
}

impl IirState {
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline]
    pub const fn output(&self) -> f64 {
        self.y1
    }
}

/// Advance the two-pole filter by one sample.
#[inline]
pub fn iir_apply(state: &mut IirState, coeffs: &[f64; 3], input: f64) -> f64 {
    let input = if input.is_finite() { input } else { 0.0 };
    let y = coeffs[0] * state.y1 + coeffs[1] * state.y2 + coeffs[2] * input;
    state.y2 = state.y1;
    state.y1 = y;
    y
}

// ─── Moving Average ─────────────────────────────────────────────────

/// Fixed-window moving average over the last `N` samples.
#[derive(Debug, Clone)]
pub struct MovingAverage<const N: usize> {
    window: Deque<f64, N>,
    sum: f64,
}

impl<const N: usize> Default for MovingAverage<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> MovingAverage<N> {
    pub fn new() -> Self {
        Self {
            window: Deque::new(),
            sum: 0.0,
        }
    }

    /// Push a sample and return the mean of the window.
    pub fn push(&mut self, sample: f64) -> f64 {
        if self.window.is_full() {
            if let Some(old) = self.window.pop_front() {
                self.sum -= old;
            }
        }
        if self.window.push_back(sample).is_ok() {
            self.sum += sample;
        }
        self.mean()
    }

    /// Fill the whole window with `sample`.
    pub fn reset_to(&mut self, sample: f64) -> f64 {
        self.window.clear();
        self.sum = 0.0;
        for _ in 0..N {
            self.push(sample);
        }
        self.mean()
    }

    pub fn mean(&self) -> f64 {
        if self.window.is_empty() {
            0.0
        } else {
            self.sum / self.window.len() as f64
        }
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
