//! Integration test: PID output and integral bounds under long step inputs.
//!
//! Each loop runs 10,000 ticks against a crude first-order plant and the
//! bounds are checked on every tick.

use rm_common::control_unit::config::PidConfig;

use rm_control_unit::control::pid::{ErrorFn, Pid, PidMode};

const TICKS: usize = 10_000;
const DT: f64 = 0.001;

fn hot_gains() -> PidConfig {
    PidConfig::new(5_000.0, 80_000.0, 30.0, 16_000.0, 4_000.0)
}

fn drive(mut pid: Pid, set: impl Fn(usize) -> f64, plant_gain: f64) {
    let max_out = pid.gains().max_out;
    let max_iout = pid.gains().max_iout;
    let mut measured = 0.0;
    for tick in 0..TICKS {
        let out = pid.calc(measured, set(tick), DT);
        assert!(out.abs() <= max_out, "tick {tick}: out {out}");
        assert!(
            pid.integral_term().abs() <= max_iout,
            "tick {tick}: iout {}",
            pid.integral_term()
        );
        measured += (out * plant_gain - measured) * DT;
    }
}

#[test]
fn position_loop_stays_bounded_on_a_step() {
    drive(Pid::raw(hot_gains()), |_| 1_000.0, 0.0);
}

#[test]
fn position_loop_stays_bounded_on_alternating_steps() {
    drive(
        Pid::raw(hot_gains()),
        |t| if (t / 500) % 2 == 0 { 5e6 } else { -5e6 },
        1e-3,
    );
}

#[test]
fn delta_loop_stays_bounded() {
    drive(
        Pid::new(PidMode::Delta, hot_gains(), ErrorFn::Raw),
        |t| if t < TICKS / 2 { 250.0 } else { -250.0 },
        0.5,
    );
}

#[test]
fn angle_loop_stays_bounded_across_wraps() {
    drive(
        Pid::new(PidMode::Position, hot_gains(), ErrorFn::FilteredAngle(0.3)),
        |t| t as f64 * 0.01,
        0.0,
    );
}

#[test]
fn measured_rate_loop_stays_bounded() {
    let mut pid = Pid::angle(hot_gains());
    let gains = *pid.gains();
    for tick in 0..TICKS {
        let rate = if tick % 2 == 0 { 1e4 } else { -1e4 };
        let out = pid.calc_with_rate(0.0, 3.0, DT, rate);
        assert!(out.abs() <= gains.max_out);
        assert!(pid.integral_term().abs() <= gains.max_iout);
    }
}
