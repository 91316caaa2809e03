//! Control engine micro-benchmark.
//!
//! Measures the per-tick cost of the pieces every loop runs:
//! - Position PID on a raw error
//! - Angle PID with an externally measured rate (gimbal absolute loop)
//! - Delta PID (swerve steer loop)
//! - First-order and two-pole filters
//! - Mecanum and swerve inverse kinematics

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use rm_common::control_unit::config::{MecanumConfig, PidConfig, SwerveConfig};
use rm_common::control_unit::measurement::MotionVector;
use rm_control_unit::control::filters::{
    FirstOrderState, IirState, first_order_apply, iir_apply,
};
use rm_control_unit::control::pid::{ErrorFn, Pid, PidMode};
use rm_control_unit::kinematics::mecanum::wheel_speeds_from_motion;
use rm_control_unit::kinematics::swerve::{HipMotion, SwerveState, wheel_targets_from_motion};

const DT: f64 = 0.001; // 1 kHz

fn reference_gains() -> PidConfig {
    PidConfig::new(15_000.0, 10.0, 0.5, 16_000.0, 2_000.0)
}

fn bench_pid_position(c: &mut Criterion) {
    let mut pid = Pid::raw(reference_gains());
    let mut cycle = 0u64;

    c.bench_function("pid_position", |b| {
        b.iter(|| {
            cycle += 1;
            let t = cycle as f64 * DT;
            pid.calc(black_box(0.2 * t.sin()), 1.0, DT)
        });
    });
}

fn bench_pid_angle_with_rate(c: &mut Criterion) {
    let mut pid = Pid::angle(PidConfig::new(15.0, 0.0, 0.3, 10.0, 0.0));
    let mut cycle = 0u64;

    c.bench_function("pid_angle_with_rate", |b| {
        b.iter(|| {
            cycle += 1;
            let t = cycle as f64 * DT;
            pid.calc_with_rate(black_box(3.0 * t.sin()), -3.0, DT, 3.0 * t.cos())
        });
    });
}

fn bench_pid_delta(c: &mut Criterion) {
    let mut pid = Pid::new(PidMode::Delta, reference_gains(), ErrorFn::Raw);
    let mut cycle = 0u64;

    c.bench_function("pid_delta", |b| {
        b.iter(|| {
            cycle += 1;
            let t = cycle as f64 * DT;
            pid.calc(black_box(100.0 * t.cos()), 250.0, DT)
        });
    });
}

fn bench_filters(c: &mut Criterion) {
    let mut first = FirstOrderState::default();
    let mut iir = IirState::default();
    let coeffs = [1.929454039488895, -0.93178349823448, 0.002329458745586];
    let mut cycle = 0u64;

    c.bench_function("filters_first_order_and_iir", |b| {
        b.iter(|| {
            cycle += 1;
            let t = cycle as f64 * DT;
            let input = 10.0 * t.sin() + 0.5 * (800.0 * t).sin();
            let smooth = first_order_apply(&mut first, 0.1667, input, DT);
            iir_apply(&mut iir, &coeffs, black_box(smooth))
        });
    });
}

fn bench_kinematics(c: &mut Criterion) {
    let mecanum = MecanumConfig::default();
    let swerve = SwerveConfig::default();
    let radii = [swerve.default_radius; 4];
    let mut state = SwerveState::default();
    let mut cycle = 0u64;

    c.bench_function("mecanum_inverse", |b| {
        b.iter(|| {
            cycle += 1;
            let t = cycle as f64 * DT;
            wheel_speeds_from_motion(black_box(&MotionVector::new(t.sin(), t.cos(), 0.5)), &mecanum)
        });
    });

    c.bench_function("swerve_inverse", |b| {
        b.iter(|| {
            cycle += 1;
            let t = cycle as f64 * DT;
            let motion = MotionVector::new(t.sin(), t.cos(), 0.5);
            wheel_targets_from_motion(&mut state, black_box(&motion), &radii, HipMotion::Idle, &swerve)
        });
    });
}

criterion_group!(
    benches,
    bench_pid_position,
    bench_pid_angle_with_rate,
    bench_pid_delta,
    bench_filters,
    bench_kinematics,
);
criterion_main!(benches);
