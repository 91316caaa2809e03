//! Wire codec micro-benchmark.
//!
//! One receive-decode pass and one encode pass per protocol, plus the full
//! routed path from a received frame to the published record.

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use rm_common::control_unit::config::{ArmConfig, MitMotorModel, RobotConfig};
use rm_common::control_unit::measurement::MitCommand;
use rm_common::hal::bus::{BusId, CanFrame};
use rm_control_unit::codec::ktech::{decode_ktech_torque, encode_ktech_broadcast};
use rm_control_unit::codec::mit::{decode_mit, encode_mit};
use rm_control_unit::codec::rm::{decode_rm, encode_rm_group};
use rm_control_unit::codec::router::FrameRouter;
use rm_control_unit::codec::table::MotorTable;
use rm_control_unit::safety::liveness::DetectTable;

fn bench_rm(c: &mut Criterion) {
    let feedback = [0x12, 0x34, 0x01, 0xF4, 0xFF, 0x38, 40, 0];
    c.bench_function("rm_decode", |b| b.iter(|| decode_rm(black_box(&feedback))));

    let currents = [1200.0, -800.0, 16_500.0, f64::NAN];
    c.bench_function("rm_encode_group", |b| {
        b.iter(|| encode_rm_group(black_box(currents), 16_000.0))
    });
}

fn bench_mit(c: &mut Criterion) {
    let range = MitMotorModel::Dm4310.range();
    let cmd = MitCommand {
        position: 0.7,
        velocity: -1.2,
        kp: 20.0,
        kd: 0.5,
        torque: 3.3,
    };
    c.bench_function("mit_encode", |b| b.iter(|| encode_mit(black_box(&cmd), &range)));

    let feedback = [0x11, 0x80, 0x00, 0x7F, 0xF8, 0x00, 30, 28];
    c.bench_function("mit_decode", |b| {
        b.iter(|| decode_mit(black_box(&feedback), &range, false))
    });
}

fn bench_ktech(c: &mut Criterion) {
    let feedback = [0xA1, 32, 0x10, 0x00, 0x64, 0x00, 0x00, 0x20];
    c.bench_function("ktech_decode_torque", |b| {
        b.iter(|| decode_ktech_torque(black_box(&feedback), 10.0))
    });

    let currents = [150.0, -150.0, 0.0, 2100.0];
    c.bench_function("ktech_encode_broadcast", |b| {
        b.iter(|| encode_ktech_broadcast(black_box(currents), 2000.0))
    });
}

fn bench_routed_receive(c: &mut Criterion) {
    let cfg = RobotConfig {
        arm: Some(ArmConfig::default()),
        ..RobotConfig::default()
    };
    let router = FrameRouter::from_config(&cfg).expect("default robot routes");
    let mut table = MotorTable::new();
    let mut liveness = DetectTable::new(&cfg.liveness);
    let frames = [
        CanFrame::new(
            BusId(cfg.can.gimbal_bus),
            cfg.can.yaw_id,
            [0x12, 0x34, 0x01, 0xF4, 0xFF, 0x38, 40, 0],
        ),
        CanFrame::new(
            BusId(cfg.can.chassis_bus),
            cfg.can.wheel_ids[2],
            [0x00, 0x10, 0xFE, 0x0C, 0x00, 0x64, 35, 0],
        ),
        CanFrame::new(
            BusId(cfg.can.arm_bus),
            cfg.can.mit_feedback_ids[1],
            [0x12, 0x80, 0x00, 0x7F, 0xF8, 0x00, 30, 28],
        ),
    ];
    let mut i = 0usize;

    c.bench_function("router_on_frame_received", |b| {
        b.iter(|| {
            i = (i + 1) % frames.len();
            router.on_frame_received(black_box(&frames[i]), &mut table, &mut liveness)
        });
    });
}

criterion_group!(benches, bench_rm, bench_mit, bench_ktech, bench_routed_receive);
criterion_main!(benches);
