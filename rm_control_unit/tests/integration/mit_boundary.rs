//! Integration test: MIT fixed-point saturation at the wire boundary.

use rm_common::control_unit::config::MitMotorModel;
use rm_common::control_unit::measurement::MitCommand;

use rm_control_unit::codec::mit::{POSITION_BITS, decode_mit, encode_mit};
use rm_control_unit::codec::scaling::{float_to_uint, uint_to_float};

#[test]
fn out_of_range_saturates_instead_of_wrapping() {
    assert_eq!(float_to_uint(999.0, -12.5, 12.5, 16), 65535);
    assert_eq!(float_to_uint(-999.0, -12.5, 12.5, 16), 0);
    assert_eq!(float_to_uint(f64::NAN, -12.5, 12.5, 16), 0);
}

#[test]
fn in_range_stays_within_one_step() {
    let step = 25.0 / 65535.0;
    for x in [-12.5, -3.3, 0.0, 0.001, 7.77, 12.5] {
        let back = uint_to_float(float_to_uint(x, -12.5, 12.5, 16), -12.5, 12.5, 16);
        assert!((back - x).abs() <= step, "{x} -> {back}");
    }
}

#[test]
fn saturated_command_decodes_to_the_boundary() {
    let range = MitMotorModel::Dm4310.range();
    let cmd = MitCommand {
        position: 999.0,
        velocity: -999.0,
        kp: 0.0,
        kd: 0.0,
        torque: 999.0,
    };
    let frame = encode_mit(&cmd, &range);
    assert_eq!(&frame[0..2], &[0xFF, 0xFF]);
    assert_eq!(frame[2], 0x00);
    assert_eq!(frame[3] & 0xF0, 0x00);
    assert_eq!(frame[6] & 0x0F, 0x0F);
    assert_eq!(frame[7], 0xFF);

    // Feed the saturated position and torque back as a feedback frame.
    let p = float_to_uint(999.0, range.p_min, range.p_max, POSITION_BITS);
    let feedback = [0x11, (p >> 8) as u8, p as u8, 0x80, 0x0F, 0xFF, 25, 0];
    let fb = decode_mit(&feedback, &range, false).expect("healthy status");
    assert_eq!(fb.position, range.p_max);
    assert_eq!(fb.torque, range.t_max);
}

#[test]
fn low_torque_model_saturates_at_its_own_limit() {
    let range = MitMotorModel::LowTorque.range();
    let frame = encode_mit(&MitCommand::torque_only(-50.0), &range);
    assert_eq!(frame[6] & 0x0F, 0x00);
    assert_eq!(frame[7], 0x00);
    let frame = encode_mit(&MitCommand::torque_only(range.t_max), &range);
    assert_eq!(frame[6] & 0x0F, 0x0F);
    assert_eq!(frame[7], 0xFF);
}
