//! Integration test: vision mode handshake and aim hand-off to the gimbal.
//!
//! 1. G key → auto-aim bit set, one mode request queued
//! 2. ACK from the vision side → delay estimate and sync point updated
//! 3. Valid aim command → gimbal in VisionAssisted
//! 4. Non-finite aim command → gimbal back to operator control

use rm_common::control_unit::input::KeyFlags;
use rm_common::control_unit::measurement::DeviceId;
use rm_common::control_unit::state::GimbalBehaviour;
use rm_common::hal::liveness::LivenessTracker;

use rm_control_unit::vision::frame::{FRAME_LEN, HEADER_LEN, HEADLESS_LEN};
use rm_control_unit::vision::{Message, MsgType, RawFrame, VisionMode};

use super::Rig;

fn ack(request_ts: u16, exec_delta: u16, cv_sync: u16) -> [u8; FRAME_LEN] {
    let mut f = RawFrame::new(0, MsgType::Ack);
    f.payload[..3].copy_from_slice(b"ACK");
    f.payload[3..5].copy_from_slice(&request_ts.to_le_bytes());
    f.payload[5..7].copy_from_slice(&exec_delta.to_le_bytes());
    f.payload[7..9].copy_from_slice(&cv_sync.to_le_bytes());
    f.encode()
}

fn aim(ts: u16, yaw: f32, pitch: f32) -> [u8; FRAME_LEN] {
    let mut f = RawFrame::new(ts, MsgType::CvCmd);
    for (i, v) in [yaw, pitch, 0.0, 0.0].iter().enumerate() {
        f.payload[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
    }
    f.encode()
}

fn drain(rig: &mut Rig) -> Vec<Message> {
    let mut out = Vec::new();
    rig.unit.drain_vision(|bytes| {
        let mut headless = [0u8; HEADLESS_LEN];
        headless.copy_from_slice(&bytes[HEADER_LEN..]);
        if let Ok(msg) = RawFrame::from_headless(&headless).decode() {
            out.push(msg);
        }
    });
    out
}

fn gimbal(rig: &Rig) -> GimbalBehaviour {
    rig.unit.gimbal().map(|g| g.behaviour()).expect("gimbal")
}

#[test]
fn handshake_then_aim_drives_the_gimbal() {
    let mut rig = Rig::new(Default::default());
    rig.operator.keys = KeyFlags::G;
    rig.step();
    rig.operator.keys = KeyFlags::empty();

    let sent = drain(&mut rig);
    assert_eq!(sent, vec![Message::ModeControl(VisionMode::AUTO_AIM)]);
    let link = rig.unit.vision().expect("vision");
    assert!(link.is_waiting_for_ack());
    assert!(rig.unit.liveness().is_faulted(DeviceId::VisionLink));

    // Mode request went out at t = 1 ms; the ACK arrives at t = 11 ms.
    rig.steps(10);
    assert_eq!(rig.unit.now_ms(), 11);
    assert_eq!(rig.unit.on_vision_bytes(&ack(1, 4, 500)), 1);
    let link = rig.unit.vision().expect("vision");
    assert!(!link.is_waiting_for_ack());
    assert_eq!(link.tran_delta(), 3);
    assert_eq!(link.ctrl_sync(), 8);
    assert_eq!(link.cv_sync(), 500);
    assert!(!rig.unit.liveness().is_faulted(DeviceId::VisionLink));

    assert_eq!(gimbal(&rig), GimbalBehaviour::Absolute);
    assert_eq!(rig.unit.on_vision_bytes(&aim(3, 0.05, -0.02)), 1);
    rig.step();
    assert_eq!(gimbal(&rig), GimbalBehaviour::VisionAssisted);

    assert_eq!(rig.unit.on_vision_bytes(&aim(4, f32::NAN, 0.0)), 0);
    rig.step();
    assert_eq!(gimbal(&rig), GimbalBehaviour::Absolute);
}

#[test]
fn aim_is_ignored_without_auto_aim() {
    let mut rig = Rig::new(Default::default());
    rig.steps(2);
    assert_eq!(rig.unit.on_vision_bytes(&aim(1, 0.1, 0.1)), 0);
    rig.step();
    assert_eq!(gimbal(&rig), GimbalBehaviour::Absolute);
    assert!(rig.unit.vision().expect("vision").command().is_none());
}

#[test]
fn garbage_between_frames_is_skipped() {
    let mut rig = Rig::new(Default::default());
    rig.operator.keys = KeyFlags::G;
    rig.step();
    let mut buf = vec![0x00, 0x13, 0x55];
    buf.extend_from_slice(&ack(1, 0, 0));
    buf.extend_from_slice(&[0xAA; 5]);
    assert_eq!(rig.unit.on_vision_bytes(&buf), 1);
    assert!(!rig.unit.vision().expect("vision").is_waiting_for_ack());
}
