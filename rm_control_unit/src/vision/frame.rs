//! Vision link frame format.
//!
//! ```text
//! [ '>' ][ '>' ][ ts 7:0 ][ ts 15:8 ][ type ][ payload ×16 ]
//! ```
//! Unused payload bytes are `0xFF` and are checked on receipt: a frame
//! with bad padding is rejected whole.

use bitflags::bitflags;
use static_assertions::const_assert_eq;
use thiserror::Error;

pub const HEADER: [u8; 2] = [b'>', b'>'];
pub const HEADER_LEN: usize = 2;
pub const PAYLOAD_LEN: usize = 16;
pub const FRAME_LEN: usize = 21;
/// Frame without its two header bytes.
pub const HEADLESS_LEN: usize = FRAME_LEN - HEADER_LEN;
pub const PADDING: u8 = 0xFF;

const_assert_eq!(HEADER_LEN + 2 + 1 + PAYLOAD_LEN, FRAME_LEN);

const ACK_ASCII: [u8; 3] = *b"ACK";
/// "ACK" + request timestamp + execution delta + remote sync time.
const ACK_USED_LEN: usize = 3 + 2 + 2 + 2;
/// Four little-endian f32 fill the payload exactly.
const CV_CMD_USED_LEN: usize = 16;

const_assert_eq!(CV_CMD_USED_LEN, PAYLOAD_LEN);

/// Message type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgType {
    ModeControl = 0x10,
    CvCmd = 0x20,
    Ack = 0x40,
    InfoRequest = 0x50,
    InfoFeedback = 0x51,
}

impl MsgType {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x10 => Some(Self::ModeControl),
            0x20 => Some(Self::CvCmd),
            0x40 => Some(Self::Ack),
            0x50 => Some(Self::InfoRequest),
            0x51 => Some(Self::InfoFeedback),
            _ => None,
        }
    }
}

bitflags! {
    /// Vision mode bits shared by both ends.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct VisionMode: u8 {
        const AUTO_AIM       = 1 << 0;
        const AUTO_MOVE      = 1 << 1;
        const ENEMY_DETECTED = 1 << 2;
        const SHOOT          = 1 << 3;
    }
}

bitflags! {
    /// Values the vision side may ask for with an info request.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InfoBits: u8 {
        const TRAN_DELTA   = 1 << 0;
        const CV_SYNC_TIME = 1 << 1;
    }
}

/// Aim and move command from the vision side.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CvCommand {
    /// Yaw offset to the target, rad.
    pub delta_yaw: f64,
    /// Pitch offset to the target, rad.
    pub delta_pitch: f64,
    /// Forward speed request, m/s.
    pub speed_x: f64,
    /// Strafe speed request, m/s.
    pub speed_y: f64,
}

impl CvCommand {
    pub fn is_finite(&self) -> bool {
        self.delta_yaw.is_finite()
            && self.delta_pitch.is_finite()
            && self.speed_x.is_finite()
            && self.speed_y.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AckPayload {
    pub request_timestamp: u16,
    pub exec_delta: u16,
    pub cv_sync_time: u16,
}

/// A validated message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    ModeControl(VisionMode),
    CvCmd(CvCommand),
    Ack(AckPayload),
    InfoRequest(InfoBits),
    InfoFeedback { info: InfoBits, value: [u8; 2] },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("unknown message type 0x{0:02X}")]
    UnknownType(u8),
    #[error("{0:?} payload padding corrupt")]
    Padding(MsgType),
    #[error("ACK marker missing")]
    AckMarker,
    #[error("undefined flag bits 0x{bits:02X} in {msg:?}")]
    UndefinedBits { msg: MsgType, bits: u8 },
}

/// One frame before interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame {
    pub timestamp: u16,
    pub msg_type: u8,
    pub payload: [u8; PAYLOAD_LEN],
}

impl RawFrame {
    /// Frame with an all-padding payload.
    pub const fn new(timestamp: u16, msg_type: MsgType) -> Self {
        Self {
            timestamp,
            msg_type: msg_type as u8,
            payload: [PADDING; PAYLOAD_LEN],
        }
    }

    /// Parse the bytes following a header.
    pub fn from_headless(bytes: &[u8; HEADLESS_LEN]) -> Self {
        let mut payload = [0u8; PAYLOAD_LEN];
        payload.copy_from_slice(&bytes[3..]);
        Self {
            timestamp: u16::from_le_bytes([bytes[0], bytes[1]]),
            msg_type: bytes[2],
            payload,
        }
    }

    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut out = [0u8; FRAME_LEN];
        out[..HEADER_LEN].copy_from_slice(&HEADER);
        out[2..4].copy_from_slice(&self.timestamp.to_le_bytes());
        out[4] = self.msg_type;
        out[5..].copy_from_slice(&self.payload);
        out
    }

    /// Validate padding and flag bits and interpret the payload.
    pub fn decode(&self) -> Result<Message, FrameError> {
        let msg = MsgType::from_u8(self.msg_type).ok_or(FrameError::UnknownType(self.msg_type))?;
        let p = &self.payload;
        match msg {
            MsgType::ModeControl => {
                check_padding(msg, &p[1..])?;
                let mode = VisionMode::from_bits(p[0])
                    .ok_or(FrameError::UndefinedBits { msg, bits: p[0] })?;
                Ok(Message::ModeControl(mode))
            }
            MsgType::CvCmd => {
                check_padding(msg, &p[CV_CMD_USED_LEN..])?;
                let f = |i: usize| f64::from(f32::from_le_bytes([p[i], p[i + 1], p[i + 2], p[i + 3]]));
                Ok(Message::CvCmd(CvCommand {
                    delta_yaw: f(0),
                    delta_pitch: f(4),
                    speed_x: f(8),
                    speed_y: f(12),
                }))
            }
            MsgType::Ack => {
                check_padding(msg, &p[ACK_USED_LEN..])?;
                if p[..3] != ACK_ASCII {
                    return Err(FrameError::AckMarker);
                }
                Ok(Message::Ack(AckPayload {
                    request_timestamp: u16::from_le_bytes([p[3], p[4]]),
                    exec_delta: u16::from_le_bytes([p[5], p[6]]),
                    cv_sync_time: u16::from_le_bytes([p[7], p[8]]),
                }))
            }
            MsgType::InfoRequest => {
                check_padding(msg, &p[1..])?;
                let info =
                    InfoBits::from_bits(p[0]).ok_or(FrameError::UndefinedBits { msg, bits: p[0] })?;
                Ok(Message::InfoRequest(info))
            }
            MsgType::InfoFeedback => {
                check_padding(msg, &p[3..])?;
                Ok(Message::InfoFeedback {
                    info: InfoBits::from_bits_truncate(p[0]),
                    value: [p[1], p[2]],
                })
            }
        }
    }
}

fn check_padding(msg: MsgType, unused: &[u8]) -> Result<(), FrameError> {
    if unused.iter().all(|&b| b == PADDING) {
        Ok(())
    } else {
        Err(FrameError::Padding(msg))
    }
}

/// Mode-set request carrying the local mode bits.
pub fn mode_request(timestamp: u16, mode: VisionMode) -> RawFrame {
    let mut frame = RawFrame::new(timestamp, MsgType::ModeControl);
    frame.payload[0] = mode.bits();
    frame
}

/// Reply to one info request bit.
pub fn info_feedback(timestamp: u16, info: InfoBits, value: [u8; 2]) -> RawFrame {
    let mut frame = RawFrame::new(timestamp, MsgType::InfoFeedback);
    frame.payload[0] = info.bits();
    frame.payload[1..3].copy_from_slice(&value);
    frame
}

/// Cuts frames out of a receive buffer.
///
/// Walks the buffer while a whole frame still fits. A `'>'` starts a frame;
/// a second `'>'` right after it is skipped, so a frame whose first header
/// byte was lost is still read.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameScanner;

impl FrameScanner {
    pub fn scan(&self, buf: &[u8], mut on_frame: impl FnMut(RawFrame)) -> usize {
        let mut found = 0;
        let mut i = 0;
        while i < buf.len() && buf.len() - i >= FRAME_LEN {
            if buf[i] != HEADER[0] {
                i += 1;
                continue;
            }
            if buf[i + 1] == HEADER[1] {
                i += 1;
            }
            i += 1;
            let mut headless = [0u8; HEADLESS_LEN];
            headless.copy_from_slice(&buf[i..i + HEADLESS_LEN]);
            on_frame(RawFrame::from_headless(&headless));
            found += 1;
            i += HEADLESS_LEN;
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ack_frame(req: u16, exec: u16, sync: u16) -> RawFrame {
        let mut f = RawFrame::new(0, MsgType::Ack);
        f.payload[..3].copy_from_slice(b"ACK");
        f.payload[3..5].copy_from_slice(&req.to_le_bytes());
        f.payload[5..7].copy_from_slice(&exec.to_le_bytes());
        f.payload[7..9].copy_from_slice(&sync.to_le_bytes());
        f
    }

    #[test]
    fn encoded_layout() {
        let bytes = mode_request(0x1234, VisionMode::AUTO_AIM | VisionMode::SHOOT).encode();
        assert_eq!(&bytes[..5], &[b'>', b'>', 0x34, 0x12, 0x10]);
        assert_eq!(bytes[5], 0x09);
        assert!(bytes[6..].iter().all(|&b| b == PADDING));
    }

    #[test]
    fn ack_decodes() {
        let msg = ack_frame(100, 7, 900).decode().unwrap();
        assert_eq!(
            msg,
            Message::Ack(AckPayload {
                request_timestamp: 100,
                exec_delta: 7,
                cv_sync_time: 900
            })
        );
    }

    #[test]
    fn corrupt_padding_rejects_plausible_frame() {
        let mut f = ack_frame(1, 2, 3);
        f.payload[15] = 0x00;
        assert_eq!(f.decode(), Err(FrameError::Padding(MsgType::Ack)));

        let mut m = mode_request(0, VisionMode::SHOOT);
        m.payload[4] = 0;
        assert_eq!(m.decode(), Err(FrameError::Padding(MsgType::ModeControl)));
    }

    #[test]
    fn ack_marker_checked() {
        let mut f = ack_frame(1, 2, 3);
        f.payload[0] = b'N';
        assert_eq!(f.decode(), Err(FrameError::AckMarker));
    }

    #[test]
    fn undefined_mode_bits_rejected() {
        let mut m = mode_request(0, VisionMode::empty());
        m.payload[0] = 0x30;
        assert!(matches!(m.decode(), Err(FrameError::UndefinedBits { .. })));
    }

    #[test]
    fn cv_cmd_floats_little_endian() {
        let mut f = RawFrame::new(0, MsgType::CvCmd);
        for (i, v) in [0.5f32, -0.25, 1.0, 2.0].iter().enumerate() {
            f.payload[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
        }
        let Ok(Message::CvCmd(cmd)) = f.decode() else {
            panic!("expected command");
        };
        assert_eq!(cmd.delta_yaw, 0.5);
        assert_eq!(cmd.delta_pitch, -0.25);
        assert_eq!(cmd.speed_y, 2.0);
    }

    #[test]
    fn unknown_type() {
        let mut f = RawFrame::new(0, MsgType::Ack);
        f.msg_type = 0x77;
        assert_eq!(f.decode(), Err(FrameError::UnknownType(0x77)));
    }

    #[test]
    fn scanner_finds_frames_and_skips_noise() {
        let a = mode_request(1, VisionMode::AUTO_AIM).encode();
        let b = mode_request(2, VisionMode::SHOOT).encode();
        let mut buf = vec![0x00, 0x13];
        buf.extend_from_slice(&a);
        buf.extend_from_slice(&b);
        let mut got = Vec::new();
        assert_eq!(FrameScanner.scan(&buf, |f| got.push(f.timestamp)), 2);
        assert_eq!(got, vec![1, 2]);
    }

    #[test]
    fn scanner_tolerates_lost_first_header_byte() {
        let full = mode_request(7, VisionMode::AUTO_MOVE).encode();
        let mut got = Vec::new();
        let mut buf = full[1..].to_vec();
        buf.push(0);
        FrameScanner.scan(&buf, |f| got.push(f));
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].timestamp, 7);
    }

    #[test]
    fn scanner_ignores_truncated_tail() {
        let full = mode_request(7, VisionMode::AUTO_MOVE).encode();
        assert_eq!(FrameScanner.scan(&full[..FRAME_LEN - 1], |_| {}), 0);
    }
}
