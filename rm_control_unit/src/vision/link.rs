//! Vision link session.
//!
//! Owns the local mode bits, the latest aim/move command, the transport
//! delay estimate and the mode-set commander. Time is passed in as a
//! millisecond tick; wire timestamps are that tick truncated to 16 bits.
//!
//! Delay estimation: on an ACK,
//! `delta = ((now − ctrl_sync) − request_ts − exec_delta) / 2`, averaged
//! over the last four samples, and the local sync point moves to
//! `now − delta`. Every other valid message adds `now − ctrl_sync − ts`
//! to the average.

use heapless::Vec;
use rm_common::control_unit::config::VisionConfig;
use rm_common::control_unit::measurement::DeviceId;
use rm_common::hal::liveness::LivenessTracker;
use tracing::{debug, info, warn};

use super::frame::{
    AckPayload, CvCommand, FRAME_LEN, FrameScanner, InfoBits, Message, MsgType, RawFrame,
    VisionMode, info_feedback, mode_request,
};
use crate::control::filters::MovingAverage;

/// Transport delay window.
pub const TRAN_DELTA_WINDOW: usize = 4;
/// Frames queued for transmit between two drains.
pub const VISION_TX_CAPACITY: usize = 4;

/// Mode-set commander state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommanderState {
    #[default]
    Idle,
    WaitForAck,
}

#[derive(Debug, Clone)]
pub struct VisionLink {
    cfg: VisionConfig,
    mode: VisionMode,
    mode_changed: bool,
    command: CvCommand,
    command_valid: bool,
    waiting_for_ack: bool,
    commander: CommanderState,
    last_poll_ms: Option<u64>,
    shoot_start_ms: u64,
    tran_delta: MovingAverage<TRAN_DELTA_WINDOW>,
    tran_delta_ma: i16,
    ctrl_sync: u16,
    cv_sync: u16,
    outbox: Vec<[u8; FRAME_LEN], VISION_TX_CAPACITY>,
}

impl VisionLink {
    pub fn new(cfg: VisionConfig) -> Self {
        Self {
            cfg,
            mode: VisionMode::empty(),
            mode_changed: false,
            command: CvCommand::default(),
            command_valid: false,
            waiting_for_ack: false,
            commander: CommanderState::Idle,
            last_poll_ms: None,
            shoot_start_ms: 0,
            tran_delta: MovingAverage::new(),
            tran_delta_ma: 0,
            ctrl_sync: 0,
            cv_sync: 0,
            outbox: Vec::new(),
        }
    }

    // ─── Accessors ──────────────────────────────────────────────────

    #[inline]
    pub fn mode(&self) -> VisionMode {
        self.mode
    }

    /// Latest command, only while it is valid.
    #[inline]
    pub fn command(&self) -> Option<CvCommand> {
        self.command_valid.then_some(self.command)
    }

    /// Moving-average transport delay, ms.
    #[inline]
    pub fn tran_delta(&self) -> i16 {
        self.tran_delta_ma
    }

    #[inline]
    pub fn ctrl_sync(&self) -> u16 {
        self.ctrl_sync
    }

    #[inline]
    pub fn cv_sync(&self) -> u16 {
        self.cv_sync
    }

    #[inline]
    pub fn commander_state(&self) -> CommanderState {
        self.commander
    }

    #[inline]
    pub fn is_waiting_for_ack(&self) -> bool {
        self.waiting_for_ack
    }

    /// Hand every queued outbound frame to `send`.
    pub fn drain_outbound(&mut self, mut send: impl FnMut(&[u8; FRAME_LEN])) {
        for frame in self.outbox.iter() {
            send(frame);
        }
        self.outbox.clear();
    }

    // ─── Local mode changes ─────────────────────────────────────────

    pub fn set_mode_bit(&mut self, bit: VisionMode, on: bool) {
        self.mode.set(bit, on);
    }

    /// Operator key edge: flip auto-aim and schedule a mode-set request.
    pub fn toggle_auto_aim(&mut self) {
        self.mode.toggle(VisionMode::AUTO_AIM);
        self.mode_changed = true;
        info!(auto_aim = self.mode.contains(VisionMode::AUTO_AIM), "vision auto-aim toggled");
    }

    // ─── Periodic work ──────────────────────────────────────────────

    /// Run once per base tick. Polls the commander every `poll_ms` and
    /// expires the shoot bit.
    pub fn tick(&mut self, now_ms: u64, link_faulted: bool) {
        let due = self
            .last_poll_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.cfg.poll_ms);
        if due {
            self.last_poll_ms = Some(now_ms);
            self.poll_commander(now_ms, link_faulted);
        }
        if self.mode.contains(VisionMode::SHOOT)
            && now_ms.saturating_sub(self.shoot_start_ms) > self.cfg.shoot_timeout_ms
        {
            debug!("vision shoot bit expired");
            self.mode.remove(VisionMode::SHOOT);
        }
    }

    fn poll_commander(&mut self, now_ms: u64, link_faulted: bool) {
        match self.commander {
            CommanderState::Idle => {
                let changed = core::mem::take(&mut self.mode_changed);
                if changed || link_faulted {
                    self.send_mode_request(now_ms);
                    self.waiting_for_ack = true;
                    self.commander = CommanderState::WaitForAck;
                }
            }
            CommanderState::WaitForAck => {
                if self.waiting_for_ack {
                    self.send_mode_request(now_ms);
                } else {
                    self.commander = CommanderState::Idle;
                }
            }
        }
    }

    fn send_mode_request(&mut self, now_ms: u64) {
        let frame = mode_request(self.wire_time(now_ms), self.mode);
        self.queue(&frame);
        self.command_valid = self.command_valid
            && self.mode.intersects(VisionMode::AUTO_AIM | VisionMode::AUTO_MOVE);
    }

    fn queue(&mut self, frame: &RawFrame) {
        if self.outbox.push(frame.encode()).is_err() {
            warn!("vision transmit queue full, frame dropped");
        }
    }

    #[inline]
    fn wire_time(&self, now_ms: u64) -> u16 {
        (now_ms as u16).wrapping_sub(self.ctrl_sync)
    }

    // ─── Receive ────────────────────────────────────────────────────

    /// Scan received bytes and handle every frame in them.
    pub fn on_bytes<L: LivenessTracker + ?Sized>(
        &mut self,
        buf: &[u8],
        now_ms: u64,
        liveness: &mut L,
    ) -> usize {
        let mut frames: Vec<RawFrame, 8> = Vec::new();
        FrameScanner.scan(buf, |f| {
            if frames.push(f).is_err() {
                warn!("vision receive burst too long, frame dropped");
            }
        });
        let link_faulted = liveness.is_faulted(DeviceId::VisionLink);
        let mut valid = 0;
        for frame in &frames {
            if self.on_frame(frame, now_ms, link_faulted) {
                liveness.notify_seen(DeviceId::VisionLink);
                valid += 1;
            }
        }
        valid
    }

    /// Handle one frame. Returns whether it was valid.
    pub fn on_frame(&mut self, frame: &RawFrame, now_ms: u64, link_faulted: bool) -> bool {
        let message = frame.decode();
        match message {
            Ok(Message::CvCmd(cmd)) => {
                let accepted = self.mode.intersects(VisionMode::AUTO_AIM | VisionMode::AUTO_MOVE)
                    && cmd.is_finite();
                if accepted {
                    self.update_tran_delta(frame.timestamp, now_ms);
                    self.command = cmd;
                    self.command_valid = true;
                } else {
                    self.reject_command(link_faulted);
                }
                accepted
            }
            Ok(Message::Ack(ack)) => {
                self.on_ack(&ack, now_ms);
                true
            }
            Ok(Message::ModeControl(mode)) => {
                self.update_tran_delta(frame.timestamp, now_ms);
                self.mode.set(VisionMode::SHOOT, mode.contains(VisionMode::SHOOT));
                self.shoot_start_ms = now_ms;
                true
            }
            Ok(Message::InfoRequest(bits)) => {
                self.update_tran_delta(frame.timestamp, now_ms);
                for bit in bits.iter() {
                    self.send_info(bit, now_ms);
                }
                true
            }
            Ok(Message::InfoFeedback { .. }) => false,
            Err(err) => {
                debug!(%err, "vision frame rejected");
                match MsgType::from_u8(frame.msg_type) {
                    Some(MsgType::CvCmd) => self.reject_command(link_faulted),
                    Some(MsgType::ModeControl) => self.mode.remove(VisionMode::SHOOT),
                    _ => {}
                }
                false
            }
        }
    }

    fn reject_command(&mut self, link_faulted: bool) {
        self.command_valid = false;
        if link_faulted {
            self.command = CvCommand::default();
        }
    }

    fn on_ack(&mut self, ack: &AckPayload, now_ms: u64) {
        let now = now_ms as u16;
        let round_trip = now
            .wrapping_sub(self.ctrl_sync)
            .wrapping_sub(ack.request_timestamp)
            .wrapping_sub(ack.exec_delta);
        let delta = (round_trip as i16) / 2;
        let mean = if self.ctrl_sync == 0 {
            self.tran_delta.reset_to(f64::from(delta))
        } else {
            self.tran_delta.push(f64::from(delta))
        };
        self.tran_delta_ma = mean.round() as i16;
        self.ctrl_sync = now.wrapping_sub(delta as u16);
        self.cv_sync = ack.cv_sync_time;
        self.waiting_for_ack = false;
        debug!(delta, ctrl_sync = self.ctrl_sync, "vision ack");
    }

    fn update_tran_delta(&mut self, remote_ts: u16, now_ms: u64) {
        let delta = (now_ms as u16)
            .wrapping_sub(self.ctrl_sync)
            .wrapping_sub(remote_ts) as i16;
        self.tran_delta_ma = self.tran_delta.push(f64::from(delta)).round() as i16;
    }

    fn send_info(&mut self, bit: InfoBits, now_ms: u64) {
        let value = if bit == InfoBits::TRAN_DELTA {
            self.tran_delta_ma.to_le_bytes()
        } else {
            self.cv_sync.to_le_bytes()
        };
        let frame = info_feedback(self.wire_time(now_ms), bit, value);
        self.queue(&frame);
    }
}
