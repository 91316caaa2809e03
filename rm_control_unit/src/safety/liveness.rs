//! Device liveness table.
//!
//! One slot per [`DeviceId`] with its own offline timeout. A device that
//! has never been seen counts as faulted, so a subsystem stays in its safe
//! mode until every device it relies on has reported at least once.
//! Time is injected through [`DetectTable::advance`].

use rm_common::control_unit::config::LivenessConfig;
use rm_common::control_unit::error::DeviceFault;
use rm_common::control_unit::measurement::{DeviceId, Subsystem};
use rm_common::hal::liveness::LivenessTracker;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    timeout_ms: u64,
    last_seen_ms: Option<u64>,
    fault: DeviceFault,
}

#[derive(Debug, Clone)]
pub struct DetectTable {
    slots: [Slot; DeviceId::COUNT],
    now_ms: u64,
}

impl DetectTable {
    /// Timeouts per device class from configuration.
    pub fn new(cfg: &LivenessConfig) -> Self {
        let mut slots = [Slot::default(); DeviceId::COUNT];
        for id in DeviceId::all() {
            let timeout_ms = match id {
                DeviceId::RemoteControl => cfg.remote_ms,
                DeviceId::Imu => cfg.imu_ms,
                DeviceId::VisionLink => cfg.vision_ms,
                DeviceId::Referee => cfg.referee_ms,
                _ => cfg.motor_ms,
            };
            if let Some(slot) = id.index().and_then(|i| slots.get_mut(i)) {
                slot.timeout_ms = timeout_ms;
            }
        }
        Self { slots, now_ms: 0 }
    }

    /// Move the clock forward and raise `OFFLINE` on every device whose
    /// last report is older than its timeout.
    pub fn advance(&mut self, now_ms: u64) {
        self.now_ms = now_ms.max(self.now_ms);
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if let Some(seen) = slot.last_seen_ms {
                let stale = self.now_ms.saturating_sub(seen) > slot.timeout_ms;
                if stale && !slot.fault.contains(DeviceFault::OFFLINE) {
                    slot.fault |= DeviceFault::OFFLINE;
                    warn!(device = ?DeviceId::from_index(i), "device offline");
                }
            }
        }
    }

    #[inline]
    pub const fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Current flags of a device. Never-seen devices report `OFFLINE`.
    pub fn fault(&self, id: DeviceId) -> DeviceFault {
        match id.index().and_then(|i| self.slots.get(i)) {
            Some(slot) if slot.last_seen_ms.is_some() => slot.fault,
            _ => DeviceFault::OFFLINE,
        }
    }

    /// True when any device owned by `subsystem` among `ids` is faulted.
    pub fn subsystem_faulted(&self, subsystem: Subsystem, ids: &[DeviceId]) -> bool {
        ids.iter()
            .filter(|id| id.subsystem() == subsystem)
            .any(|&id| self.is_faulted(id))
    }

    fn slot_mut(&mut self, id: DeviceId) -> Option<&mut Slot> {
        id.index().and_then(|i| self.slots.get_mut(i))
    }
}

impl LivenessTracker for DetectTable {
    fn notify_seen(&mut self, id: DeviceId) {
        let now = self.now_ms;
        if let Some(slot) = self.slot_mut(id) {
            if slot.fault.has_critical() && slot.last_seen_ms.is_some() {
                info!(device = ?id, "device recovered");
            }
            slot.last_seen_ms = Some(now);
            slot.fault = DeviceFault::empty();
        }
    }

    fn notify_fault(&mut self, id: DeviceId) {
        if let Some(slot) = self.slot_mut(id) {
            slot.fault |= DeviceFault::PROTOCOL;
        }
    }

    fn notify_transport_failure(&mut self, id: DeviceId) {
        if let Some(slot) = self.slot_mut(id) {
            slot.fault |= DeviceFault::TRANSPORT | DeviceFault::OFFLINE;
        }
    }

    fn is_faulted(&self, id: DeviceId) -> bool {
        self.fault(id).has_critical()
    }
}
