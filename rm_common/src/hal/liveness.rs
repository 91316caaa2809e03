//! Device liveness interface.
//!
//! The codec reports every successful decode and every protocol fault;
//! behaviour machines ask whether a device is currently usable. The
//! offline-timeout policy belongs to the implementor.

use crate::control_unit::measurement::DeviceId;

/// Tracks per-device health.
pub trait LivenessTracker {
    /// A frame from `id` decoded successfully.
    fn notify_seen(&mut self, id: DeviceId);

    /// The device reported a fault in its own status field.
    fn notify_fault(&mut self, id: DeviceId);

    /// A frame addressed to the device could not be delivered.
    fn notify_transport_failure(&mut self, id: DeviceId);

    /// True when the device must not be relied upon.
    fn is_faulted(&self, id: DeviceId) -> bool;

    /// True when any device in `ids` is faulted.
    fn any_faulted(&self, ids: &[DeviceId]) -> bool {
        ids.iter().any(|&id| self.is_faulted(id))
    }
}
