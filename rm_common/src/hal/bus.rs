//! Field-bus frame type and transport trait.
//!
//! This module defines:
//! - `BusId` / `CanFrame` - addressing and payload of one classic CAN frame
//! - `BusError` - transport-level failures
//! - `BusTransport` - a single non-blocking send attempt, implemented by drivers

use crate::consts::CAN_PAYLOAD_LEN;
use thiserror::Error;

/// Physical bus index (CAN1 = 0, CAN2 = 1, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct BusId(pub u8);

/// One outbound or inbound classic CAN data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    /// Bus the frame travels on.
    pub bus: BusId,
    /// Standard 11-bit identifier.
    pub id: u16,
    /// Payload, always the full eight bytes.
    pub data: [u8; CAN_PAYLOAD_LEN],
}

impl CanFrame {
    #[inline]
    pub const fn new(bus: BusId, id: u16, data: [u8; CAN_PAYLOAD_LEN]) -> Self {
        Self { bus, id, data }
    }
}

/// Error types for bus transport operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BusError {
    /// All transmit mailboxes are occupied; the caller may retry.
    #[error("bus {0:?} busy")]
    Busy(BusId),

    /// Retries exhausted without the frame being accepted.
    #[error("bus {bus:?} frame 0x{id:03X} timed out after {elapsed_ms} ms")]
    Timeout { bus: BusId, id: u16, elapsed_ms: u64 },
}

/// Trait implemented by bus drivers.
///
/// `try_send` makes exactly one attempt and never blocks. Bounded retry is
/// layered on top by the control unit.
pub trait BusTransport {
    /// Offer one frame to the bus.
    fn try_send(&mut self, frame: &CanFrame) -> Result<(), BusError>;
}

impl<T: BusTransport + ?Sized> BusTransport for &mut T {
    fn try_send(&mut self, frame: &CanFrame) -> Result<(), BusError> {
        (**self).try_send(frame)
    }
}
