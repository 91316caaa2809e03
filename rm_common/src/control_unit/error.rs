//! Device fault flags.
//!
//! Every flag is critical: the owning subsystem drops to its safe mode
//! while any flag is set on one of its devices.

use bitflags::bitflags;

bitflags! {
    /// Per-device fault flags kept by the liveness tracker.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeviceFault: u8 {
        /// No successful decode within the device's offline timeout.
        const OFFLINE   = 0x01;
        /// Device reported an error code in its status field.
        const PROTOCOL  = 0x02;
        /// Frames to the device could not be delivered.
        const TRANSPORT = 0x04;
    }
}

impl DeviceFault {
    /// Mask of all flags that force the safe mode.
    pub const CRITICAL_MASK: Self = Self::from_bits_truncate(
        Self::OFFLINE.bits() | Self::PROTOCOL.bits() | Self::TRANSPORT.bits(),
    );

    /// Returns true if any critical flag is set.
    #[inline]
    pub const fn has_critical(&self) -> bool {
        self.intersects(Self::CRITICAL_MASK)
    }
}

impl Default for DeviceFault {
    fn default() -> Self {
        Self::empty()
    }
}
