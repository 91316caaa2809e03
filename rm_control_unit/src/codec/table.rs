//! Published measurement table.
//!
//! One slot per [`DeviceId`]. The router is the only writer and replaces a
//! slot's record in a single assignment, so readers always see a complete
//! record from one frame.

use rm_common::control_unit::measurement::{DeviceId, MotorMeasurement};

#[derive(Debug, Clone)]
pub struct MotorTable {
    slots: [MotorMeasurement; DeviceId::COUNT],
}

impl Default for MotorTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MotorTable {
    pub fn new() -> Self {
        Self {
            slots: [MotorMeasurement::default(); DeviceId::COUNT],
        }
    }

    /// Copy of the latest record. Unknown devices read as zeroed.
    #[inline]
    pub fn get(&self, id: DeviceId) -> MotorMeasurement {
        id.index()
            .and_then(|i| self.slots.get(i).copied())
            .unwrap_or_default()
    }

    /// Replace a whole record.
    #[inline]
    pub(crate) fn publish(&mut self, id: DeviceId, record: MotorMeasurement) {
        if let Some(slot) = id.index().and_then(|i| self.slots.get_mut(i)) {
            *slot = record;
        }
    }
}
