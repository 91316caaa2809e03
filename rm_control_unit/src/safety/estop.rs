//! Gimbal emergency-stop latch.
//!
//! Latches when a motor's measured current reaches the configured limit and
//! stays latched until [`EstopLatch::clear`]. While the remote is offline
//! the stop is active without latching.

use tracing::error;

#[derive(Debug, Clone, Copy, Default)]
pub struct EstopLatch {
    latched: bool,
}

impl EstopLatch {
    pub const fn new() -> Self {
        Self { latched: false }
    }

    /// Evaluate one cycle. Returns true when output must be zero.
    pub fn evaluate(&mut self, measured_currents: &[f64], limit: f64, remote_offline: bool) -> bool {
        if !self.latched && measured_currents.iter().any(|c| c.abs() >= limit) {
            error!(limit, "gimbal current limit reached, emergency stop latched");
            self.latched = true;
        }
        self.latched || remote_offline
    }

    #[inline]
    pub const fn is_latched(&self) -> bool {
        self.latched
    }

    /// Operator acknowledgement.
    pub fn clear(&mut self) {
        self.latched = false;
    }
}
