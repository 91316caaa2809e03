//! Bounded-retry transmission and an in-memory transport.
//!
//! A transport offers one non-blocking attempt per call. [`send_with_retry`]
//! keeps offering a busy frame every `interval_ms` until the `budget_ms`
//! runs out; the caller decides how to wait between attempts.

use rm_common::control_unit::config::BusRetryConfig;
use rm_common::hal::bus::{BusError, BusId, BusTransport, CanFrame};
use tracing::{debug, warn};

/// Send `frame`, retrying while the bus reports busy.
///
/// `wait(ms)` is called between attempts. Returns the number of attempts
/// that were needed.
pub fn send_with_retry<T: BusTransport + ?Sized>(
    bus: &mut T,
    frame: &CanFrame,
    retry: &BusRetryConfig,
    mut wait: impl FnMut(u64),
) -> Result<u32, BusError> {
    let mut elapsed_ms = 0u64;
    let mut attempts = 0u32;
    loop {
        attempts = attempts.saturating_add(1);
        match bus.try_send(frame) {
            Ok(()) => {
                if attempts > 1 {
                    debug!(id = frame.id, attempts, "frame accepted after retry");
                }
                return Ok(attempts);
            }
            Err(BusError::Busy(_)) if elapsed_ms < retry.budget_ms => {
                wait(retry.interval_ms);
                elapsed_ms += retry.interval_ms.max(1);
            }
            Err(BusError::Busy(bus_id)) => {
                warn!(bus = bus_id.0, id = frame.id, elapsed_ms, "transmit retry budget exhausted");
                return Err(BusError::Timeout {
                    bus: bus_id,
                    id: frame.id,
                    elapsed_ms,
                });
            }
            Err(e) => return Err(e),
        }
    }
}

// ─── Recording Transport ────────────────────────────────────────────

/// Transport that keeps every accepted frame in memory.
///
/// Used by the simulated loop and by tests. A bus can be made to report
/// busy for a number of attempts, or forever.
#[derive(Debug, Default)]
pub struct RecordingBus {
    sent: Vec<CanFrame>,
    total: u64,
    discard: bool,
    busy_attempts: u32,
    jammed: Option<BusId>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report busy for the next `attempts` offers on any bus.
    pub fn busy_for(mut self, attempts: u32) -> Self {
        self.busy_attempts = attempts;
        self
    }

    /// Count accepted frames without keeping them, for long dry runs.
    pub fn discarding(mut self) -> Self {
        self.discard = true;
        self
    }

    /// Report busy forever on `bus`.
    pub fn jam(&mut self, bus: BusId) {
        self.jammed = Some(bus);
    }

    pub fn unjam(&mut self) {
        self.jammed = None;
    }

    pub fn sent(&self) -> &[CanFrame] {
        &self.sent
    }

    /// Frames accepted since construction, kept or not.
    pub fn total_sent(&self) -> u64 {
        self.total
    }

    pub fn clear(&mut self) {
        self.sent.clear();
    }
}

impl BusTransport for RecordingBus {
    fn try_send(&mut self, frame: &CanFrame) -> Result<(), BusError> {
        if self.jammed == Some(frame.bus) {
            return Err(BusError::Busy(frame.bus));
        }
        if self.busy_attempts > 0 {
            self.busy_attempts -= 1;
            return Err(BusError::Busy(frame.bus));
        }
        self.total += 1;
        if !self.discard {
            self.sent.push(*frame);
        }
        Ok(())
    }
}
