//! Behaviour machines, one per subsystem.
//!
//! Each machine is re-evaluated every cycle of its subsystem:
//! 1. select this cycle's mode from operator input and device health;
//! 2. on a change, run the entry action of the new mode exactly once;
//! 3. run the mode's control law and stage command frames.
//!
//! Any critical device fault forces the subsystem's safe mode.

pub mod arm;
pub mod chassis;
pub mod gimbal;
pub mod shooter;

use core::fmt::Debug;

use heapless::Vec;
use rm_common::control_unit::measurement::ActuatorCommand;
use rm_common::hal::bus::{BusId, CanFrame};
use tracing::{info, warn};

use crate::codec::guard::guard;
use crate::codec::rm::{encode_rm_group, rm_command_slot};

/// Transmit scratch frames per subsystem and cycle.
pub const TX_SCRATCH_CAPACITY: usize = 16;

/// Frames staged by one subsystem in one cycle.
pub type TxScratch = Vec<CanFrame, TX_SCRATCH_CAPACITY>;

// ─── Mode Latch ─────────────────────────────────────────────────────

/// Holds the active mode and detects changes between cycles.
#[derive(Debug, Clone, Copy)]
pub struct ModeLatch<M> {
    current: M,
    transitions: u32,
}

impl<M: Copy + PartialEq + Debug + Default> Default for ModeLatch<M> {
    fn default() -> Self {
        Self::new(M::default())
    }
}

impl<M: Copy + PartialEq + Debug> ModeLatch<M> {
    pub const fn new(initial: M) -> Self {
        Self {
            current: initial,
            transitions: 0,
        }
    }

    #[inline]
    pub const fn current(&self) -> M {
        self.current
    }

    /// Number of mode changes seen so far.
    #[inline]
    pub const fn transition_count(&self) -> u32 {
        self.transitions
    }

    /// Store this cycle's mode. Returns the previous mode on a change.
    pub fn update(&mut self, subsystem: &'static str, next: M) -> Option<M> {
        if next == self.current {
            return None;
        }
        let previous = self.current;
        info!(subsystem, from = ?previous, to = ?next, "mode transition");
        self.current = next;
        self.transitions = self.transitions.wrapping_add(1);
        Some(previous)
    }
}

// ─── Frame Staging ──────────────────────────────────────────────────

/// Stage a frame, logging when the scratch buffer is full.
pub(crate) fn stage(out: &mut TxScratch, frame: CanFrame) {
    if out.push(frame).is_err() {
        warn!(id = frame.id, "transmit scratch full, frame dropped");
    }
}

/// Stage RM group frames for `(feedback_id, current)` pairs.
///
/// Motors are grouped by command frame; slots without a motor are sent as
/// zero. Ids outside the RM range are skipped.
pub(crate) fn stage_rm_currents(out: &mut TxScratch, bus: BusId, commands: &[(u16, f64)]) {
    let mut groups: [(u16, [f64; 4], bool); 2] = [(0, [0.0; 4], false); 2];
    for &(feedback_id, current) in commands {
        let Some((frame_id, slot)) = rm_command_slot(feedback_id) else {
            warn!(feedback_id, "not an RM motor id, command skipped");
            continue;
        };
        let index = groups
            .iter()
            .position(|g| g.2 && g.0 == frame_id)
            .or_else(|| groups.iter().position(|g| !g.2));
        if let Some(group) = index.and_then(|i| groups.get_mut(i)) {
            group.0 = frame_id;
            group.2 = true;
            group.1[slot] = match guard(ActuatorCommand::Current(current)) {
                ActuatorCommand::Current(c) => c,
                ActuatorCommand::Mit(_) => 0.0,
            };
        }
    }
    for (frame_id, values, used) in groups {
        if used {
            stage(
                out,
                CanFrame::new(bus, frame_id, encode_rm_group(values, f64::from(i16::MAX))),
            );
        }
    }
}
