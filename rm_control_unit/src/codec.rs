//! Motor codec layer.
//!
//! Pure encode/decode functions per wire protocol, the measurement table
//! they publish into, and the router that dispatches received frames by
//! `(bus, frame id)`.
//!
//! | Protocol | Feedback | Command |
//! |----------|----------|---------|
//! | RM (C620/GM6020) | encoder, rpm, current, temperature (BE) | four i16 currents per group frame (BE) |
//! | MIT (DaMiao) | status nibble + fixed-point P/V/T | fixed-point P/V/Kp/Kd/T |
//! | Ktech 4005 | torque-loop reply, multi-turn angle (LE) | broadcast current (LE) |

use thiserror::Error;

pub mod guard;
pub mod ktech;
pub mod mit;
pub mod rm;
pub mod router;
pub mod scaling;
pub mod table;

/// Decode failures. None of them are transport errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    /// MIT status nibble carried a motor-side fault code.
    #[error("motor reported fault code 0x{0:X}")]
    MotorFault(u8),

    /// Reply to a command this decoder does not handle.
    #[error("unexpected command byte 0x{0:02X}")]
    UnexpectedCommand(u8),
}
