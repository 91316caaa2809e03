//! Hardware seams consumed by the control core.
//!
//! The core never talks to a peripheral directly. It sends frames through
//! [`bus::BusTransport`] and reports device health to a
//! [`liveness::LivenessTracker`].

pub mod bus;
pub mod liveness;
