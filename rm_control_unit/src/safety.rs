//! Safety module root.
//!
//! Device liveness tracking and the gimbal emergency-stop latch.

pub mod estop;
pub mod liveness;
