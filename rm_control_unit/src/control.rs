//! Control engine root.
//!
//! Angle arithmetic, the PID engine, and the filters every loop uses.

pub mod angle;
pub mod filters;
pub mod pid;
