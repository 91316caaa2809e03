//! Control-unit shared types.
//!
//! Organized by domain: measurement and command records, operator input,
//! behaviour mode enums, device fault flags, and the robot configuration.

pub mod config;
pub mod error;
pub mod input;
pub mod measurement;
pub mod state;
