//! Robot Control Common Library
//!
//! Shared data model, wire constants and configuration for the robot
//! control core. Everything in this crate is plain data or a trait seam;
//! the control algorithms live in `rm_control_unit`.
//!
//! # Module Structure
//!
//! - [`consts`] - Encoder ranges, bus frame identifiers and loop periods
//! - [`control_unit`] - Measurement model, operator input, mode enums, fault flags and robot configuration
//! - [`hal`] - Bus transport and liveness tracker interfaces
//! - [`config`] - Configuration loading traits and errors
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use rm_common::prelude::*;
//!
//! let cfg = RobotConfig::default();
//! assert!(cfg.validate().is_ok());
//! ```

pub mod config;
pub mod consts;
pub mod control_unit;
pub mod hal;
pub mod prelude;
