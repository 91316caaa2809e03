//! # RM Control Unit Library
//!
//! Real-time control core for competition robots: mecanum or swerve
//! chassis, two-axis gimbal, projectile launcher and a seven-joint arm,
//! all driven over CAN at a fixed 1 ms base tick.
//!
//! ## Layers
//!
//! 1. **codec**: RM, MIT and Ktech motor frames into a shared measurement table
//! 2. **safety**: per-device liveness and the gimbal emergency stop
//! 3. **control**: PID engine, angle arithmetic, filters
//! 4. **kinematics**: body motion to wheel and steer targets
//! 5. **state**: one behaviour machine per subsystem
//! 6. **cycle**: multi-rate scheduler, transmit retry and RT pacing
//!
//! The vision serial link runs alongside and feeds aim and move commands.
//!
//! ## No allocation in the loop
//!
//! Routing, liveness, transmit scratch and vision buffers are fixed-size
//! and sized at startup. The tick path does not allocate.

#![deny(clippy::disallowed_types)]

pub mod bus;
pub mod codec;
pub mod config;
pub mod control;
pub mod cycle;
pub mod kinematics;
pub mod safety;
pub mod state;
pub mod vision;
