//! Received-frame dispatch.
//!
//! Maps `(bus, frame id)` to the device and protocol that own it, decodes,
//! publishes the new record and reports to the liveness tracker. This is
//! the single decode entry point for every actuator.

use heapless::Vec;
use rm_common::control_unit::config::{MitRange, RobotConfig};
use rm_common::control_unit::measurement::DeviceId;
use rm_common::hal::bus::{BusId, CanFrame};
use rm_common::hal::liveness::LivenessTracker;
use thiserror::Error;
use tracing::warn;

use super::CodecError;
use super::ktech::{MULTI_TURN_RAD_PER_LSB, decode_ktech_torque, decode_multi_turn};
use super::mit::decode_mit;
use super::rm::decode_rm;
use super::table::MotorTable;
use rm_common::consts::{KTECH_CMD_MULTI_TURN_ANGLE, KTECH_CMD_TORQUE};

/// Maximum number of routed frame ids.
pub const MAX_ROUTES: usize = 32;

/// Wire protocol of one routed device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Protocol {
    Rm,
    Mit { range: MitRange, reversed: bool },
    Ktech { gear: f64, reversed: bool },
}

/// One routing table entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Route {
    pub bus: BusId,
    pub frame_id: u16,
    pub device: DeviceId,
    pub protocol: Protocol,
}

/// Result of handing one frame to the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Frame id not routed, or a reply the decoder does not use.
    Ignored,
    /// Record published.
    Updated(DeviceId),
    /// Device reported a fault; its record was left stale.
    Faulted { device: DeviceId, code: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("routing table full ({MAX_ROUTES} entries)")]
    Full,
    #[error("frame 0x{id:03X} on bus {bus:?} routed twice")]
    Duplicate { bus: BusId, id: u16 },
}

#[derive(Debug, Clone, Default)]
pub struct FrameRouter {
    routes: Vec<Route, MAX_ROUTES>,
}

impl FrameRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table for every subsystem present in `cfg`.
    pub fn from_config(cfg: &RobotConfig) -> Result<Self, RouteError> {
        use rm_common::control_unit::config::DriveConfig;

        let mut router = Self::new();
        let can = &cfg.can;

        if let Some(chassis) = &cfg.chassis {
            let bus = BusId(can.chassis_bus);
            for (i, &id) in can.wheel_ids.iter().enumerate() {
                router.add(Route {
                    bus,
                    frame_id: id,
                    device: DeviceId::ChassisWheel(i as u8),
                    protocol: Protocol::Rm,
                })?;
            }
            if matches!(chassis.drive, DriveConfig::Swerve(_)) {
                for (i, &id) in can.steer_ids.iter().enumerate() {
                    router.add(Route {
                        bus,
                        frame_id: id,
                        device: DeviceId::ChassisSteer(i as u8),
                        protocol: Protocol::Rm,
                    })?;
                }
            }
        }

        let gimbal_bus = BusId(can.gimbal_bus);
        if cfg.gimbal.is_some() {
            router.add(Route {
                bus: gimbal_bus,
                frame_id: can.yaw_id,
                device: DeviceId::GimbalYaw,
                protocol: Protocol::Rm,
            })?;
            router.add(Route {
                bus: gimbal_bus,
                frame_id: can.pitch_id,
                device: DeviceId::GimbalPitch,
                protocol: Protocol::Rm,
            })?;
        }
        if cfg.shooter.is_some() {
            for (device, id) in [
                (DeviceId::Trigger, can.trigger_id),
                (DeviceId::FrictionLeft, can.friction_ids[0]),
                (DeviceId::FrictionRight, can.friction_ids[1]),
            ] {
                router.add(Route {
                    bus: gimbal_bus,
                    frame_id: id,
                    device,
                    protocol: Protocol::Rm,
                })?;
            }
        }

        if let Some(arm) = &cfg.arm {
            let bus = BusId(can.arm_bus);
            let range = arm.mit_model.range();
            for (i, &id) in can.mit_feedback_ids.iter().enumerate() {
                let reversed = arm.joints.get(i).is_some_and(|j| j.reversed);
                router.add(Route {
                    bus,
                    frame_id: id,
                    device: DeviceId::Joint(i as u8),
                    protocol: Protocol::Mit { range, reversed },
                })?;
            }
            for (k, &id) in can.ktech_ids.iter().enumerate() {
                let joint = can.mit_feedback_ids.len() + k;
                let reversed = arm.joints.get(joint).is_some_and(|j| j.reversed);
                router.add(Route {
                    bus,
                    frame_id: id,
                    device: DeviceId::Joint(joint as u8),
                    protocol: Protocol::Ktech {
                        gear: arm.ktech_gears.get(k).copied().unwrap_or(1.0),
                        reversed,
                    },
                })?;
            }
        }

        Ok(router)
    }

    /// Add one route.
    pub fn add(&mut self, route: Route) -> Result<(), RouteError> {
        if self.lookup(route.bus, route.frame_id).is_some() {
            return Err(RouteError::Duplicate {
                bus: route.bus,
                id: route.frame_id,
            });
        }
        self.routes.push(route).map_err(|_| RouteError::Full)
    }

    #[inline]
    pub fn lookup(&self, bus: BusId, frame_id: u16) -> Option<&Route> {
        self.routes
            .iter()
            .find(|r| r.bus == bus && r.frame_id == frame_id)
    }

    /// Route owning `device`, if any.
    pub fn route_of(&self, device: DeviceId) -> Option<&Route> {
        self.routes.iter().find(|r| r.device == device)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Decode entry point, called for every received frame.
    pub fn on_frame_received<L: LivenessTracker + ?Sized>(
        &self,
        frame: &CanFrame,
        table: &mut MotorTable,
        liveness: &mut L,
    ) -> DecodeOutcome {
        let Some(route) = self.lookup(frame.bus, frame.id) else {
            return DecodeOutcome::Ignored;
        };
        let device = route.device;
        let previous = table.get(device);

        let decoded = match route.protocol {
            Protocol::Rm => Ok(decode_rm(&frame.data).to_measurement(&previous)),
            Protocol::Mit { range, reversed } => {
                decode_mit(&frame.data, &range, reversed).map(|fb| fb.to_measurement(&previous))
            }
            Protocol::Ktech { gear, reversed } => match frame.data[0] {
                KTECH_CMD_TORQUE => decode_ktech_torque(&frame.data, gear).map(|fb| {
                    let mut record = fb.to_measurement(&previous);
                    if reversed {
                        record.position = -record.position;
                        record.velocity = -record.velocity;
                        record.effort = -record.effort;
                    }
                    record
                }),
                KTECH_CMD_MULTI_TURN_ANGLE => {
                    decode_multi_turn(&frame.data, MULTI_TURN_RAD_PER_LSB / gear, reversed).map(
                        |position| {
                            let mut record = previous;
                            record.last_position = previous.position;
                            record.position = position;
                            record
                        },
                    )
                }
                other => Err(CodecError::UnexpectedCommand(other)),
            },
        };

        match decoded {
            Ok(record) => {
                table.publish(device, record);
                liveness.notify_seen(device);
                DecodeOutcome::Updated(device)
            }
            Err(CodecError::MotorFault(code)) => {
                warn!(?device, code, "motor reported fault");
                liveness.notify_fault(device);
                DecodeOutcome::Faulted { device, code }
            }
            Err(CodecError::UnexpectedCommand(_)) => DecodeOutcome::Ignored,
        }
    }
}
