//! Non-finite command guard.
//!
//! A command with any NaN or infinite field is replaced by the null command
//! of the same protocol before it reaches an encoder.

use rm_common::control_unit::measurement::ActuatorCommand;
use tracing::warn;

/// Pass finite commands through, null the rest.
#[inline]
pub fn guard(cmd: ActuatorCommand) -> ActuatorCommand {
    if cmd.is_finite() {
        cmd
    } else {
        warn!(?cmd, "non-finite actuator command replaced by stop");
        cmd.null_of()
    }
}

/// `value` if finite, otherwise zero.
#[inline]
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rm_common::control_unit::measurement::MitCommand;

    #[test]
    fn finite_command_passes() {
        let cmd = ActuatorCommand::Current(12.0);
        assert_eq!(guard(cmd), cmd);
    }

    #[test]
    fn any_nan_field_stops_whole_actuator() {
        let cmd = ActuatorCommand::Mit(MitCommand {
            position: 1.0,
            velocity: 2.0,
            kp: 10.0,
            kd: f64::NAN,
            torque: 3.0,
        });
        assert_eq!(guard(cmd), ActuatorCommand::Mit(MitCommand::default()));
    }

    #[test]
    fn infinite_current_stops() {
        assert_eq!(
            guard(ActuatorCommand::Current(f64::NEG_INFINITY)),
            ActuatorCommand::Current(0.0)
        );
        assert_eq!(finite_or_zero(f64::NAN), 0.0);
        assert_eq!(finite_or_zero(-2.0), -2.0);
    }
}
