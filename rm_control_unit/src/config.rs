//! Robot configuration loading.
//!
//! One TOML file describes the whole robot. Loading parses it into
//! [`RobotConfig`] and runs every section's validation; the result is
//! immutable for the lifetime of the control unit.

use std::path::Path;

use rm_common::config::{ConfigError, ConfigLoader};
use rm_common::consts::BASE_TICK_MS;
use rm_common::control_unit::config::RobotConfig;
use tracing::info;

use crate::codec::router::FrameRouter;

/// Load and validate a robot description from `path`.
pub fn load_config(path: &Path) -> Result<RobotConfig, ConfigError> {
    let cfg = RobotConfig::load(path)?;
    check(&cfg)?;
    info!(robot = %cfg.name, path = %path.display(), "configuration loaded");
    Ok(cfg)
}

/// Parse and validate a robot description held in memory.
pub fn load_config_from_str(text: &str) -> Result<RobotConfig, ConfigError> {
    let cfg = RobotConfig::from_toml_str(text)?;
    check(&cfg)?;
    Ok(cfg)
}

/// Section validation plus the checks that need the whole robot at once.
fn check(cfg: &RobotConfig) -> Result<(), ConfigError> {
    cfg.validate()?;
    let p = &cfg.periods;
    for (name, ms) in [("chassis", p.chassis_ms), ("gimbal", p.gimbal_ms), ("arm", p.arm_ms)] {
        if ms % BASE_TICK_MS != 0 {
            return Err(ConfigError::ValidationError(format!(
                "periods: {name}_ms {ms} is not a multiple of the {BASE_TICK_MS} ms tick"
            )));
        }
    }
    // Two devices answering on the same bus and id would be indistinguishable.
    FrameRouter::from_config(cfg)
        .map(|_| ())
        .map_err(|e| ConfigError::ValidationError(format!("can: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_file_is_default_infantry() {
        let cfg = load_config_from_str("").unwrap();
        assert_eq!(cfg.name, "infantry");
        assert!(cfg.chassis.is_none());
        assert!(cfg.arm.is_none());
    }

    #[test]
    fn sections_enable_subsystems() {
        let cfg = load_config_from_str(
            r#"
            name = "engineer"

            [arm]
            mit_model = "low_torque"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.name, "engineer");
        let arm = cfg.arm.unwrap();
        assert_eq!(arm.joints.len(), 7);
        assert_eq!(arm.mit_model.range().t_max, 10.0);
    }

    #[test]
    fn shooter_without_gimbal_is_rejected() {
        let err = load_config_from_str("[shooter]\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn duplicate_bus_ids_are_rejected() {
        let err = load_config_from_str(
            r#"
            [can]
            gimbal_bus = 1
            chassis_bus = 1

            [chassis]
            [gimbal]
            [shooter]
            "#,
        )
        .unwrap_err();
        match err {
            ConfigError::ValidationError(msg) => assert!(msg.contains("routed twice")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "name = \"hero\"\n[gimbal]\nestop_current = 20000.0").unwrap();
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.name, "hero");
        assert_eq!(cfg.gimbal.unwrap().estop_current, 20000.0);
    }

    #[test]
    fn missing_file_reports_not_found() {
        let err = load_config(Path::new("/nonexistent/robot.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound));
    }

    #[test]
    fn bad_value_fails_validation() {
        let err = load_config_from_str("[vision]\npoll_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }
}
