//! Configuration validation.
//!
//! The planner never rejects a configuration; a zero RPM or a zero ramp rate
//! just yields nonsense timing. Validate up front to rule that out.

use crate::error::{ConfigError, Error, Result};
use crate::motion::SpeedMode;

use super::{MotorConfig, SystemConfig};

/// Validate a system configuration.
///
/// Checks every motor:
/// - Steps per revolution and RPM are non-zero
/// - The driver supports the configured microstep divisor
/// - Acceleration and deceleration are non-zero for the linear profile
pub fn validate_config(config: &SystemConfig) -> Result<()> {
    for (_, motor) in config.motors.iter() {
        validate_motor(motor)?;
    }
    Ok(())
}

/// Validate a single motor configuration.
pub fn validate_motor(config: &MotorConfig) -> Result<()> {
    if config.steps_per_revolution == 0 {
        return Err(Error::Config(ConfigError::InvalidStepsPerRevolution(
            config.steps_per_revolution,
        )));
    }

    if config.rpm == 0 {
        return Err(Error::Config(ConfigError::InvalidRpm(config.rpm)));
    }

    let capability = config.capability();
    if !capability.supports(config.microsteps) {
        return Err(Error::Config(ConfigError::UnsupportedMicrosteps {
            microsteps: config.microsteps.value(),
            max: capability.max().value(),
        }));
    }

    if config.profile.mode == SpeedMode::Linear {
        if config.profile.acceleration == 0 {
            return Err(Error::Config(ConfigError::InvalidAcceleration(
                config.profile.acceleration,
            )));
        }
        if config.profile.deceleration == 0 {
            return Err(Error::Config(ConfigError::InvalidDeceleration(
                config.profile.deceleration,
            )));
        }
    }

    Ok(())
}
