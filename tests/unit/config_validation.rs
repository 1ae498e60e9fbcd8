//! Unit tests for configuration validation.

use stepper_pulse::config::{validate_config, SystemConfig};
use stepper_pulse::error::{ConfigError, Error};

fn parse_unchecked(toml_str: &str) -> SystemConfig {
    toml::from_str(toml_str).expect("Failed to parse TOML")
}

/// Test validation of a valid configuration.
#[test]
fn test_valid_config_passes_validation() {
    let config = parse_unchecked(
        r#"
[motors.stepper1]
name = "main_axis"
steps_per_revolution = 200
microsteps = 32
rpm = 200
driver = "drv8825"

[motors.stepper1.profile]
mode = "linear"
acceleration = 1000
deceleration = 1000
"#,
    );
    assert!(validate_config(&config).is_ok());
}

/// Test validation fails for microsteps the driver cannot produce.
#[test]
fn test_microsteps_beyond_driver() {
    let config = parse_unchecked(
        r#"
[motors.stepper1]
name = "main_axis"
steps_per_revolution = 200
microsteps = 64
driver = "drv8880"
"#,
    );
    assert_eq!(
        validate_config(&config),
        Err(Error::Config(ConfigError::UnsupportedMicrosteps {
            microsteps: 64,
            max: 16
        }))
    );
}

/// Test validation fails for zero steps per revolution.
#[test]
fn test_zero_steps_per_revolution() {
    let config = parse_unchecked(
        r#"
[motors.stepper1]
name = "main_axis"
steps_per_revolution = 0
"#,
    );
    assert!(matches!(
        validate_config(&config),
        Err(Error::Config(ConfigError::InvalidStepsPerRevolution(0)))
    ));
}

/// Test validation fails for zero acceleration in linear mode.
#[test]
fn test_zero_acceleration_linear() {
    let config = parse_unchecked(
        r#"
[motors.stepper1]
name = "main_axis"
steps_per_revolution = 200

[motors.stepper1.profile]
mode = "linear"
acceleration = 0
"#,
    );
    assert!(matches!(
        validate_config(&config),
        Err(Error::Config(ConfigError::InvalidAcceleration(0)))
    ));
}

/// Test that one bad motor fails the whole configuration.
#[test]
fn test_one_bad_motor_fails_all() {
    let config = parse_unchecked(
        r#"
[motors.good]
name = "good"
steps_per_revolution = 200

[motors.bad]
name = "bad"
steps_per_revolution = 200
rpm = 0
"#,
    );
    assert!(config.motor("good").unwrap().validate().is_ok());
    assert!(matches!(
        validate_config(&config),
        Err(Error::Config(ConfigError::InvalidRpm(0)))
    ));
}
