//! Unit tests for TOML configuration parsing.

use stepper_pulse::config::{load_config, parse_config, DriverKind, SystemConfig};
use stepper_pulse::config::units::Microsteps;
use stepper_pulse::motion::SpeedMode;

/// Test parsing a valid motor configuration from TOML.
#[test]
fn test_parse_motor_config() {
    let toml_str = r#"
[motors.stepper1]
name = "main_axis"
steps_per_revolution = 200
microsteps = 16
rpm = 120
driver = "drv8825"
invert_direction = false
"#;

    let config: SystemConfig = parse_config(toml_str).expect("Failed to parse TOML");
    let motor = config.motor("stepper1").expect("Motor not found");

    assert_eq!(motor.name.as_str(), "main_axis");
    assert_eq!(motor.steps_per_revolution, 200);
    assert_eq!(motor.microsteps.value(), 16);
    assert_eq!(motor.rpm, 120);
    assert_eq!(motor.driver, DriverKind::Drv8825);
    assert!(!motor.invert_direction);
}

/// Test parsing a linear profile with asymmetric rates.
#[test]
fn test_parse_profile_with_asymmetric_rates() {
    let toml_str = r#"
[motors.stepper1]
name = "main_axis"
steps_per_revolution = 200

[motors.stepper1.profile]
mode = "linear"
acceleration = 500
deceleration = 200
"#;

    let config = parse_config(toml_str).expect("Failed to parse TOML");
    let motor = config.motor("stepper1").expect("Motor not found");
    let settings = motor.profile_settings();

    assert_eq!(settings.mode, SpeedMode::Linear);
    assert_eq!(settings.acceleration, 500);
    assert_eq!(settings.deceleration, 200);
    assert_eq!(settings.microsteps, Microsteps::FULL);
}

/// Test that every driver family name parses.
#[test]
fn test_parse_driver_names() {
    for (name, expected, max) in [
        ("generic", DriverKind::Generic, 128),
        ("a4988", DriverKind::A4988, 16),
        ("drv8825", DriverKind::Drv8825, 32),
        ("drv8834", DriverKind::Drv8834, 32),
        ("drv8880", DriverKind::Drv8880, 16),
    ] {
        let toml_str = format!(
            r#"
[motors.m]
name = "m"
steps_per_revolution = 200
driver = "{name}"
"#
        );
        let config = parse_config(&toml_str).expect("Failed to parse TOML");
        let motor = config.motor("m").unwrap();
        assert_eq!(motor.driver, expected);
        assert_eq!(motor.capability().max().value(), max);
    }
}

/// Test that an unknown speed mode is a parse error.
#[test]
fn test_unknown_mode_rejected() {
    let toml_str = r#"
[motors.m]
name = "m"
steps_per_revolution = 200

[motors.m.profile]
mode = "s_curve"
"#;

    assert!(parse_config(toml_str).is_err());
}

/// Test loading configuration from a file.
#[test]
fn test_load_config_from_file() {
    let path = std::env::temp_dir().join("stepper_pulse_load_config.toml");
    std::fs::write(
        &path,
        r#"
[motors.x]
name = "X"
steps_per_revolution = 400
microsteps = 4
"#,
    )
    .expect("Failed to write temp file");

    let config = load_config(&path).expect("Failed to load config");
    let _ = std::fs::remove_file(&path);

    let motor = config.motor("x").expect("Motor not found");
    assert_eq!(motor.total_steps_per_revolution(), 1600);
}
