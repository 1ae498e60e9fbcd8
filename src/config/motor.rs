//! Motor configuration from TOML.

use heapless::String;
use serde::Deserialize;

use crate::error::Result;
use crate::motion::{ProfileSettings, SpeedMode};

use super::capability::{DriverKind, MicrostepCapability};
use super::units::Microsteps;

/// Speed profile section of a motor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SpeedProfileConfig {
    /// Profile shape.
    #[serde(default)]
    pub mode: SpeedMode,

    /// Acceleration in full steps per second squared.
    #[serde(default = "default_rate")]
    pub acceleration: u16,

    /// Deceleration in full steps per second squared.
    #[serde(default = "default_rate")]
    pub deceleration: u16,
}

impl Default for SpeedProfileConfig {
    fn default() -> Self {
        Self {
            mode: SpeedMode::Constant,
            acceleration: default_rate(),
            deceleration: default_rate(),
        }
    }
}

/// Complete motor configuration from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct MotorConfig {
    /// Human-readable name (max 32 chars).
    pub name: String<32>,

    /// Full steps per revolution (typically 200 for 1.8° motors).
    pub steps_per_revolution: u16,

    /// Microstep setting (1, 2, 4, 8, 16, 32, 64, 128).
    #[serde(default)]
    pub microsteps: Microsteps,

    /// Target speed in revolutions per minute.
    #[serde(default = "default_rpm")]
    pub rpm: u16,

    /// Driver family; decides which microstep values are accepted.
    #[serde(default)]
    pub driver: DriverKind,

    /// Invert direction pin logic.
    #[serde(default)]
    pub invert_direction: bool,

    /// Speed profile.
    #[serde(default)]
    pub profile: SpeedProfileConfig,
}

fn default_rpm() -> u16 {
    60
}

fn default_rate() -> u16 {
    1000
}

impl MotorConfig {
    /// Microsteps per output revolution.
    pub fn total_steps_per_revolution(&self) -> u32 {
        u32::from(self.steps_per_revolution) * u32::from(self.microsteps.value())
    }

    /// Microsteps per degree of output rotation.
    pub fn steps_per_degree(&self) -> f32 {
        self.total_steps_per_revolution() as f32 / 360.0
    }

    /// Microstep capability of the configured driver.
    pub fn capability(&self) -> MicrostepCapability {
        self.driver.capability()
    }

    /// Parameters for planning a move with this configuration.
    pub fn profile_settings(&self) -> ProfileSettings {
        ProfileSettings {
            steps_per_revolution: self.steps_per_revolution,
            microsteps: self.microsteps,
            rpm: self.rpm,
            mode: self.profile.mode,
            acceleration: self.profile.acceleration,
            deceleration: self.profile.deceleration,
        }
    }

    /// Check this configuration on its own.
    ///
    /// Same rules as [`validate_config`](super::validate_config) applies per motor.
    pub fn validate(&self) -> Result<()> {
        super::validation::validate_motor(self)
    }
}
