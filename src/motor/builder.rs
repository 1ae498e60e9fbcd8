//! Builder pattern for StepperDriver.

use embedded_hal::digital::OutputPin;

use crate::clock::MicrosClock;
use crate::config::units::Microsteps;
use crate::config::{MicrostepCapability, MotorConfig, SystemConfig};
use crate::error::{ConfigError, Error, Result};
use crate::motion::{PulseSequencer, SpeedMode};

use super::driver::{NoPin, StepperDriver};
use super::state::Idle;

/// Builder for creating StepperDriver instances.
///
/// STEP, DIR, the clock and the steps per revolution are required. The
/// ENABLE pin is optional; without one, enable and disable do nothing.
pub struct StepperDriverBuilder<STEP, DIR, EN, CLK>
where
    STEP: OutputPin,
    DIR: OutputPin,
    EN: OutputPin,
    CLK: MicrosClock,
{
    step_pin: Option<STEP>,
    dir_pin: Option<DIR>,
    enable_pin: Option<EN>,
    clock: Option<CLK>,
    name: Option<heapless::String<32>>,
    steps_per_revolution: Option<u16>,
    capability: MicrostepCapability,
    microsteps: Microsteps,
    rpm: u16,
    mode: SpeedMode,
    acceleration: u16,
    deceleration: u16,
    invert_direction: bool,
}

impl<STEP, DIR, CLK> Default for StepperDriverBuilder<STEP, DIR, NoPin, CLK>
where
    STEP: OutputPin,
    DIR: OutputPin,
    CLK: MicrosClock,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<STEP, DIR, CLK> StepperDriverBuilder<STEP, DIR, NoPin, CLK>
where
    STEP: OutputPin,
    DIR: OutputPin,
    CLK: MicrosClock,
{
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            step_pin: None,
            dir_pin: None,
            enable_pin: None,
            clock: None,
            name: None,
            steps_per_revolution: None,
            capability: MicrostepCapability::GENERIC,
            microsteps: Microsteps::FULL,
            rpm: 60,
            mode: SpeedMode::Constant,
            acceleration: 1000,
            deceleration: 1000,
            invert_direction: false,
        }
    }

    /// Set the active-low ENABLE pin.
    pub fn enable_pin<E: OutputPin>(self, pin: E) -> StepperDriverBuilder<STEP, DIR, E, CLK> {
        StepperDriverBuilder {
            step_pin: self.step_pin,
            dir_pin: self.dir_pin,
            enable_pin: Some(pin),
            clock: self.clock,
            name: self.name,
            steps_per_revolution: self.steps_per_revolution,
            capability: self.capability,
            microsteps: self.microsteps,
            rpm: self.rpm,
            mode: self.mode,
            acceleration: self.acceleration,
            deceleration: self.deceleration,
            invert_direction: self.invert_direction,
        }
    }
}

impl<STEP, DIR, EN, CLK> StepperDriverBuilder<STEP, DIR, EN, CLK>
where
    STEP: OutputPin,
    DIR: OutputPin,
    EN: OutputPin,
    CLK: MicrosClock,
{
    /// Set the STEP pin.
    pub fn step_pin(mut self, pin: STEP) -> Self {
        self.step_pin = Some(pin);
        self
    }

    /// Set the DIR pin.
    pub fn dir_pin(mut self, pin: DIR) -> Self {
        self.dir_pin = Some(pin);
        self
    }

    /// Set the microsecond time source.
    pub fn clock(mut self, clock: CLK) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the motor name.
    pub fn name(mut self, name: &str) -> Self {
        self.name = heapless::String::try_from(name).ok();
        self
    }

    /// Set steps per revolution (base motor steps before microstepping).
    pub fn steps_per_revolution(mut self, steps: u16) -> Self {
        self.steps_per_revolution = Some(steps);
        self
    }

    /// Set the microstep divisors the driver chip supports.
    pub fn capability(mut self, capability: MicrostepCapability) -> Self {
        self.capability = capability;
        self
    }

    /// Set the initial microstep divisor.
    pub fn microsteps(mut self, microsteps: Microsteps) -> Self {
        self.microsteps = microsteps;
        self
    }

    /// Set the initial target speed.
    pub fn rpm(mut self, rpm: u16) -> Self {
        self.rpm = rpm;
        self
    }

    /// Set the initial speed profile.
    pub fn speed_profile(mut self, mode: SpeedMode, acceleration: u16, deceleration: u16) -> Self {
        self.mode = mode;
        self.acceleration = acceleration;
        self.deceleration = deceleration;
        self
    }

    /// Set direction inversion.
    pub fn invert_direction(mut self, invert: bool) -> Self {
        self.invert_direction = invert;
        self
    }

    /// Configure from a MotorConfig.
    pub fn from_motor_config(mut self, config: &MotorConfig) -> Self {
        self.name = Some(config.name.clone());
        self.steps_per_revolution = Some(config.steps_per_revolution);
        self.capability = config.capability();
        self.microsteps = config.microsteps;
        self.rpm = config.rpm;
        self.mode = config.profile.mode;
        self.acceleration = config.profile.acceleration;
        self.deceleration = config.profile.deceleration;
        self.invert_direction = config.invert_direction;
        self
    }

    /// Configure from SystemConfig by motor name.
    pub fn from_config(self, config: &SystemConfig, motor_name: &str) -> Result<Self> {
        let motor_config = config.motor(motor_name).ok_or_else(|| {
            Error::Config(ConfigError::MotorNotFound(
                heapless::String::try_from(motor_name).unwrap_or_default(),
            ))
        })?;

        Ok(self.from_motor_config(motor_config))
    }

    /// Build the StepperDriver.
    ///
    /// No pin is written; call [`StepperDriver::begin`] before the first move.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing, steps per revolution
    /// is zero, or the capability does not include the microstep divisor.
    pub fn build(self) -> Result<StepperDriver<STEP, DIR, EN, CLK, Idle>> {
        let step_pin = self
            .step_pin
            .ok_or(Error::Config(ConfigError::MissingField("step_pin")))?;
        let dir_pin = self
            .dir_pin
            .ok_or(Error::Config(ConfigError::MissingField("dir_pin")))?;
        let clock = self
            .clock
            .ok_or(Error::Config(ConfigError::MissingField("clock")))?;
        let steps_per_revolution = self
            .steps_per_revolution
            .ok_or(Error::Config(ConfigError::MissingField("steps_per_revolution")))?;

        if steps_per_revolution == 0 {
            return Err(Error::Config(ConfigError::InvalidStepsPerRevolution(0)));
        }

        if !self.capability.supports(self.microsteps) {
            return Err(Error::Config(ConfigError::UnsupportedMicrosteps {
                microsteps: self.microsteps.value(),
                max: self.capability.max().value(),
            }));
        }

        let name = self.name.unwrap_or_else(|| {
            let mut name = heapless::String::new();
            // Fits in 32 bytes.
            let _ = name.push_str("motor");
            name
        });

        Ok(StepperDriver::new(
            PulseSequencer::new(step_pin, dir_pin, self.invert_direction),
            self.enable_pin,
            clock,
            name,
            steps_per_revolution,
            self.capability,
            self.microsteps,
            self.rpm,
            (self.mode, self.acceleration, self.deceleration),
        ))
    }
}
