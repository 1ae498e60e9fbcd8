//! Error types for stepper-pulse.
//!
//! Only configuration problems and hardware I/O failures are errors. Out-of-range
//! runtime inputs (an unsupported microstep divisor, advancing a finished move)
//! are handled by rejection or clamping and never surface here.

use core::fmt;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all stepper-pulse operations.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Configuration parsing or validation error
    Config(ConfigError),
    /// Motor I/O error
    Motor(MotorError),
}

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Failed to parse TOML configuration
    ParseError(heapless::String<128>),
    /// Invalid microstep value (must be a power of 2 between 1 and 128)
    InvalidMicrosteps(u16),
    /// Microstep value is valid but the driver cannot produce it
    UnsupportedMicrosteps {
        /// Requested divisor
        microsteps: u16,
        /// Largest divisor the driver supports
        max: u16,
    },
    /// Steps per revolution must be > 0
    InvalidStepsPerRevolution(u16),
    /// RPM must be > 0
    InvalidRpm(u16),
    /// Acceleration must be > 0 for the linear speed profile
    InvalidAcceleration(u16),
    /// Deceleration must be > 0 for the linear speed profile
    InvalidDeceleration(u16),
    /// Motor name not found in configuration
    MotorNotFound(heapless::String<32>),
    /// A required builder field was never set
    MissingField(&'static str),
    /// File I/O error (std only)
    #[cfg(feature = "std")]
    IoError(heapless::String<128>),
}

/// Motor I/O errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorError {
    /// A STEP, DIR or ENABLE pin write failed
    PinError,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Motor(e) => write!(f, "Motor error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::InvalidMicrosteps(v) => {
                write!(f, "Invalid microsteps: {}. Valid values: 1, 2, 4, 8, 16, 32, 64, 128", v)
            }
            ConfigError::UnsupportedMicrosteps { microsteps, max } => {
                write!(f, "Microsteps {} not supported by driver (max {})", microsteps, max)
            }
            ConfigError::InvalidStepsPerRevolution(v) => {
                write!(f, "Invalid steps per revolution: {}. Must be > 0", v)
            }
            ConfigError::InvalidRpm(v) => write!(f, "Invalid rpm: {}. Must be > 0", v),
            ConfigError::InvalidAcceleration(v) => {
                write!(f, "Invalid acceleration: {}. Must be > 0 for linear profile", v)
            }
            ConfigError::InvalidDeceleration(v) => {
                write!(f, "Invalid deceleration: {}. Must be > 0 for linear profile", v)
            }
            ConfigError::MotorNotFound(name) => write!(f, "Motor '{}' not found", name),
            ConfigError::MissingField(field) => write!(f, "{} is required", field),
            #[cfg(feature = "std")]
            ConfigError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for MotorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotorError::PinError => write!(f, "GPIO pin operation failed"),
        }
    }
}

// Conversion impls
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<MotorError> for Error {
    fn from(e: MotorError) -> Self {
        Error::Motor(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(feature = "std")]
impl std::error::Error for MotorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_cause() {
        let err: Error = ConfigError::UnsupportedMicrosteps { microsteps: 64, max: 32 }.into();
        let msg = format!("{}", err);
        assert!(msg.starts_with("Configuration error"));
        assert!(msg.contains("64"));
        assert!(msg.contains("max 32"));
    }

    #[test]
    fn test_motor_error_conversion() {
        let err: Error = MotorError::PinError.into();
        assert_eq!(err, Error::Motor(MotorError::PinError));
    }
}
