//! Unit types for motor quantities.
//!
//! Keeps angles, step counts and microstep divisors apart at the type level.

use serde::Deserialize;

use crate::error::ConfigError;

/// Angular position in degrees.
///
/// Used for the fractional rotate API and position readout. Internally converted to [`Steps`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(transparent)]
pub struct Degrees(pub f32);

impl Degrees {
    /// Create a new Degrees value.
    #[inline]
    pub const fn new(value: f32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f32 {
        self.0
    }
}

/// Motor position in (micro)steps, absolute from origin.
///
/// Uses i64 for unlimited range in either direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Steps(pub i64);

impl Steps {
    /// Create a new Steps value.
    #[inline]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> i64 {
        self.0
    }

    /// Convert to degrees using steps per degree ratio.
    #[inline]
    pub fn to_degrees(self, steps_per_degree: f32) -> Degrees {
        Degrees(self.0 as f32 / steps_per_degree)
    }

    /// Create from degrees using steps per degree ratio (truncates toward zero).
    #[inline]
    pub fn from_degrees(degrees: Degrees, steps_per_degree: f32) -> Self {
        Self((degrees.0 * steps_per_degree) as i64)
    }
}

/// Microstep divisor (1, 2, 4, 8, 16, 32, 64, 128).
///
/// Validated at construction to be a power of 2 within the valid range.
/// Whether a particular driver can produce it is a separate question,
/// answered by [`MicrostepCapability`](super::MicrostepCapability).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Microsteps(u16);

impl Microsteps {
    /// Full step (no microstepping).
    pub const FULL: Self = Self(1);
    /// Half step.
    pub const HALF: Self = Self(2);
    /// Quarter step.
    pub const QUARTER: Self = Self(4);
    /// Eighth step.
    pub const EIGHTH: Self = Self(8);
    /// Sixteenth step.
    pub const SIXTEENTH: Self = Self(16);
    /// Thirty-second step.
    pub const THIRTY_SECOND: Self = Self(32);
    /// Sixty-fourth step.
    pub const SIXTY_FOURTH: Self = Self(64);
    /// 128th step (maximum resolution).
    pub const ONE_TWENTY_EIGHTH: Self = Self(128);

    /// Largest divisor any driver can be asked for.
    pub const MAX: Self = Self::ONE_TWENTY_EIGHTH;

    /// Create a new Microsteps value with validation.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidMicrosteps` if the value is not a valid power of 2.
    pub fn new(value: u16) -> Result<Self, ConfigError> {
        if Self::is_valid(value) {
            Ok(Self(value))
        } else {
            Err(ConfigError::InvalidMicrosteps(value))
        }
    }

    /// Get the raw divisor value.
    #[inline]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Bit index of the divisor (log2).
    #[inline]
    pub const fn exponent(self) -> u32 {
        self.0.trailing_zeros()
    }

    /// Check if a value is valid.
    #[inline]
    pub fn is_valid(value: u16) -> bool {
        value.is_power_of_two() && value <= Self::MAX.0
    }
}

impl Default for Microsteps {
    fn default() -> Self {
        Self::FULL
    }
}

impl TryFrom<u16> for Microsteps {
    type Error = ConfigError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for Microsteps {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use core::fmt::Write;
        let value = u16::deserialize(deserializer)?;
        Microsteps::new(value).map_err(|e| {
            let mut buf = heapless::String::<128>::new();
            let _ = write!(buf, "{}", e);
            serde::de::Error::custom(buf.as_str())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_microsteps_valid_values() {
        for v in [1, 2, 4, 8, 16, 32, 64, 128] {
            assert!(Microsteps::new(v).is_ok());
        }
    }

    #[test]
    fn test_microsteps_invalid_values() {
        assert!(Microsteps::new(0).is_err());
        assert!(Microsteps::new(3).is_err());
        assert!(Microsteps::new(17).is_err());
        assert!(Microsteps::new(256).is_err());
    }

    #[test]
    fn test_microsteps_exponent() {
        assert_eq!(Microsteps::FULL.exponent(), 0);
        assert_eq!(Microsteps::SIXTEENTH.exponent(), 4);
        assert_eq!(Microsteps::ONE_TWENTY_EIGHTH.exponent(), 7);
    }

    #[test]
    fn test_steps_to_degrees() {
        let steps = Steps::new(3200);
        let steps_per_degree = 3200.0 / 360.0;
        let degrees = steps.to_degrees(steps_per_degree);
        assert!((degrees.value() - 360.0).abs() < 0.01);
    }
}
