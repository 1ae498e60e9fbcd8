//! Position tracking for stepper motors.
//!
//! Counts issued microsteps from an origin. The count is in units of the
//! active microstep divisor, so it is rescaled whenever that divisor changes.

use crate::config::units::{Degrees, Microsteps, Steps};

/// Motor position tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Position {
    /// Current position in microsteps (from origin)
    steps: Steps,
    /// Microsteps per degree for conversions
    steps_per_degree: f32,
}

impl Position {
    /// Create a tracker at the origin.
    #[inline]
    pub fn new(steps_per_degree: f32) -> Self {
        Self {
            steps: Steps::default(),
            steps_per_degree,
        }
    }

    /// Get current position in steps.
    #[inline]
    pub fn steps(&self) -> Steps {
        self.steps
    }

    /// Get current position in degrees.
    #[inline]
    pub fn degrees(&self) -> Degrees {
        self.steps.to_degrees(self.steps_per_degree)
    }

    /// Set position in degrees.
    #[inline]
    pub fn set_degrees(&mut self, degrees: Degrees) {
        self.steps = Steps::from_degrees(degrees, self.steps_per_degree);
    }

    /// Move by a number of steps.
    #[inline]
    pub fn move_steps(&mut self, delta: i64) {
        self.steps = Steps(self.steps.0.saturating_add(delta));
    }

    /// Set current position as the new origin.
    #[inline]
    pub fn set_origin(&mut self) {
        self.steps = Steps::default();
    }

    /// Get steps per degree conversion factor.
    #[inline]
    pub fn steps_per_degree(&self) -> f32 {
        self.steps_per_degree
    }

    /// Re-express the position after a microstep divisor change.
    ///
    /// Going to a coarser divisor truncates toward zero.
    pub fn rescale(&mut self, from: Microsteps, to: Microsteps) {
        let from = i64::from(from.value());
        let to = i64::from(to.value());
        self.steps = Steps(self.steps.0.saturating_mul(to) / from);
        self.steps_per_degree = self.steps_per_degree * to as f32 / from as f32;
    }
}
