//! Pulse sequencing: one STEP edge per call.
//!
//! A full step is two edges. The rising edge starts the pulse and the
//! falling edge ends it; only the falling edge counts the step and computes
//! the width of the next one. Width updates use integer arithmetic with a
//! carried remainder (AVR446 / Atmel DOC8017), so no rounding drift builds
//! up over long ramps.

use embedded_hal::digital::{OutputPin, PinState};

use crate::clock::{elapsed_since, MicrosClock};
use crate::error::{MotorError, Result};

use super::profile::{Direction, MotionProfile, SpeedMode};

/// tWH(STEP): minimum STEP high time [µs].
pub const STEP_HIGH_MIN_US: u32 = 1;
/// tWL(STEP): minimum STEP low time [µs].
pub const STEP_LOW_MIN_US: u32 = 1;
/// tWAKE: nSLEEP inactive to first STEP [µs].
pub const WAKEUP_TIME_US: u32 = 0;

/// Level of the STEP output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    /// STEP low; the next edge is rising.
    #[default]
    Low,
    /// STEP high; the next edge is falling.
    High,
}

impl Edge {
    /// The other level.
    #[inline]
    pub fn toggled(self) -> Self {
        match self {
            Edge::Low => Edge::High,
            Edge::High => Edge::Low,
        }
    }
}

impl From<Edge> for PinState {
    fn from(edge: Edge) -> Self {
        match edge {
            Edge::Low => PinState::Low,
            Edge::High => PinState::High,
        }
    }
}

impl MotionProfile {
    /// Count one finished step and compute the width of the next one.
    ///
    /// This is the pure half of the sequencer, usable on its own when STEP
    /// is produced by a hardware timer. No-op once the move is complete.
    pub fn complete_step(&mut self) {
        if self.steps_remaining == 0 {
            return;
        }

        self.steps_remaining -= 1;
        self.step_count += 1;

        if self.mode == SpeedMode::Constant {
            return;
        }

        let width = i64::from(self.pulse_width_us);

        let next = if self.step_count <= self.steps_to_cruise {
            // accelerating
            let denom = 4 * self.step_count as i64 + 1;
            let next = width - (2 * width + self.remainder) / denom;
            self.remainder = if self.step_count < self.steps_to_cruise {
                (2 * next + self.remainder) % denom
            } else {
                0
            };
            next
        } else if self.steps_remaining > self.steps_to_brake || self.steps_remaining == 0 {
            // cruising, or the last step was just issued
            return;
        } else {
            // decelerating
            let denom = 1 - 4 * self.steps_remaining as i64;
            let next = width - (2 * width + self.remainder) / denom;
            self.remainder = (2 * next + self.remainder) % denom;
            next
        };

        self.pulse_width_us = next.clamp(1, i64::from(u32::MAX)) as u32;
    }
}

/// Drives STEP and DIR for a [`MotionProfile`].
#[derive(Debug)]
pub struct PulseSequencer<STEP, DIR> {
    step_pin: STEP,
    dir_pin: DIR,
    invert_direction: bool,
}

impl<STEP, DIR> PulseSequencer<STEP, DIR>
where
    STEP: OutputPin,
    DIR: OutputPin,
{
    /// Wrap the STEP and DIR pins.
    pub fn new(step_pin: STEP, dir_pin: DIR, invert_direction: bool) -> Self {
        Self {
            step_pin,
            dir_pin,
            invert_direction,
        }
    }

    /// Whether DIR logic is inverted.
    #[inline]
    pub fn invert_direction(&self) -> bool {
        self.invert_direction
    }

    /// Set DIR logic inversion.
    pub fn set_invert_direction(&mut self, invert: bool) {
        self.invert_direction = invert;
    }

    /// Put the outputs in their idle state: DIR high, STEP low.
    pub fn reset(&mut self) -> Result<()> {
        self.dir_pin.set_high().map_err(|_| MotorError::PinError)?;
        self.step_pin.set_low().map_err(|_| MotorError::PinError)?;
        Ok(())
    }

    /// Drive DIR for `direction`.
    pub fn set_direction(&mut self, direction: Direction) -> Result<()> {
        let high = match direction {
            Direction::Forward => !self.invert_direction,
            Direction::Reverse => self.invert_direction,
        };
        self.dir_pin
            .set_state(PinState::from(high))
            .map_err(|_| MotorError::PinError)?;
        Ok(())
    }

    /// Emit the next STEP edge of `profile`.
    ///
    /// Returns the microseconds to wait before the following call, or 0 when
    /// the move is complete. Calling it again after completion keeps
    /// returning 0 without touching the pins or the profile.
    ///
    /// After a rising edge the wait is [`STEP_HIGH_MIN_US`]. After a falling
    /// edge it is the rest of this step's pulse width, minus the time spent
    /// here on the pin write and the width update. The width for the next
    /// step is computed on the same call.
    pub fn advance<C>(&mut self, profile: &mut MotionProfile, clock: &C) -> Result<u32>
    where
        C: MicrosClock + ?Sized,
    {
        if profile.steps_remaining == 0 {
            return Ok(0);
        }

        let edge = profile.edge.toggled();
        if edge == Edge::High {
            // DIR is sampled on the rising STEP edge, so it goes first.
            self.set_direction(profile.direction)?;
        }

        let start = clock.now_micros();
        self.step_pin
            .set_state(edge.into())
            .map_err(|_| MotorError::PinError)?;
        profile.edge = edge;

        match edge {
            Edge::High => Ok(STEP_HIGH_MIN_US),
            Edge::Low => {
                // The step just issued still runs on the width it started with.
                let width = profile.pulse_width_us;
                profile.complete_step();
                let spent = elapsed_since(start, clock.now_micros());
                Ok(width
                    .saturating_sub(STEP_HIGH_MIN_US)
                    .saturating_sub(spent)
                    .max(STEP_LOW_MIN_US))
            }
        }
    }

    /// Drive STEP low between moves.
    pub fn park(&mut self) -> Result<()> {
        self.step_pin.set_low().map_err(|_| MotorError::PinError)?;
        Ok(())
    }

    /// End a pulse that an abandoned move left high.
    ///
    /// The rising edge already moved the motor, so the step is counted even
    /// when the falling edge cannot be written. Returns whether a step was
    /// counted.
    pub fn settle(&mut self, profile: &mut MotionProfile) -> Result<bool> {
        if profile.edge != Edge::High {
            return Ok(false);
        }
        profile.edge = Edge::Low;
        profile.complete_step();
        self.park()?;
        Ok(true)
    }

    /// Release the pins.
    pub fn release(self) -> (STEP, DIR) {
        (self.step_pin, self.dir_pin)
    }
}
