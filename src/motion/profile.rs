//! Motion profile planning.
//!
//! Plans a trapezoidal (accelerate, cruise, decelerate) move as step counts
//! and an initial pulse width. The per-step widths are not stored anywhere:
//! the [`sequencer`](super::sequencer) derives each one from the previous
//! one as the move runs.
//!
//! Linear speed profile calculations based on
//! - Generating stepper-motor speed profiles in real time - David Austin, 2004
//! - Atmel AVR446: Linear speed control of stepper motor, 2006

use libm::sqrtf;
use serde::Deserialize;

use crate::config::units::Microsteps;

use super::sequencer::Edge;

/// 60 [s/min] * 1_000_000 [µs/s].
pub const MICROS_PER_MINUTE: u64 = 60_000_000;

/// Correction applied to the first pulse of an acceleration ramp.
///
/// The discrete recurrence overestimates the first interval; 0.676 is the
/// published correction for it (Austin, 2004).
pub const INITIAL_PULSE_CORRECTION: f32 = 0.676;

/// Direction of motor motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Positive step count. DIR is driven high (unless inverted).
    #[default]
    Forward,
    /// Negative step count. DIR is driven low (unless inverted).
    Reverse,
}

impl Direction {
    /// Get direction from signed step count.
    #[inline]
    pub fn from_steps(steps: i64) -> Self {
        if steps >= 0 {
            Direction::Forward
        } else {
            Direction::Reverse
        }
    }

    /// Get the sign multiplier.
    #[inline]
    pub fn sign(self) -> i64 {
        match self {
            Direction::Forward => 1,
            Direction::Reverse => -1,
        }
    }
}

/// Speed profile shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum SpeedMode {
    /// Every step at the configured RPM; no ramps.
    #[default]
    Constant,
    /// Linear acceleration to the configured RPM and linear deceleration to a stop.
    Linear,
}

/// Phase of the next step of a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionPhase {
    /// Accelerating from rest toward cruise velocity.
    Accelerating,
    /// Moving at constant cruise velocity.
    Cruising,
    /// Decelerating from cruise velocity to rest.
    Decelerating,
    /// Motion complete.
    Complete,
}

/// Motor and speed parameters a move is planned from.
///
/// `acceleration` and `deceleration` are in full steps/s² and must be
/// non-zero when `mode` is [`SpeedMode::Linear`]; `rpm` must be non-zero in
/// both modes. Violating that does not panic, it produces a profile with
/// meaningless (but positive) pulse widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProfileSettings {
    /// Full steps per motor revolution (usually 200).
    pub steps_per_revolution: u16,
    /// Active microstep divisor.
    pub microsteps: Microsteps,
    /// Target speed.
    pub rpm: u16,
    /// Profile shape.
    pub mode: SpeedMode,
    /// Acceleration [full steps/s²].
    pub acceleration: u16,
    /// Deceleration [full steps/s²].
    pub deceleration: u16,
}

impl ProfileSettings {
    /// Pulse width at the target RPM, in microseconds.
    #[inline]
    pub fn cruise_pulse_us(&self) -> u32 {
        step_pulse_us(self.steps_per_revolution, self.microsteps, self.rpm)
    }
}

/// Step pulse width for a given RPM: 60 s/min * 1e6 µs/s / microsteps / steps / rpm.
///
/// Never returns 0. A zero divisor (zero RPM or zero steps) gives `u32::MAX`.
pub fn step_pulse_us(steps_per_revolution: u16, microsteps: Microsteps, rpm: u16) -> u32 {
    let divisor =
        u64::from(steps_per_revolution) * u64::from(microsteps.value()) * u64::from(rpm);
    match MICROS_PER_MINUTE.checked_div(divisor) {
        Some(width) => width.max(1) as u32,
        None => u32::MAX,
    }
}

/// Initial pulse width c0 of an acceleration ramp, in microseconds.
fn initial_pulse_us(acceleration: u16, microsteps: Microsteps) -> u32 {
    let rate = f32::from(acceleration) * f32::from(microsteps.value());
    let c0 = 1_000_000.0 * INITIAL_PULSE_CORRECTION * sqrtf(2.0 / rate);
    // Saturating cast; an infinite c0 (zero acceleration) pins to u32::MAX.
    (c0 as u32).max(1)
}

/// Time to cover `steps` from rest at `rate` steps/s², in microseconds.
fn ramp_time_us(steps: u64, rate: f32) -> u64 {
    if steps == 0 || rate <= 0.0 {
        return 0;
    }
    (sqrtf(2.0 * steps as f32 / rate) * 1_000_000.0) as u64
}

/// Computed motion profile for one move.
///
/// Owns all state the pulse sequencer mutates, including the rounding
/// remainder of the acceleration recurrence, so a profile can be stepped
/// without any hidden state.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotionProfile {
    /// Absolute requested step count.
    pub(super) total_steps: u64,
    /// Steps left; the move is complete at zero.
    pub(super) steps_remaining: u64,
    /// Steps completed so far (integration index).
    pub(super) step_count: u64,
    /// Step index at which acceleration ends.
    pub(super) steps_to_cruise: u64,
    /// Remaining-steps threshold at which deceleration begins.
    pub(super) steps_to_brake: u64,
    /// Current pulse width in microseconds. Always > 0.
    pub(super) pulse_width_us: u32,
    /// Direction, fixed for the move.
    pub(super) direction: Direction,
    /// Update rule.
    pub(super) mode: SpeedMode,
    /// Microstep divisor the widths were computed for.
    pub(super) microsteps: Microsteps,
    /// Remainder carried between recurrence updates.
    pub(super) remainder: i64,
    /// Current level of the STEP output.
    pub(super) edge: Edge,
}

impl MotionProfile {
    /// Plan a move of `steps` (sign selects direction).
    pub fn plan(steps: i64, settings: &ProfileSettings) -> Self {
        let profile = Self::layout(steps, settings);

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "plan: steps={} mode={} to_cruise={} to_brake={} c0={}us",
            steps,
            profile.mode,
            profile.steps_to_cruise,
            profile.steps_to_brake,
            profile.pulse_width_us
        );

        profile
    }

    fn layout(steps: i64, settings: &ProfileSettings) -> Self {
        let total = steps.unsigned_abs();
        let mut profile = Self {
            total_steps: total,
            steps_remaining: total,
            step_count: 0,
            steps_to_cruise: 0,
            steps_to_brake: 0,
            pulse_width_us: settings.cruise_pulse_us(),
            direction: Direction::from_steps(steps),
            mode: settings.mode,
            microsteps: settings.microsteps,
            remainder: 0,
            edge: Edge::Low,
        };

        if settings.mode == SpeedMode::Linear {
            let (to_cruise, to_brake) = linear_segments(total, settings);
            profile.steps_to_cruise = to_cruise;
            profile.steps_to_brake = to_brake;
            profile.pulse_width_us = initial_pulse_us(settings.acceleration, settings.microsteps);
        }

        profile
    }

    /// A finished profile that emits no pulses.
    pub fn zero() -> Self {
        Self::layout(0, &ProfileSettings {
            steps_per_revolution: 1,
            microsteps: Microsteps::FULL,
            rpm: 1,
            mode: SpeedMode::Constant,
            acceleration: 0,
            deceleration: 0,
        })
    }

    /// Predict how long a move of `steps` would take, in microseconds.
    ///
    /// Closed-form sum of the three phases; nothing is iterated and no live
    /// profile is touched.
    pub fn estimate_duration_us(steps: i64, settings: &ProfileSettings) -> u64 {
        let profile = Self::layout(steps, settings);
        let cruise_pulse = u64::from(settings.cruise_pulse_us());

        match profile.mode {
            SpeedMode::Constant => profile.total_steps.saturating_mul(cruise_pulse),
            SpeedMode::Linear => {
                let ms = f32::from(settings.microsteps.value());
                let cruise_steps = profile
                    .total_steps
                    .saturating_sub(profile.steps_to_cruise)
                    .saturating_sub(profile.steps_to_brake);

                ramp_time_us(profile.steps_to_cruise, f32::from(settings.acceleration) * ms)
                    .saturating_add(cruise_steps.saturating_mul(cruise_pulse))
                    .saturating_add(ramp_time_us(
                        profile.steps_to_brake,
                        f32::from(settings.deceleration) * ms,
                    ))
            }
        }
    }

    /// Absolute step count of the move.
    #[inline]
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Steps left to issue.
    #[inline]
    pub fn steps_remaining(&self) -> u64 {
        self.steps_remaining
    }

    /// Steps issued so far.
    #[inline]
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Step index at which acceleration ends.
    #[inline]
    pub fn steps_to_cruise(&self) -> u64 {
        self.steps_to_cruise
    }

    /// Remaining-steps threshold at which deceleration starts.
    #[inline]
    pub fn steps_to_brake(&self) -> u64 {
        self.steps_to_brake
    }

    /// Current pulse width in microseconds.
    #[inline]
    pub fn pulse_width_us(&self) -> u32 {
        self.pulse_width_us
    }

    /// Direction of the move.
    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Speed mode the move was planned with.
    #[inline]
    pub fn mode(&self) -> SpeedMode {
        self.mode
    }

    /// Microstep divisor the move was planned with.
    #[inline]
    pub fn microsteps(&self) -> Microsteps {
        self.microsteps
    }

    /// Current STEP output level.
    #[inline]
    pub fn edge(&self) -> Edge {
        self.edge
    }

    /// Check if the move is complete.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.steps_remaining == 0
    }

    /// Phase the next step belongs to.
    pub fn phase(&self) -> MotionPhase {
        if self.steps_remaining == 0 {
            return MotionPhase::Complete;
        }
        match self.mode {
            SpeedMode::Constant => MotionPhase::Cruising,
            SpeedMode::Linear => {
                if self.step_count < self.steps_to_cruise {
                    MotionPhase::Accelerating
                } else if self.steps_remaining - 1 > self.steps_to_brake {
                    MotionPhase::Cruising
                } else {
                    MotionPhase::Decelerating
                }
            }
        }
    }

    /// Get progress as a fraction (0.0 to 1.0).
    #[inline]
    pub fn progress(&self) -> f32 {
        if self.total_steps == 0 {
            1.0
        } else {
            self.step_count as f32 / self.total_steps as f32
        }
    }
}

impl Default for MotionProfile {
    fn default() -> Self {
        Self::zero()
    }
}

/// Split `total` steps into (steps_to_cruise, steps_to_brake).
fn linear_segments(total: u64, settings: &ProfileSettings) -> (u64, u64) {
    let accel = u64::from(settings.acceleration);
    let decel = u64::from(settings.deceleration);
    let microsteps = u64::from(settings.microsteps.value());

    // Target speed in full steps/s.
    let speed = u64::from(settings.rpm) * u64::from(settings.steps_per_revolution) / 60;

    // Steps from 0 to target rpm.
    let to_cruise = (speed * speed * microsteps)
        .checked_div(2 * accel)
        .unwrap_or(u64::MAX);

    // Steps from 0 until we must begin slowing down.
    let brake_raw = (u128::from(total) * u128::from(decel))
        .checked_div(u128::from(accel + decel))
        .unwrap_or(0) as u64;

    if to_cruise < brake_raw {
        // Reaches cruise speed before it needs to brake. decel > 0 here,
        // otherwise brake_raw would be 0.
        let to_brake = to_cruise.saturating_mul(accel) / decel;
        (to_cruise, to_brake)
    } else {
        // Cannot reach cruise speed; brake early.
        (brake_raw, total - brake_raw)
    }
}
