//! Stepper motor driver.
//!
//! Generic over embedded-hal 1.0 pin types and a microsecond clock, with
//! type-state safety. Moves run either blocking ([`StepperDriver::move_steps`])
//! or one edge at a time from a caller's loop ([`StepperDriver::begin_move`]
//! and [`StepperDriver::advance`]).

use core::convert::Infallible;
use core::marker::PhantomData;

use embedded_hal::digital::{ErrorType, OutputPin};

use crate::clock::{wait_until, MicrosClock};
use crate::config::units::{Degrees, Microsteps, Steps};
use crate::config::MicrostepCapability;
use crate::error::{Error, MotorError, Result};
use crate::motion::{
    MotionPhase, MotionProfile, ProfileSettings, PulseSequencer, SpeedMode, MICROS_PER_MINUTE,
    WAKEUP_TIME_US,
};

use super::builder::StepperDriverBuilder;
use super::position::Position;
use super::state::{Idle, MotorState, Moving, StateName};

/// Placeholder for a driver without an ENABLE pin.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPin;

impl ErrorType for NoPin {
    type Error = Infallible;
}

impl OutputPin for NoPin {
    fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
        Ok(())
    }
}

/// Stepper motor driver with type-state safety.
///
/// Generic over:
/// - `STEP`: STEP pin type (must implement `OutputPin`)
/// - `DIR`: DIR pin type (must implement `OutputPin`)
/// - `EN`: active-low ENABLE pin type ([`NoPin`] when absent)
/// - `CLK`: microsecond time source
/// - `STATE`: Type-state marker (defaults to `Idle`)
pub struct StepperDriver<STEP, DIR, EN, CLK, STATE = Idle>
where
    STEP: OutputPin,
    DIR: OutputPin,
    EN: OutputPin,
    CLK: MicrosClock,
    STATE: MotorState,
{
    /// STEP and DIR outputs.
    sequencer: PulseSequencer<STEP, DIR>,

    /// Optional active-low ENABLE output.
    enable_pin: Option<EN>,

    /// Time source for pulse timing.
    clock: CLK,

    /// Motor name for logging/debugging.
    name: heapless::String<32>,

    /// Full steps per revolution.
    steps_per_revolution: u16,

    /// Microstep divisors the driver chip can produce.
    capability: MicrostepCapability,

    /// Active microstep divisor.
    microsteps: Microsteps,

    /// Target speed.
    rpm: u16,

    /// Speed profile for the next move.
    mode: SpeedMode,
    acceleration: u16,
    deceleration: u16,

    /// Current absolute position.
    position: Position,

    /// Active or most recent move.
    profile: MotionProfile,

    /// Type-state marker.
    _state: PhantomData<STATE>,
}

impl<STEP, DIR, CLK> StepperDriver<STEP, DIR, NoPin, CLK, Idle>
where
    STEP: OutputPin,
    DIR: OutputPin,
    CLK: MicrosClock,
{
    /// Start building a driver.
    pub fn builder() -> StepperDriverBuilder<STEP, DIR, NoPin, CLK> {
        StepperDriverBuilder::new()
    }
}

impl<STEP, DIR, EN, CLK, STATE> StepperDriver<STEP, DIR, EN, CLK, STATE>
where
    STEP: OutputPin,
    DIR: OutputPin,
    EN: OutputPin,
    CLK: MicrosClock,
    STATE: MotorState + StateName,
{
    /// Get the motor name.
    #[inline]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Get the current state name.
    #[inline]
    pub fn state_name(&self) -> &'static str {
        STATE::name()
    }

    /// Get current position in microsteps.
    #[inline]
    pub fn position_steps(&self) -> Steps {
        self.position.steps()
    }

    /// Get current position in degrees.
    #[inline]
    pub fn position_degrees(&self) -> Degrees {
        self.position.degrees()
    }

    /// Full steps per revolution.
    #[inline]
    pub fn steps_per_revolution(&self) -> u16 {
        self.steps_per_revolution
    }

    /// Microstep divisors this driver accepts.
    #[inline]
    pub fn capability(&self) -> MicrostepCapability {
        self.capability
    }

    /// Active microstep divisor.
    #[inline]
    pub fn microsteps(&self) -> Microsteps {
        self.microsteps
    }

    /// Configured target speed.
    #[inline]
    pub fn rpm(&self) -> u16 {
        self.rpm
    }

    /// Speed profile shape for the next move.
    #[inline]
    pub fn speed_mode(&self) -> SpeedMode {
        self.mode
    }

    /// Acceleration [full steps/s²].
    #[inline]
    pub fn acceleration(&self) -> u16 {
        self.acceleration
    }

    /// Deceleration [full steps/s²].
    #[inline]
    pub fn deceleration(&self) -> u16 {
        self.deceleration
    }

    /// Active or most recent move.
    #[inline]
    pub fn profile(&self) -> &MotionProfile {
        &self.profile
    }

    /// Parameters the next move will be planned with.
    pub fn settings(&self) -> ProfileSettings {
        ProfileSettings {
            steps_per_revolution: self.steps_per_revolution,
            microsteps: self.microsteps,
            rpm: self.rpm,
            mode: self.mode,
            acceleration: self.acceleration,
            deceleration: self.deceleration,
        }
    }

    /// Instantaneous speed implied by the current pulse width.
    ///
    /// Uses the divisor the profile was planned with. During a ramp this is
    /// below [`rpm`](Self::rpm). Zero before the first move.
    pub fn current_rpm(&self) -> u16 {
        let per_minute = u64::from(self.profile.pulse_width_us())
            * u64::from(self.profile.microsteps().value())
            * u64::from(self.steps_per_revolution);
        MICROS_PER_MINUTE
            .checked_div(per_minute)
            .map_or(0, |rpm| rpm.min(u64::from(u16::MAX)) as u16)
    }

    /// Microsteps for a rotation of `degrees` whole degrees.
    pub fn steps_for_rotation(&self, degrees: i64) -> i64 {
        degrees
            .saturating_mul(i64::from(self.steps_per_revolution))
            .saturating_mul(i64::from(self.microsteps.value()))
            / 360
    }

    /// Microsteps for a rotation of `degrees`, truncated toward zero.
    pub fn steps_for_angle(&self, degrees: Degrees) -> i64 {
        (degrees.0 * f32::from(self.steps_per_revolution) * f32::from(self.microsteps.value())
            / 360.0) as i64
    }

    /// Predicted duration of a move of `steps` with the current settings [µs].
    pub fn estimate_duration(&self, steps: i64) -> u64 {
        MotionProfile::estimate_duration_us(steps, &self.settings())
    }

    /// Energize the coils (ENABLE low).
    ///
    /// No-op without an ENABLE pin.
    pub fn enable(&mut self) -> Result<()> {
        if let Some(pin) = self.enable_pin.as_mut() {
            pin.set_low().map_err(|_| MotorError::PinError)?;
            let deadline = self.clock.now_micros().wrapping_add(WAKEUP_TIME_US);
            wait_until(&self.clock, deadline, core::hint::spin_loop);
        }
        Ok(())
    }

    /// Release the coils (ENABLE high).
    ///
    /// No-op without an ENABLE pin.
    pub fn disable(&mut self) -> Result<()> {
        if let Some(pin) = self.enable_pin.as_mut() {
            pin.set_high().map_err(|_| MotorError::PinError)?;
        }
        Ok(())
    }

    /// Emit one STEP edge and track the position.
    fn step_edge(&mut self) -> Result<u32> {
        let before = self.profile.step_count();
        let interval = self.sequencer.advance(&mut self.profile, &self.clock)?;
        self.track(before);
        Ok(interval)
    }

    /// Move the position by the steps counted since `before`.
    fn track(&mut self, before: u64) {
        if self.profile.step_count() != before {
            self.position.move_steps(self.profile.direction().sign());

            #[cfg(feature = "defmt")]
            if self.profile.is_complete() {
                defmt::trace!(
                    "{}: move complete, {} steps, position={}",
                    self.name.as_str(),
                    self.profile.total_steps(),
                    self.position.steps().value()
                );
            }
        }
    }

    fn into_state<S: MotorState>(self) -> StepperDriver<STEP, DIR, EN, CLK, S> {
        StepperDriver {
            sequencer: self.sequencer,
            enable_pin: self.enable_pin,
            clock: self.clock,
            name: self.name,
            steps_per_revolution: self.steps_per_revolution,
            capability: self.capability,
            microsteps: self.microsteps,
            rpm: self.rpm,
            mode: self.mode,
            acceleration: self.acceleration,
            deceleration: self.deceleration,
            position: self.position,
            profile: self.profile,
            _state: PhantomData,
        }
    }
}

impl<STEP, DIR, EN, CLK> StepperDriver<STEP, DIR, EN, CLK, Idle>
where
    STEP: OutputPin,
    DIR: OutputPin,
    EN: OutputPin,
    CLK: MicrosClock,
{
    /// Create a new driver in the Idle state. No pin is written.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        sequencer: PulseSequencer<STEP, DIR>,
        enable_pin: Option<EN>,
        clock: CLK,
        name: heapless::String<32>,
        steps_per_revolution: u16,
        capability: MicrostepCapability,
        microsteps: Microsteps,
        rpm: u16,
        speed: (SpeedMode, u16, u16),
    ) -> Self {
        let steps_per_degree =
            f32::from(steps_per_revolution) * f32::from(microsteps.value()) / 360.0;
        let (mode, acceleration, deceleration) = speed;
        Self {
            sequencer,
            enable_pin,
            clock,
            name,
            steps_per_revolution,
            capability,
            microsteps,
            rpm,
            mode,
            acceleration,
            deceleration,
            position: Position::new(steps_per_degree),
            profile: MotionProfile::zero(),
            _state: PhantomData,
        }
    }

    /// Put the outputs in a known state and energize the motor.
    ///
    /// Drives DIR high and STEP low, disables, stores `rpm`, applies
    /// `microsteps` (ignored if unsupported) and enables again.
    pub fn begin(&mut self, rpm: u16, microsteps: u16) -> Result<()> {
        self.sequencer.reset()?;
        self.disable()?;
        self.rpm = rpm;
        self.set_microstep(microsteps);
        self.enable()
    }

    /// Set the target speed for the next move.
    pub fn set_rpm(&mut self, rpm: u16) {
        self.rpm = rpm;
    }

    /// Change the microstep divisor.
    ///
    /// Only divisors the driver supports are accepted; anything else leaves
    /// the previous value. Returns the divisor in effect afterwards.
    ///
    /// This only changes timing. The MS1..MS3 mode pins, if any, are the
    /// caller's to drive.
    pub fn set_microstep(&mut self, microsteps: u16) -> u16 {
        match Microsteps::new(microsteps) {
            Ok(new) if self.capability.supports(new) => {
                self.position.rescale(self.microsteps, new);
                self.microsteps = new;
            }
            _ => {
                #[cfg(feature = "defmt")]
                defmt::warn!(
                    "{}: microsteps {} not supported, keeping {}",
                    self.name.as_str(),
                    microsteps,
                    self.microsteps.value()
                );
            }
        }
        self.microsteps.value()
    }

    /// Set the speed profile for the next move.
    ///
    /// `acceleration` and `deceleration` are in full steps/s² and must be
    /// non-zero for [`SpeedMode::Linear`].
    pub fn set_speed_profile(&mut self, mode: SpeedMode, acceleration: u16, deceleration: u16) {
        self.mode = mode;
        self.acceleration = acceleration;
        self.deceleration = deceleration;
    }

    /// Move `steps` microsteps (sign selects direction), blocking until done.
    ///
    /// Spins between edges; use [`move_steps_with`](Self::move_steps_with)
    /// to run something else while waiting.
    pub fn move_steps(&mut self, steps: i64) -> Result<()> {
        self.move_steps_with(steps, core::hint::spin_loop)
    }

    /// Move `steps` microsteps, calling `yield_now` while waiting between edges.
    pub fn move_steps_with<Y>(&mut self, steps: i64, mut yield_now: Y) -> Result<()>
    where
        Y: FnMut(),
    {
        self.start(steps)?;
        loop {
            let interval = self.step_edge()?;
            if interval == 0 {
                return Ok(());
            }
            let deadline = self.clock.now_micros().wrapping_add(interval);
            wait_until(&self.clock, deadline, &mut yield_now);
        }
    }

    /// Rotate by whole degrees, blocking until done.
    pub fn rotate(&mut self, degrees: i64) -> Result<()> {
        self.move_steps(self.steps_for_rotation(degrees))
    }

    /// Rotate by a fractional angle, blocking until done.
    pub fn rotate_angle(&mut self, degrees: Degrees) -> Result<()> {
        self.move_steps(self.steps_for_angle(degrees))
    }

    /// Plan a move of `steps` microsteps and hand it to the caller's loop.
    ///
    /// Only DIR is written here. Call [`advance`](StepperDriver::advance) on
    /// the returned driver to emit edges. On a pin error the idle driver is
    /// handed back with the error.
    pub fn begin_move(
        mut self,
        steps: i64,
    ) -> core::result::Result<StepperDriver<STEP, DIR, EN, CLK, Moving>, (Self, Error)> {
        match self.start(steps) {
            Ok(()) => Ok(self.into_state()),
            Err(e) => Err((self, e)),
        }
    }

    /// Cooperative [`rotate`](Self::rotate).
    pub fn begin_rotate(
        self,
        degrees: i64,
    ) -> core::result::Result<StepperDriver<STEP, DIR, EN, CLK, Moving>, (Self, Error)> {
        let steps = self.steps_for_rotation(degrees);
        self.begin_move(steps)
    }

    /// Cooperative [`rotate_angle`](Self::rotate_angle).
    pub fn begin_rotate_angle(
        self,
        degrees: Degrees,
    ) -> core::result::Result<StepperDriver<STEP, DIR, EN, CLK, Moving>, (Self, Error)> {
        let steps = self.steps_for_angle(degrees);
        self.begin_move(steps)
    }

    /// Set the current position as the origin (zero).
    pub fn set_origin(&mut self) {
        self.position.set_origin();
    }

    /// Set the current position to a specific value.
    pub fn set_position(&mut self, degrees: Degrees) {
        self.position.set_degrees(degrees);
    }

    /// Give back the pins and the clock.
    pub fn release(self) -> (STEP, DIR, Option<EN>, CLK) {
        let (step, dir) = self.sequencer.release();
        (step, dir, self.enable_pin, self.clock)
    }

    fn start(&mut self, steps: i64) -> Result<()> {
        // Every step of the move needs a real rising edge.
        self.sequencer.park()?;
        self.profile = MotionProfile::plan(steps, &self.settings());
        self.sequencer.set_direction(self.profile.direction())
    }
}

impl<STEP, DIR, EN, CLK> StepperDriver<STEP, DIR, EN, CLK, Moving>
where
    STEP: OutputPin,
    DIR: OutputPin,
    EN: OutputPin,
    CLK: MicrosClock,
{
    /// Emit the next STEP edge.
    ///
    /// Returns the microseconds until the next call is due, or 0 once the
    /// move is complete. Calling early shortens the pulse; calling late
    /// stretches it.
    pub fn advance(&mut self) -> Result<u32> {
        self.step_edge()
    }

    /// Check if the move is complete.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.profile.is_complete()
    }

    /// Get move progress (0.0 to 1.0).
    #[inline]
    pub fn progress(&self) -> f32 {
        self.profile.progress()
    }

    /// Get current motion phase.
    #[inline]
    pub fn phase(&self) -> MotionPhase {
        self.profile.phase()
    }

    /// Steps left in the move.
    #[inline]
    pub fn steps_remaining(&self) -> u64 {
        self.profile.steps_remaining()
    }

    /// Return to Idle.
    ///
    /// Also the way to abandon a move: the position reflects the steps
    /// actually issued. A pulse left high is ended here and counted, since
    /// its rising edge already moved the motor.
    pub fn finish(mut self) -> StepperDriver<STEP, DIR, EN, CLK, Idle> {
        let before = self.profile.step_count();
        // On a write error STEP stays high until the next move parks it.
        let _ = self.sequencer.settle(&mut self.profile);
        self.track(before);
        self.into_state()
    }

    /// Run the rest of the move, calling `yield_now` while waiting.
    pub fn run_to_completion<Y>(
        mut self,
        mut yield_now: Y,
    ) -> core::result::Result<StepperDriver<STEP, DIR, EN, CLK, Idle>, (Self, Error)>
    where
        Y: FnMut(),
    {
        loop {
            let interval = match self.step_edge() {
                Ok(interval) => interval,
                Err(e) => return Err((self, e)),
            };
            if interval == 0 {
                return Ok(self.finish());
            }
            let deadline = self.clock.now_micros().wrapping_add(interval);
            wait_until(&self.clock, deadline, &mut yield_now);
        }
    }
}
