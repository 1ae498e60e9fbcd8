//! Motion module for stepper-pulse.
//!
//! Plans a move once ([`MotionProfile::plan`]) and then steps it one edge at a
//! time ([`PulseSequencer::advance`]).

mod profile;
mod sequencer;

pub use profile::{
    step_pulse_us, Direction, MotionPhase, MotionProfile, ProfileSettings, SpeedMode,
    INITIAL_PULSE_CORRECTION, MICROS_PER_MINUTE,
};
pub use sequencer::{Edge, PulseSequencer, STEP_HIGH_MIN_US, STEP_LOW_MIN_US, WAKEUP_TIME_US};
