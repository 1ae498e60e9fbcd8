//! Motor module for stepper-pulse.
//!
//! Provides the stepper motor driver with type-state safety and position tracking.

mod builder;
mod driver;
mod position;
pub mod state;

pub use builder::StepperDriverBuilder;
pub use driver::{NoPin, StepperDriver};
pub use position::Position;
pub use state::{Idle, MotorState, Moving, StateName};
