//! # stepper-pulse
//!
//! STEP/DIR pulse generation for stepper motor drivers with embedded-hal 1.0
//! support.
//!
//! ## Features
//!
//! - **Constant and linear speed profiles**: trapezoidal ramps with
//!   independent acceleration and deceleration rates
//! - **Integer pulse recurrence**: after the first pulse, every width is
//!   derived from the previous one without floating point
//! - **Blocking or cooperative**: run a move to completion, or emit one edge
//!   at a time from your own loop
//! - **Driver capabilities**: microstep validation per driver family
//!   (A4988, DRV8825, DRV8834, DRV8880)
//! - **no_std compatible**: core library works without standard library
//! - **Type-state safety**: compile-time motor state verification
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stepper_pulse::{SpeedMode, StepperDriver};
//!
//! let mut motor = StepperDriver::builder()
//!     .step_pin(step_pin)
//!     .dir_pin(dir_pin)
//!     .enable_pin(enable_pin)
//!     .clock(|| timer.now_micros())
//!     .steps_per_revolution(200)
//!     .build()?;
//!
//! motor.begin(120, 16)?;
//! motor.set_speed_profile(SpeedMode::Linear, 1000, 1000);
//! motor.rotate(360)?;
//!
//! // Or drive the edges from a scheduler:
//! let mut moving = motor.begin_move(3200).map_err(|(_, e)| e)?;
//! loop {
//!     let wait_us = moving.advance()?;
//!     if wait_us == 0 {
//!         break;
//!     }
//!     // come back in `wait_us` microseconds
//! }
//! let motor = moving.finish();
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Enables file I/O, TOML parsing and [`clock::StdClock`]
//! - `defmt`: Enables defmt logging for embedded targets

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow large error types - necessary for no_std with heapless strings
#![allow(clippy::result_large_err)]

// Core modules
pub mod clock;
pub mod config;
pub mod error;
pub mod motion;
pub mod motor;

// Re-exports for ergonomic API
pub use clock::MicrosClock;
pub use config::{
    validate_config, DriverKind, MicrostepCapability, MotorConfig, SpeedProfileConfig,
    SystemConfig,
};
pub use error::{Error, Result};
pub use motion::{Direction, MotionPhase, MotionProfile, ProfileSettings, SpeedMode};
pub use motor::{state, NoPin, StepperDriver, StepperDriverBuilder};

// Configuration loading (std only)
#[cfg(feature = "std")]
pub use config::{load_config, parse_config};

#[cfg(feature = "std")]
pub use clock::StdClock;

// Unit types
pub use config::units::{Degrees, Microsteps, Steps};
