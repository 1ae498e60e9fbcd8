//! Unit test harness for stepper-pulse.
//!
//! This module organizes unit tests for each component of the library.

mod config_parsing;
mod config_validation;
