//! Integration tests for stepper-pulse.
//!
//! These tests drive the public API end to end: configuration, driver
//! construction, blocking and cooperative moves, against recording pins and a
//! simulated microsecond clock.

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType, OutputPin};
use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction as PinTransaction};
use proptest::prelude::*;

use stepper_pulse::config::units::{Degrees, Microsteps};
use stepper_pulse::error::{ConfigError, Error};
use stepper_pulse::motion::{MotionProfile, ProfileSettings, SpeedMode};
use stepper_pulse::{parse_config, MotionPhase, StepperDriver, StepperDriverBuilder};

// =============================================================================
// Test hardware
// =============================================================================

/// Simulated time. Reading it is free; only waiting moves it forward.
#[derive(Clone, Default)]
struct SimTime(Rc<Cell<u32>>);

impl SimTime {
    fn now(&self) -> u32 {
        self.0.get()
    }

    fn tick(&self) {
        self.0.set(self.0.get().wrapping_add(1));
    }

    fn clock(&self) -> impl Fn() -> u32 {
        let time = self.0.clone();
        move || time.get()
    }
}

/// Output pin that logs (time, level) for every transition.
struct RecordingPin {
    time: SimTime,
    log: Rc<RefCell<Vec<(u32, bool)>>>,
    high: Option<bool>,
}

impl RecordingPin {
    fn new(time: &SimTime) -> (Self, Rc<RefCell<Vec<(u32, bool)>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let pin = Self {
            time: time.clone(),
            log: log.clone(),
            high: None,
        };
        (pin, log)
    }

    fn write(&mut self, high: bool) {
        if self.high != Some(high) {
            self.log.borrow_mut().push((self.time.now(), high));
        }
        self.high = Some(high);
    }
}

impl ErrorType for RecordingPin {
    type Error = Infallible;
}

impl OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true);
        Ok(())
    }
}

struct Rig {
    time: SimTime,
    step_log: Rc<RefCell<Vec<(u32, bool)>>>,
    dir_log: Rc<RefCell<Vec<(u32, bool)>>>,
}

impl Rig {
    fn rising_edges(&self) -> Vec<u32> {
        self.step_log
            .borrow()
            .iter()
            .filter(|(_, high)| *high)
            .map(|(t, _)| *t)
            .collect()
    }

    fn falling_edges(&self) -> usize {
        // The first entry is the idle low written by begin().
        self.step_log.borrow().iter().skip(1).filter(|(_, high)| !*high).count()
    }

    fn periods(&self) -> Vec<u32> {
        self.rising_edges().windows(2).map(|w| w[1] - w[0]).collect()
    }
}

fn rig_builder(
    spr: u16,
) -> (
    StepperDriverBuilder<RecordingPin, RecordingPin, stepper_pulse::NoPin, impl Fn() -> u32>,
    Rig,
) {
    let time = SimTime::default();
    let (step, step_log) = RecordingPin::new(&time);
    let (dir, dir_log) = RecordingPin::new(&time);
    let builder = StepperDriver::builder()
        .step_pin(step)
        .dir_pin(dir)
        .clock(time.clock())
        .steps_per_revolution(spr);
    (
        builder,
        Rig {
            time,
            step_log,
            dir_log,
        },
    )
}

fn linear_settings(rpm: u16, accel: u16, decel: u16) -> ProfileSettings {
    ProfileSettings {
        steps_per_revolution: 200,
        microsteps: Microsteps::FULL,
        rpm,
        mode: SpeedMode::Linear,
        acceleration: accel,
        deceleration: decel,
    }
}

/// Widths the sequencer will use for every step of a profile, in order.
fn step_widths(mut profile: MotionProfile) -> Vec<u32> {
    let mut out = Vec::new();
    while !profile.is_complete() {
        out.push(profile.pulse_width_us());
        profile.complete_step();
    }
    out
}

// =============================================================================
// Blocking moves
// =============================================================================

#[test]
fn constant_move_uses_fixed_width() {
    let (builder, rig) = rig_builder(200);
    let mut motor = builder.build().expect("driver should build");
    motor.begin(60, 1).unwrap();

    let start = rig.time.now();
    let time = rig.time.clone();
    motor.move_steps_with(200, || time.tick()).unwrap();

    let rising = rig.rising_edges();
    assert_eq!(rising.len(), 200);
    assert_eq!(rig.falling_edges(), 200);
    assert!(rig.periods().iter().all(|&p| p == 5000));

    // Blocking returns once the last step's period has run out.
    assert_eq!(rig.time.now() - start, 1_000_000);
    assert_eq!(motor.estimate_duration(200), 1_000_000);
    assert_eq!(motor.position_steps().value(), 200);
}

#[test]
fn rotate_half_turn_at_sixteenth_steps() {
    let (builder, rig) = rig_builder(200);
    let mut motor = builder.build().unwrap();
    motor.begin(300, 16).unwrap();

    let time = rig.time.clone();
    let steps = motor.steps_for_rotation(180);
    assert_eq!(steps, 1600);
    motor.move_steps_with(steps, || time.tick()).unwrap();

    assert_eq!(rig.falling_edges(), 1600);
    assert_eq!(motor.position_steps().value(), 1600);
    assert!((motor.position_degrees().value() - 180.0).abs() < 0.01);
}

#[test]
fn linear_move_duration_close_to_estimate() {
    let (builder, rig) = rig_builder(200);
    let mut motor = builder.build().unwrap();
    motor.begin(120, 1).unwrap();
    motor.set_speed_profile(SpeedMode::Linear, 1000, 1000);

    let estimate = motor.estimate_duration(1000);
    let start = rig.time.now();
    let time = rig.time.clone();
    motor.move_steps_with(1000, || time.tick()).unwrap();
    let elapsed = rig.time.now() - start;

    let error = (f64::from(elapsed) - estimate as f64).abs() / estimate as f64;
    assert!(error < 0.05, "elapsed {} vs estimate {}", elapsed, estimate);

    // First period is the corrected initial width.
    let periods = rig.periods();
    assert!((30_200..=30_240).contains(&periods[0]), "c0 = {}", periods[0]);
    // Ends on the last braking width, well below the target speed.
    assert!(motor.current_rpm() < motor.rpm());
}

#[test]
fn reverse_move_drives_dir_low() {
    let (builder, rig) = rig_builder(200);
    let mut motor = builder.build().unwrap();
    motor.begin(60, 1).unwrap();

    let time = rig.time.clone();
    motor.move_steps_with(-3, || time.tick()).unwrap();

    let dir = rig.dir_log.borrow();
    // begin() drives DIR high, the move drives it low before the first step.
    assert_eq!(dir.iter().map(|(_, h)| *h).collect::<Vec<_>>(), vec![true, false]);
    assert!(dir[1].0 <= rig.rising_edges()[0]);
    assert_eq!(motor.position_steps().value(), -3);
}

#[test]
fn inverted_direction_flips_dir_level() {
    let (builder, rig) = rig_builder(200);
    let mut motor = builder.invert_direction(true).build().unwrap();
    motor.begin(60, 1).unwrap();

    let time = rig.time.clone();
    motor.move_steps_with(2, || time.tick()).unwrap();

    let last = rig.dir_log.borrow().last().copied().unwrap();
    assert!(!last.1);
    assert_eq!(motor.position_steps().value(), 2);
}

#[test]
fn rotate_angle_truncates_toward_zero() {
    let (builder, rig) = rig_builder(200);
    let mut motor = builder.build().unwrap();
    motor.begin(600, 1).unwrap();

    // 1.9 degrees = 1.05 full steps
    let time = rig.time.clone();
    let steps = motor.steps_for_angle(Degrees(1.9));
    motor.move_steps_with(steps, || time.tick()).unwrap();
    assert_eq!(motor.position_steps().value(), 1);
}

// =============================================================================
// Cooperative moves
// =============================================================================

#[test]
fn advance_after_completion_is_idempotent() {
    let (builder, _rig) = rig_builder(200);
    let mut motor = builder.build().unwrap();
    motor.begin(60, 1).unwrap();
    motor.set_speed_profile(SpeedMode::Linear, 1000, 1000);

    let mut moving = motor.begin_move(5).map_err(|(_, e)| e).unwrap();
    while moving.advance().unwrap() != 0 {}

    let count = moving.profile().step_count();
    for _ in 0..5 {
        assert_eq!(moving.advance().unwrap(), 0);
        assert_eq!(moving.profile().step_count(), count);
    }
    assert_eq!(count, 5);
    assert_eq!(moving.phase(), MotionPhase::Complete);
}

#[test]
fn cooperative_rotate_reports_phases() {
    let (builder, _rig) = rig_builder(200);
    let mut motor = builder.build().unwrap();
    motor.begin(120, 1).unwrap();
    motor.set_speed_profile(SpeedMode::Linear, 1000, 1000);

    // 1000 full steps: 80 up, 840 cruising, 80 down
    let mut moving = motor.begin_rotate(1800).map_err(|(_, e)| e).unwrap();
    let mut phases = Vec::new();
    while !moving.is_complete() {
        let phase = moving.phase();
        if phases.last() != Some(&phase) {
            phases.push(phase);
        }
        moving.advance().unwrap();
    }
    assert_eq!(
        phases,
        vec![
            MotionPhase::Accelerating,
            MotionPhase::Cruising,
            MotionPhase::Decelerating
        ]
    );

    let motor = moving.finish();
    assert_eq!(motor.position_steps().value(), 1000);
    assert_eq!(motor.state_name(), "Idle");
}

#[test]
fn begin_rotate_angle_plans_fractional_move() {
    let (builder, _rig) = rig_builder(200);
    let mut motor = builder.build().unwrap();
    motor.begin(60, 16).unwrap();

    let moving = motor
        .begin_rotate_angle(Degrees(-45.0))
        .map_err(|(_, e)| e)
        .unwrap();
    assert_eq!(moving.profile().total_steps(), 400);
    assert_eq!(moving.steps_remaining(), 400);
    assert_eq!(moving.progress(), 0.0);
}

#[test]
fn abandoned_pulse_counts_toward_position() {
    let (builder, rig) = rig_builder(200);
    let mut motor = builder.build().unwrap();
    motor.begin(60, 1).unwrap();

    let mut moving = motor.begin_move(-5).map_err(|(_, e)| e).unwrap();
    moving.advance().unwrap();
    let motor = moving.finish();
    assert_eq!(rig.step_log.borrow().last().map(|(_, high)| *high), Some(false));

    let moving = motor.begin_move(5).map_err(|(_, e)| e).unwrap();
    let time = rig.time.clone();
    let motor = moving
        .run_to_completion(|| time.tick())
        .map_err(|(_, e)| e)
        .unwrap();

    // Physical position: one step reverse, then five forward.
    assert_eq!(rig.rising_edges().len(), 6);
    assert_eq!(motor.position_steps().value(), -1 + 5);
}

// =============================================================================
// Pin transactions
// =============================================================================

#[test]
fn begin_and_single_step_pin_sequence() {
    let step = PinMock::new(&[
        // begin
        PinTransaction::set(State::Low),
        // begin_move parks STEP
        PinTransaction::set(State::Low),
        PinTransaction::set(State::High),
        PinTransaction::set(State::Low),
    ]);
    let dir = PinMock::new(&[
        // begin
        PinTransaction::set(State::High),
        // begin_move
        PinTransaction::set(State::High),
        // before the rising edge
        PinTransaction::set(State::High),
    ]);
    let enable = PinMock::new(&[
        // begin: disable, then enable
        PinTransaction::set(State::High),
        PinTransaction::set(State::Low),
        // disable after the move
        PinTransaction::set(State::High),
    ]);

    let mut motor = StepperDriver::builder()
        .step_pin(step)
        .dir_pin(dir)
        .enable_pin(enable)
        .clock(|| 0u32)
        .steps_per_revolution(200)
        .build()
        .unwrap();
    motor.begin(60, 1).unwrap();

    let mut moving = motor.begin_move(1).map_err(|(_, e)| e).unwrap();
    assert_eq!(moving.advance().unwrap(), 1);
    assert_eq!(moving.advance().unwrap(), 4999);
    assert_eq!(moving.advance().unwrap(), 0);

    let mut motor = moving.finish();
    motor.disable().unwrap();

    let (mut step, mut dir, enable, _) = motor.release();
    step.done();
    dir.done();
    enable.expect("enable pin was set").done();
}

#[test]
fn no_enable_pin_makes_enable_a_no_op() {
    let step = PinMock::new(&[PinTransaction::set(State::Low)]);
    let dir = PinMock::new(&[PinTransaction::set(State::High)]);

    let mut motor = StepperDriver::builder()
        .step_pin(step)
        .dir_pin(dir)
        .clock(|| 0u32)
        .steps_per_revolution(200)
        .build()
        .unwrap();
    motor.begin(60, 1).unwrap();
    motor.enable().unwrap();
    motor.disable().unwrap();

    let (mut step, mut dir, enable, _) = motor.release();
    step.done();
    dir.done();
    assert!(enable.is_none());
}

// =============================================================================
// Configuration to driver
// =============================================================================

const CONFIG: &str = r#"
[motors.pan]
name = "Pan Axis"
steps_per_revolution = 200
microsteps = 16
rpm = 90
driver = "a4988"
invert_direction = true

[motors.pan.profile]
mode = "linear"
acceleration = 2000
deceleration = 800

[motors.tilt]
name = "Tilt Axis"
steps_per_revolution = 400
"#;

#[test]
fn driver_from_config() {
    let config = parse_config(CONFIG).expect("config should parse");
    let (builder, _rig) = rig_builder(1);
    let motor = builder.from_config(&config, "pan").unwrap().build().unwrap();

    assert_eq!(motor.name(), "Pan Axis");
    assert_eq!(motor.steps_per_revolution(), 200);
    assert_eq!(motor.microsteps(), Microsteps::SIXTEENTH);
    assert_eq!(motor.rpm(), 90);
    assert_eq!(motor.speed_mode(), SpeedMode::Linear);
    assert_eq!(motor.acceleration(), 2000);
    assert_eq!(motor.deceleration(), 800);
    assert_eq!(motor.capability().max(), Microsteps::SIXTEENTH);
}

#[test]
fn driver_capability_limits_set_microstep() {
    let config = parse_config(CONFIG).unwrap();
    let (builder, _rig) = rig_builder(1);
    let mut motor = builder.from_config(&config, "pan").unwrap().build().unwrap();

    // A4988 stops at 1/16.
    assert_eq!(motor.set_microstep(32), 16);
    assert_eq!(motor.set_microstep(4), 4);
}

#[test]
fn unknown_motor_name() {
    let config = parse_config(CONFIG).unwrap();
    let (builder, _rig) = rig_builder(1);
    let result = builder.from_config(&config, "zoom");
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::MotorNotFound(ref name))) if name.as_str() == "zoom"
    ));
}

#[test]
fn independent_motors_in_one_config() {
    let config = parse_config(CONFIG).unwrap();
    let mut names: Vec<_> = config.motor_names().collect();
    names.sort_unstable();
    assert_eq!(names, vec!["pan", "tilt"]);

    let tilt = config.motor("tilt").unwrap();
    assert_eq!(tilt.total_steps_per_revolution(), 400);
    assert_eq!(tilt.profile.mode, SpeedMode::Constant);
}

// =============================================================================
// Profile scenarios
// =============================================================================

#[test]
fn too_short_move_never_reaches_cruise() {
    let settings = linear_settings(120, 1000, 1000);
    let profile = MotionProfile::plan(100, &settings);

    // brake_raw = 100 * 1000 / 2000
    assert_eq!(profile.steps_to_cruise(), 50);
    assert_eq!(profile.steps_to_brake(), 50);

    let cruise = settings.cruise_pulse_us();
    assert!(step_widths(profile).iter().all(|&w| w > cruise));
}

#[test]
fn asymmetric_rates_stretch_braking() {
    let profile = MotionProfile::plan(1000, &linear_settings(120, 1000, 250));
    assert_eq!(profile.steps_to_cruise(), 80);
    assert_eq!(profile.steps_to_brake(), 320);
}

proptest! {
    #[test]
    fn planner_segments_fit_in_move(
        total in 1i64..200_000,
        rpm in 1u16..1000,
        accel in 1u16..=u16::MAX,
        decel in 1u16..=u16::MAX,
        exponent in 0u32..8,
    ) {
        let settings = ProfileSettings {
            microsteps: Microsteps::new(1 << exponent).unwrap(),
            ..linear_settings(rpm, accel, decel)
        };
        let profile = MotionProfile::plan(total, &settings);
        prop_assert!(profile.steps_to_cruise() + profile.steps_to_brake() <= total as u64);
        prop_assert!(profile.pulse_width_us() > 0);
    }

    #[test]
    fn linear_widths_follow_phases(
        total in 1i64..3000,
        rpm in 30u16..600,
        accel in 100u16..5000,
        decel in 100u16..5000,
        exponent in 0u32..5,
    ) {
        let settings = ProfileSettings {
            microsteps: Microsteps::new(1 << exponent).unwrap(),
            ..linear_settings(rpm, accel, decel)
        };
        let profile = MotionProfile::plan(total, &settings);
        let to_cruise = profile.steps_to_cruise() as usize;
        let to_brake = profile.steps_to_brake() as usize;
        let total = total as usize;
        let w = step_widths(profile);
        prop_assert_eq!(w.len(), total);

        // Step k runs on w[k]; the width changes only after accelerating
        // steps (1..=to_cruise) and braking steps.
        let accel_end = to_cruise.min(total - 1);
        prop_assert!(w[..=accel_end].windows(2).all(|p| p[1] <= p[0]));

        let brake_start = total - to_brake;
        if to_cruise < brake_start {
            prop_assert!(w[to_cruise..brake_start].windows(2).all(|p| p[1] == p[0]));
        }

        for k in brake_start.max(to_cruise + 1)..total {
            prop_assert!(w[k] >= w[k - 1], "step {}: {} < {}", k, w[k], w[k - 1]);
        }
    }

    #[test]
    fn opposite_moves_are_mirror_images(total in 1i64..3000, linear in any::<bool>()) {
        let mode = if linear { SpeedMode::Linear } else { SpeedMode::Constant };
        let settings = ProfileSettings { mode, ..linear_settings(120, 1000, 700) };

        let forward = MotionProfile::plan(total, &settings);
        let reverse = MotionProfile::plan(-total, &settings);
        prop_assert_ne!(forward.direction(), reverse.direction());
        prop_assert_eq!(step_widths(forward), step_widths(reverse));
    }

    #[test]
    fn one_falling_edge_per_step(total in 0i64..400, linear in any::<bool>()) {
        let (builder, rig) = rig_builder(200);
        let mut motor = builder.build().unwrap();
        motor.begin(600, 1).unwrap();
        if linear {
            motor.set_speed_profile(SpeedMode::Linear, 4000, 4000);
        }

        let mut moving = motor.begin_move(total).map_err(|(_, e)| e).unwrap();
        let mut edges = 0usize;
        while moving.advance().unwrap() != 0 {
            edges += 1;
        }
        prop_assert_eq!(edges, 2 * total as usize);
        prop_assert_eq!(rig.falling_edges(), total as usize);
        prop_assert_eq!(moving.finish().position_steps().value(), total);
    }
}
