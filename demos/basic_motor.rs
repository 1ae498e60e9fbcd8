//! Basic motor control example.
//!
//! Builds a driver from TOML configuration, prints the planned profile, then
//! runs a blocking move and a cooperative move against console pins.
//!
//! Run with `cargo run --example basic_motor`.

use stepper_pulse::{
    clock::StdClock,
    motion::{MotionProfile, SpeedMode},
    StepperDriver,
};

/// Output pin that counts rising edges.
struct MockPin {
    state: bool,
    rising: u32,
}

impl MockPin {
    fn new() -> Self {
        Self {
            state: false,
            rising: 0,
        }
    }
}

impl embedded_hal::digital::OutputPin for MockPin {
    fn set_high(&mut self) -> Result<(), Self::Error> {
        if !self.state {
            self.rising += 1;
        }
        self.state = true;
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.state = false;
        Ok(())
    }
}

impl embedded_hal::digital::ErrorType for MockPin {
    type Error = core::convert::Infallible;
}

fn main() -> Result<(), stepper_pulse::Error> {
    println!("=== Basic Motor Control Example ===\n");

    let toml_content = r#"
[motors.demo]
name = "demo_motor"
steps_per_revolution = 200
microsteps = 16
rpm = 120
driver = "drv8825"

[motors.demo.profile]
mode = "linear"
acceleration = 1000
deceleration = 500
"#;

    let config = stepper_pulse::parse_config(toml_content)?;
    println!("Loaded configuration with {} motor(s)", config.motors.len());

    let mut motor = StepperDriver::builder()
        .step_pin(MockPin::new())
        .dir_pin(MockPin::new())
        .clock(StdClock::new())
        .from_config(&config, "demo")?
        .build()?;

    println!("Motor created: {} ({})", motor.name(), motor.state_name());

    let steps = motor.steps_for_rotation(360);
    let profile = MotionProfile::plan(steps, &motor.settings());

    println!("\n=== Motion Profile ===");
    println!("Total steps: {}", profile.total_steps());
    println!("Direction: {:?}", profile.direction());
    println!("Acceleration phase: {} steps", profile.steps_to_cruise());
    println!("Deceleration phase: {} steps", profile.steps_to_brake());
    println!("Initial pulse: {} us", profile.pulse_width_us());
    println!("Cruise pulse: {} us", motor.settings().cruise_pulse_us());
    println!(
        "Estimated duration: {:.3} seconds",
        motor.estimate_duration(steps) as f64 / 1e6
    );

    println!("\n=== Blocking move ===");
    motor.begin(120, 16)?;
    let started = std::time::Instant::now();
    motor.rotate(90)?;
    println!(
        "Rotated to {:.1} degrees in {:.3} seconds",
        motor.position_degrees().value(),
        started.elapsed().as_secs_f64()
    );

    println!("\n=== Cooperative move ===");
    motor.set_speed_profile(SpeedMode::Constant, 0, 0);
    let mut moving = motor.begin_rotate(-90).map_err(|(_, e)| e)?;
    let mut edges = 0u32;
    loop {
        let wait_us = moving.advance()?;
        if wait_us == 0 {
            break;
        }
        edges += 1;
        std::thread::sleep(std::time::Duration::from_micros(u64::from(wait_us)));
    }
    let motor = moving.finish();
    println!(
        "{} edges, back at {:.1} degrees",
        edges,
        motor.position_degrees().value()
    );

    let (step, _, _, _) = motor.release();
    println!("\nTotal STEP pulses: {}", step.rising);

    println!("\n=== Example Complete ===");
    Ok(())
}
