//! Oscillate a Copley servo axis for a fixed time.
//!
//! Motion parameters may be given positionally, as flags (flags win), or
//! typed in at a prompt when any are missing:
//!
//! ```text
//! oscillate 500 50 50 60 100 --port /dev/ttyUSB0
//! oscillate -v 500 -a 50 -d 50 -t 60 --delta 100
//! ```
//!
//! Ctrl+C stops the motion after the current move and disables the drive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use copley::{
    DriveConfig, MotionEnvelope, MotionParams, MotorController, OscillationController, Parameter,
    ScaleFactor, DEFAULT_BAUD_RATE, DEFAULT_PORT,
};
use rustyline::DefaultEditor;
use tracing::{info, warn};

/// Copley single-axis oscillation
#[derive(Parser, Debug)]
#[command(name = "oscillate")]
#[command(about = "Oscillate a Copley servo axis between its start position and start + DELTA")]
#[command(version)]
struct Args {
    /// Motor velocity (units)
    #[arg(value_name = "VELOCITY")]
    velocity_pos: Option<f64>,

    /// Motor acceleration (units)
    #[arg(value_name = "ACCELERATION")]
    acceleration_pos: Option<f64>,

    /// Motor deceleration (units)
    #[arg(value_name = "DECELERATION")]
    deceleration_pos: Option<f64>,

    /// Run time in seconds
    #[arg(value_name = "DESIRED_TIME")]
    desired_time_pos: Option<f64>,

    /// Stroke length (units)
    #[arg(value_name = "DELTA")]
    delta_pos: Option<f64>,

    /// Motor velocity (units)
    #[arg(short, long)]
    velocity: Option<f64>,

    /// Motor acceleration (units)
    #[arg(short, long)]
    acceleration: Option<f64>,

    /// Motor deceleration (units)
    #[arg(short, long)]
    deceleration: Option<f64>,

    /// Run time in seconds
    #[arg(short = 't', long)]
    desired_time: Option<f64>,

    /// Stroke length (units)
    #[arg(long)]
    delta: Option<f64>,

    /// Serial port the drive is connected to
    #[arg(long, default_value = DEFAULT_PORT)]
    port: String,

    /// Serial baud rate
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,
}

impl Args {
    /// Value for a parameter, preferring the flag over the positional form.
    fn value(&self, parameter: Parameter) -> Option<f64> {
        match parameter {
            Parameter::Velocity => self.velocity.or(self.velocity_pos),
            Parameter::Acceleration => self.acceleration.or(self.acceleration_pos),
            Parameter::Deceleration => self.deceleration.or(self.deceleration_pos),
            Parameter::DesiredTime => self.desired_time.or(self.desired_time_pos),
            Parameter::Delta => self.delta.or(self.delta_pos),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let envelope = MotionEnvelope::default();

    let config = DriveConfig::new(&args.port).with_baud_rate(args.baud);

    let params = collect_params(&args, &envelope)?;
    params.validate(&envelope)?;
    print_params(&params, &envelope, config.scale);

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl+C handler")?;

    let mut drive = MotorController::open(&config)?;

    let report = OscillationController::new(&mut drive, stop).run(&params)?;
    info!(
        "Elapsed time: {:.2} seconds ({} moves)",
        report.elapsed.as_secs_f64(),
        report.iterations
    );
    Ok(())
}

/// Take values from the command line, prompting for any that are missing.
fn collect_params(args: &Args, envelope: &MotionEnvelope) -> Result<MotionParams> {
    // Created on the first missing value only.
    let mut editor: Option<DefaultEditor> = None;

    let mut value_of = |parameter| -> Result<f64> {
        if let Some(value) = args.value(parameter) {
            return Ok(value);
        }
        let mut active = match editor.take() {
            Some(active) => active,
            None => DefaultEditor::new()?,
        };
        let value = prompt(&mut active, parameter, envelope);
        editor = Some(active);
        value
    };

    Ok(MotionParams {
        velocity: value_of(Parameter::Velocity)?,
        acceleration: value_of(Parameter::Acceleration)?,
        deceleration: value_of(Parameter::Deceleration)?,
        desired_time: value_of(Parameter::DesiredTime)?,
        delta: value_of(Parameter::Delta)?,
    })
}

/// Ask until the operator enters a number inside the envelope.
fn prompt(
    editor: &mut DefaultEditor,
    parameter: Parameter,
    envelope: &MotionEnvelope,
) -> Result<f64> {
    let max = envelope.max(parameter);
    let text = format!(" Motor {parameter} (0 - {max:.3} {}): ", parameter.unit());

    loop {
        let line = editor.readline(&text)?;
        match line.trim().parse::<f64>() {
            Ok(value) => match envelope.check(parameter, value) {
                Ok(value) => return Ok(value),
                Err(e) => warn!("Invalid input: {e}"),
            },
            Err(_) => warn!("Invalid input: enter a number between 0 and {max:.3}"),
        }
    }
}

fn print_params(params: &MotionParams, envelope: &MotionEnvelope, scale: ScaleFactor) {
    let scale = scale.factor();
    println!(
        " VELOCITY set to: {:.3} m/s ({:.3} Units)",
        params.velocity * scale * envelope.cap_factor,
        params.velocity
    );
    println!(
        " ACCELERATION set to: {:.3} m/s2 ({:.3} Units)",
        params.acceleration * scale,
        params.acceleration
    );
    println!(
        " DECELERATION set to: {:.3} m/s2 ({:.3} Units)",
        params.deceleration * scale,
        params.deceleration
    );
    println!(
        " TIME set to: {:.3} seconds ({} Units)",
        params.desired_time,
        (params.desired_time * envelope.time_factor) as i64
    );
    println!(" DELTA set to: {:.3} Units", params.delta);
}
