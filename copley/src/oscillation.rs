//! Time-bounded oscillation between the start position and a bound.
//!
//! The run goes through four stages:
//!
//! ```text
//! Idle -> Configuring -> Oscillating -> Disabling -> Idle
//! ```
//!
//! **Configuring** loads the motion profile (acceleration, deceleration,
//! velocity), selects relative-move and programmed-position modes, waits the
//! settle delay, enables the drive and logs the event register.
//!
//! **Oscillating** captures the start position, sets `bound = start + delta`
//! and repeats a relative move of `delta` in the current direction. The
//! direction flips to reverse once a position reading is at or past the
//! bound, and back to forward once a reading is at or below the start. A
//! missing reading never flips. The loop ends when the run time has elapsed,
//! a command fails, or the stop flag is raised.
//!
//! The stop flag is also honoured while configuring: a raised flag skips the
//! rest of configuration and the drive is never enabled.
//!
//! **Disabling** happens exactly once per run whatever ended the previous
//! stage. A failure to disable is logged and not retried.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::MotionParams;
use crate::drive::{Direction, MotorController};
use crate::error::ProtocolError;
use crate::transport::LineTransport;

/// Reasons a run ended early.
#[derive(Error, Debug)]
pub enum OscillationError {
    /// A set or trigger command failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The start position could not be read, so no bound can be computed.
    #[error("Initial motor position unavailable")]
    PositionUnavailable,
}

/// How a run that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// The requested run time elapsed.
    Completed,
    /// The stop flag was raised.
    Interrupted,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunReport {
    /// Loop iterations executed (one move each)
    pub iterations: u64,
    /// Time spent oscillating
    pub elapsed: Duration,
    pub exit: RunExit,
}

/// Direction bookkeeping for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OscillationState {
    direction: Direction,
    initial_position: f64,
    bound: f64,
    started: Instant,
}

impl OscillationState {
    /// Start moving forward from `initial_position`.
    pub fn new(initial_position: f64, delta: f64) -> Self {
        Self {
            direction: Direction::Forward,
            initial_position,
            bound: initial_position + delta,
            started: Instant::now(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn initial_position(&self) -> f64 {
        self.initial_position
    }

    pub fn bound(&self) -> f64 {
        self.bound
    }

    /// Time since the state was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Update the direction from a position reading taken after a move.
    pub fn observe(&mut self, position: Option<f64>) -> Direction {
        if let Some(position) = position {
            match self.direction {
                Direction::Forward if position >= self.bound => {
                    self.direction = Direction::Reverse;
                }
                Direction::Reverse if position <= self.initial_position => {
                    self.direction = Direction::Forward;
                }
                _ => {}
            }
        }
        self.direction
    }
}

/// Runs the oscillation sequence on a borrowed drive.
pub struct OscillationController<'a, T> {
    drive: &'a mut MotorController<T>,
    stop: Arc<AtomicBool>,
}

impl<'a, T: LineTransport> OscillationController<'a, T> {
    /// `stop` is polled during configuration and between iterations;
    /// raising it ends the run.
    pub fn new(drive: &'a mut MotorController<T>, stop: Arc<AtomicBool>) -> Self {
        Self { drive, stop }
    }

    /// Configure, enable, oscillate, and always disable.
    ///
    /// Parameters must already be inside the motion envelope.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the run early. The drive has been sent
    /// the disable command by the time this returns, whether or not it
    /// acknowledged it.
    pub fn run(&mut self, params: &MotionParams) -> Result<RunReport, OscillationError> {
        info!("Starting oscillation: {params}");
        self.drive.telemetry();

        let result = match self.configure(params) {
            Ok(None) => self.oscillate(params.delta, params.duration()),
            Ok(Some(exit)) => Ok(RunReport {
                iterations: 0,
                elapsed: Duration::ZERO,
                exit,
            }),
            Err(e) => Err(e),
        };

        match &result {
            Ok(report) => info!(
                "Oscillation finished after {} moves in {:.2} s ({:?})",
                report.iterations,
                report.elapsed.as_secs_f64(),
                report.exit
            ),
            Err(e) => error!("Oscillation aborted: {e}"),
        }

        self.shutdown();
        result
    }

    /// Load the profile and enable the drive.
    ///
    /// Returns `Some(RunExit::Interrupted)` if the stop flag was raised
    /// before the drive was enabled.
    fn configure(&mut self, params: &MotionParams) -> Result<Option<RunExit>, OscillationError> {
        if self.stop_requested() {
            return Ok(Some(RunExit::Interrupted));
        }

        self.drive.set_profile_acceleration(params.acceleration)?;
        self.drive.set_profile_deceleration(params.deceleration)?;
        self.drive.set_profile_velocity(params.velocity)?;
        self.drive.set_mode_relative_move()?;
        self.drive.set_mode_programmed_position()?;

        if self.stop_requested() {
            return Ok(Some(RunExit::Interrupted));
        }
        std::thread::sleep(self.drive.settle_delay());
        if self.stop_requested() {
            return Ok(Some(RunExit::Interrupted));
        }

        self.drive.enable_drive()?;
        self.drive.get_event_register();
        Ok(None)
    }

    fn stop_requested(&self) -> bool {
        let stop = self.stop.load(Ordering::SeqCst);
        if stop {
            warn!("Interrupt detected, stopping oscillation");
        }
        stop
    }

    fn oscillate(
        &mut self,
        delta: f64,
        duration: Duration,
    ) -> Result<RunReport, OscillationError> {
        let initial_position = self
            .drive
            .get_motor_position()
            .ok_or(OscillationError::PositionUnavailable)?;
        let mut state = OscillationState::new(initial_position, delta);
        info!(
            "Oscillating between {:.5} and {:.5} for {:.2} s",
            state.initial_position(),
            state.bound(),
            duration.as_secs_f64()
        );

        let mut iterations = 0;
        let exit = loop {
            if self.stop_requested() {
                break RunExit::Interrupted;
            }

            self.drive.set_relative_move(delta, state.direction())?;
            self.drive.trigger_trajectory()?;
            let position = self.drive.get_motor_position();
            state.observe(position);
            iterations += 1;

            if state.elapsed() >= duration {
                break RunExit::Completed;
            }
        };

        Ok(RunReport {
            iterations,
            elapsed: state.elapsed(),
            exit,
        })
    }

    fn shutdown(&mut self) {
        match self.drive.disable_drive() {
            Ok(()) => info!("Drive disabled"),
            Err(e) => error!("Error occurred while disabling drive: {e}"),
        }
    }
}
