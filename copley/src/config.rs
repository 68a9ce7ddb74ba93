//! Drive configuration and motion envelope.
//!
//! [`DriveConfig`] describes the link and the unit scaling of one drive.
//! [`MotionEnvelope`] holds the actuator limits the operator-supplied
//! [`MotionParams`] are checked against before anything is written to the
//! drive.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Default serial device.
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Default baud rate of the drive's RS-232 port.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Read timeout for every response.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Device counts to physical units.
pub const DEFAULT_SCALE_FACTOR: f64 = 0.00625;

/// Pause after mode changes and after disabling the drive.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Conversion between raw device integers and physical units.
///
/// `physical = raw * factor` and `raw = round(physical / factor)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactor(f64);

impl ScaleFactor {
    /// The raw factor.
    pub fn factor(self) -> f64 {
        self.0
    }

    /// Physical value to the nearest device integer.
    pub fn to_raw(self, physical: f64) -> i64 {
        (physical / self.0).round() as i64
    }

    /// Device value to physical units.
    pub fn to_physical(self, raw: f64) -> f64 {
        raw * self.0
    }
}

impl Default for ScaleFactor {
    fn default() -> Self {
        Self(DEFAULT_SCALE_FACTOR)
    }
}

/// Everything needed to open and drive one controller.
#[derive(Debug, Clone, PartialEq)]
pub struct DriveConfig {
    /// Serial device name (`/dev/ttyUSB0`, `COM3`, ...)
    pub port: String,
    /// Serial baud rate
    pub baud_rate: u32,
    /// Maximum wait for each response line
    pub timeout: Duration,
    /// Unit conversion for positions, velocities and accelerations
    pub scale: ScaleFactor,
    /// Delay after mode selection and after disabling the drive
    pub settle_delay: Duration,
}

impl DriveConfig {
    /// Default configuration for the given port.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
            scale: ScaleFactor::default(),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PORT)
    }
}

/// The five operator-supplied motion parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::Display)]
pub enum Parameter {
    #[strum(serialize = "VELOCITY")]
    Velocity,
    #[strum(serialize = "ACCELERATION")]
    Acceleration,
    #[strum(serialize = "DECELERATION")]
    Deceleration,
    #[strum(serialize = "DESIRED_TIME")]
    DesiredTime,
    #[strum(serialize = "DELTA")]
    Delta,
}

impl Parameter {
    /// Unit label shown to the operator.
    pub fn unit(self) -> &'static str {
        match self {
            Parameter::DesiredTime => "s",
            _ => "Units",
        }
    }
}

/// Value outside the motion envelope.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnvelopeError {
    #[error("{parameter} must be between 0 and {max:.3}, got {value}")]
    OutOfRange {
        parameter: Parameter,
        value: f64,
        max: f64,
    },
}

/// Actuator limits. Defaults are for the STA1112 linear servo tube.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionEnvelope {
    /// Maximum profile velocity (units)
    pub max_velocity: f64,
    /// Maximum profile acceleration (units)
    pub max_acceleration: f64,
    /// Maximum profile deceleration (units)
    pub max_deceleration: f64,
    /// Maximum run time (seconds)
    pub max_run_time: f64,
    /// Maximum relative move (units)
    pub max_delta: f64,
    /// Velocity units to m/s, after scaling
    pub cap_factor: f64,
    /// Seconds to drive time units
    pub time_factor: f64,
}

impl Default for MotionEnvelope {
    fn default() -> Self {
        Self {
            max_velocity: 5.4 / DEFAULT_SCALE_FACTOR,
            max_acceleration: 100.0,
            max_deceleration: 100.0,
            max_run_time: 100_000.0,
            max_delta: 300.0,
            cap_factor: 0.05088,
            time_factor: 12.5,
        }
    }
}

impl MotionEnvelope {
    /// Upper bound for a parameter; the lower bound is always zero.
    pub fn max(&self, parameter: Parameter) -> f64 {
        match parameter {
            Parameter::Velocity => self.max_velocity,
            Parameter::Acceleration => self.max_acceleration,
            Parameter::Deceleration => self.max_deceleration,
            Parameter::DesiredTime => self.max_run_time,
            Parameter::Delta => self.max_delta,
        }
    }

    /// Check one value against `[0, max]`. NaN is rejected.
    pub fn check(&self, parameter: Parameter, value: f64) -> Result<f64, EnvelopeError> {
        let max = self.max(parameter);
        if (0.0..=max).contains(&value) {
            Ok(value)
        } else {
            Err(EnvelopeError::OutOfRange {
                parameter,
                value,
                max,
            })
        }
    }
}

/// Validated inputs for one oscillation run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionParams {
    pub velocity: f64,
    pub acceleration: f64,
    pub deceleration: f64,
    /// Run time in seconds
    pub desired_time: f64,
    /// Relative move per stroke
    pub delta: f64,
}

impl MotionParams {
    /// Value of a single parameter.
    pub fn get(&self, parameter: Parameter) -> f64 {
        match parameter {
            Parameter::Velocity => self.velocity,
            Parameter::Acceleration => self.acceleration,
            Parameter::Deceleration => self.deceleration,
            Parameter::DesiredTime => self.desired_time,
            Parameter::Delta => self.delta,
        }
    }

    /// Check every parameter against the envelope.
    pub fn validate(&self, envelope: &MotionEnvelope) -> Result<(), EnvelopeError> {
        use strum::IntoEnumIterator;

        for parameter in Parameter::iter() {
            envelope.check(parameter, self.get(parameter))?;
        }
        Ok(())
    }

    /// Run time as a [`Duration`].
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.desired_time.max(0.0))
    }
}

impl fmt::Display for MotionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "velocity={:.3} acceleration={:.3} deceleration={:.3} time={:.3}s delta={:.3}",
            self.velocity, self.acceleration, self.deceleration, self.desired_time, self.delta
        )
    }
}
