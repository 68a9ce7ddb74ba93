//! Driver for single-axis Copley servo drives on an ASCII serial link.
//!
//! The crate is layered from the wire up:
//!
//! - [`transport`] - `\r`-delimited request/response lines over a serial port
//! - [`register`] - the register map and the `s`/`g`/`t` command grammar
//! - [`protocol`] - typed register reads and writes with response checking
//! - [`drive`] - unit-scaled motor operations with a per-operation error policy
//! - [`oscillation`] - the time-bounded back-and-forth motion routine
//!
//! [`config`] holds the link settings and the motion envelope operator input
//! is validated against.

pub mod config;
pub mod drive;
pub mod error;
pub mod event;
pub mod oscillation;
pub mod protocol;
pub mod register;
pub mod transport;

#[cfg(test)]
mod testing;

pub use config::{
    DriveConfig, EnvelopeError, MotionEnvelope, MotionParams, Parameter, ScaleFactor,
    DEFAULT_BAUD_RATE, DEFAULT_PORT,
};
pub use drive::{Direction, MotorController, Telemetry};
pub use error::{ProtocolError, ProtocolResult};
pub use event::EventStatus;
pub use oscillation::{
    OscillationController, OscillationError, OscillationState, RunExit, RunReport,
};
pub use protocol::RegisterProtocol;
pub use register::{Command, Register, Response};
pub use transport::{LineTransport, SerialTransport, TimedStream};
