//! Copley register map and ASCII command grammar.
//!
//! The drive exposes its parameters as numbered registers addressed with
//! tokens like `r0xCA`. Three command forms are used:
//!
//! ```text
//! s r0xCB 16000    set register 0xCB to 16000
//! g r0x32          get register 0x32
//! t 1              trigger a trajectory with the current profile
//! ```
//!
//! The register list below is the single place that must agree with the
//! drive's firmware documentation.

use std::fmt;

/// Registers used by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::Display)]
#[repr(u16)]
pub enum Register {
    /// Load encoder position (counts)
    LoadPosition = 0x17,
    /// Desired drive state; 0 disables, 21 enables the trajectory generator
    DesiredState = 0x24,
    /// Motor encoder position (counts)
    MotorPosition = 0x32,
    /// Difference between commanded and actual position (counts)
    FollowingError = 0x35,
    /// Latched event status bits, see [`EventStatus`](crate::EventStatus)
    EventStatus = 0xA0,
    /// Programmed position mode selector
    ProgrammedPositionMode = 0xC4,
    /// Trajectory profile type; 256 selects relative moves
    ProfileMode = 0xC8,
    /// Trajectory generator status bits
    TrajectoryStatus = 0xC9,
    /// Relative move distance (counts)
    TrajectoryDistance = 0xCA,
    /// Profile maximum velocity
    ProfileVelocity = 0xCB,
    /// Profile maximum acceleration
    ProfileAcceleration = 0xCC,
    /// Profile maximum deceleration
    ProfileDeceleration = 0xCD,
}

impl Register {
    /// Numeric register address.
    pub fn address(self) -> u16 {
        self as u16
    }

    /// Register token as it appears on the wire, e.g. `r0xCA`.
    pub fn token(self) -> String {
        format!("r0x{:02X}", self.address())
    }
}

/// A single request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `s <reg> <value>`
    Set(Register, i64),
    /// `g <reg>`
    Get(Register),
    /// `t 1`
    Trigger,
}

impl Command {
    /// Encode the command as a request line, without the terminator.
    pub fn encode(&self) -> String {
        match self {
            Command::Set(register, value) => format!("s {} {value}", register.token()),
            Command::Get(register) => format!("g {}", register.token()),
            Command::Trigger => "t 1".to_string(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Classified response line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response<'a> {
    /// `ok`
    Ok,
    /// `k`, the short acknowledgement older firmware sends for `s`
    LegacyOk,
    /// `v <token>`
    Value(&'a str),
    /// Anything else, including an empty line
    Other(&'a str),
}

impl<'a> Response<'a> {
    /// Classify a response line (terminator already stripped).
    pub fn classify(line: &'a str) -> Self {
        match line {
            "ok" => Response::Ok,
            "k" => Response::LegacyOk,
            _ => match line
                .strip_prefix("v ")
                .and_then(|rest| rest.split_whitespace().next())
            {
                Some(value) => Response::Value(value),
                None => Response::Other(line),
            },
        }
    }
}
