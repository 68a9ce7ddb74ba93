//! Register read/write protocol.
//!
//! Wraps a [`LineTransport`] with the drive's three request forms. Each
//! method sends exactly one line and reads exactly one line back; there is
//! never more than one command in flight.
//!
//! | Request            | Success        | Anything else                       |
//! |--------------------|----------------|-------------------------------------|
//! | `s <reg> <value>`  | `ok` (or `k`)  | [`ProtocolError::UnexpectedResponse`] |
//! | `g <reg>`          | `v <value>`    | [`ProtocolError::UnexpectedResponse`] |
//! | `t 1`              | `ok`           | [`ProtocolError::UnexpectedResponse`] |
//!
//! Errors are always returned to the caller; deciding whether a failure is
//! fatal is the job of [`MotorController`](crate::MotorController).

use tracing::debug;

use crate::error::{ProtocolError, ProtocolResult};
use crate::register::{Command, Register, Response};
use crate::transport::LineTransport;

/// Synchronous register protocol over a line transport.
pub struct RegisterProtocol<T> {
    transport: T,
}

impl<T: LineTransport> RegisterProtocol<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Borrow the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send one command and return its response line.
    fn exchange(&mut self, command: &Command) -> ProtocolResult<(String, String)> {
        let line = command.encode();
        self.transport.write_line(&line)?;
        let response = self.transport.read_line()?;
        debug!("{} -> {:?}", line, response);
        Ok((line, response))
    }

    /// Write `value` to `register`.
    ///
    /// Accepts `ok` and the legacy single-character `k` acknowledgement.
    pub fn set_register(&mut self, register: Register, value: i64) -> ProtocolResult<()> {
        let (command, response) = self.exchange(&Command::Set(register, value))?;
        match Response::classify(&response) {
            Response::Ok | Response::LegacyOk => Ok(()),
            _ => Err(ProtocolError::UnexpectedResponse { command, response }),
        }
    }

    /// Read `register` and return the value token after `v `.
    pub fn get_register(&mut self, register: Register) -> ProtocolResult<String> {
        let (command, response) = self.exchange(&Command::Get(register))?;
        match Response::classify(&response) {
            Response::Value(value) => Ok(value.to_string()),
            _ => Err(ProtocolError::UnexpectedResponse { command, response }),
        }
    }

    /// Start a trajectory with the currently loaded profile (`t 1`).
    pub fn trigger(&mut self) -> ProtocolResult<()> {
        let (command, response) = self.exchange(&Command::Trigger)?;
        match Response::classify(&response) {
            Response::Ok => Ok(()),
            _ => Err(ProtocolError::UnexpectedResponse { command, response }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;

    fn protocol(transport: ScriptedTransport) -> RegisterProtocol<ScriptedTransport> {
        RegisterProtocol::new(transport)
    }

    #[test]
    fn test_set_accepts_ok_and_legacy_k() {
        let mut p = protocol(ScriptedTransport::new().reply("ok").reply("k"));
        p.set_register(Register::ProfileVelocity, 1600).unwrap();
        p.set_register(Register::DesiredState, 0).unwrap();
        assert_eq!(
            p.transport().sent(),
            ["s r0xCB 1600", "s r0x24 0"]
        );
    }

    #[test]
    fn test_set_rejects_everything_else() {
        for bad in ["e 12", "", "OK", "okay", "v 1", " ok", "kk"] {
            let mut p = protocol(ScriptedTransport::new().reply(bad));
            match p.set_register(Register::ProfileVelocity, 5) {
                Err(ProtocolError::UnexpectedResponse { command, response }) => {
                    assert_eq!(command, "s r0xCB 5");
                    assert_eq!(response, bad);
                }
                other => panic!("expected UnexpectedResponse for {bad:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_get_returns_value_token() {
        let mut p = protocol(ScriptedTransport::new().reply("v 1234"));
        assert_eq!(p.get_register(Register::MotorPosition).unwrap(), "1234");
        assert_eq!(p.transport().sent(), ["g r0x32"]);
    }

    #[test]
    fn test_get_rejects_error_response() {
        let mut p = protocol(ScriptedTransport::new().reply("e bad"));
        assert!(matches!(
            p.get_register(Register::MotorPosition),
            Err(ProtocolError::UnexpectedResponse { .. })
        ));
    }

    #[test]
    fn test_get_rejects_empty_response() {
        let mut p = protocol(ScriptedTransport::new().reply(""));
        assert!(matches!(
            p.get_register(Register::MotorPosition),
            Err(ProtocolError::UnexpectedResponse { .. })
        ));
    }

    #[test]
    fn test_trigger_requires_ok() {
        let mut p = protocol(ScriptedTransport::new().reply("ok").reply("k"));
        p.trigger().unwrap();
        assert!(matches!(
            p.trigger(),
            Err(ProtocolError::UnexpectedResponse { .. })
        ));
        assert_eq!(p.transport().sent(), ["t 1", "t 1"]);
    }

    #[test]
    fn test_timeout_propagates() {
        let mut p = protocol(ScriptedTransport::new());
        assert!(matches!(
            p.set_register(Register::ProfileMode, 256),
            Err(ProtocolError::Timeout)
        ));
        assert!(matches!(
            p.get_register(Register::EventStatus),
            Err(ProtocolError::Timeout)
        ));
    }
}
