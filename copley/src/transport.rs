//! Line-oriented serial transport.
//!
//! The drive speaks a half-duplex request/response protocol: every request
//! is one line terminated with a carriage return (`\r`), and the drive
//! answers each request with exactly one `\r`-terminated line. There are
//! no sequence numbers, so responses are matched to requests purely by
//! ordering.
//!
//! [`LineTransport`] is the seam the protocol layer talks through;
//! [`SerialTransport`] implements it over any byte stream, normally a
//! [`serialport::SerialPort`].

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use serialport::SerialPort;
use tracing::{debug, trace};

use crate::config::DriveConfig;
use crate::error::{ProtocolError, ProtocolResult};

/// Line terminator used in both directions.
pub const TERMINATOR: u8 = b'\r';

/// Request/response line channel to the drive.
pub trait LineTransport {
    /// Write one line, appending the terminator.
    fn write_line(&mut self, line: &str) -> ProtocolResult<()>;

    /// Read one complete line with the terminator stripped.
    ///
    /// Must never return a partial line: a line that is not terminated
    /// before the timeout is an error.
    fn read_line(&mut self) -> ProtocolResult<String>;
}

/// Byte stream whose blocking read can be bounded.
///
/// [`SerialTransport`] shrinks the bound before every read so that a slow
/// trickle of bytes cannot stretch one response past the line timeout.
pub trait TimedStream: Read + Write {
    /// Limit how long the next `read` may block.
    fn set_read_timeout(&mut self, timeout: Duration) -> std::io::Result<()>;
}

impl TimedStream for Box<dyn SerialPort> {
    fn set_read_timeout(&mut self, timeout: Duration) -> std::io::Result<()> {
        self.set_timeout(timeout).map_err(std::io::Error::from)
    }
}

/// [`LineTransport`] over a byte stream with a fixed read timeout.
///
/// The stream is owned for the lifetime of the transport; dropping the
/// transport closes the port.
pub struct SerialTransport<S> {
    stream: S,
    timeout: Duration,
}

impl SerialTransport<Box<dyn SerialPort>> {
    /// Open the serial port named in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Connection`] if the port does not exist or is
    /// already claimed by another process. No retry is attempted.
    pub fn open(config: &DriveConfig) -> ProtocolResult<Self> {
        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(config.timeout)
            .open()
            .map_err(|e| {
                ProtocolError::Connection(format!("Failed to open {}: {e}", config.port))
            })?;

        debug!(
            "Opened {} at {} baud (timeout {:?})",
            config.port, config.baud_rate, config.timeout
        );

        Ok(Self::new(port, config.timeout))
    }
}

impl<S: TimedStream> SerialTransport<S> {
    /// Wrap an already-open stream.
    pub fn new(stream: S, timeout: Duration) -> Self {
        Self { stream, timeout }
    }

    /// Release the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S: TimedStream> LineTransport for SerialTransport<S> {
    fn write_line(&mut self, line: &str) -> ProtocolResult<()> {
        let mut msg = Vec::with_capacity(line.len() + 1);
        msg.extend_from_slice(line.as_bytes());
        msg.push(TERMINATOR);

        debug!("send: {:?}", line);
        self.stream.write_all(&msg)?;
        self.stream.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> ProtocolResult<String> {
        let deadline = Instant::now() + self.timeout;
        let mut buf = [0u8; 1];
        let mut bytes = Vec::new();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ProtocolError::Timeout);
            }
            self.stream.set_read_timeout(remaining)?;

            match self.stream.read(&mut buf) {
                Ok(0) => return Err(ProtocolError::Timeout),
                Ok(_) => {
                    if buf[0] == TERMINATOR {
                        break;
                    }
                    bytes.push(buf[0]);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::TimedOut => {
                    return Err(ProtocolError::Timeout);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    return Err(ProtocolError::Timeout);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let response = String::from_utf8_lossy(&bytes).into_owned();
        trace!("recv: {:?}", response);
        Ok(response)
    }
}
