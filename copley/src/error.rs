//! Error types for the Copley ASCII link.

use thiserror::Error;

/// Errors that can occur while talking to the drive.
///
/// Covers the whole path from opening the port down to an unexpected reply.
/// Timeouts are reported separately from other I/O failures so callers can
/// tell a silent drive from a broken port.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Low-level I/O error (serial read/write failure).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The serial port could not be opened.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// No complete response line arrived within the timeout period.
    #[error("Timeout waiting for response")]
    Timeout,

    /// The drive answered, but not with the expected token.
    #[error("Unexpected response to `{command}`: {response:?}")]
    UnexpectedResponse {
        /// Command line as sent, without the terminator
        command: String,
        /// Raw response line, without the terminator
        response: String,
    },

    /// A `v` response carried a value that could not be parsed.
    #[error("Invalid value {value:?} read from {register}")]
    InvalidValue {
        /// Register token the value was read from
        register: String,
        /// The unparseable value token
        value: String,
    },
}

/// Result type for drive communication.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
