//! Scripted transport for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{ProtocolError, ProtocolResult};
use crate::transport::LineTransport;

/// Replays canned responses and records every line written.
///
/// Once the script runs out, every read times out.
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    replies: VecDeque<ProtocolResult<String>>,
    sent: Vec<String>,
    raise_after: Option<(usize, Arc<AtomicBool>)>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue a response line.
    pub(crate) fn reply(mut self, line: &str) -> Self {
        self.replies.push_back(Ok(line.to_string()));
        self
    }

    /// Queue a read that times out.
    pub(crate) fn timeout(mut self) -> Self {
        self.replies.push_back(Err(ProtocolError::Timeout));
        self
    }

    /// Raise `flag` once `lines` lines have been written.
    pub(crate) fn raise_after(mut self, lines: usize, flag: Arc<AtomicBool>) -> Self {
        self.raise_after = Some((lines, flag));
        self
    }

    /// Lines written so far, without terminators.
    pub(crate) fn sent(&self) -> &[String] {
        &self.sent
    }

    /// Number of times `line` was written.
    pub(crate) fn count(&self, line: &str) -> usize {
        self.sent.iter().filter(|sent| sent.as_str() == line).count()
    }
}

impl LineTransport for ScriptedTransport {
    fn write_line(&mut self, line: &str) -> ProtocolResult<()> {
        self.sent.push(line.to_string());
        if let Some((lines, flag)) = &self.raise_after {
            if self.sent.len() >= *lines {
                flag.store(true, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    fn read_line(&mut self) -> ProtocolResult<String> {
        self.replies
            .pop_front()
            .unwrap_or(Err(ProtocolError::Timeout))
    }
}
