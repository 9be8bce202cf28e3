//! Accumulation of streamed assistant output.
//!
//! The server delivers an assistant response as a run of delta frames
//! followed by one completion frame. This module owns the buffer for
//! the single in-progress response and decides when (and whether) it
//! becomes a finalized message.

use tracing::debug;

/// Two-state machine: `Idle` (no buffer) and `Accumulating` (buffer
/// present). At most one stream is open at a time; the protocol
/// carries no stream identifier, so overlapping streams cannot be
/// represented and are not supported.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    buffer: Option<String>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a delta in arrival order. The first delta after idle (or
    /// after a commit) opens a fresh buffer.
    pub fn push_delta(&mut self, delta: &str) {
        self.buffer.get_or_insert_with(String::new).push_str(delta);
    }

    /// End of stream. Returns the full accumulated text to commit, or
    /// `None` when there is nothing to finalize: a completion frame
    /// with no prior deltas is a no-op, not an error.
    pub fn finish(&mut self) -> Option<String> {
        match self.buffer.take() {
            Some(text) if !text.is_empty() => Some(text),
            Some(_) => {
                debug!("stream completed with an empty buffer, nothing to commit");
                None
            }
            None => {
                debug!("stream completion with no open stream, ignoring");
                None
            }
        }
    }

    /// The connection dropped mid-stream: discard the buffer without
    /// committing. A partial response is never promoted to final.
    /// Returns true if a partial was actually discarded.
    pub fn discard(&mut self) -> bool {
        self.buffer.take().is_some_and(|text| !text.is_empty())
    }

    /// The text streamed in so far, while a stream is open.
    pub fn partial(&self) -> Option<&str> {
        self.buffer.as_deref()
    }

    pub fn is_accumulating(&self) -> bool {
        self.buffer.is_some()
    }
}
