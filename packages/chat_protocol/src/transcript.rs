//! The append-only log of finalized messages.

use serde::{Deserialize, Serialize};

use crate::frame::FrameKind;

/// Who a finalized message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    User,
    Assistant,
    System,
    Error,
}

impl From<&FrameKind> for Origin {
    fn from(kind: &FrameKind) -> Self {
        match kind {
            FrameKind::User => Origin::User,
            FrameKind::Ai => Origin::Assistant,
            FrameKind::Error => Origin::Error,
            // Unknown server-side kinds render like system notices.
            FrameKind::System | FrameKind::Other(_) => Origin::System,
        }
    }
}

/// One finalized entry. Immutable once appended; `sequence` is the
/// position assigned by the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub origin: Origin,
    pub content: String,
    pub sequence: u64,
}

/// Ordered, append-only message log. Insertion order is sequence
/// order; entries are never reordered or truncated short of a full
/// session reset.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finalized message, assigning the next sequence number.
    pub fn push(&mut self, origin: Origin, content: impl Into<String>) -> &Message {
        let message = Message {
            origin,
            content: content.into(),
            sequence: self.messages.len() as u64,
        };
        self.messages.push(message);
        self.messages.last().expect("just pushed")
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// An owned, immutable view of the transcript plus the currently
    /// streaming partial (if a stream is open).
    pub fn snapshot(&self, streaming: Option<&str>) -> ChatSnapshot {
        ChatSnapshot {
            messages: self.messages.clone(),
            streaming: streaming.map(str::to_string),
        }
    }

    /// Session boundary only: drop everything, sequence restarts at 0.
    pub fn reset(&mut self) {
        self.messages.clear();
    }
}

/// What the presentation layer reads: the finalized log plus the text
/// of the in-progress assistant response, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSnapshot {
    pub messages: Vec<Message>,
    pub streaming: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_assigns_monotonic_sequences() {
        let mut transcript = Transcript::new();
        transcript.push(Origin::User, "one");
        transcript.push(Origin::Assistant, "two");
        transcript.push(Origin::System, "three");

        let sequences: Vec<u64> = transcript.messages().iter().map(|m| m.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }

    #[test]
    fn snapshot_preserves_append_order() {
        let mut transcript = Transcript::new();
        for i in 0..10 {
            transcript.push(Origin::User, format!("message {i}"));
        }
        let snapshot = transcript.snapshot(None);
        assert_eq!(snapshot.messages.len(), 10);
        for (i, message) in snapshot.messages.iter().enumerate() {
            assert_eq!(message.content, format!("message {i}"));
            assert_eq!(message.sequence, i as u64);
        }
        assert_eq!(snapshot.streaming, None);
    }

    #[test]
    fn snapshot_carries_the_streaming_partial() {
        let mut transcript = Transcript::new();
        transcript.push(Origin::User, "q");
        let snapshot = transcript.snapshot(Some("thinking ab"));
        assert_eq!(snapshot.streaming.as_deref(), Some("thinking ab"));
        // The partial is not a transcript entry.
        assert_eq!(snapshot.messages.len(), 1);
    }

    #[test]
    fn snapshot_is_detached_from_later_appends() {
        let mut transcript = Transcript::new();
        transcript.push(Origin::User, "before");
        let snapshot = transcript.snapshot(None);
        transcript.push(Origin::Error, "after");
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn reset_clears_and_restarts_sequencing() {
        let mut transcript = Transcript::new();
        transcript.push(Origin::User, "old");
        transcript.reset();
        assert!(transcript.is_empty());
        let message = transcript.push(Origin::User, "new").clone();
        assert_eq!(message.sequence, 0);
    }

    #[test]
    fn origins_map_from_frame_kinds() {
        assert_eq!(Origin::from(&FrameKind::Ai), Origin::Assistant);
        assert_eq!(Origin::from(&FrameKind::Error), Origin::Error);
        assert_eq!(
            Origin::from(&FrameKind::Other("announcement".to_string())),
            Origin::System
        );
    }
}
