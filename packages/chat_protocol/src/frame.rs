//! Wire frames for the chat socket.
//!
//! One JSON object per text frame, in both directions:
//! `{ "type": "...", "content": "...", "sender": "...", "isStream": bool? }`.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// The `type` field of a frame. The server is free to introduce new
/// values, so unknown strings are preserved rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    User,
    Ai,
    System,
    Error,
    #[serde(untagged)]
    Other(String),
}

/// One JSON text frame on the chat socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub kind: FrameKind,
    pub content: String,
    pub sender: String,
    /// Present and true on assistant delta frames; absent/false on the
    /// completion frame and on standalone messages.
    #[serde(rename = "isStream", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_stream: bool,
}

impl Frame {
    /// Build an outbound user frame.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::User,
            content: content.into(),
            sender: "user".to_string(),
            is_stream: false,
        }
    }

    /// Parse a raw text frame. A frame missing required fields or
    /// carrying non-JSON is a [`ProtocolError`]; the caller drops it
    /// and keeps the connection open.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize for transmission.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decide what an inbound frame means for the session.
    ///
    /// Only `ai` frames participate in streaming. The completion frame
    /// deliberately discards its own `content`: the committed message
    /// is whatever the accumulator buffered, never this payload.
    pub fn classify(self) -> ClassifiedFrame {
        match self.kind {
            FrameKind::Ai if self.is_stream => ClassifiedFrame::StreamingDelta(self.content),
            FrameKind::Ai => ClassifiedFrame::StreamFinal,
            kind => ClassifiedFrame::Standalone {
                kind,
                content: self.content,
                sender: self.sender,
            },
        }
    }
}

/// An inbound frame after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedFrame {
    /// A partial chunk of the in-progress assistant response.
    StreamingDelta(String),
    /// The stream is complete; commit whatever was accumulated.
    StreamFinal,
    /// A complete, non-streamed message delivered in one frame.
    Standalone {
        kind: FrameKind,
        content: String,
        sender: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_frame_serde() {
        let frame = Frame::user("hello");
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "user");
        assert_eq!(json["content"], "hello");
        assert_eq!(json["sender"], "user");
        // isStream omitted when false
        assert!(json.get("isStream").is_none());
    }

    #[test]
    fn ai_delta_classifies_as_streaming() {
        let frame =
            Frame::decode(r#"{"type":"ai","content":"Hel","sender":"ai","isStream":true}"#)
                .unwrap();
        assert_eq!(
            frame.classify(),
            ClassifiedFrame::StreamingDelta("Hel".to_string())
        );
    }

    #[test]
    fn ai_final_ignores_its_content() {
        // The Go server sends an empty content on the completion frame,
        // but even a non-empty one must not leak into the commit.
        let frame =
            Frame::decode(r#"{"type":"ai","content":"ignored","sender":"ai","isStream":false}"#)
                .unwrap();
        assert_eq!(frame.classify(), ClassifiedFrame::StreamFinal);
    }

    #[test]
    fn ai_without_is_stream_is_final() {
        let frame = Frame::decode(r#"{"type":"ai","content":"","sender":"ai"}"#).unwrap();
        assert_eq!(frame.classify(), ClassifiedFrame::StreamFinal);
    }

    #[test]
    fn system_frame_is_standalone() {
        let frame = Frame::decode(
            r#"{"type":"system","content":"Welcome to Financial Planner AI!","sender":"system"}"#,
        )
        .unwrap();
        assert_eq!(
            frame.classify(),
            ClassifiedFrame::Standalone {
                kind: FrameKind::System,
                content: "Welcome to Financial Planner AI!".to_string(),
                sender: "system".to_string(),
            }
        );
    }

    #[test]
    fn unknown_kind_is_preserved_and_standalone() {
        let frame =
            Frame::decode(r#"{"type":"user-echo","content":"hi","sender":"server"}"#).unwrap();
        assert_eq!(frame.kind, FrameKind::Other("user-echo".to_string()));
        assert!(matches!(
            frame.classify(),
            ClassifiedFrame::Standalone { .. }
        ));
    }

    #[test]
    fn missing_content_is_a_protocol_error() {
        let err = Frame::decode(r#"{"type":"ai","sender":"ai"}"#).unwrap_err();
        assert!(err.to_string().contains("malformed frame"));
    }

    #[test]
    fn non_json_is_a_protocol_error() {
        assert!(Frame::decode("not json").is_err());
    }

    #[test]
    fn frame_roundtrip_with_stream_flag() {
        let frame = Frame {
            kind: FrameKind::Ai,
            content: "chunk".to_string(),
            sender: "ai".to_string(),
            is_stream: true,
        };
        let text = frame.encode().unwrap();
        assert_eq!(Frame::decode(&text).unwrap(), frame);
    }
}
