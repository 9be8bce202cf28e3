//! # Chat Protocol
//!
//! Protocol core for the planner chat client: the wire frame model,
//! classification of inbound frames, accumulation of streamed
//! assistant output, and the append-only transcript.
//!
//! This crate is deliberately free of I/O. The connection layer feeds
//! raw text frames in; the session layer applies the results. The one
//! real piece of state-machine behavior lives in
//! [`StreamAccumulator`]: assistant responses arrive as a run of
//! delta frames followed by a completion frame, and the committed
//! message must be exactly the concatenation of the deltas the user
//! watched stream in. The completion frame's own payload is never
//! used.
//!
//! ```
//! use chat_protocol::{ClassifiedFrame, Frame, Origin, StreamAccumulator, Transcript};
//!
//! let mut transcript = Transcript::new();
//! let mut accumulator = StreamAccumulator::new();
//!
//! for raw in [
//!     r#"{"type":"ai","content":"Hello","sender":"ai","isStream":true}"#,
//!     r#"{"type":"ai","content":" world","sender":"ai","isStream":true}"#,
//!     r#"{"type":"ai","content":"","sender":"ai","isStream":false}"#,
//! ] {
//!     match Frame::decode(raw).unwrap().classify() {
//!         ClassifiedFrame::StreamingDelta(delta) => accumulator.push_delta(&delta),
//!         ClassifiedFrame::StreamFinal => {
//!             if let Some(text) = accumulator.finish() {
//!                 transcript.push(Origin::Assistant, text);
//!             }
//!         }
//!         ClassifiedFrame::Standalone { .. } => unreachable!(),
//!     }
//! }
//!
//! assert_eq!(transcript.messages()[0].content, "Hello world");
//! ```

mod error;
mod frame;
mod stream;
mod transcript;

pub use error::ProtocolError;
pub use frame::{ClassifiedFrame, Frame, FrameKind};
pub use stream::StreamAccumulator;
pub use transcript::{ChatSnapshot, Message, Origin, Transcript};
