//! The chat session: one serialized timeline of protocol state.
//!
//! Everything that mutates session state (inbound frames, send
//! requests, upload completions) funnels through a single actor task,
//! so ordering follows arrival order and no lock is needed beyond the
//! channel. The protocol logic itself lives in [`SessionCore`], a
//! plain struct the run loop drives; it returns [`Action`]s instead of
//! performing I/O, which keeps it testable without a socket.

use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use chat_protocol::{
    ChatSnapshot, ClassifiedFrame, Frame, Message, Origin, StreamAccumulator, Transcript,
};

use crate::connection::{ChatConnection, ConnectionEvent, ConnectionState};
use crate::upload::{self, TransferError, UploadClient};

const SEND_FAILED: &str = "Failed to send message. Please try again.";
const UPLOAD_FAILED: &str = "Sorry, the file upload failed. Please try again.";
const UNSUPPORTED_FILE: &str = "Only .pdf, .txt, .docx and .csv files can be uploaded.";
const DISCONNECTED: &str = "Disconnected from chat server.";

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// A finalized message was appended to the transcript.
    Appended(Message),
    /// The in-progress assistant response grew to this content.
    Streaming(String),
    /// An in-progress response was dropped without being committed.
    StreamDiscarded,
    ConnectionChanged(ConnectionState),
}

/// Requests into the session actor.
pub(crate) enum SessionCommand {
    Send {
        text: String,
    },
    Upload {
        path: PathBuf,
    },
    Snapshot {
        respond_to: oneshot::Sender<ChatSnapshot>,
    },
    // Completions of fire-and-forget work, re-entering the timeline.
    SendFinished(anyhow::Result<()>),
    UploadFinished(Result<String, TransferError>),
}

/// What the core asked the run loop to do.
#[derive(Debug)]
enum Action {
    Notify(SessionUpdate),
    Transmit(String),
    StartUpload(PathBuf),
}

/// Protocol state for one session: the transcript, the stream
/// accumulator, and the two at-most-one-in-flight guards. All methods
/// are called from the session task only.
#[derive(Default)]
struct SessionCore {
    transcript: Transcript,
    accumulator: StreamAccumulator,
    send_in_flight: bool,
    upload_in_flight: bool,
}

impl SessionCore {
    fn append(&mut self, origin: Origin, content: impl Into<String>, actions: &mut Vec<Action>) {
        let message = self.transcript.push(origin, content).clone();
        actions.push(Action::Notify(SessionUpdate::Appended(message)));
    }

    fn on_opened(&mut self) -> Vec<Action> {
        vec![Action::Notify(SessionUpdate::ConnectionChanged(
            ConnectionState::Open,
        ))]
    }

    /// Classify one raw inbound frame and apply it. Malformed frames
    /// are dropped without touching any state.
    fn on_frame(&mut self, raw: &str) -> Vec<Action> {
        let frame = match Frame::decode(raw) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(%err, raw, "dropping malformed frame");
                return Vec::new();
            }
        };

        let mut actions = Vec::new();
        match frame.classify() {
            ClassifiedFrame::StreamingDelta(delta) => {
                self.accumulator.push_delta(&delta);
                let partial = self.accumulator.partial().unwrap_or_default().to_string();
                actions.push(Action::Notify(SessionUpdate::Streaming(partial)));
            }
            ClassifiedFrame::StreamFinal => {
                // Commit the buffered text, never this frame's payload.
                if let Some(text) = self.accumulator.finish() {
                    self.append(Origin::Assistant, text, &mut actions);
                }
            }
            ClassifiedFrame::Standalone { kind, content, .. } => {
                self.append(Origin::from(&kind), content, &mut actions);
            }
        }
        actions
    }

    fn on_errored(&mut self, cause: &str) -> Vec<Action> {
        let mut actions = Vec::new();
        self.append(Origin::Error, format!("Connection error: {cause}"), &mut actions);
        actions
    }

    /// The socket is gone. A partial assistant message is never
    /// promoted to final on disconnect; it is dropped.
    fn on_closed(&mut self, final_state: ConnectionState) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.accumulator.discard() {
            debug!("discarding partial assistant response on disconnect");
            actions.push(Action::Notify(SessionUpdate::StreamDiscarded));
        }
        self.append(Origin::System, DISCONNECTED, &mut actions);
        actions.push(Action::Notify(SessionUpdate::ConnectionChanged(final_state)));
        actions
    }

    /// Dispatch one user message. Empty input, a non-open connection,
    /// and an already-in-flight send are all silent no-ops: nothing is
    /// transmitted and the transcript is untouched. An accepted send
    /// appends the user message optimistically, before transmission.
    fn on_send(&mut self, text: &str, connection: ConnectionState) -> Vec<Action> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        if connection != ConnectionState::Open {
            debug!(?connection, "ignoring send while not connected");
            return Vec::new();
        }
        if self.send_in_flight {
            debug!("ignoring send while another is in flight");
            return Vec::new();
        }

        let frame = match Frame::user(trimmed).encode() {
            Ok(json) => json,
            Err(err) => {
                error!(%err, "could not serialize outbound frame");
                return Vec::new();
            }
        };

        let mut actions = Vec::new();
        // Any stale partial from an earlier, never-finalized stream is
        // dropped when a new exchange starts.
        if self.accumulator.discard() {
            actions.push(Action::Notify(SessionUpdate::StreamDiscarded));
        }
        self.append(Origin::User, trimmed, &mut actions);
        self.send_in_flight = true;
        actions.push(Action::Transmit(frame));
        actions
    }

    /// Transmission finished. On failure the optimistic user entry
    /// stays (the user's own words are never un-said) and a separate
    /// error message is appended after it.
    fn on_send_result(&mut self, result: anyhow::Result<()>) -> Vec<Action> {
        self.send_in_flight = false;
        let mut actions = Vec::new();
        if let Err(err) = result {
            warn!(%err, "message transmission failed");
            self.append(Origin::Error, SEND_FAILED, &mut actions);
        }
        actions
    }

    fn on_upload_request(&mut self, path: PathBuf) -> Vec<Action> {
        if self.upload_in_flight {
            debug!("ignoring upload while another is in flight");
            return Vec::new();
        }
        let mut actions = Vec::new();
        if !upload::is_supported(&path) {
            self.append(Origin::Error, UNSUPPORTED_FILE, &mut actions);
            return actions;
        }
        self.upload_in_flight = true;
        actions.push(Action::StartUpload(path));
        actions
    }

    fn on_upload_result(&mut self, result: Result<String, TransferError>) -> Vec<Action> {
        self.upload_in_flight = false;
        let mut actions = Vec::new();
        match result {
            Ok(name) => {
                self.append(
                    Origin::System,
                    format!(
                        "File \"{name}\" uploaded successfully! You can now ask me questions about it."
                    ),
                    &mut actions,
                );
            }
            Err(err) => {
                warn!(%err, "file upload failed");
                self.append(Origin::Error, UPLOAD_FAILED, &mut actions);
            }
        }
        actions
    }

    fn snapshot(&self) -> ChatSnapshot {
        self.transcript.snapshot(self.accumulator.partial())
    }
}

/// Handle for the presentation layer. All methods are fire-and-forget
/// except [`snapshot`](Self::snapshot).
#[derive(Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub async fn send_message(&self, text: impl Into<String>) {
        let _ = self
            .sender
            .send(SessionCommand::Send { text: text.into() })
            .await;
    }

    pub async fn upload_file(&self, path: PathBuf) {
        let _ = self.sender.send(SessionCommand::Upload { path }).await;
    }

    pub async fn snapshot(&self) -> Option<ChatSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Snapshot { respond_to: tx })
            .await
            .ok()?;
        rx.await.ok()
    }
}

pub struct ChatSession {
    core: SessionCore,
    connection: ChatConnection,
    uploader: UploadClient,
    updates: mpsc::Sender<SessionUpdate>,
    command_tx: mpsc::Sender<SessionCommand>,
}

impl ChatSession {
    /// Start the session actor over an open connection. Returns the
    /// handle and the update stream for the presentation layer.
    pub fn spawn(
        connection: ChatConnection,
        events: mpsc::Receiver<ConnectionEvent>,
        uploader: UploadClient,
    ) -> (SessionHandle, mpsc::Receiver<SessionUpdate>) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (update_tx, update_rx) = mpsc::channel(64);

        let session = Self {
            core: SessionCore::default(),
            connection,
            uploader,
            updates: update_tx,
            command_tx: command_tx.clone(),
        };
        tokio::spawn(session.run(events, command_rx));

        (SessionHandle { sender: command_tx }, update_rx)
    }

    async fn run(
        mut self,
        mut events: mpsc::Receiver<ConnectionEvent>,
        mut commands: mpsc::Receiver<SessionCommand>,
    ) {
        loop {
            let actions = tokio::select! {
                Some(event) = events.recv() => match event {
                    ConnectionEvent::Opened => self.core.on_opened(),
                    ConnectionEvent::Frame(raw) => self.core.on_frame(&raw),
                    ConnectionEvent::Errored(cause) => self.core.on_errored(&cause),
                    ConnectionEvent::Closed => {
                        self.core.on_closed(self.connection.state().await)
                    }
                },
                cmd = commands.recv() => match cmd {
                    Some(SessionCommand::Send { text }) => {
                        // Gate on the state the connection manager owns.
                        let state = self.connection.state().await;
                        self.core.on_send(&text, state)
                    }
                    Some(SessionCommand::Upload { path }) => self.core.on_upload_request(path),
                    Some(SessionCommand::Snapshot { respond_to }) => {
                        let _ = respond_to.send(self.core.snapshot());
                        Vec::new()
                    }
                    Some(SessionCommand::SendFinished(result)) => {
                        self.core.on_send_result(result)
                    }
                    Some(SessionCommand::UploadFinished(result)) => {
                        self.core.on_upload_result(result)
                    }
                    None => break,
                },
                else => break,
            };

            for action in actions {
                self.dispatch(action).await;
            }
        }
        debug!("session actor exiting");
    }

    async fn dispatch(&self, action: Action) {
        match action {
            Action::Notify(update) => {
                let _ = self.updates.send(update).await;
            }
            Action::Transmit(frame) => {
                let connection = self.connection.clone();
                let command_tx = self.command_tx.clone();
                tokio::spawn(async move {
                    let result = connection.transmit(frame).await;
                    let _ = command_tx.send(SessionCommand::SendFinished(result)).await;
                });
            }
            Action::StartUpload(path) => {
                let uploader = self.uploader.clone();
                let command_tx = self.command_tx.clone();
                tokio::spawn(async move {
                    let result = uploader.upload(&path).await;
                    let _ = command_tx
                        .send(SessionCommand::UploadFinished(result))
                        .await;
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(content: &str) -> String {
        format!(r#"{{"type":"ai","content":"{content}","sender":"ai","isStream":true}}"#)
    }

    const FINAL: &str = r#"{"type":"ai","content":"","sender":"ai","isStream":false}"#;

    fn contents(core: &SessionCore) -> Vec<(Origin, String)> {
        core.transcript
            .messages()
            .iter()
            .map(|m| (m.origin, m.content.clone()))
            .collect()
    }

    fn has_transmit(actions: &[Action]) -> bool {
        actions.iter().any(|a| matches!(a, Action::Transmit(_)))
    }

    #[test]
    fn streamed_deltas_commit_as_one_assistant_message() {
        let mut core = SessionCore::default();
        core.on_frame(&delta("Hello"));
        core.on_frame(&delta(" world"));
        assert_eq!(core.snapshot().streaming.as_deref(), Some("Hello world"));

        core.on_frame(FINAL);
        assert_eq!(
            contents(&core),
            vec![(Origin::Assistant, "Hello world".to_string())]
        );
        assert_eq!(core.snapshot().streaming, None);
    }

    #[test]
    fn final_without_deltas_commits_nothing() {
        let mut core = SessionCore::default();
        let actions = core.on_frame(FINAL);
        assert!(actions.is_empty());
        assert!(core.transcript.is_empty());
    }

    #[test]
    fn final_content_is_never_committed() {
        let mut core = SessionCore::default();
        core.on_frame(&delta("real"));
        core.on_frame(r#"{"type":"ai","content":"bogus tail","sender":"ai","isStream":false}"#);
        assert_eq!(contents(&core), vec![(Origin::Assistant, "real".to_string())]);
    }

    #[test]
    fn standalone_frames_append_directly() {
        let mut core = SessionCore::default();
        core.on_frame(r#"{"type":"system","content":"Welcome!","sender":"system"}"#);
        core.on_frame(r#"{"type":"error","content":"Error processing message","sender":"system"}"#);
        assert_eq!(
            contents(&core),
            vec![
                (Origin::System, "Welcome!".to_string()),
                (Origin::Error, "Error processing message".to_string()),
            ]
        );
    }

    #[test]
    fn malformed_frame_is_dropped_without_state_change() {
        let mut core = SessionCore::default();
        core.on_frame(&delta("keep me"));
        let actions = core.on_frame("{ not json");
        assert!(actions.is_empty());
        assert_eq!(core.snapshot().streaming.as_deref(), Some("keep me"));
        assert!(core.transcript.is_empty());
    }

    #[test]
    fn whitespace_send_transmits_nothing() {
        let mut core = SessionCore::default();
        let actions = core.on_send("  ", ConnectionState::Open);
        assert!(actions.is_empty());
        assert!(core.transcript.is_empty());
        assert!(!core.send_in_flight);
    }

    #[test]
    fn send_while_closed_is_a_noop() {
        let mut core = SessionCore::default();
        let actions = core.on_send("hello", ConnectionState::Closed);
        assert!(actions.is_empty());
        assert!(core.transcript.is_empty());
    }

    #[test]
    fn send_appends_optimistically_and_transmits() {
        let mut core = SessionCore::default();
        let actions = core.on_send("  How do I budget?  ", ConnectionState::Open);

        // Appended before any transmission result is known.
        assert_eq!(
            contents(&core),
            vec![(Origin::User, "How do I budget?".to_string())]
        );
        let transmitted = actions
            .iter()
            .find_map(|a| match a {
                Action::Transmit(json) => Some(json.clone()),
                _ => None,
            })
            .expect("send should transmit a frame");
        let frame = Frame::decode(&transmitted).unwrap();
        assert_eq!(frame, Frame::user("How do I budget?"));
    }

    #[test]
    fn failed_send_keeps_user_message_and_appends_error() {
        let mut core = SessionCore::default();
        core.on_send("hello", ConnectionState::Open);
        core.on_send_result(Err(anyhow::anyhow!("broken pipe")));

        assert_eq!(
            contents(&core),
            vec![
                (Origin::User, "hello".to_string()),
                (Origin::Error, SEND_FAILED.to_string()),
            ]
        );
        assert!(!core.send_in_flight);
    }

    #[test]
    fn only_one_send_in_flight() {
        let mut core = SessionCore::default();
        assert!(has_transmit(&core.on_send("first", ConnectionState::Open)));
        assert!(!has_transmit(&core.on_send("second", ConnectionState::Open)));
        assert_eq!(core.transcript.len(), 1);

        core.on_send_result(Ok(()));
        assert!(has_transmit(&core.on_send("third", ConnectionState::Open)));
        assert_eq!(core.transcript.len(), 2);
    }

    #[test]
    fn send_discards_a_stale_partial() {
        let mut core = SessionCore::default();
        core.on_frame(&delta("orphaned stream"));
        let actions = core.on_send("next question", ConnectionState::Open);
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::Notify(SessionUpdate::StreamDiscarded))));
        assert_eq!(core.snapshot().streaming, None);
        // The orphaned partial was never committed.
        assert_eq!(contents(&core), vec![(Origin::User, "next question".to_string())]);
    }

    #[test]
    fn close_mid_stream_discards_the_partial() {
        let mut core = SessionCore::default();
        core.on_frame(&delta("half an ans"));
        let actions = core.on_closed(ConnectionState::Closed);

        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::Notify(SessionUpdate::StreamDiscarded))));
        // No assistant message was committed; only the disconnect note.
        assert_eq!(contents(&core), vec![(Origin::System, DISCONNECTED.to_string())]);
        assert_eq!(core.snapshot().streaming, None);
    }

    #[test]
    fn connection_error_is_surfaced_in_the_transcript() {
        let mut core = SessionCore::default();
        core.on_errored("io error: connection reset");
        assert_eq!(
            contents(&core),
            vec![(
                Origin::Error,
                "Connection error: io error: connection reset".to_string()
            )]
        );
    }

    #[test]
    fn upload_success_appends_the_system_notice() {
        let mut core = SessionCore::default();
        let actions = core.on_upload_request(PathBuf::from("report.pdf"));
        assert!(matches!(actions[..], [Action::StartUpload(_)]));
        assert!(core.upload_in_flight);

        core.on_upload_result(Ok("report.pdf".to_string()));
        assert_eq!(
            contents(&core),
            vec![(
                Origin::System,
                "File \"report.pdf\" uploaded successfully! You can now ask me questions about it."
                    .to_string()
            )]
        );
        assert!(!core.upload_in_flight);
    }

    #[test]
    fn upload_failure_appends_the_error_notice() {
        let mut core = SessionCore::default();
        core.on_upload_request(PathBuf::from("report.pdf"));
        core.on_upload_result(Err(TransferError::Nameless(PathBuf::from("report.pdf"))));
        assert_eq!(
            contents(&core),
            vec![(Origin::Error, UPLOAD_FAILED.to_string())]
        );
    }

    #[test]
    fn unsupported_file_is_rejected_before_any_transfer() {
        let mut core = SessionCore::default();
        let actions = core.on_upload_request(PathBuf::from("script.exe"));
        assert!(!actions.iter().any(|a| matches!(a, Action::StartUpload(_))));
        assert!(!core.upload_in_flight);
        assert_eq!(
            contents(&core),
            vec![(Origin::Error, UNSUPPORTED_FILE.to_string())]
        );
    }

    #[test]
    fn only_one_upload_in_flight() {
        let mut core = SessionCore::default();
        core.on_upload_request(PathBuf::from("a.pdf"));
        let second = core.on_upload_request(PathBuf::from("b.pdf"));
        assert!(second.is_empty());
    }

    #[test]
    fn uploads_do_not_touch_the_streaming_buffer() {
        let mut core = SessionCore::default();
        core.on_frame(&delta("streaming along"));
        core.on_upload_request(PathBuf::from("report.csv"));
        core.on_upload_result(Ok("report.csv".to_string()));
        assert_eq!(core.snapshot().streaming.as_deref(), Some("streaming along"));
    }

    #[test]
    fn transcript_order_is_stable_across_interleaving() {
        let mut core = SessionCore::default();
        core.on_frame(r#"{"type":"system","content":"Welcome","sender":"system"}"#);
        core.on_send("question one", ConnectionState::Open);
        core.on_frame(&delta("answer"));
        core.on_frame(&delta(" one"));
        core.on_frame(FINAL);
        core.on_send_result(Ok(()));
        core.on_upload_result(Ok("plan.csv".to_string()));

        let snapshot = core.snapshot();
        let order: Vec<Origin> = snapshot.messages.iter().map(|m| m.origin).collect();
        assert_eq!(
            order,
            vec![Origin::System, Origin::User, Origin::Assistant, Origin::System]
        );
        let sequences: Vec<u64> = snapshot.messages.iter().map(|m| m.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3]);
    }
}
