//! Line-oriented shell around the session.
//!
//! Presentation only: reads commands from stdin, prints session
//! updates to stdout. All protocol behavior lives in the session; the
//! shell never touches the transcript directly.

use anyhow::Result;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use chat_protocol::{ChatSnapshot, Origin};

use crate::connection::ConnectionState;
use crate::session::{SessionHandle, SessionUpdate};

pub async fn run_repl(
    handle: SessionHandle,
    mut updates: mpsc::Receiver<SessionUpdate>,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    // Bytes of the current partial already on screen. Deltas only ever
    // append, so printing the suffix is safe.
    let mut streamed = 0usize;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "" => {}
                    "/quit" | "/q" => break,
                    "/history" => {
                        if let Some(snapshot) = handle.snapshot().await {
                            print_history(&snapshot);
                        }
                    }
                    "/upload" => println!("usage: /upload <path>"),
                    command if command.starts_with("/upload ") => {
                        let path = command["/upload ".len()..].trim();
                        handle.upload_file(PathBuf::from(path)).await;
                    }
                    text => handle.send_message(text).await,
                }
            }

            update = updates.recv() => {
                let Some(update) = update else { break };
                render(update, &mut streamed);
            }
        }
    }
    Ok(())
}

fn origin_tag(origin: Origin) -> &'static str {
    match origin {
        Origin::User => "you",
        Origin::Assistant => "assistant",
        Origin::System => "system",
        Origin::Error => "error",
    }
}

/// Replay the whole transcript, plus the in-progress partial if a
/// response is still streaming.
fn print_history(snapshot: &ChatSnapshot) {
    let mut stdout = std::io::stdout().lock();
    let _ = writeln!(stdout, "--- transcript ({} messages) ---", snapshot.messages.len());
    for message in &snapshot.messages {
        let _ = writeln!(stdout, "[{}] {}", origin_tag(message.origin), message.content);
    }
    if let Some(partial) = &snapshot.streaming {
        let _ = writeln!(stdout, "[assistant, streaming] {partial}");
    }
    let _ = writeln!(stdout, "---");
}

fn render(update: SessionUpdate, streamed: &mut usize) {
    let mut stdout = std::io::stdout().lock();
    match update {
        SessionUpdate::Streaming(partial) => {
            if *streamed == 0 {
                let _ = write!(stdout, "[assistant] ");
            }
            let _ = write!(stdout, "{}", &partial[*streamed..]);
            let _ = stdout.flush();
            *streamed = partial.len();
        }
        SessionUpdate::Appended(message) => {
            if *streamed > 0 {
                // The streamed text is already on screen; close the line.
                let _ = writeln!(stdout);
                *streamed = 0;
                if message.origin == Origin::Assistant {
                    return;
                }
            }
            let _ = writeln!(stdout, "[{}] {}", origin_tag(message.origin), message.content);
        }
        SessionUpdate::StreamDiscarded => {
            if *streamed > 0 {
                let _ = writeln!(stdout, " [interrupted]");
                *streamed = 0;
            }
        }
        SessionUpdate::ConnectionChanged(state) => {
            let note = match state {
                ConnectionState::Open => "[connected]",
                ConnectionState::Closed => "[disconnected]",
                ConnectionState::Failed => "[connection failed]",
                ConnectionState::Connecting => return,
            };
            let _ = writeln!(stdout, "{note}");
        }
    }
}
