//! Session Bridge - relays one WebSocket connection to one shell
//!
//! Messages:
//! - client -> shell: `{ type: "input", data }`, `{ type: "resize", cols, rows }`
//! - shell -> client: `{ type: "output", data, encoding }`
//!
//! Malformed frames are dropped without closing the connection. Closing the
//! connection, from either side, kills the shell.

use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

use crate::protocol::{parse_client_message, ClientMessage, OutputEncoding, ServerMessage};
use crate::pty::{ProcessSpawner, ShellSession, ShellSpec};
use crate::viewport::Geometry;

/// Close code sent when the shell cannot be started
pub const CLOSE_SPAWN_FAILED: u16 = 1011;

/// Per-connection bridge options
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    pub shell: ShellSpec,
    pub encoding: OutputEncoding,
    pub initial_geometry: Geometry,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            shell: ShellSpec::platform_default(),
            encoding: OutputEncoding::default(),
            initial_geometry: Geometry::default(),
        }
    }
}

/// Counters reported when a session ends
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub session_id: String,
    pub input_messages: u64,
    pub resize_events: u64,
    pub output_chunks: u64,
    pub dropped_frames: u64,
    /// Output stream ended before the connection closed
    pub process_exited: bool,
    pub final_geometry: Option<Geometry>,
}

fn close_frame(code: u16, reason: impl Into<String>) -> CloseFrame<'static> {
    CloseFrame {
        code: CloseCode::from(code),
        reason: reason.into().into(),
    }
}

async fn send_json<S, T>(
    ws_tx: &mut SplitSink<WebSocketStream<S>, Message>,
    msg: &T,
) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    T: Serialize,
{
    let text = serde_json::to_string(msg)?;
    ws_tx.send(Message::Text(text)).await?;
    Ok(())
}

/// Bridges connections to freshly spawned shells
#[derive(Clone)]
pub struct SessionBridge {
    spawner: Arc<dyn ProcessSpawner>,
    options: Arc<BridgeOptions>,
}

impl SessionBridge {
    pub fn new(spawner: Arc<dyn ProcessSpawner>, options: BridgeOptions) -> Self {
        Self {
            spawner,
            options: Arc::new(options),
        }
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    /// Run one connection to completion.
    ///
    /// Returns an error only when the shell could not be spawned.
    pub async fn run<S>(&self, ws_stream: WebSocketStream<S>, peer: &str) -> anyhow::Result<SessionSummary>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut ws_tx, mut ws_rx) = ws_stream.split();

        let mut session = ShellSession::new(self.options.initial_geometry);
        let mut summary = SessionSummary {
            session_id: session.id.clone(),
            ..Default::default()
        };

        let mut output_rx = match session.start(self.spawner.as_ref(), &self.options.shell) {
            Ok(rx) => rx,
            Err(e) => {
                error!(peer, session_id = %session.id, error = %e, "Failed to start shell");
                let _ = ws_tx
                    .send(Message::Close(Some(close_frame(
                        CLOSE_SPAWN_FAILED,
                        "Failed to start shell",
                    ))))
                    .await;
                return Err(e.into());
            }
        };

        info!(peer, session_id = %session.id, "Client attached to shell");

        let encoding = self.options.encoding;
        let mut output_open = true;

        loop {
            tokio::select! {
                // shell -> client
                chunk = output_rx.recv(), if output_open => {
                    match chunk {
                        Some(bytes) => {
                            summary.output_chunks += 1;
                            let msg = ServerMessage::output(&bytes, encoding);
                            if send_json(&mut ws_tx, &msg).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            // Connection stays up; further input is discarded
                            output_open = false;
                            summary.process_exited = true;
                            info!(peer, session_id = %session.id, "Shell output ended");
                        }
                    }
                }

                // client -> shell
                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            Self::handle_frame(&mut session, &text, &mut summary);
                        }
                        Some(Ok(Message::Binary(_))) => {
                            summary.dropped_frames += 1;
                            debug!(session_id = %session.id, "Binary frame dropped");
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(e)) => {
                            warn!(peer, session_id = %session.id, error = %e, "WebSocket error");
                            break;
                        }
                        _ => {}
                    }
                }
            }
        }

        summary.final_geometry = Some(session.geometry());
        session.close();
        info!(
            peer,
            session_id = %summary.session_id,
            inputs = summary.input_messages,
            resizes = summary.resize_events,
            outputs = summary.output_chunks,
            dropped = summary.dropped_frames,
            "Client disconnected from shell"
        );
        Ok(summary)
    }

    fn handle_frame(session: &mut ShellSession, text: &str, summary: &mut SessionSummary) {
        let msg = match parse_client_message(text) {
            Ok(msg) => msg,
            Err(e) => {
                summary.dropped_frames += 1;
                debug!(session_id = %session.id, error = %e, "Malformed frame dropped");
                return;
            }
        };

        match msg {
            ClientMessage::Input { data } => {
                summary.input_messages += 1;
                if let Err(e) = session.write_input(data.as_bytes()) {
                    debug!(session_id = %session.id, error = %e, "Input discarded");
                }
            }
            ClientMessage::Resize { cols, rows } => {
                summary.resize_events += 1;
                if let Err(e) = session.resize(Geometry::new(cols, rows)) {
                    debug!(session_id = %session.id, error = %e, "Resize discarded");
                }
            }
        }
    }
}
