//! webterm-attach - terminal client for webtermd
//!
//! Connects to a webterm server and drives the remote shell with the same
//! sticky modifiers a touch toolbar provides, mapped to function keys.
//!
//! Usage:
//!   webterm-attach
//!   webterm-attach --host 192.168.1.20 --port 3000
//!
//! Hotkeys:
//!   F1 / F2 / F3  Ctrl / Alt / Meta (press twice quickly to lock)
//!   F5 / F6 / F7  send ^C / ^X / ^D
//!   F8 / F9       send Esc / Tab
//!   Ctrl+]        detach

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{self, disable_raw_mode, enable_raw_mode},
};
use futures_util::{SinkExt, StreamExt};
use std::io::{stderr, stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use webterm_core::keys::{
    ChannelSink, DispatchOutcome, InputController, KeyInput, Modifier, ModifierPhase, ModifierSet, NamedKey,
    NoClipboard, TapTracker, ToolbarAction, DOUBLE_TAP_WINDOW,
};
use webterm_core::protocol::{parse_server_message, ClientMessage};
use webterm_core::{Geometry, ViewportFitter};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3000;

#[derive(Parser, Debug)]
#[command(name = "webterm-attach")]
#[command(about = "Open a shell on a webterm server")]
#[command(version)]
struct Args {
    /// WebSocket server host
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    host: String,

    /// WebSocket server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Request path (any path is accepted by the server)
    #[arg(long, default_value = "/")]
    path: String,
}

impl Args {
    fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("ws://{}:{}{}", self.host, self.port, path)
    }
}

/// What a function key does
#[derive(Debug, Clone, PartialEq, Eq)]
enum Hotkey {
    Modifier(Modifier),
    Action(ToolbarAction),
}

fn hotkey(code: KeyCode) -> Option<Hotkey> {
    let hotkey = match code {
        KeyCode::F(1) => Hotkey::Modifier(Modifier::Ctrl),
        KeyCode::F(2) => Hotkey::Modifier(Modifier::Alt),
        KeyCode::F(3) => Hotkey::Modifier(Modifier::Meta),
        KeyCode::F(5) => Hotkey::Action(ToolbarAction::SendCtrl('c')),
        KeyCode::F(6) => Hotkey::Action(ToolbarAction::SendCtrl('x')),
        KeyCode::F(7) => Hotkey::Action(ToolbarAction::SendCtrl('d')),
        KeyCode::F(8) => Hotkey::Action(ToolbarAction::Literal("\\x1b".to_string())),
        KeyCode::F(9) => Hotkey::Action(ToolbarAction::Literal("\\t".to_string())),
        _ => return None,
    };
    Some(hotkey)
}

fn key_input(code: KeyCode) -> Option<KeyInput> {
    let named = match code {
        KeyCode::Char(c) => return Some(KeyInput::Char(c)),
        KeyCode::Enter => NamedKey::Enter,
        KeyCode::Backspace => NamedKey::Backspace,
        KeyCode::Tab => NamedKey::Tab,
        KeyCode::Esc => NamedKey::Escape,
        KeyCode::Up => NamedKey::ArrowUp,
        KeyCode::Down => NamedKey::ArrowDown,
        KeyCode::Right => NamedKey::ArrowRight,
        KeyCode::Left => NamedKey::ArrowLeft,
        KeyCode::Home => NamedKey::Home,
        KeyCode::End => NamedKey::End,
        KeyCode::PageUp => NamedKey::PageUp,
        KeyCode::PageDown => NamedKey::PageDown,
        KeyCode::Delete => NamedKey::Delete,
        KeyCode::Insert => NamedKey::Insert,
        _ => return None,
    };
    Some(KeyInput::Named(named))
}

/// Ctrl+] (reported as Ctrl+5 by some terminals)
fn is_detach(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char(']') | KeyCode::Char('5'))
}

fn status_line(modifiers: &ModifierSet) -> String {
    let parts: Vec<String> = modifiers
        .snapshot()
        .into_iter()
        .map(|(modifier, phase)| match phase {
            ModifierPhase::Idle => modifier.name().to_lowercase(),
            ModifierPhase::Armed => modifier.name().to_uppercase(),
            ModifierPhase::Locked => format!("[{}]", modifier.name().to_uppercase()),
        })
        .collect();
    format!("\x1b[90mmodifiers: {}\x1b[0m", parts.join(" "))
}

fn status(msg: &str) {
    let mut err = stderr();
    let _ = write!(err, "\r\n{}\r\n", msg);
    let _ = err.flush();
}

/// Blocking keyboard loop. Owns the controller, so all modifier state lives here.
fn input_loop(tx: mpsc::UnboundedSender<ClientMessage>, open: Arc<AtomicBool>, running: Arc<AtomicBool>) {
    let mut controller = InputController::new(ChannelSink::new(tx.clone(), Arc::clone(&open)));
    let mut taps = TapTracker::new(DOUBLE_TAP_WINDOW);
    let mut fitter = ViewportFitter::new();

    let send_resize = |fitter: &mut ViewportFitter, cols: u16, rows: u16| {
        if let Some(geometry) = fitter.observe_cells(Geometry::new(cols, rows)) {
            if open.load(Ordering::SeqCst) {
                let _ = tx.send(ClientMessage::resize(geometry));
            }
        }
    };

    if let Ok((cols, rows)) = terminal::size() {
        send_resize(&mut fitter, cols, rows);
    }

    while running.load(Ordering::SeqCst) {
        if !event::poll(Duration::from_millis(100)).unwrap_or(false) {
            continue;
        }
        let event = match event::read() {
            Ok(event) => event,
            Err(_) => continue,
        };

        match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => {
                if is_detach(&key) {
                    status("\x1b[33mDetaching, remote shell will be closed\x1b[0m");
                    running.store(false, Ordering::SeqCst);
                    break;
                }

                match hotkey(key.code) {
                    Some(Hotkey::Modifier(modifier)) => {
                        controller.press(taps.press(modifier, Instant::now()));
                        status(&status_line(controller.modifiers()));
                        continue;
                    }
                    Some(Hotkey::Action(action)) => {
                        let _ = controller.handle_action(&action, &NoClipboard);
                        continue;
                    }
                    None => {}
                }

                let Some(input) = key_input(key.code) else {
                    continue;
                };
                // Hardware modifiers arm the sticky ones for this keystroke
                if key.modifiers.contains(KeyModifiers::CONTROL) && !controller.modifiers().is_effective(Modifier::Ctrl) {
                    controller.tap(Modifier::Ctrl);
                }
                if key.modifiers.contains(KeyModifiers::ALT) && !controller.modifiers().is_effective(Modifier::Alt) {
                    controller.tap(Modifier::Alt);
                }
                if let DispatchOutcome::Dropped(_) = controller.handle_key(&input) {
                    status("\x1b[31mNot connected, input dropped\x1b[0m");
                }
            }
            Event::Paste(text) => {
                let clipboard = move || Some(text.clone());
                let _ = controller.handle_action(&ToolbarAction::Paste, &clipboard);
            }
            Event::Resize(cols, rows) => send_resize(&mut fitter, cols, rows),
            _ => {}
        }
    }
}

fn restore_terminal() {
    let _ = execute!(stdout(), DisableBracketedPaste);
    let _ = disable_raw_mode();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let url = args.url();

    eprintln!("\x1b[90mConnecting to {}...\x1b[0m", url);

    let (ws_stream, _) = connect_async(&url)
        .await
        .context("Failed to connect to WebSocket server")?;

    eprintln!("\x1b[32mConnected to {}\x1b[0m", url);
    eprintln!("\x1b[90mF1 Ctrl  F2 Alt  F3 Meta (twice to lock)  F5 ^C  F6 ^X  F7 ^D  F8 Esc  F9 Tab  Ctrl+] detach\x1b[0m");
    eprintln!();

    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let open = Arc::new(AtomicBool::new(true));
    let running = Arc::new(AtomicBool::new(true));
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ClientMessage>();

    enable_raw_mode().context("Failed to enable raw mode")?;
    let _ = execute!(stdout(), EnableBracketedPaste);

    let input_handle = {
        let open = Arc::clone(&open);
        let running = Arc::clone(&running);
        tokio::task::spawn_blocking(move || input_loop(out_tx, open, running))
    };

    let result: Result<()> = async {
        loop {
            tokio::select! {
                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(WsMessage::Text(text))) => {
                            // Malformed frames are dropped
                            let Ok(server_msg) = parse_server_message(&text) else {
                                continue;
                            };
                            if let Ok(bytes) = server_msg.decode_output() {
                                let mut out = stdout();
                                out.write_all(&bytes)?;
                                out.flush()?;
                            }
                        }
                        Some(Ok(WsMessage::Close(frame))) => {
                            let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                            status(&format!("\x1b[33mDisconnected {}\x1b[0m", reason));
                            break;
                        }
                        None => {
                            status("\x1b[33mDisconnected\x1b[0m");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                    }
                }

                msg = out_rx.recv() => {
                    match msg {
                        Some(msg) => ws_tx.send(WsMessage::Text(msg.to_json()?)).await?,
                        // Input loop ended (detach)
                        None => {
                            let _ = ws_tx.send(WsMessage::Close(None)).await;
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }
    .await;

    // Cleanup
    open.store(false, Ordering::SeqCst);
    running.store(false, Ordering::SeqCst);
    let _ = input_handle.await;
    restore_terminal();

    if let Err(e) = result {
        eprintln!("\x1b[31mError: {}\x1b[0m", e);
        std::process::exit(1);
    }
    Ok(())
}
