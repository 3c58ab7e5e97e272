//! Input Controller - Single owner of the sticky modifier state
//!
//! Hardware key events and virtual-keyboard text both go through one
//! controller, so they share (and reset) the same modifiers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::composer::{ComposedSequence, ComposerOptions, KeyComposer, KeyInput, NamedKey};
use super::modifier::{Modifier, ModifierSet};
use super::toolbar::{ctrl_action_text, decode_literal, ClipboardSource, TapGesture, ToolbarAction};
use crate::protocol::ClientMessage;

/// Destination for composed input
pub trait InputSink {
    /// Whether the channel currently accepts messages
    fn is_open(&self) -> bool;

    /// Hand one `input` payload to the channel
    fn send_input(&mut self, data: String);
}

/// What happened to one dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Sent to the channel
    Sent(ComposedSequence),
    /// Nothing to send (unmapped key, empty clipboard)
    Empty,
    /// Channel was not open; the input is discarded
    Dropped(ComposedSequence),
    /// Handled locally, nothing sent
    Local,
}

impl DispatchOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DispatchOutcome::Sent(_))
    }
}

/// Owns the modifier state machine and turns input events into channel sends
pub struct InputController<S: InputSink> {
    modifiers: ModifierSet,
    composer: KeyComposer,
    sink: S,
}

impl<S: InputSink> InputController<S> {
    pub fn new(sink: S) -> Self {
        Self::with_options(sink, ComposerOptions::default())
    }

    pub fn with_options(sink: S, options: ComposerOptions) -> Self {
        Self {
            modifiers: ModifierSet::new(),
            composer: KeyComposer::new(options),
            sink,
        }
    }

    pub fn modifiers(&self) -> &ModifierSet {
        &self.modifiers
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    // ========== Toolbar modifiers ==========

    pub fn tap(&mut self, modifier: Modifier) {
        self.modifiers.tap(modifier);
    }

    pub fn double_tap(&mut self, modifier: Modifier) {
        self.modifiers.double_tap(modifier);
    }

    /// Apply a detected tap gesture (tap, plus lock toggle on double tap)
    pub fn press(&mut self, gesture: TapGesture) {
        self.modifiers.tap(gesture.modifier);
        if gesture.double {
            self.modifiers.double_tap(gesture.modifier);
        }
    }

    // ========== Key sources ==========

    /// Hardware key event from the terminal widget
    pub fn handle_key(&mut self, key: &KeyInput) -> DispatchOutcome {
        let sequence = self.composer.compose(key, self.modifiers.effective());
        let outcome = self.transmit(sequence);
        self.modifiers.after_dispatch();
        outcome
    }

    /// Text typed through the virtual keyboard's hidden input.
    ///
    /// Each character is dispatched as its own keystroke.
    pub fn handle_text(&mut self, text: &str) -> Vec<DispatchOutcome> {
        text.chars()
            .map(|c| {
                let key = match c {
                    '\n' | '\r' => KeyInput::Named(NamedKey::Enter),
                    '\t' => KeyInput::Named(NamedKey::Tab),
                    '\u{8}' | '\u{7f}' => KeyInput::Named(NamedKey::Backspace),
                    c => KeyInput::Char(c),
                };
                self.handle_key(&key)
            })
            .collect()
    }

    /// Toolbar button
    pub fn handle_action(
        &mut self,
        action: &ToolbarAction,
        clipboard: &dyn ClipboardSource,
    ) -> DispatchOutcome {
        match action {
            ToolbarAction::Literal(spec) => {
                let outcome = self.transmit(ComposedSequence::new(decode_literal(spec)));
                self.modifiers.after_dispatch();
                outcome
            }
            ToolbarAction::SendCtrl(c) => {
                let outcome = self.transmit(ComposedSequence::new(ctrl_action_text(*c)));
                self.modifiers.after_dispatch();
                outcome
            }
            ToolbarAction::Key(named) => self.handle_key(&KeyInput::Named(*named)),
            ToolbarAction::Paste => match clipboard.read_text() {
                Some(text) => self.transmit(ComposedSequence::new(text)),
                None => {
                    debug!("Clipboard unavailable, paste ignored");
                    DispatchOutcome::Empty
                }
            },
            ToolbarAction::Command(cmd) => self.transmit(ComposedSequence::new(format!("{}\n", cmd))),
            ToolbarAction::Clear => DispatchOutcome::Local,
        }
    }

    fn transmit(&mut self, sequence: ComposedSequence) -> DispatchOutcome {
        if sequence.is_empty() {
            return DispatchOutcome::Empty;
        }
        if !self.sink.is_open() {
            warn!(len = sequence.as_bytes().len(), "Channel not open, input dropped");
            return DispatchOutcome::Dropped(sequence);
        }
        self.sink.send_input(sequence.as_str().to_string());
        DispatchOutcome::Sent(sequence)
    }
}

// ========== ChannelSink ==========

/// Sink that forwards `input` messages to a connection task
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ClientMessage>,
    open: Arc<AtomicBool>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<ClientMessage>, open: Arc<AtomicBool>) -> Self {
        Self { tx, open }
    }
}

impl InputSink for ChannelSink {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.tx.is_closed()
    }

    fn send_input(&mut self, data: String) {
        let _ = self.tx.send(ClientMessage::Input { data });
    }
}

/// Sink that records sends, for tests and offline composition
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub open: bool,
    pub sent: Vec<String>,
}

impl RecordingSink {
    pub fn open() -> Self {
        Self {
            open: true,
            sent: Vec::new(),
        }
    }

    pub fn closed() -> Self {
        Self::default()
    }
}

impl InputSink for RecordingSink {
    fn is_open(&self) -> bool {
        self.open
    }

    fn send_input(&mut self, data: String) {
        self.sent.push(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::modifier::ModifierPhase;
    use crate::keys::toolbar::NoClipboard;

    fn controller() -> InputController<RecordingSink> {
        InputController::new(RecordingSink::open())
    }

    #[test]
    fn test_ctrl_tap_then_c() {
        let mut ctl = controller();
        ctl.tap(Modifier::Ctrl);

        let outcome = ctl.handle_key(&KeyInput::Char('c'));
        assert_eq!(outcome, DispatchOutcome::Sent(ComposedSequence::new("\x03")));
        assert_eq!(ctl.sink().sent, vec!["\x03".to_string()]);
        assert_eq!(ctl.modifiers().phase(Modifier::Ctrl), ModifierPhase::Idle);
    }

    #[test]
    fn test_locked_alt_survives_dispatch() {
        let mut ctl = controller();
        ctl.double_tap(Modifier::Alt);

        ctl.handle_key(&KeyInput::Char('a'));
        ctl.handle_key(&KeyInput::Named(NamedKey::ArrowUp));

        assert_eq!(
            ctl.sink().sent,
            vec!["\x1ba".to_string(), "\x1b\x1b[A".to_string()]
        );
        assert_eq!(ctl.modifiers().phase(Modifier::Alt), ModifierPhase::Locked);
    }

    #[test]
    fn test_unmapped_key_still_resets() {
        let mut ctl = controller();
        ctl.tap(Modifier::Meta);

        let outcome = ctl.handle_key(&KeyInput::Unmapped("F24".to_string()));
        assert_eq!(outcome, DispatchOutcome::Empty);
        assert!(ctl.sink().sent.is_empty());
        assert_eq!(ctl.modifiers().phase(Modifier::Meta), ModifierPhase::Idle);
    }

    #[test]
    fn test_closed_channel_drops_and_resets() {
        let mut ctl = InputController::new(RecordingSink::closed());
        ctl.tap(Modifier::Ctrl);

        let outcome = ctl.handle_key(&KeyInput::Char('d'));
        assert_eq!(outcome, DispatchOutcome::Dropped(ComposedSequence::new("\x04")));
        assert!(ctl.sink().sent.is_empty());
        assert_eq!(ctl.modifiers().phase(Modifier::Ctrl), ModifierPhase::Idle);
    }

    #[test]
    fn test_virtual_text_shares_modifiers() {
        let mut ctl = controller();
        ctl.tap(Modifier::Ctrl);

        ctl.handle_text("ab\n");
        assert_eq!(
            ctl.sink().sent,
            vec!["\x01".to_string(), "b".to_string(), "\r".to_string()]
        );
    }

    #[test]
    fn test_literal_action_ignores_modifiers_and_resets() {
        let mut ctl = controller();
        ctl.tap(Modifier::Alt);

        let outcome = ctl.handle_action(&ToolbarAction::Literal(r"\x1b".to_string()), &NoClipboard);
        assert!(outcome.is_sent());
        assert_eq!(ctl.sink().sent, vec!["\x1b".to_string()]);
        assert_eq!(ctl.modifiers().phase(Modifier::Alt), ModifierPhase::Idle);
    }

    #[test]
    fn test_send_ctrl_action() {
        let mut ctl = controller();
        ctl.handle_action(&ToolbarAction::SendCtrl('x'), &NoClipboard);
        ctl.handle_action(&ToolbarAction::SendCtrl('%'), &NoClipboard);
        assert_eq!(ctl.sink().sent, vec!["\x18".to_string(), "%".to_string()]);
    }

    #[test]
    fn test_toolbar_arrow_uses_modifiers() {
        let mut ctl = controller();
        ctl.double_tap(Modifier::Alt);
        ctl.handle_action(&ToolbarAction::Key(NamedKey::ArrowUp), &NoClipboard);
        assert_eq!(ctl.sink().sent, vec!["\x1b\x1b[A".to_string()]);
    }

    #[test]
    fn test_paste_keeps_modifiers() {
        let mut ctl = controller();
        ctl.tap(Modifier::Ctrl);

        let clip = || Some("echo hi".to_string());
        ctl.handle_action(&ToolbarAction::Paste, &clip);
        assert_eq!(ctl.sink().sent, vec!["echo hi".to_string()]);
        assert_eq!(ctl.modifiers().phase(Modifier::Ctrl), ModifierPhase::Armed);

        let outcome = ctl.handle_action(&ToolbarAction::Paste, &NoClipboard);
        assert_eq!(outcome, DispatchOutcome::Empty);
    }

    #[test]
    fn test_command_and_clear() {
        let mut ctl = controller();
        ctl.handle_action(&ToolbarAction::Command("ls -la".to_string()), &NoClipboard);
        let outcome = ctl.handle_action(&ToolbarAction::Clear, &NoClipboard);
        assert_eq!(outcome, DispatchOutcome::Local);
        assert_eq!(ctl.sink().sent, vec!["ls -la\n".to_string()]);
    }

    #[test]
    fn test_press_double_gesture_locks() {
        let mut ctl = controller();
        ctl.press(TapGesture {
            modifier: Modifier::Ctrl,
            double: false,
        });
        ctl.press(TapGesture {
            modifier: Modifier::Ctrl,
            double: true,
        });
        assert_eq!(ctl.modifiers().phase(Modifier::Ctrl), ModifierPhase::Locked);
    }

    #[tokio::test]
    async fn test_channel_sink_open_flag() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));
        let mut ctl = InputController::new(ChannelSink::new(tx, Arc::clone(&open)));

        assert!(!ctl.handle_key(&KeyInput::Char('a')).is_sent());

        open.store(true, Ordering::SeqCst);
        assert!(ctl.handle_key(&KeyInput::Char('b')).is_sent());

        match rx.recv().await {
            Some(ClientMessage::Input { data }) => assert_eq!(data, "b"),
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
