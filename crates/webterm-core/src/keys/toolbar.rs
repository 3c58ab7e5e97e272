//! Toolbar - Declarative toolbar actions and tap gesture detection

use std::time::{Duration, Instant};

use super::composer::{ctrl_char, NamedKey};
use super::modifier::Modifier;

/// Default window in which a second press counts as a double tap
pub const DOUBLE_TAP_WINDOW: Duration = Duration::from_millis(300);

/// A toolbar button's behaviour
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolbarAction {
    /// Escape specification decoded at click time (`\x1b`, `\t`, `\n`)
    Literal(String),
    /// Ctrl+<char>, independent of the sticky Ctrl state
    SendCtrl(char),
    /// Named key composed like a hardware key (arrows, Enter, ...)
    Key(NamedKey),
    /// Read the clipboard and send its text
    Paste,
    /// Quick command, sent followed by a newline
    Command(String),
    /// Clear the local terminal view; nothing is sent
    Clear,
}

/// Source of clipboard text
///
/// Returns `None` when the clipboard is empty or access was denied.
pub trait ClipboardSource {
    fn read_text(&self) -> Option<String>;
}

/// Clipboard that is never available
pub struct NoClipboard;

impl ClipboardSource for NoClipboard {
    fn read_text(&self) -> Option<String> {
        None
    }
}

impl<F> ClipboardSource for F
where
    F: Fn() -> Option<String>,
{
    fn read_text(&self) -> Option<String> {
        self()
    }
}

/// Decode a literal escape specification.
///
/// Supports `\xHH` hex bytes, `\t` and `\n`. Malformed escapes are kept as
/// written.
pub fn decode_literal(spec: &str) -> String {
    let mut out = String::with_capacity(spec.len());
    let mut rest = spec;

    while let Some(pos) = rest.find('\\') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        let hex = tail
            .strip_prefix("\\x")
            .and_then(|t| t.get(..2))
            .filter(|h| h.bytes().all(|b| b.is_ascii_hexdigit()));
        if let Some(hex) = hex {
            if let Ok(byte) = u8::from_str_radix(hex, 16) {
                out.push(char::from(byte));
                rest = &tail[4..];
                continue;
            }
        }
        if tail.starts_with("\\t") {
            out.push('\t');
            rest = &tail[2..];
        } else if tail.starts_with("\\n") {
            out.push('\n');
            rest = &tail[2..];
        } else {
            out.push('\\');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

/// Bytes for a Ctrl toolbar button: mapped control char, or the raw char
pub fn ctrl_action_text(c: char) -> String {
    ctrl_char(c).unwrap_or(c).to_string()
}

/// Result of a modifier button press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapGesture {
    pub modifier: Modifier,
    /// The press completed a double tap
    pub double: bool,
}

/// Detects double taps on modifier buttons.
///
/// Every press is a tap; the second press of the same modifier inside the
/// window is additionally a double tap, mirroring click + dblclick.
#[derive(Debug, Clone)]
pub struct TapTracker {
    window: Duration,
    last: Option<(Modifier, Instant)>,
}

impl Default for TapTracker {
    fn default() -> Self {
        Self::new(DOUBLE_TAP_WINDOW)
    }
}

impl TapTracker {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    pub fn press(&mut self, modifier: Modifier, now: Instant) -> TapGesture {
        let double = matches!(
            self.last,
            Some((prev, at)) if prev == modifier && now.saturating_duration_since(at) <= self.window
        );
        self.last = if double { None } else { Some((modifier, now)) };
        TapGesture { modifier, double }
    }
}
