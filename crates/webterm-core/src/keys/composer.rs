//! Key Composer - Converts keystrokes plus sticky modifiers into shell bytes
//!
//! Printable characters go through the Ctrl table, named keys through the
//! ANSI table, and Alt/Meta add an ESC prefix.

use super::modifier::EffectiveModifiers;

const ESC: char = '\x1b';

/// Non-printable keys with a fixed escape sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    ArrowUp,
    ArrowDown,
    ArrowRight,
    ArrowLeft,
    Enter,
    Backspace,
    Tab,
    Escape,
    Home,
    End,
    PageUp,
    PageDown,
    Delete,
    Insert,
}

impl NamedKey {
    /// Parse a DOM-style key name (`"ArrowUp"`, `"Enter"`, `"Esc"`, ...)
    pub fn from_key_name(name: &str) -> Option<Self> {
        let key = match name {
            "ArrowUp" | "Up" => NamedKey::ArrowUp,
            "ArrowDown" | "Down" => NamedKey::ArrowDown,
            "ArrowRight" | "Right" => NamedKey::ArrowRight,
            "ArrowLeft" | "Left" => NamedKey::ArrowLeft,
            "Enter" | "Return" => NamedKey::Enter,
            "Backspace" => NamedKey::Backspace,
            "Tab" => NamedKey::Tab,
            "Escape" | "Esc" => NamedKey::Escape,
            "Home" => NamedKey::Home,
            "End" => NamedKey::End,
            "PageUp" => NamedKey::PageUp,
            "PageDown" => NamedKey::PageDown,
            "Delete" | "Del" => NamedKey::Delete,
            "Insert" => NamedKey::Insert,
            _ => return None,
        };
        Some(key)
    }

    /// Escape sequence sent for this key
    pub fn sequence(&self) -> &'static str {
        match self {
            NamedKey::ArrowUp => "\x1b[A",
            NamedKey::ArrowDown => "\x1b[B",
            NamedKey::ArrowRight => "\x1b[C",
            NamedKey::ArrowLeft => "\x1b[D",
            NamedKey::Enter => "\r",
            NamedKey::Backspace => "\x7f",
            NamedKey::Tab => "\t",
            NamedKey::Escape => "\x1b",
            NamedKey::Home => "\x1b[H",
            NamedKey::End => "\x1b[F",
            NamedKey::PageUp => "\x1b[5~",
            NamedKey::PageDown => "\x1b[6~",
            NamedKey::Delete => "\x1b[3~",
            NamedKey::Insert => "\x1b[2~",
        }
    }
}

/// A raw keystroke as reported by the terminal widget
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyInput {
    /// Single printable character
    Char(char),
    /// Non-printable key with a known sequence
    Named(NamedKey),
    /// Non-printable key without a mapping; composes to nothing
    Unmapped(String),
}

impl KeyInput {
    /// Classify a DOM-style `key` value: one character is printable,
    /// anything longer is a key name.
    pub fn from_dom_key(key: &str) -> Self {
        let mut chars = key.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => KeyInput::Char(c),
            _ => match NamedKey::from_key_name(key) {
                Some(named) => KeyInput::Named(named),
                None => KeyInput::Unmapped(key.to_string()),
            },
        }
    }
}

impl From<char> for KeyInput {
    fn from(c: char) -> Self {
        KeyInput::Char(c)
    }
}

impl From<NamedKey> for KeyInput {
    fn from(key: NamedKey) -> Self {
        KeyInput::Named(key)
    }
}

/// Bytes produced for one logical keystroke
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposedSequence(String);

impl ComposedSequence {
    pub fn new(data: impl Into<String>) -> Self {
        Self(data.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Map a character to its Ctrl control character.
///
/// Letters map to 0x01..=0x1A case-insensitively; `@ [ \ ] ^ _ ?` use the
/// fixed table. Returns `None` for anything else.
pub fn ctrl_char(c: char) -> Option<char> {
    let upper = c.to_ascii_uppercase();
    if upper.is_ascii_uppercase() {
        return Some((upper as u8 - 0x40) as char);
    }
    let byte: u8 = match c {
        '@' => 0x00,
        '[' => 0x1b,
        '\\' => 0x1c,
        ']' => 0x1d,
        '^' => 0x1e,
        '_' => 0x1f,
        '?' => 0x7f,
        _ => return None,
    };
    Some(byte as char)
}

/// Composer options
#[derive(Debug, Clone, Copy, Default)]
pub struct ComposerOptions {
    /// Emit one ESC per effective Alt/Meta instead of a single ESC.
    /// Only needed for byte compatibility with older clients.
    pub stack_meta_prefixes: bool,
}

/// Stateless key composer
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyComposer {
    options: ComposerOptions,
}

impl KeyComposer {
    pub fn new(options: ComposerOptions) -> Self {
        Self { options }
    }

    /// Compose the bytes for `key` under the given modifier flags
    pub fn compose(&self, key: &KeyInput, mods: EffectiveModifiers) -> ComposedSequence {
        let body = match key {
            KeyInput::Char(c) => {
                let c = if mods.ctrl { ctrl_char(*c).unwrap_or(*c) } else { *c };
                c.to_string()
            }
            // Ctrl has no mapping for named keys
            KeyInput::Named(named) => named.sequence().to_string(),
            KeyInput::Unmapped(_) => return ComposedSequence::default(),
        };

        let prefixes = match mods.meta_class_count() {
            0 => 0,
            n if self.options.stack_meta_prefixes => n,
            _ => 1,
        };

        let mut out = String::with_capacity(prefixes + body.len());
        for _ in 0..prefixes {
            out.push(ESC);
        }
        out.push_str(&body);
        ComposedSequence(out)
    }
}
