//! Keys Module - Sticky-modifier key composition for touch clients
//!
//! # Components
//! - `ModifierSet`: Ctrl/Alt/Meta sticky state (armed / locked)
//! - `KeyComposer`: keystroke + modifiers -> bytes for the shell
//! - `ToolbarAction`: declarative toolbar buttons (literals, ^X, paste, commands)
//! - `InputController`: owns the modifier state and feeds an `InputSink`

mod composer;
mod controller;
mod modifier;
mod toolbar;

pub use composer::{ctrl_char, ComposedSequence, ComposerOptions, KeyComposer, KeyInput, NamedKey};
pub use controller::{ChannelSink, DispatchOutcome, InputController, InputSink, RecordingSink};
pub use modifier::{EffectiveModifiers, Modifier, ModifierPhase, ModifierSet, ModifierState};
pub use toolbar::{
    ctrl_action_text, decode_literal, ClipboardSource, NoClipboard, TapGesture, TapTracker,
    ToolbarAction, DOUBLE_TAP_WINDOW,
};
