//! WebSocket module for bridging browser terminals to shells
//!
//! Each accepted connection:
//! 1. Spawns one shell at 80x24
//! 2. Relays input / resize / output until either side closes
//! 3. Kills the shell

mod bridge;
mod server;

pub use bridge::{BridgeOptions, SessionBridge, SessionSummary, CLOSE_SPAWN_FAILED};
pub use server::{ServerOptions, TerminalServer};
