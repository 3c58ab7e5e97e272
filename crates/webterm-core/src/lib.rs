//! Core library for webterm
//!
//! A browser terminal for touch devices: the client side emulates Ctrl/Alt/Meta
//! with sticky toolbar modifiers, the server side bridges each WebSocket
//! connection to its own shell on a pseudo-terminal.
//!
//! # Modules
//!
//! - `keys`: sticky modifiers, key composition, toolbar actions, input controller
//! - `viewport`: terminal geometry from container size and font metrics
//! - `protocol`: JSON control channel messages
//! - `pty`: shell spawning and per-connection session lifecycle
//! - `ws`: session bridge and WebSocket server
//! - `config`: server configuration from the environment
//!
//! # Example
//!
//! ```no_run
//! use webterm_core::{ServerConfig, ServerOptions, TerminalServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env();
//!     let mut server = TerminalServer::new(ServerOptions {
//!         bind: config.bind.clone(),
//!         port: config.port,
//!         ..Default::default()
//!     });
//!     server.start().await?;
//!     tokio::signal::ctrl_c().await?;
//!     server.stop().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod keys;
pub mod protocol;
pub mod pty;
pub mod viewport;
pub mod ws;

pub use config::ServerConfig;
pub use protocol::{ClientMessage, OutputEncoding, ProtocolError, ServerMessage};
pub use pty::{NativeSpawner, ProcessSpawner, SessionError, ShellSession, ShellSpec};
pub use viewport::{Geometry, ViewportFitter};
pub use ws::{BridgeOptions, ServerOptions, SessionBridge, SessionSummary, TerminalServer};
