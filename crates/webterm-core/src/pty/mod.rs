//! PTY Module - One interactive shell per connection
//!
//! # Components
//! - `ShellSpec`: which shell to run, with inherited cwd and environment
//! - `ProcessSpawner` / `ShellProcess`: spawn capability (portable-pty natively)
//! - `ShellSession`: Connecting -> Active -> Closed lifecycle around one process

mod process;
mod session;
mod shell;

pub use process::{NativeSpawner, ProcessSpawner, SessionError, ShellProcess, SpawnedProcess};
pub use session::{new_session_id, SessionPhase, ShellSession};
pub use shell::{ShellSpec, DEFAULT_TERM};
