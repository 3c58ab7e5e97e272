//! Shell process - portable-pty backed process behind a small trait seam
//!
//! The bridge only needs write / resize / kill plus a stream of output
//! chunks, so tests can swap in an in-memory process.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use portable_pty::{native_pty_system, ChildKiller, MasterPty, PtySize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::shell::ShellSpec;
use crate::viewport::Geometry;

/// PTY read buffer size
const READ_CHUNK: usize = 4096;

/// Session / process errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to spawn shell: {0}")]
    Spawn(String),

    #[error("Failed to resize PTY: {0}")]
    Resize(String),

    #[error("Session is {0}")]
    InvalidPhase(&'static str),

    #[error("Shell process has exited")]
    Exited,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle to a running shell
pub trait ShellProcess: Send {
    /// Write bytes to the shell's input, in order
    fn write(&mut self, data: &[u8]) -> Result<(), SessionError>;

    /// Apply a new geometry without restarting the process
    fn resize(&mut self, geometry: Geometry) -> Result<(), SessionError>;

    /// Terminate immediately
    fn kill(&mut self) -> Result<(), SessionError>;

    fn pid(&self) -> Option<u32>;

    fn has_exited(&self) -> bool;
}

/// A spawned process plus its output stream
pub struct SpawnedProcess {
    pub process: Box<dyn ShellProcess>,
    /// Output chunks in the order the process produced them.
    /// Closed when the process output reaches EOF.
    pub output: mpsc::UnboundedReceiver<Vec<u8>>,
}

/// Something that can start shells
pub trait ProcessSpawner: Send + Sync {
    fn spawn(&self, spec: &ShellSpec, geometry: Geometry) -> Result<SpawnedProcess, SessionError>;
}

// ========== Native (portable-pty) ==========

/// Spawns shells on the host's native PTY system
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeSpawner;

impl ProcessSpawner for NativeSpawner {
    fn spawn(&self, spec: &ShellSpec, geometry: Geometry) -> Result<SpawnedProcess, SessionError> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(pty_size(geometry))
            .map_err(|e| SessionError::Spawn(e.to_string()))?;

        let mut child = pair
            .slave
            .spawn_command(spec.command())
            .map_err(|e| SessionError::Spawn(e.to_string()))?;
        // Only the child keeps the slave open, so reads see EOF once it exits
        drop(pair.slave);

        let pid = child.process_id();
        let killer = child.clone_killer();
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| SessionError::Spawn(e.to_string()))?;
        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| SessionError::Spawn(e.to_string()))?;

        info!(program = %spec.program, pid = ?pid, %geometry, "Shell spawned");

        let (output_tx, output_rx) = mpsc::unbounded_channel();
        tokio::task::spawn_blocking(move || read_loop(reader, output_tx));

        let exited = Arc::new(AtomicBool::new(false));
        let exited_flag = Arc::clone(&exited);
        tokio::task::spawn_blocking(move || {
            let code = child.wait().map(|s| s.exit_code()).ok();
            exited_flag.store(true, Ordering::SeqCst);
            info!(pid = ?pid, exit_code = ?code, "Shell exited");
        });

        Ok(SpawnedProcess {
            process: Box::new(NativeProcess {
                master: pair.master,
                writer,
                killer,
                pid,
                exited,
            }),
            output: output_rx,
        })
    }
}

fn pty_size(geometry: Geometry) -> PtySize {
    PtySize {
        rows: geometry.rows,
        cols: geometry.cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

/// Blocking PTY reader; forwards each chunk as read
fn read_loop(mut reader: Box<dyn Read + Send>, output_tx: mpsc::UnboundedSender<Vec<u8>>) {
    let mut buf = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if output_tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                // EIO is the normal end of a Linux PTY after the child exits
                debug!(error = %e, "PTY read ended");
                break;
            }
        }
    }
}

struct NativeProcess {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    pid: Option<u32>,
    exited: Arc<AtomicBool>,
}

impl ShellProcess for NativeProcess {
    fn write(&mut self, data: &[u8]) -> Result<(), SessionError> {
        if self.has_exited() {
            return Err(SessionError::Exited);
        }
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    fn resize(&mut self, geometry: Geometry) -> Result<(), SessionError> {
        self.master
            .resize(pty_size(geometry))
            .map_err(|e| SessionError::Resize(e.to_string()))
    }

    fn kill(&mut self) -> Result<(), SessionError> {
        if self.has_exited() {
            return Ok(());
        }
        self.killer.kill()?;
        Ok(())
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }
}
