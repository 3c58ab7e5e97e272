//! Shell Session - one shell process bound to one connection
//!
//! Lifecycle: Connecting -> Active -> Closed. Closed is terminal; a new
//! connection always gets a new session.

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use super::process::{ProcessSpawner, SessionError, ShellProcess};
use super::shell::ShellSpec;
use crate::viewport::Geometry;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Connection accepted, shell not yet spawned
    Connecting,
    /// Shell running and bridged
    Active,
    /// Connection gone, shell terminated
    Closed,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Connecting => "connecting",
            SessionPhase::Active => "active",
            SessionPhase::Closed => "closed",
        }
    }
}

/// Session id: `term-<unix millis>-<8 hex>`
pub fn new_session_id() -> String {
    format!(
        "term-{}-{}",
        Utc::now().timestamp_millis(),
        &Uuid::new_v4().simple().to_string()[..8]
    )
}

/// One connection's shell
pub struct ShellSession {
    pub id: String,
    geometry: Geometry,
    phase: SessionPhase,
    process: Option<Box<dyn ShellProcess>>,
}

impl ShellSession {
    pub fn new(initial: Geometry) -> Self {
        Self {
            id: new_session_id(),
            geometry: initial,
            phase: SessionPhase::Connecting,
            process: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(|p| p.pid())
    }

    /// Spawn the shell and enter Active. Returns the output stream.
    pub fn start(
        &mut self,
        spawner: &dyn ProcessSpawner,
        spec: &ShellSpec,
    ) -> Result<mpsc::UnboundedReceiver<Vec<u8>>, SessionError> {
        if self.phase != SessionPhase::Connecting {
            return Err(SessionError::InvalidPhase(self.phase.as_str()));
        }

        let spawned = spawner.spawn(spec, self.geometry)?;
        info!(
            session_id = %self.id,
            pid = ?spawned.process.pid(),
            geometry = %self.geometry,
            "Session active"
        );
        self.process = Some(spawned.process);
        self.phase = SessionPhase::Active;
        Ok(spawned.output)
    }

    /// Write input bytes verbatim
    pub fn write_input(&mut self, data: &[u8]) -> Result<(), SessionError> {
        self.active_process()?.write(data)
    }

    /// Apply a new geometry to the running shell, no restart
    pub fn resize(&mut self, geometry: Geometry) -> Result<(), SessionError> {
        self.active_process()?.resize(geometry)?;
        debug!(session_id = %self.id, %geometry, "Session resized");
        self.geometry = geometry;
        Ok(())
    }

    /// Terminate the shell and enter Closed. Kill errors are discarded.
    pub fn close(&mut self) {
        if self.phase == SessionPhase::Closed {
            return;
        }
        self.phase = SessionPhase::Closed;
        if let Some(mut process) = self.process.take() {
            if let Err(e) = process.kill() {
                debug!(session_id = %self.id, error = %e, "Kill failed, ignoring");
            }
        }
        info!(session_id = %self.id, "Session closed");
    }

    fn active_process(&mut self) -> Result<&mut Box<dyn ShellProcess>, SessionError> {
        match (self.phase, self.process.as_mut()) {
            (SessionPhase::Active, Some(process)) => Ok(process),
            (phase, _) => Err(SessionError::InvalidPhase(phase.as_str())),
        }
    }
}

impl Drop for ShellSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pty::process::SpawnedProcess;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Record {
        written: Vec<u8>,
        resizes: Vec<Geometry>,
        killed: bool,
    }

    struct FakeProcess {
        record: Arc<Mutex<Record>>,
        fail_kill: bool,
    }

    impl ShellProcess for FakeProcess {
        fn write(&mut self, data: &[u8]) -> Result<(), SessionError> {
            self.record.lock().unwrap().written.extend_from_slice(data);
            Ok(())
        }

        fn resize(&mut self, geometry: Geometry) -> Result<(), SessionError> {
            self.record.lock().unwrap().resizes.push(geometry);
            Ok(())
        }

        fn kill(&mut self) -> Result<(), SessionError> {
            self.record.lock().unwrap().killed = true;
            if self.fail_kill {
                return Err(SessionError::Exited);
            }
            Ok(())
        }

        fn pid(&self) -> Option<u32> {
            Some(42)
        }

        fn has_exited(&self) -> bool {
            false
        }
    }

    struct FakeSpawner {
        record: Arc<Mutex<Record>>,
        spawned_at: Mutex<Vec<Geometry>>,
        fail_kill: bool,
    }

    impl FakeSpawner {
        fn new() -> Self {
            Self {
                record: Arc::new(Mutex::new(Record::default())),
                spawned_at: Mutex::new(Vec::new()),
                fail_kill: false,
            }
        }
    }

    impl ProcessSpawner for FakeSpawner {
        fn spawn(&self, _spec: &ShellSpec, geometry: Geometry) -> Result<SpawnedProcess, SessionError> {
            self.spawned_at.lock().unwrap().push(geometry);
            let (_tx, rx) = mpsc::unbounded_channel();
            Ok(SpawnedProcess {
                process: Box::new(FakeProcess {
                    record: Arc::clone(&self.record),
                    fail_kill: self.fail_kill,
                }),
                output: rx,
            })
        }
    }

    struct FailingSpawner;

    impl ProcessSpawner for FailingSpawner {
        fn spawn(&self, _spec: &ShellSpec, _geometry: Geometry) -> Result<SpawnedProcess, SessionError> {
            Err(SessionError::Spawn("no such shell".to_string()))
        }
    }

    fn spec() -> ShellSpec {
        ShellSpec::with_program("/bin/sh")
    }

    #[test]
    fn test_session_lifecycle() {
        let spawner = FakeSpawner::new();
        let mut session = ShellSession::new(Geometry::default());
        assert_eq!(session.phase(), SessionPhase::Connecting);

        session.start(&spawner, &spec()).unwrap();
        assert_eq!(session.phase(), SessionPhase::Active);
        assert_eq!(*spawner.spawned_at.lock().unwrap(), vec![Geometry::new(80, 24)]);
        assert_eq!(session.pid(), Some(42));

        session.write_input(b"ls\r").unwrap();
        session.resize(Geometry::new(100, 25)).unwrap();
        assert_eq!(session.geometry(), Geometry::new(100, 25));

        session.close();
        assert_eq!(session.phase(), SessionPhase::Closed);

        let record = spawner.record.lock().unwrap();
        assert_eq!(record.written, b"ls\r");
        assert_eq!(record.resizes, vec![Geometry::new(100, 25)]);
        assert!(record.killed);
    }

    #[test]
    fn test_closed_is_terminal() {
        let spawner = FakeSpawner::new();
        let mut session = ShellSession::new(Geometry::default());
        session.start(&spawner, &spec()).unwrap();
        session.close();

        assert!(matches!(
            session.write_input(b"x"),
            Err(SessionError::InvalidPhase("closed"))
        ));
        assert!(session.start(&spawner, &spec()).is_err());
        assert_eq!(spawner.spawned_at.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_input_before_start_rejected() {
        let mut session = ShellSession::new(Geometry::default());
        assert!(session.write_input(b"x").is_err());
        assert!(session.resize(Geometry::new(10, 10)).is_err());
        assert_eq!(session.geometry(), Geometry::default());
    }

    #[test]
    fn test_spawn_failure_surfaces() {
        let mut session = ShellSession::new(Geometry::default());
        let err = session.start(&FailingSpawner, &spec()).unwrap_err();
        assert!(matches!(err, SessionError::Spawn(_)));
        assert_eq!(session.phase(), SessionPhase::Connecting);
    }

    #[test]
    fn test_kill_error_discarded() {
        let mut spawner = FakeSpawner::new();
        spawner.fail_kill = true;
        let mut session = ShellSession::new(Geometry::default());
        session.start(&spawner, &spec()).unwrap();

        session.close();
        assert_eq!(session.phase(), SessionPhase::Closed);
        assert!(spawner.record.lock().unwrap().killed);
    }

    #[test]
    fn test_drop_kills_process() {
        let spawner = FakeSpawner::new();
        {
            let mut session = ShellSession::new(Geometry::default());
            session.start(&spawner, &spec()).unwrap();
        }
        assert!(spawner.record.lock().unwrap().killed);
    }

    #[test]
    fn test_session_id_format() {
        let id = new_session_id();
        assert!(id.starts_with("term-"));
        assert_eq!(id.rsplit('-').next().map(str::len), Some(8));
        assert_ne!(id, new_session_id());
    }
}
