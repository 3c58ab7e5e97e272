//! Shell selection
//!
//! The shell is picked by host platform; there is no per-session override.

use std::path::PathBuf;

use portable_pty::CommandBuilder;

/// TERM exported to spawned shells
pub const DEFAULT_TERM: &str = "xterm-256color";

/// What to spawn for each session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory (the hosting process's current directory by default)
    pub cwd: PathBuf,
    /// Extra variables applied on top of the inherited environment
    pub env: Vec<(String, String)>,
}

impl Default for ShellSpec {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl ShellSpec {
    /// `powershell.exe` on Windows, `bash` elsewhere
    pub fn platform_default() -> Self {
        Self::with_program(default_program())
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
            env: vec![("TERM".to_string(), DEFAULT_TERM.to_string())],
        }
    }

    /// Build the portable-pty command.
    ///
    /// CommandBuilder starts from an empty environment, so the whole parent
    /// environment is copied before the extra variables.
    pub fn command(&self) -> CommandBuilder {
        let mut cmd = CommandBuilder::new(&self.program);
        cmd.args(&self.args);
        cmd.cwd(&self.cwd);
        for (key, value) in std::env::vars() {
            cmd.env(key, value);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }
}

#[cfg(windows)]
fn default_program() -> String {
    "powershell.exe".to_string()
}

#[cfg(not(windows))]
fn default_program() -> String {
    if find_in_path("bash").is_some() {
        return "bash".to_string();
    }
    std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
}

#[cfg(not(windows))]
fn find_in_path(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_file(candidate))
}

#[cfg(not(windows))]
fn is_file(path: &std::path::Path) -> bool {
    path.metadata().map(|m| m.is_file()).unwrap_or(false)
}
