//! Server configuration from environment variables
//!
//! | Variable                  | Default        |
//! |---------------------------|----------------|
//! | `WEBTERM_PORT` / `PORT`   | `3000`         |
//! | `WEBTERM_BIND`            | `0.0.0.0`      |
//! | `WEBTERM_OUTPUT_ENCODING` | `base64`       |
//! | `WEBTERM_LOG_LEVEL`       | `info`         |
//! | `RUST_LOG`                | overrides log level |
//! | `WEBTERM_HOME`            | `~/.webterm`   |

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::warn;

use crate::protocol::OutputEncoding;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND: &str = "0.0.0.0";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Where configuration values come from
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Daemon configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub output_encoding: OutputEncoding,
    pub home: PathBuf,
    /// Tracing filter directive
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            output_encoding: OutputEncoding::default(),
            home: default_home(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_source(&ProcessEnv)
    }

    pub fn from_source(env: &dyn EnvSource) -> Self {
        let mut config = Self::default();

        if let Some(home) = env.get("WEBTERM_HOME") {
            config.home = PathBuf::from(home);
        }
        if let Some(bind) = env.get("WEBTERM_BIND") {
            config.bind = bind;
        }

        let port = env.get("WEBTERM_PORT").or_else(|| env.get("PORT"));
        if let Some(raw) = port {
            match raw.parse::<u16>() {
                Ok(port) => config.port = port,
                Err(_) => warn!(value = %raw, "Invalid port, using default {}", DEFAULT_PORT),
            }
        }

        if let Some(raw) = env.get("WEBTERM_OUTPUT_ENCODING") {
            match OutputEncoding::from_name(&raw) {
                Some(encoding) => config.output_encoding = encoding,
                None => warn!(value = %raw, "Unknown output encoding, using base64"),
            }
        }

        config.log_level = log_directive(env);
        config
    }

    pub fn log_dir(&self) -> PathBuf {
        self.home.join("logs")
    }

    /// Create the home and log directories, returns the log directory
    pub fn ensure_dirs(&self) -> std::io::Result<PathBuf> {
        let log_dir = self.log_dir();
        std::fs::create_dir_all(&log_dir)?;
        Ok(log_dir)
    }

    /// `bind:port`
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn default_home() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".webterm"))
        .unwrap_or_else(|| PathBuf::from(".webterm"))
}

/// `RUST_LOG` wins; otherwise `WEBTERM_LOG_LEVEL` with `silent` and `fatal` aliases
fn log_directive(env: &dyn EnvSource) -> String {
    if let Some(v) = env.get("RUST_LOG") {
        return v;
    }
    match env.get("WEBTERM_LOG_LEVEL") {
        Some(v) => match v.as_str() {
            "silent" => "off".to_string(),
            "fatal" => "error".to_string(),
            other => other.to_string(),
        },
        None => DEFAULT_LOG_LEVEL.to_string(),
    }
}
