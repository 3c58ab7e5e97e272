//! webtermd - serves browser terminals over WebSocket
//!
//! Every connection gets its own shell, killed when the connection closes.
//! Configuration comes from the environment, see `webterm_core::config`.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use webterm_core::pty::{NativeSpawner, ShellSpec};
use webterm_core::ws::{BridgeOptions, ServerOptions, TerminalServer};
use webterm_core::{Geometry, ServerConfig};

fn log_filter(config: &ServerConfig) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
}

fn server_options(config: &ServerConfig) -> ServerOptions {
    ServerOptions {
        bind: config.bind.clone(),
        port: config.port,
        bridge: BridgeOptions {
            shell: ShellSpec::platform_default(),
            encoding: config.output_encoding,
            initial_geometry: Geometry::default(),
        },
        spawner: Arc::new(NativeSpawner),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_env();
    let log_dir = config.ensure_dirs().ok();

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    // Dual-layer logging: stderr + file (daily rotation)
    let (file_layer, _guard) = match &log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "webtermd.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(log_filter(&config))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    if log_dir.is_none() {
        warn!(home = %config.home.display(), "Log directory unavailable, logging to stderr only");
    }

    // Panic hook: log panic info to the file layer too
    std::panic::set_hook(Box::new(|info| {
        let payload = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_default();
        eprintln!("PANIC at {}: {}", location, payload);
        tracing::error!(location = %location, "DAEMON PANIC: {}", payload);
    }));

    let options = server_options(&config);
    info!(
        shell = %options.bridge.shell.program,
        cwd = %options.bridge.shell.cwd.display(),
        encoding = ?config.output_encoding,
        "webtermd starting"
    );

    let mut server = TerminalServer::new(options);
    let addr = server
        .start()
        .await
        .with_context(|| format!("Failed to listen on {}", config.listen_addr()))?;
    info!(%addr, "Listening for terminal connections");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for shutdown signal")?;
    info!(active = server.active_sessions(), "Shutdown requested");
    server.stop().await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use webterm_core::OutputEncoding;

    #[test]
    fn test_server_options_follow_config() {
        let config = ServerConfig {
            bind: "127.0.0.1".to_string(),
            port: 4000,
            output_encoding: OutputEncoding::Text,
            ..Default::default()
        };
        let options = server_options(&config);
        assert_eq!(options.bind, "127.0.0.1");
        assert_eq!(options.port, 4000);
        assert_eq!(options.bridge.encoding, OutputEncoding::Text);
        assert_eq!(options.bridge.initial_geometry, Geometry::new(80, 24));
    }

    #[test]
    fn test_invalid_filter_falls_back() {
        let config = ServerConfig {
            log_level: "[[not a filter".to_string(),
            ..Default::default()
        };
        // Falls back instead of panicking
        let _ = log_filter(&config);
    }
}
