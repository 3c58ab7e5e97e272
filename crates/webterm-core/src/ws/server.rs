//! WebSocket Server implementation
//!
//! Every upgrade, on any path, gets its own freshly spawned shell:
//! `ws://host:port/<anything>`
//!
//! Messages are described in [`crate::protocol`].

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{Request as WsRequest, Response as WsResponse};
use tracing::{debug, error, info};

use super::bridge::{BridgeOptions, SessionBridge};
use crate::pty::{NativeSpawner, ProcessSpawner};

/// WebSocket server options
pub struct ServerOptions {
    /// Bind address
    pub bind: String,
    /// Server port (0 picks a free port)
    pub port: u16,
    pub bridge: BridgeOptions,
    pub spawner: Arc<dyn ProcessSpawner>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3000,
            bridge: BridgeOptions::default(),
            spawner: Arc::new(NativeSpawner),
        }
    }
}

/// Terminal WebSocket Server
pub struct TerminalServer {
    bind: String,
    port: u16,
    bridge: SessionBridge,
    active: Arc<AtomicUsize>,
    shutdown_tx: Option<broadcast::Sender<()>>,
}

impl TerminalServer {
    /// Create a new WebSocket server
    pub fn new(options: ServerOptions) -> Self {
        Self {
            bind: options.bind,
            port: options.port,
            bridge: SessionBridge::new(options.spawner, options.bridge),
            active: Arc::new(AtomicUsize::new(0)),
            shutdown_tx: None,
        }
    }

    /// Number of connections currently bridged to a shell
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Start the server, returns the bound address
    pub async fn start(&mut self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.bind, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        let local_addr = listener.local_addr()?;

        info!(addr = %local_addr, "Terminal WebSocket server started");

        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx.clone());

        let bridge = self.bridge.clone();
        let active = Arc::clone(&self.active);

        tokio::spawn(async move {
            let mut shutdown_rx = shutdown_tx.subscribe();
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, addr)) => {
                                let bridge = bridge.clone();
                                let active = Arc::clone(&active);
                                tokio::spawn(async move {
                                    if let Err(e) = Self::handle_connection(stream, addr, bridge, active).await {
                                        error!(error = %e, %addr, "WebSocket connection error");
                                    }
                                });
                            }
                            Err(e) => {
                                error!(error = %e, "Failed to accept connection");
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("WebSocket server shutting down");
                        break;
                    }
                }
            }
        });

        Ok(local_addr)
    }

    /// Stop accepting connections. Bridged sessions run until their clients leave.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        info!("Terminal WebSocket server stopped");
    }

    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        bridge: SessionBridge,
        active: Arc<AtomicUsize>,
    ) -> anyhow::Result<()> {
        // Any path is accepted; it is only logged
        let ws_stream = accept_hdr_async(stream, |req: &WsRequest, resp: WsResponse| {
            debug!(%addr, path = req.uri().path(), "WebSocket upgrade");
            Ok(resp)
        })
        .await
        .context("WebSocket handshake failed")?;

        let peer = addr.to_string();
        active.fetch_add(1, Ordering::SeqCst);
        let result = bridge.run(ws_stream, &peer).await;
        active.fetch_sub(1, Ordering::SeqCst);

        result.map(|_| ())
    }
}
