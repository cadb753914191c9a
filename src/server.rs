//! TCP server: accept loop, background tasks and shutdown orchestration.
//!
//! ```text
//!                 ┌────────────────────┐
//!   clients ────► │   accept loop      │──spawn──► ConnectionHandler (one task each)
//!                 └─────────┬──────────┘
//!                           │ shutdown future completes
//!                           ▼
//!   1. stop accepting
//!   2. signal connections, wait for them to finish the line in flight
//!   3. stop the expiry sweeper
//!   4. snapshot saver writes its final snapshot
//! ```

use crate::commands::CommandHandler;
use crate::config::ServerConfig;
use crate::connection::{handle_connection, ConnectionStats};
use crate::persistence::{SnapshotManager, SnapshotSaver};
use crate::storage::{ExpirySweeper, StorageEngine};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Pause after a transient accept error before accepting again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// How long shutdown waits for open connections before aborting them
const CONNECTION_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

// Descriptor exhaustion (ENFILE, EMFILE) has the same value on Linux and macOS
const ENFILE: i32 = 23;
const EMFILE: i32 = 24;

/// A bound PhotonKV server with its store already loaded.
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    storage: Arc<StorageEngine>,
    snapshots: Option<SnapshotManager>,
    stats: Arc<ConnectionStats>,
}

impl Server {
    /// Loads the snapshot (when persistence is enabled) and binds the listener.
    ///
    /// A snapshot that can't be read is logged and the server starts with an
    /// empty store. Only a bind failure is an error.
    pub async fn bind(config: ServerConfig) -> io::Result<Self> {
        let storage = Arc::new(StorageEngine::new());

        let snapshots = if config.persistence {
            let manager = SnapshotManager::new(&config.data_dir);
            match manager.load(&storage) {
                Ok(Some(keys)) => {
                    info!(keys, path = %manager.path().display(), "Snapshot loaded")
                }
                Ok(None) => {
                    info!(path = %manager.path().display(), "No snapshot found, starting empty")
                }
                Err(e) => warn!(
                    error = %e,
                    path = %manager.path().display(),
                    "Failed to load snapshot, starting with an empty store"
                ),
            }
            Some(manager)
        } else {
            info!("Persistence disabled");
            None
        };

        let listener = TcpListener::bind(config.bind_address()).await?;
        info!(address = %listener.local_addr()?, "Listening");

        Ok(Self {
            listener,
            config,
            storage,
            snapshots,
            stats: Arc::new(ConnectionStats::new()),
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    pub fn stats(&self) -> &Arc<ConnectionStats> {
        &self.stats
    }

    /// Serves clients until `shutdown` completes, then shuts down in order.
    ///
    /// Returns an error only if the listener fails in a way that retrying
    /// can't fix; background tasks are still stopped and the final snapshot
    /// is still written in that case.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> io::Result<()> {
        let Server {
            listener,
            config,
            storage,
            snapshots,
            stats,
        } = self;

        let sweeper = ExpirySweeper::start(Arc::clone(&storage), config.sweep.clone());
        let saver = snapshots.clone().map(|manager| {
            SnapshotSaver::start(Arc::clone(&storage), manager, config.snapshot_interval)
        });

        let handler = match snapshots {
            Some(manager) => CommandHandler::with_snapshots(Arc::clone(&storage), manager),
            None => CommandHandler::new(Arc::clone(&storage)),
        };

        let (notify_tx, notify_rx) = watch::channel(false);
        let mut connections = JoinSet::new();

        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received, stopping server");
                    break Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        connections.spawn(handle_connection(
                            stream,
                            addr,
                            handler.clone(),
                            Arc::clone(&stats),
                            notify_rx.clone(),
                        ));
                    }
                    Err(e) if is_transient(&e) => {
                        error!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                    Err(e) => {
                        error!(error = %e, "Listener failed, stopping accept loop");
                        break Err(e);
                    }
                },
                // Reap finished connection tasks
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        };

        drop(listener);

        let _ = notify_tx.send(true);
        let open = connections.len();
        if open > 0 {
            info!(connections = open, "Waiting for open connections to close");
        }
        let drained = tokio::time::timeout(CONNECTION_DRAIN_TIMEOUT, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                connections = connections.len(),
                "Connections did not close in time, aborting them"
            );
            connections.shutdown().await;
        }

        sweeper.stop().await;
        if let Some(saver) = saver {
            saver.stop().await;
        }

        info!("Server shutdown complete");
        result
    }
}

/// Accept errors worth retrying rather than ending the loop.
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    ) || matches!(e.raw_os_error(), Some(ENFILE) | Some(EMFILE))
}
