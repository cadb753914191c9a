//! Background Snapshot Saver
//!
//! Periodically writes a snapshot of the store and performs one last save
//! when the server shuts down.
//!
//! The store is copied under its lock on the async side; serialization and
//! file I/O run on the blocking pool so the runtime keeps serving clients
//! while a large snapshot is written.

use super::snapshot::{SnapshotError, SnapshotManager};
use crate::storage::StorageEngine;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// Handle to the background snapshot task.
///
/// Dropping the handle signals the task to stop; use [`SnapshotSaver::stop`]
/// to also wait for the final save.
#[derive(Debug)]
pub struct SnapshotSaver {
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SnapshotSaver {
    /// Starts saving `engine` every `interval`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(engine: Arc<StorageEngine>, manager: SnapshotManager, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            path = %manager.path().display(),
            interval_secs = interval.as_secs(),
            "Background snapshot saver started"
        );
        let task = tokio::spawn(saver_loop(engine, manager, interval, shutdown_rx));

        Self {
            shutdown_tx,
            task: Some(task),
        }
    }

    /// Stops the saver and waits until the final snapshot is on disk.
    pub async fn stop(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!("Background snapshot saver stopped");
    }
}

impl Drop for SnapshotSaver {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

async fn saver_loop(
    engine: Arc<StorageEngine>,
    manager: SnapshotManager,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                save_logged(&engine, &manager).await;
            }
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Snapshot saver received shutdown signal");
                    break;
                }
            }
        }
    }

    info!("Writing final snapshot before shutdown");
    save_logged(&engine, &manager).await;
}

/// Copies the store and writes it on the blocking pool.
pub async fn save_snapshot(
    engine: &StorageEngine,
    manager: &SnapshotManager,
) -> Result<usize, SnapshotError> {
    let entries = engine.export();
    let manager = manager.clone();

    tokio::task::spawn_blocking(move || manager.write(entries))
        .await
        .map_err(|e| SnapshotError::Io(io::Error::other(e)))?
}

async fn save_logged(engine: &StorageEngine, manager: &SnapshotManager) -> bool {
    match save_snapshot(engine, manager).await {
        Ok(keys) => {
            info!(keys, path = %manager.path().display(), "Snapshot saved");
            true
        }
        Err(e) => {
            error!(error = %e, path = %manager.path().display(), "Snapshot save failed");
            false
        }
    }
}
