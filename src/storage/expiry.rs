//! Background Expiry Sweeper
//!
//! Lazy expiry only removes a key when somebody touches it. A key that
//! expires and is never read again would sit in memory forever, so this
//! task periodically drains the engine's expiry queue through
//! [`StorageEngine::cleanup_expired_keys`].
//!
//! ## Adaptive Frequency
//!
//! When a sweep removes a large fraction of the resident keys the interval
//! is halved (down to `min_interval`); when a sweep finds nothing it is
//! doubled (up to `max_interval`).

use crate::storage::StorageEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpiryConfig {
    /// Starting interval between sweeps (default: 100ms)
    pub base_interval: Duration,

    /// Minimum interval between sweeps (default: 10ms)
    pub min_interval: Duration,

    /// Maximum interval between sweeps (default: 1s)
    pub max_interval: Duration,

    /// Speed up when a sweep removes more than this fraction of keys
    pub speedup_threshold: f64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(100),
            min_interval: Duration::from_millis(10),
            max_interval: Duration::from_secs(1),
            speedup_threshold: 0.25,
        }
    }
}

/// A handle to the running expiry sweeper.
///
/// When this handle is dropped, the sweeper task is stopped.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl ExpirySweeper {
    /// Starts the expiry sweeper as a background task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(engine: Arc<StorageEngine>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(sweeper_loop(engine, config, shutdown_rx));
        info!("Background expiry sweeper started");

        Self {
            shutdown_tx,
            task: Some(task),
        }
    }

    /// Stops the sweeper and waits for the task to finish.
    pub async fn stop(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!("Background expiry sweeper stopped");
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

async fn sweeper_loop(
    engine: Arc<StorageEngine>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut current_interval = config.base_interval;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(current_interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let keys_before = engine.dbsize();
        let expired = engine.cleanup_expired_keys();

        if expired == 0 {
            current_interval = (current_interval * 2).min(config.max_interval);
            trace!(
                new_interval_ms = current_interval.as_millis(),
                "Nothing expired, slowing down sweeper"
            );
            continue;
        }

        let expiry_rate = expired as f64 / keys_before.max(1) as f64;
        if expiry_rate > config.speedup_threshold {
            current_interval = (current_interval / 2).max(config.min_interval);
        }

        debug!(
            expired = expired,
            keys_remaining = engine.dbsize(),
            rate = %format!("{:.2}%", expiry_rate * 100.0),
            interval_ms = current_interval.as_millis(),
            "Expired keys cleaned up"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> ExpiryConfig {
        ExpiryConfig {
            base_interval: Duration::from_millis(10),
            min_interval: Duration::from_millis(5),
            max_interval: Duration::from_millis(20),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_sweeper_cleans_expired_keys() {
        let engine = Arc::new(StorageEngine::new());

        for i in 0..10 {
            engine.set(&format!("key{}", i), "value", Some(Duration::from_millis(30)));
        }
        engine.set("persistent", "value", None);
        assert_eq!(engine.dbsize(), 11);

        let _sweeper = ExpirySweeper::start(Arc::clone(&engine), fast_config());

        tokio::time::sleep(Duration::from_millis(200)).await;

        // Removed without anybody reading them
        assert_eq!(engine.dbsize(), 1);
        assert!(engine.exists("persistent"));
    }

    #[tokio::test]
    async fn test_sweeper_stops() {
        let engine = Arc::new(StorageEngine::new());

        let sweeper = ExpirySweeper::start(Arc::clone(&engine), fast_config());
        tokio::time::sleep(Duration::from_millis(30)).await;
        sweeper.stop().await;

        engine.set("key", "value", Some(Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_millis(60)).await;

        // Nobody swept it, but lazy expiry still applies
        assert_eq!(engine.dbsize(), 1);
        assert_eq!(engine.get("key").unwrap(), None);
    }

    #[tokio::test]
    async fn test_sweeper_handles_many_keys() {
        let engine = Arc::new(StorageEngine::new());

        for i in 0..1000 {
            engine.set(&format!("key{}", i), "value", Some(Duration::from_millis(20)));
        }

        let config = ExpiryConfig {
            base_interval: Duration::from_millis(50),
            min_interval: Duration::from_millis(5),
            max_interval: Duration::from_secs(1),
            speedup_threshold: 0.1,
        };
        let _sweeper = ExpirySweeper::start(Arc::clone(&engine), config);

        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(engine.dbsize(), 0);
        assert_eq!(engine.stats().pending_expiries, 0);
    }
}
