//! Background sweeper that purges expired cache entries.
//!
//! Reads already treat expired entries as absent; the sweeper only bounds
//! memory held by entries nobody asks for again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use super::store::CacheStore;

// ---------------------------------------------------------------------------
// SweepTask
// ---------------------------------------------------------------------------

/// On-demand work accepted by the sweeper in addition to its periodic purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepTask {
    /// Purge expired entries now.
    Purge,
    /// Drop every entry.
    Clear,
}

// ---------------------------------------------------------------------------
// CacheSweeper
// ---------------------------------------------------------------------------

/// Handle to a spawned sweeper task.
///
/// The task:
/// 1. Purges expired entries every `interval_ms`
/// 2. Runs [`SweepTask`]s submitted through [`Self::submit`]
/// 3. Exits on [`Self::stop`] or when the handle is dropped
pub struct CacheSweeper {
    tx: Option<mpsc::Sender<SweepTask>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CacheSweeper {
    /// Spawns the sweeper on the current tokio runtime. The task channel holds 64 tasks.
    #[must_use]
    pub fn start(store: Arc<dyn CacheStore>, interval_ms: u64) -> Self {
        let (tx, mut rx) = mpsc::channel::<SweepTask>(64);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
            // The first tick completes immediately; skip it.
            ticker.tick().await;

            loop {
                tokio::select! {
                    task = rx.recv() => {
                        match task {
                            Some(task) => run_task(store.as_ref(), task),
                            None => break,
                        }
                    }
                    _ = ticker.tick() => {
                        let purged = store.purge_expired();
                        if purged > 0 {
                            debug!(purged, remaining = store.len(), "cache sweep");
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
        });

        Self {
            tx: Some(tx),
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Queue a task for the sweeper.
    ///
    /// # Errors
    ///
    /// Returns an error if the sweeper has been stopped.
    pub async fn submit(&self, task: SweepTask) -> anyhow::Result<()> {
        match &self.tx {
            Some(tx) => tx
                .send(task)
                .await
                .map_err(|_| anyhow::anyhow!("cache sweeper channel closed")),
            None => Err(anyhow::anyhow!("cache sweeper not running")),
        }
    }

    /// Stop the sweeper and wait for its task to finish.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

fn run_task(store: &dyn CacheStore, task: SweepTask) {
    match task {
        SweepTask::Purge => {
            let purged = store.purge_expired();
            debug!(purged, "cache purge requested");
        }
        SweepTask::Clear => {
            let dropped = store.len();
            store.clear();
            debug!(dropped, "cache cleared");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
