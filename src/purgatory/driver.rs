//! Background expiration driver for self-advancing clocks.
//!
//! The driver owns no entries. It repeatedly sweeps the purgatory at the
//! clock's current time, then sleeps until the earliest remaining deadline.
//! A registration that becomes the new earliest deadline wakes it early.

use super::Purgatory;
use crate::core::config::DriverConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Sweeps a purgatory as its clock advances.
pub struct ExpirationDriver<V> {
    purgatory: Arc<Purgatory<V>>,
    config: DriverConfig,
    shutdown: watch::Receiver<bool>,
}

impl<V> ExpirationDriver<V>
where
    V: Clone + Send + 'static,
{
    /// Create a driver that stops when `shutdown` becomes `true` or its
    /// sender is dropped.
    pub fn new(
        purgatory: Arc<Purgatory<V>>,
        config: DriverConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            purgatory,
            config,
            shutdown,
        }
    }

    /// Spawn a driver on the current tokio runtime.
    pub fn spawn(purgatory: Arc<Purgatory<V>>, config: DriverConfig) -> DriverHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let driver = Self::new(purgatory, config, shutdown_rx);
        DriverHandle {
            shutdown: shutdown_tx,
            task: tokio::spawn(driver.run()),
        }
    }

    /// Run until shutdown.
    pub async fn run(mut self) {
        tracing::info!(idle_wait_ms = self.config.idle_wait_ms, "expiration driver started");

        while !*self.shutdown.borrow() {
            let now = self.purgatory.clock().now();
            self.purgatory.expire(now);

            let wait_ms = match self.purgatory.next_deadline() {
                Some(deadline) => now.ms_until(deadline),
                None => self.config.idle_wait_ms,
            };

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(wait_ms)) => {}
                _ = self.purgatory.schedule_changed().notified() => {}
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("expiration driver stopped");
    }
}

/// Handle to a spawned [`ExpirationDriver`].
#[derive(Debug)]
pub struct DriverHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DriverHandle {
    /// Stop the driver and wait for it to exit.
    ///
    /// Pending entries are left in the purgatory.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "expiration driver task failed");
        }
    }

    /// Whether the driver task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
