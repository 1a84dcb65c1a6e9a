//! Cancelable periodic tasks.
//!
//! A [`PollingTask`] runs its job once immediately and then on every tick
//! until stopped. `stop` waits for an in-flight run to finish, so nothing the
//! job does happens after `stop` returns. Dropping the task aborts it.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Background job with an explicit start/stop lifecycle.
pub struct PollingTask {
    name: String,
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl PollingTask {
    /// Spawn `job` every `period`. Must be called inside a Tokio runtime.
    pub fn start<F, Fut>(name: impl Into<String>, period: Duration, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let period = period.max(Duration::from_millis(1));
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            let mut tick = interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

            debug!(task = %task_name, period_ms = period.as_millis() as u64, "Polling task started");

            loop {
                tokio::select! {
                    biased;
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = tick.tick() => {
                        job().await;
                    }
                }
            }

            debug!(task = %task_name, "Polling task stopped");
        });

        Self {
            name,
            shutdown_tx,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the task and wait for it to exit.
    pub async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!(task = %self.name, error = %e, "Polling task panicked");
                }
            }
        }
    }
}

impl Drop for PollingTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
