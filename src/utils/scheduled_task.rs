//! # Scheduled Task
//!
//! Periodic background task with one explicit, idempotent cancellation handle.
//!
//! Cancellation is cooperative: a stop request is observed between runs, so a
//! run that is already executing (including any recovery it triggered) always
//! completes. No new run is scheduled after `cancel()`.

use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Handle for a running periodic task
#[derive(Debug)]
pub struct ScheduledTask {
    name: &'static str,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ScheduledTask {
    /// Spawn `job` every `period`. When `run_immediately` is false the first
    /// run happens one full period after spawning.
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, run_immediately: bool, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        info!(task = name, period_ms = period.as_millis() as u64, "⏱️ Scheduled task started");

        let handle = tokio::spawn(async move {
            let start = if run_immediately {
                tokio::time::Instant::now()
            } else {
                tokio::time::Instant::now() + period
            };
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => {
                        debug!(task = name, "Scheduled task received shutdown");
                        break;
                    }
                    _ = interval.tick() => {
                        job().await;
                    }
                }
            }
        });

        Self {
            name,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the task loop is still scheduled
    pub fn is_active(&self) -> bool {
        self.shutdown_tx.lock().is_some()
    }

    /// Request cancellation and wait for the in-flight run (if any) to finish.
    /// Calling this more than once is a no-op.
    pub async fn cancel(&self) {
        let sender = self.shutdown_tx.lock().take();
        let Some(sender) = sender else {
            return;
        };
        let _ = sender.send(());

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                debug!(task = self.name, error = %e, "Scheduled task ended abnormally");
            }
        }
        info!(task = self.name, "⏹️ Scheduled task stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_runs_every_period() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let task = ScheduledTask::spawn("test", Duration::from_secs(10), true, move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        task.cancel().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_first_run() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let task = ScheduledTask::spawn("delayed", Duration::from_secs(10), false, move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        task.cancel().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent_and_stops_runs() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let task = ScheduledTask::spawn("cancel", Duration::from_secs(1), true, move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(1500)).await;
        task.cancel().await;
        task.cancel().await;
        assert!(!task.is_active());

        let seen = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_waits_for_in_flight_run() {
        let finished = Arc::new(AtomicUsize::new(0));
        let f = finished.clone();
        let task = ScheduledTask::spawn("slow", Duration::from_secs(60), true, move || {
            let f = f.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                f.fetch_add(1, Ordering::SeqCst);
            }
        });

        // Let the first run begin
        tokio::time::sleep(Duration::from_millis(10)).await;
        task.cancel().await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
