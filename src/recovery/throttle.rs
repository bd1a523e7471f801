//! Background throttling and reclaimable caches used by the resource
//! pressure strategies.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Pause switch for non-critical background work.
///
/// Critical work (health ticks, request handling) never consults it.
#[derive(Debug, Clone, Default)]
pub struct BackgroundThrottle {
    inner: Arc<ThrottleState>,
}

#[derive(Debug, Default)]
struct ThrottleState {
    paused: AtomicBool,
    resumed: Notify,
}

impl BackgroundThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
        self.inner.resumed.notify_waiters();
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    /// Return immediately when not paused, otherwise wait for `resume()`
    pub async fn wait_until_resumed(&self) {
        loop {
            let notified = self.inner.resumed.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent resume is not missed
            notified.as_mut().enable();
            if !self.is_paused() {
                return;
            }
            notified.await;
        }
    }
}

/// An in-process cache that can be dropped under memory pressure
pub trait ReclaimableCache: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Drop all entries, returning how many were released
    fn clear(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_returns_immediately_when_running() {
        let throttle = BackgroundThrottle::new();
        tokio::time::timeout(Duration::from_millis(50), throttle.wait_until_resumed())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_blocks_until_resume() {
        let throttle = BackgroundThrottle::new();
        throttle.pause();

        let waiter = {
            let throttle = throttle.clone();
            tokio::spawn(async move { throttle.wait_until_resumed().await })
        };

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!waiter.is_finished());

        throttle.resume();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(!throttle.is_paused());
    }
}
