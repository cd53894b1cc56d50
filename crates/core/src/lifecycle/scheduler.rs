//! Delayed task execution for the poll loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::broadcast;
use tracing::debug;

/// A unit of scheduled work.
pub type Task = BoxFuture<'static, ()>;

/// Runs tasks after a delay.
///
/// Lifecycle steps re-submit themselves through this instead of sleeping in a
/// loop, so tests can drive time by hand and shutdown can drop pending work.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: Task);
}

/// Scheduler backed by tokio timers.
pub struct TokioScheduler {
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            running: Arc::new(AtomicBool::new(true)),
            shutdown_tx,
        }
    }

    /// Drop every pending task and refuse new ones.
    pub fn shutdown(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            let _ = self.shutdown_tx.send(());
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        if !self.is_running() {
            debug!("Scheduler stopped, dropping task");
            return;
        }

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!("Scheduled task dropped on shutdown");
                }
                _ = tokio::time::sleep(delay) => {
                    task.await;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn test_runs_after_delay() {
        let scheduler = TokioScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&counter);
        scheduler.schedule(
            Duration::from_secs(5),
            Box::pin(async move {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drops_pending() {
        let scheduler = TokioScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&counter);
        scheduler.schedule(
            Duration::from_secs(5),
            Box::pin(async move {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );
        tokio::task::yield_now().await;
        scheduler.shutdown();

        let c = Arc::clone(&counter);
        scheduler.schedule(
            Duration::ZERO,
            Box::pin(async move {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(!scheduler.is_running());
    }
}
