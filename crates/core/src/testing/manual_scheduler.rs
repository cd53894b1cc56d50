//! Scheduler driven by hand, for deterministic lifecycle tests.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::lifecycle::{Scheduler, Task};

struct Pending {
    due: Duration,
    seq: u64,
    task: Task,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    seq: u64,
    pending: Vec<Pending>,
}

/// Scheduler with a virtual clock.
///
/// Nothing runs until the test advances time. Tasks scheduled while running
/// others are picked up in the same call when they are already due.
///
/// # Example
///
/// ```rust,ignore
/// let scheduler = Arc::new(ManualScheduler::new());
/// manager.submit(chat, target, &record).await?;
/// scheduler.advance(Duration::from_secs(5)).await; // first poll
/// ```
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Virtual time elapsed so far.
    pub fn now(&self) -> Duration {
        self.state().now
    }

    pub fn pending(&self) -> usize {
        self.state().pending.len()
    }

    /// Time until the earliest pending task, if any.
    pub fn next_delay(&self) -> Option<Duration> {
        let state = self.state();
        state
            .pending
            .iter()
            .map(|p| p.due.saturating_sub(state.now))
            .min()
    }

    fn take_due(&self) -> Option<Task> {
        let mut state = self.state();
        let now = state.now;
        let index = state
            .pending
            .iter()
            .enumerate()
            .filter(|(_, p)| p.due <= now)
            .min_by_key(|(_, p)| (p.due, p.seq))
            .map(|(i, _)| i)?;
        Some(state.pending.remove(index).task)
    }

    /// Run every task that is due. Returns how many ran.
    pub async fn run_due(&self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.take_due() {
            task.await;
            ran += 1;
        }
        ran
    }

    /// Move the clock forward and run what became due.
    pub async fn advance(&self, by: Duration) -> usize {
        self.state().now += by;
        self.run_due().await
    }

    /// Keep jumping to the next pending task until none are left or
    /// `max_tasks` have run. Returns how many ran.
    pub async fn run_until_idle(&self, max_tasks: usize) -> usize {
        let mut ran = 0;
        while ran < max_tasks {
            let Some(delay) = self.next_delay() else {
                break;
            };
            self.state().now += delay;
            match self.take_due() {
                Some(task) => {
                    task.await;
                    ran += 1;
                }
                None => break,
            }
        }
        ran
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        let mut state = self.state();
        state.seq += 1;
        let pending = Pending {
            due: state.now + delay,
            seq: state.seq,
            task,
        };
        state.pending.push(pending);
    }
}
