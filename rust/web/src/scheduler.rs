use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

pub type ScheduledTask = Box<dyn FnOnce() + Send + 'static>;

/// Runs a task once after a delay. Used to hide a mismatched pair after the
/// player has had time to see it.
///
/// Tasks are fire-and-forget: there is no cancellation.
pub trait FlipBackScheduler: Send + Sync + fmt::Debug {
    fn schedule(&self, delay: Duration, task: ScheduledTask);
}

/// Schedules tasks on the current tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl FlipBackScheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: ScheduledTask) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    task();
                });
            }
            Err(_) => {
                tracing::warn!(
                    delay_ms = delay.as_millis() as u64,
                    "no tokio runtime available, running flip-back immediately"
                );
                task();
            }
        }
    }
}

/// Holds tasks until [`ManualScheduler::run_pending`] is called.
/// Lets tests observe the window between a mismatch and its flip-back.
#[derive(Default)]
pub struct ManualScheduler {
    pending: Mutex<Vec<(Duration, ScheduledTask)>>,
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_count(&self) -> usize {
        match self.pending.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Delays of the queued tasks, oldest first.
    pub fn pending_delays(&self) -> Vec<Duration> {
        match self.pending.lock() {
            Ok(guard) => guard.iter().map(|(d, _)| *d).collect(),
            Err(poisoned) => poisoned.into_inner().iter().map(|(d, _)| *d).collect(),
        }
    }

    /// Runs every queued task in scheduling order and returns how many ran.
    pub fn run_pending(&self) -> usize {
        let tasks = match self.pending.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        let count = tasks.len();
        for (_, task) in tasks {
            task();
        }
        count
    }
}

impl FlipBackScheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: ScheduledTask) {
        match self.pending.lock() {
            Ok(mut guard) => guard.push((delay, task)),
            Err(poisoned) => poisoned.into_inner().push((delay, task)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn manual_scheduler_defers_until_run() {
        let scheduler = ManualScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        scheduler.schedule(
            Duration::from_millis(450),
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending_delays(), vec![Duration::from_millis(450)]);
        assert_eq!(scheduler.run_pending(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test]
    async fn tokio_scheduler_runs_after_delay() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        TokioScheduler.schedule(
            Duration::from_millis(20),
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn tokio_scheduler_without_runtime_runs_inline() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        TokioScheduler.schedule(
            Duration::from_millis(20),
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
