//! Bounded-concurrency task queue
//!
//! Runs one asynchronous job per asset with a fixed concurrency limit.
//! The queue can be stopped (queued jobs hold, running jobs finish) and
//! restarted, and exposes a running/queued/finished accounting plus a
//! `wait_idle` used by refresh to drain all scheduled work. A job that
//! panics only loses that job; the counters are maintained by a drop
//! guard so the queue never wedges.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{watch, Notify, Semaphore};
use tracing::{debug, warn};

/// Default number of concurrently running jobs.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Snapshot of queue accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Jobs waiting for a slot (or for the queue to start).
    pub queued: usize,
    /// Jobs currently executing.
    pub running: usize,
    /// Jobs completed since construction.
    pub finished: u64,
    /// Jobs ever pushed.
    pub total: u64,
}

#[derive(Default)]
struct Counts {
    queued: usize,
    running: usize,
    finished: u64,
    total: u64,
}

enum GuardState {
    Queued,
    Running,
}

/// Keeps the accounting correct across every exit path, including a
/// panicking job.
struct JobGuard {
    counts: Arc<Mutex<Counts>>,
    idle: Arc<Notify>,
    state: GuardState,
}

impl JobGuard {
    fn queued(counts: Arc<Mutex<Counts>>, idle: Arc<Notify>) -> Self {
        {
            let mut c = counts.lock();
            c.queued += 1;
            c.total += 1;
        }
        Self {
            counts,
            idle,
            state: GuardState::Queued,
        }
    }

    fn promote(&mut self) {
        let mut c = self.counts.lock();
        c.queued -= 1;
        c.running += 1;
        self.state = GuardState::Running;
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        let idle = {
            let mut c = self.counts.lock();
            match self.state {
                GuardState::Queued => c.queued -= 1,
                GuardState::Running => {
                    c.running -= 1;
                    c.finished += 1;
                }
            }
            c.queued + c.running == 0
        };
        if idle {
            self.idle.notify_waiters();
        }
    }
}

/// Bounded-concurrency executor for import jobs.
pub struct TaskQueue {
    semaphore: Arc<Semaphore>,
    gate: watch::Sender<bool>,
    counts: Arc<Mutex<Counts>>,
    idle: Arc<Notify>,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl TaskQueue {
    /// Create a queue running at most `concurrency` jobs at once. The
    /// queue starts in the running state.
    pub fn new(concurrency: usize) -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            gate,
            counts: Arc::new(Mutex::new(Counts::default())),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Push a job. It runs once the queue is started and a slot frees up.
    pub fn push<F>(&self, label: impl Into<String>, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.push_boxed(label.into(), Box::pin(job));
    }

    fn push_boxed(&self, label: String, job: Pin<Box<dyn Future<Output = ()> + Send>>) {
        let mut guard = JobGuard::queued(Arc::clone(&self.counts), Arc::clone(&self.idle));
        let semaphore = Arc::clone(&self.semaphore);
        let mut gate = self.gate.subscribe();

        tokio::spawn(async move {
            let _permit = loop {
                while !*gate.borrow() {
                    if gate.changed().await.is_err() {
                        warn!("Task queue dropped with job '{}' still queued", label);
                        return;
                    }
                }
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => return,
                };
                // The queue may have stopped while we waited for a slot.
                if *gate.borrow() {
                    break permit;
                }
            };

            guard.promote();
            debug!("Job started: {}", label);
            job.await;
            debug!("Job finished: {}", label);
            drop(guard);
        });
    }

    /// Pause dispatch. Queued jobs hold; running jobs finish.
    pub fn stop(&self) {
        // send_replace stores the value even with no live receivers.
        self.gate.send_replace(false);
    }

    /// Resume dispatch.
    pub fn start(&self) {
        self.gate.send_replace(true);
    }

    /// Whether dispatch is currently enabled.
    pub fn is_started(&self) -> bool {
        *self.gate.borrow()
    }

    /// Current accounting snapshot.
    pub fn stats(&self) -> QueueStats {
        let c = self.counts.lock();
        QueueStats {
            queued: c.queued,
            running: c.running,
            finished: c.finished,
            total: c.total,
        }
    }

    /// Resolve once every queued and running job has finished.
    ///
    /// Note: jobs held back by `stop()` count as queued, so a stopped
    /// queue with pending work never reports idle.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            {
                let c = self.counts.lock();
                if c.queued + c.running == 0 {
                    return;
                }
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_runs_all_jobs() {
        let queue = TaskQueue::new(2);
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let done = Arc::clone(&done);
            queue.push("job", async move {
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        queue.wait_idle().await;
        assert_eq!(done.load(Ordering::SeqCst), 10);
        assert_eq!(queue.stats().finished, 10);
        assert_eq!(queue.stats().total, 10);
    }

    #[tokio::test]
    async fn test_concurrency_bound_holds() {
        let queue = TaskQueue::new(3);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..20 {
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            queue.push("job", async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                current.fetch_sub(1, Ordering::SeqCst);
            });
        }

        queue.wait_idle().await;
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_stop_holds_jobs() {
        let queue = TaskQueue::new(2);
        queue.stop();

        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let done = Arc::clone(&done);
            queue.push("job", async move {
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(done.load(Ordering::SeqCst), 0);
        assert_eq!(queue.stats().queued, 4);

        queue.start();
        queue.wait_idle().await;
        assert_eq!(done.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_wait_idle_on_empty_queue() {
        let queue = TaskQueue::new(1);
        // Must resolve immediately.
        queue.wait_idle().await;
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_wedge() {
        let queue = TaskQueue::new(1);

        queue.push("bad", async {
            panic!("importer exploded");
        });
        let done = Arc::new(AtomicUsize::new(0));
        {
            let done = Arc::clone(&done);
            queue.push("good", async move {
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        queue.wait_idle().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(queue.stats().finished, 2);
    }
}
