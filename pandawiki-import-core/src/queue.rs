//! Bounded-concurrency task queue.
//!
//! [`TaskQueue`] runs submitted futures on the tokio runtime with at most
//! `max_concurrency` of them in flight. Pending work is admitted strictly in
//! submission order as running tasks settle; there is no background loop,
//! admission is re-entered from each task's completion path.

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::QueueError;

type QueuedTask = Box<dyn FnOnce(SlotGuard) -> BoxFuture<'static, ()> + Send>;

#[derive(Default)]
struct QueueState {
    running: usize,
    pending: VecDeque<QueuedTask>,
}

/// Cloneable handle to a bounded-concurrency executor.
#[derive(Clone)]
pub struct TaskQueue {
    state: Arc<Mutex<QueueState>>,
    max_concurrency: usize,
}

impl TaskQueue {
    pub fn new(max_concurrency: usize) -> Self {
        let max_concurrency = if max_concurrency == 0 {
            warn!("TaskQueue max_concurrency of 0 would never run anything, using 1");
            1
        } else {
            max_concurrency
        };

        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            max_concurrency,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Number of tasks currently in flight.
    pub fn running(&self) -> usize {
        self.lock().running
    }

    /// Number of tasks waiting for a free slot.
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Submit a unit of work. It starts immediately if a slot is free,
    /// otherwise once every task submitted before it has been admitted.
    ///
    /// The returned handle resolves to whatever `task`'s future produced;
    /// task-level failures travel inside `T`. Outside a tokio runtime nothing
    /// can run, so the handle resolves at once to [`QueueError::NoRuntime`].
    /// By the time a handle resolves, the task's slot has been released.
    pub fn enqueue<F, Fut, T>(&self, task: F) -> TaskHandle<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        if tokio::runtime::Handle::try_current().is_err() {
            warn!("TaskQueue::enqueue called outside a tokio runtime, rejecting task");
            let _ = tx.send(Err(QueueError::NoRuntime));
            return TaskHandle { rx };
        }

        let queued: QueuedTask = Box::new(move |mut slot: SlotGuard| {
            async move {
                let outcome = AssertUnwindSafe(async move { task().await })
                    .catch_unwind()
                    .await
                    .map_err(|_| QueueError::Panicked);
                slot.release();
                // Receiver may be gone; the work still counted as done.
                let _ = tx.send(outcome);
                // Dropping the released guard admits the next pending task.
                drop(slot);
            }
            .boxed()
        });

        self.lock().pending.push_back(queued);
        self.drain();

        TaskHandle { rx }
    }

    /// Drop every task that has not started yet. Running tasks are unaffected.
    /// Returns the number of dropped tasks; their handles resolve to
    /// [`QueueError::Cleared`].
    pub fn clear_queue(&self) -> usize {
        let dropped: Vec<QueuedTask> = self.lock().pending.drain(..).collect();
        if !dropped.is_empty() {
            debug!(dropped = dropped.len(), "Cleared pending tasks from queue");
        }
        dropped.len()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit pending tasks while slots are free.
    fn drain(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            // Only reachable when a slot is released off-runtime; dropping
            // the pending tasks resolves their handles instead of stranding them.
            let dropped = self.clear_queue();
            if dropped > 0 {
                warn!(dropped, "TaskQueue drained outside a tokio runtime, pending tasks dropped");
            }
            return;
        };

        let admitted: Vec<QueuedTask> = {
            let mut state = self.lock();
            let mut admitted = Vec::new();
            while state.running < self.max_concurrency {
                match state.pending.pop_front() {
                    Some(task) => {
                        state.running += 1;
                        admitted.push(task);
                    }
                    None => break,
                }
            }
            admitted
        };

        for task in admitted {
            let slot = SlotGuard {
                queue: self.clone(),
                released: false,
            };
            runtime.spawn(task(slot));
        }
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("TaskQueue")
            .field("max_concurrency", &self.max_concurrency)
            .field("running", &state.running)
            .field("pending", &state.pending.len())
            .finish()
    }
}

/// Holds one running slot. The slot is freed by [`SlotGuard::release`] or,
/// if the task future is dropped before settling, on drop; dropping the guard
/// always admits the next pending task.
struct SlotGuard {
    queue: TaskQueue,
    released: bool,
}

impl SlotGuard {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            let mut state = self.queue.lock();
            state.running = state.running.saturating_sub(1);
        }
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.release();
        self.queue.drain();
    }
}

/// Completion of a task submitted with [`TaskQueue::enqueue`].
#[must_use = "a TaskHandle does nothing unless awaited; the task itself still runs"]
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<Result<T, QueueError>>,
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, QueueError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(QueueError::Cleared)))
    }
}
