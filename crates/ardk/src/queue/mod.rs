// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Callback marshaling queue.
//!
//! Native threads enqueue closures; one consumer drains them in enqueue
//! order. Producers never wait on the consumer: the channel is unbounded and
//! the only synchronisation on the hot path is the channel push plus one
//! atomic store on the [`WakeNotifier`].
//!
//! The consumer is cooperative. A host either calls [`CallbackQueue::drain`]
//! from its own update loop, or spawns a [`Dispatcher`] thread that does it.
//! Only one drain runs at a time; a drain started from inside a task (or from
//! a second thread while one is in progress) returns immediately with 0.
//!
//! A task that panics is counted and logged; the following tasks still run.

mod dispatcher;
pub mod wake;

pub use dispatcher::Dispatcher;
pub use wake::WakeNotifier;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unit of work marshaled to the consumer.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Relaxed counters, monotonic.
#[derive(Debug, Default)]
pub struct QueueMetrics {
    pub enqueued: AtomicU64,
    pub executed: AtomicU64,
    pub panicked: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueMetricsSnapshot {
    pub enqueued: u64,
    pub executed: u64,
    pub panicked: u64,
}

impl QueueMetrics {
    #[must_use]
    pub fn snapshot(&self) -> QueueMetricsSnapshot {
        QueueMetricsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
        }
    }
}

struct Inner {
    tx: Sender<Task>,
    rx: Receiver<Task>,
    draining: Mutex<()>,
    waker: WakeNotifier,
    metrics: QueueMetrics,
}

/// Cloneable handle to a multi-producer, single-consumer task queue.
#[derive(Clone)]
pub struct CallbackQueue {
    inner: Arc<Inner>,
}

impl CallbackQueue {
    pub fn new() -> Self {
        let (tx, rx) = channel::unbounded();
        Self {
            inner: Arc::new(Inner {
                tx,
                rx,
                draining: Mutex::new(()),
                waker: WakeNotifier::new(),
                metrics: QueueMetrics::default(),
            }),
        }
    }

    /// Append a task. Safe from any thread, never blocks.
    pub fn enqueue<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        // The receiver lives in `inner`, so the channel cannot be disconnected.
        if self.inner.tx.send(Box::new(task)).is_err() {
            log::error!("[queue] channel disconnected, task dropped");
            return;
        }
        self.inner.metrics.enqueued.fetch_add(1, Ordering::Relaxed);
        self.inner.waker.notify();
    }

    /// Run every queued task, including ones enqueued while draining.
    ///
    /// Returns the number of tasks run.
    pub fn drain(&self) -> usize {
        self.drain_with_budget(usize::MAX)
    }

    /// Run at most `budget` tasks.
    pub fn drain_with_budget(&self, budget: usize) -> usize {
        let Some(_guard) = self.inner.draining.try_lock() else {
            log::trace!("[queue] drain already in progress, skipping");
            return 0;
        };

        let mut ran = 0;
        while ran < budget {
            let Ok(task) = self.inner.rx.try_recv() else {
                break;
            };
            self.execute(task);
            ran += 1;
        }
        ran
    }

    fn execute(&self, task: Task) {
        match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(()) => {
                self.inner.metrics.executed.fetch_add(1, Ordering::Relaxed);
            }
            Err(payload) => {
                self.inner.metrics.panicked.fetch_add(1, Ordering::Relaxed);
                log::error!("[queue] callback task panicked: {}", panic_message(&payload));
            }
        }
    }

    /// Tasks waiting to run.
    #[inline]
    pub fn pending(&self) -> usize {
        self.inner.rx.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.rx.is_empty()
    }

    pub fn metrics(&self) -> QueueMetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    #[inline]
    pub fn waker(&self) -> &WakeNotifier {
        &self.inner.waker
    }

    /// Whether two handles refer to the same queue.
    pub fn same_queue(&self, other: &CallbackQueue) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for CallbackQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallbackQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackQueue")
            .field("pending", &self.pending())
            .field("metrics", &self.metrics())
            .finish()
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic>"
    }
}
