// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dedicated consumer thread for a [`CallbackQueue`].

use super::CallbackQueue;
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Background thread draining a queue until stopped.
///
/// Tasks still queued when the dispatcher stops are drained once more
/// before the thread exits. Dropping the dispatcher stops and joins it.
pub struct Dispatcher {
    queue: CallbackQueue,
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Spawn the consumer. `idle` bounds how long it parks between wakes.
    pub fn spawn(queue: CallbackQueue, idle: Duration) -> Result<Self> {
        let stop_flag = Arc::new(AtomicBool::new(false));

        let stop = Arc::clone(&stop_flag);
        let q = queue.clone();
        let handle = thread::Builder::new()
            .name("ardk-dispatch".into())
            .spawn(move || dispatch_loop(&q, &stop, idle))
            .map_err(|e| Error::Native(format!("failed to spawn dispatcher: {}", e)))?;

        log::debug!("[dispatcher] started (idle={:?})", idle);
        Ok(Self {
            queue,
            stop_flag,
            handle: Some(handle),
        })
    }

    pub fn queue(&self) -> &CallbackQueue {
        &self.queue
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop and join. Fails if the thread panicked.
    pub fn stop(mut self) -> Result<()> {
        self.signal_stop();
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| Error::DispatcherPanicked)?;
        }
        log::debug!("[dispatcher] stopped");
        Ok(())
    }

    fn signal_stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
        self.queue.waker().notify();
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.signal_stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn dispatch_loop(queue: &CallbackQueue, stop: &AtomicBool, idle: Duration) {
    while !stop.load(Ordering::Acquire) {
        let ran = queue.drain();
        if ran > 0 {
            log::trace!("[dispatcher] ran {} task(s)", ran);
            continue;
        }
        queue.waker().wait_timeout(idle);
    }
    queue.drain();
}
