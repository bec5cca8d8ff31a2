// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Producer-to-consumer wake signal for the callback queue.
//!
//! Native threads call [`WakeNotifier::notify`] after every enqueue. The
//! common case (consumer busy or polling from a host tick) is a single
//! atomic store; the condvar is touched only while a dispatcher thread is
//! parked in [`WakeNotifier::wait_timeout`].

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct WakeNotifier {
    pending: AtomicBool,
    parked: Mutex<bool>,
    condvar: Condvar,
}

impl WakeNotifier {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal that work is available. Never blocks on the consumer.
    #[inline]
    pub fn notify(&self) {
        self.pending.store(true, Ordering::Release);
        if *self.parked.lock() {
            self.condvar.notify_one();
        }
    }

    /// Consume a pending signal without waiting.
    #[inline]
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::Acquire)
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Park until notified or `timeout` elapses. Returns true if notified.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.take() {
            return true;
        }

        let mut parked = self.parked.lock();
        // Re-check under the lock: notify() may have run in between.
        if self.take() {
            return true;
        }
        *parked = true;
        self.condvar.wait_for(&mut parked, timeout);
        *parked = false;
        self.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_take_clears() {
        let waker = WakeNotifier::new();
        assert!(!waker.take());
        waker.notify();
        assert!(waker.is_pending());
        assert!(waker.take());
        assert!(!waker.take());
    }

    #[test]
    fn test_notify_unparks_waiter() {
        let waker = Arc::new(WakeNotifier::new());
        let w = Arc::clone(&waker);

        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            w.notify();
        });

        let start = Instant::now();
        assert!(waker.wait_timeout(Duration::from_secs(2)));
        assert!(start.elapsed() < Duration::from_secs(1));

        producer.join().unwrap();
    }

    #[test]
    fn test_wait_times_out() {
        let waker = WakeNotifier::new();
        let start = Instant::now();
        assert!(!waker.wait_timeout(Duration::from_millis(10)));
        assert!(start.elapsed() >= Duration::from_millis(9));
    }

    #[test]
    fn test_pending_signal_returns_immediately() {
        let waker = WakeNotifier::new();
        waker.notify();
        assert!(waker.wait_timeout(Duration::from_secs(5)));
    }
}
