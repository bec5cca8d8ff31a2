// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session events.
//!
//! Each event is an [`EventSource`]: a multicast observer list. Emission
//! snapshots the subscriber list first, so a subscriber may subscribe or
//! unsubscribe from inside its own callback. A panicking subscriber is
//! logged and skipped; the remaining subscribers still run.

use crate::anchor::Anchor;
use crate::error::ArError;
use crate::frame::Frame;
use crate::map::{Camera, Map};
use crate::mesh::MeshUpdate;
use crate::queue::panic_message;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

/// Token returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        SubscriptionId(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

pub type Handler<A> = Arc<dyn Fn(&A) + Send + Sync>;

pub struct EventSource<A> {
    name: &'static str,
    handlers: Mutex<Vec<(SubscriptionId, Handler<A>)>>,
}

impl<A> EventSource<A> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            handlers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.subscribe_handler(Arc::new(handler))
    }

    pub(crate) fn subscribe_handler(&self, handler: Handler<A>) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.handlers.lock().push((id, handler));
        id
    }

    /// Returns false if `id` was not subscribed here.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|(sid, _)| *sid != id);
        handlers.len() != before
    }

    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.lock().is_empty()
    }

    pub(crate) fn snapshot(&self) -> Vec<Handler<A>> {
        self.handlers.lock().iter().map(|(_, h)| Arc::clone(h)).collect()
    }

    pub fn emit(&self, args: &A) {
        let handlers = self.snapshot();
        if handlers.is_empty() {
            return;
        }
        emit_to(self.name, &handlers, args);
    }
}

/// Invoke `handlers` in order, isolating panics.
pub(crate) fn emit_to<A>(name: &str, handlers: &[Handler<A>], args: &A) {
    for handler in handlers {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(args))) {
            log::error!(
                "[events] {} subscriber panicked: {}",
                name,
                panic_message(&payload)
            );
        }
    }
}

// =======================================================================
// Relocalization Query
// =======================================================================

/// Answer slot for the relocalization query.
#[derive(Debug, Default)]
pub struct RelocalizationQuery {
    pub should_attempt: bool,
}

pub type QueryHandler = Arc<dyn Fn(&mut RelocalizationQuery) + Send + Sync>;

/// Handlers asked, in subscription order, whether the session should
/// try to relocalize. Answered synchronously on the asking thread.
#[derive(Default)]
pub struct RelocalizationHandlers {
    handlers: Mutex<Vec<(SubscriptionId, QueryHandler)>>,
}

impl RelocalizationHandlers {
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&mut RelocalizationQuery) + Send + Sync + 'static,
    {
        let id = SubscriptionId::next();
        self.handlers.lock().push((id, Arc::new(handler)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|(sid, _)| *sid != id);
        handlers.len() != before
    }

    /// First handler that sets `should_attempt` wins; false without handlers.
    pub fn ask(&self) -> bool {
        let handlers: Vec<QueryHandler> =
            self.handlers.lock().iter().map(|(_, h)| Arc::clone(h)).collect();

        let mut query = RelocalizationQuery::default();
        for handler in handlers {
            let answered = panic::catch_unwind(AssertUnwindSafe(|| handler(&mut query)));
            if let Err(payload) = answered {
                log::error!(
                    "[events] relocalization handler panicked: {}",
                    panic_message(&payload)
                );
                continue;
            }
            if query.should_attempt {
                return true;
            }
        }
        false
    }
}

// =======================================================================
// Event Arguments
// =======================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionRan;

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionPaused;

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionInterrupted;

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionInterruptionEnded;

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionDeinitialized;

#[derive(Debug, Clone, Copy)]
pub struct SessionFailed {
    pub error: ArError,
}

#[derive(Debug, Clone)]
pub struct FrameUpdated {
    pub frame: Arc<Frame>,
}

#[derive(Debug, Clone)]
pub struct MeshUpdated {
    pub update: MeshUpdate,
}

#[derive(Debug, Clone)]
pub struct AnchorsChanged {
    pub anchors: Vec<Arc<Anchor>>,
}

#[derive(Debug, Clone)]
pub struct AnchorsMerged {
    pub parent: Arc<Anchor>,
    pub children: Vec<Arc<Anchor>>,
}

#[derive(Debug, Clone)]
pub struct MapsChanged {
    pub maps: Vec<Arc<Map>>,
}

#[derive(Debug, Clone)]
pub struct TrackingStateChanged {
    pub camera: Arc<Camera>,
}

/// Every event a session exposes.
pub struct SessionEvents {
    pub ran: EventSource<SessionRan>,
    pub paused: EventSource<SessionPaused>,
    pub failed: EventSource<SessionFailed>,
    pub deinitialized: EventSource<SessionDeinitialized>,
    pub frame_updated: EventSource<FrameUpdated>,
    pub mesh_updated: EventSource<MeshUpdated>,
    pub anchors_added: EventSource<AnchorsChanged>,
    pub anchors_updated: EventSource<AnchorsChanged>,
    pub anchors_removed: EventSource<AnchorsChanged>,
    pub anchors_merged: EventSource<AnchorsMerged>,
    pub maps_added: EventSource<MapsChanged>,
    pub maps_updated: EventSource<MapsChanged>,
    pub tracking_state_changed: EventSource<TrackingStateChanged>,
    pub interrupted: EventSource<SessionInterrupted>,
    pub interruption_ended: EventSource<SessionInterruptionEnded>,
    pub relocalization: RelocalizationHandlers,
}

impl SessionEvents {
    pub fn new() -> Self {
        Self {
            ran: EventSource::new("ran"),
            paused: EventSource::new("paused"),
            failed: EventSource::new("failed"),
            deinitialized: EventSource::new("deinitialized"),
            frame_updated: EventSource::new("frame_updated"),
            mesh_updated: EventSource::new("mesh_updated"),
            anchors_added: EventSource::new("anchors_added"),
            anchors_updated: EventSource::new("anchors_updated"),
            anchors_removed: EventSource::new("anchors_removed"),
            anchors_merged: EventSource::new("anchors_merged"),
            maps_added: EventSource::new("maps_added"),
            maps_updated: EventSource::new("maps_updated"),
            tracking_state_changed: EventSource::new("tracking_state_changed"),
            interrupted: EventSource::new("interrupted"),
            interruption_ended: EventSource::new("interruption_ended"),
            relocalization: RelocalizationHandlers::default(),
        }
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}
