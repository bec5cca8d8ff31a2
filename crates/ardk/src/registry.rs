// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Native handle registry and callback context table.
//!
//! # Handle registry
//!
//! Maps `(context, native handle)` to the single live wrapper for that
//! handle. Entries are weak: the session cache (or the caller) owns the
//! wrapper, the registry only guarantees identity.
//!
//! Every handle given to [`HandleRegistry::from_handle`] (or object given to
//! [`HandleRegistry::adopt`]) carries one native reference. The registry
//! consumes it in all cases:
//! - owner already disposed: released immediately, no wrapper;
//! - live wrapper already registered: released immediately (the wrapper
//!   keeps its own reference), existing wrapper returned;
//! - otherwise: moved into a new wrapper.
//!
//! # Context table
//!
//! Native code receives a [`ContextId`] instead of a pointer. Trampolines
//! resolve it here. Ids are never reused, so a callback racing with
//! disposal never reaches a freed session. A freed slot keeps a weak
//! reference to the runtime so payloads that arrive late can still be
//! released.

use crate::native::{ContextId, NativeHandle, NativeObjectKind, NativeRuntime};
use crate::object::NativeObject;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::{Arc, Weak};

/// Owner of wrapped handles (a session).
pub trait HandleOwner {
    fn context_id(&self) -> ContextId;

    /// False once disposal started.
    fn is_live(&self) -> bool;

    fn runtime(&self) -> &Arc<dyn NativeRuntime>;
}

/// Wrapper type tracked by a [`HandleRegistry`].
pub trait Registered: Send + Sync {
    fn native(&self) -> &NativeObject;

    #[inline]
    fn is_disposed(&self) -> bool {
        self.native().is_released()
    }
}

/// Process-wide, per-session partitioned identity map.
pub struct HandleRegistry<W> {
    kind: NativeObjectKind,
    entries: DashMap<(ContextId, NativeHandle), Weak<W>>,
}

impl<W: Registered> HandleRegistry<W> {
    pub fn new(kind: NativeObjectKind) -> Self {
        Self {
            kind,
            entries: DashMap::new(),
        }
    }

    /// Produce or retrieve the wrapper for `handle`.
    ///
    /// `make` builds the wrapper from the owned reference; returning `None`
    /// drops the reference (which releases it).
    pub fn from_handle<F>(&self, owner: &dyn HandleOwner, handle: NativeHandle, make: F) -> Option<Arc<W>>
    where
        F: FnOnce(NativeObject) -> Option<W>,
    {
        if handle.is_null() {
            return None;
        }
        let object = NativeObject::new(handle, self.kind, owner.runtime().clone());
        self.adopt(owner, object, make)
    }

    /// Resolve an already-owned reference against the live wrappers.
    ///
    /// Callers on the consumer thread use this so that identity is decided
    /// in queue order, not in native delivery order.
    pub fn adopt<F>(&self, owner: &dyn HandleOwner, object: NativeObject, make: F) -> Option<Arc<W>>
    where
        F: FnOnce(NativeObject) -> Option<W>,
    {
        if !owner.is_live() {
            log::debug!(
                "[registry] {:?} {} surfaced after session release, releasing",
                self.kind,
                object.handle()
            );
            return None;
        }

        let key = (owner.context_id(), object.handle());
        let mut stale: Option<Arc<W>> = None;

        let result = match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                let previous = occupied.get().upgrade();
                match previous {
                    Some(existing) if !existing.is_disposed() => {
                        drop(occupied);
                        // Duplicate reference; the wrapper keeps its own.
                        drop(object);
                        return Some(existing);
                    }
                    previous => stale = previous,
                }
                match make(object) {
                    Some(wrapper) => {
                        let wrapper = Arc::new(wrapper);
                        occupied.insert(Arc::downgrade(&wrapper));
                        Some(wrapper)
                    }
                    None => {
                        occupied.remove();
                        None
                    }
                }
            }
            Entry::Vacant(vacant) => make(object).map(|wrapper| {
                let wrapper = Arc::new(wrapper);
                vacant.insert(Arc::downgrade(&wrapper));
                wrapper
            }),
        };

        // Outside the shard lock.
        drop(stale);
        result
    }

    /// Live wrapper for `handle`, if any.
    pub fn get(&self, context: ContextId, handle: NativeHandle) -> Option<Arc<W>> {
        self.entries
            .get(&(context, handle))
            .and_then(|weak| weak.upgrade())
            .filter(|w| !w.is_disposed())
    }

    /// Drop the entry if it still points at `wrapper`.
    pub fn forget(&self, context: ContextId, wrapper: &W) {
        let handle = wrapper.native().handle();
        let removed = self.entries.remove_if(&(context, handle), |_, weak| {
            std::ptr::eq(weak.as_ptr(), wrapper as *const W)
        });
        drop(removed);
    }

    /// Remove every entry owned by `context`.
    pub fn purge(&self, context: ContextId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(ctx, _), _| *ctx != context);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =======================================================================
// Context Table
// =======================================================================

enum Slot<T> {
    Live(Arc<T>),
    /// Value gone; late callbacks still reach the runtime to release payloads.
    Retired(Weak<dyn NativeRuntime>),
}

/// What a context id resolves to.
pub enum Resolved<T> {
    Live(Arc<T>),
    Retired(Arc<dyn NativeRuntime>),
}

/// `ContextId -> T` table. Freed slots become tombstones holding a weak
/// runtime reference until that runtime is dropped.
pub struct ContextTable<T> {
    entries: DashMap<ContextId, Slot<T>>,
}

impl<T> ContextTable<T> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn insert(&self, id: ContextId, value: Arc<T>) {
        self.entries.insert(id, Slot::Live(value));
    }

    /// Live value only.
    pub fn get(&self, id: ContextId) -> Option<Arc<T>> {
        match self.resolve(id)? {
            Resolved::Live(value) => Some(value),
            Resolved::Retired(_) => None,
        }
    }

    pub fn resolve(&self, id: ContextId) -> Option<Resolved<T>> {
        let entry = self.entries.get(&id)?;
        match entry.value() {
            Slot::Live(value) => Some(Resolved::Live(Arc::clone(value))),
            Slot::Retired(runtime) => runtime.upgrade().map(Resolved::Retired),
        }
    }

    /// Drop the value and leave a tombstone for `runtime`.
    ///
    /// Returns false if the slot was not live. Tombstones whose runtime is
    /// gone are pruned here.
    pub fn retire(&self, id: ContextId, runtime: &Arc<dyn NativeRuntime>) -> bool {
        let value = self.entries.get_mut(&id).and_then(|mut entry| {
            if !matches!(*entry, Slot::Live(_)) {
                return None;
            }
            Some(std::mem::replace(
                entry.value_mut(),
                Slot::Retired(Arc::downgrade(runtime)),
            ))
        });
        let retired = value.is_some();
        drop(value);

        self.entries
            .retain(|_, slot| !matches!(slot, Slot::Retired(rt) if rt.strong_count() == 0));
        retired
    }

    /// Live slots.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.value(), Slot::Live(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for ContextTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
