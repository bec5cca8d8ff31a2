// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Anchor wrapper.
//!
//! At most one live [`Anchor`] exists per `(session, native handle)`; the
//! process-wide anchor registry enforces it. The session's lifecycle cache
//! owns the wrapper and disposes it on removal, merge or session teardown.

use crate::native::{AnchorKind, ContextId, NativeHandle, NativeObjectKind, Transform};
use crate::object::NativeObject;
use crate::registry::{HandleOwner, HandleRegistry, Registered};
use parking_lot::RwLock;
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

fn anchor_registry() -> &'static HandleRegistry<Anchor> {
    static REGISTRY: OnceLock<HandleRegistry<Anchor>> = OnceLock::new();
    REGISTRY.get_or_init(|| HandleRegistry::new(NativeObjectKind::Anchor))
}

pub struct Anchor {
    native: NativeObject,
    context: ContextId,
    identifier: Uuid,
    kind: AnchorKind,
    transform: RwLock<Transform>,
}

impl Anchor {
    /// Wrap a delivered handle, or return the live wrapper for it.
    pub(crate) fn from_handle(owner: &dyn HandleOwner, handle: NativeHandle) -> Option<Arc<Anchor>> {
        anchor_registry().from_handle(owner, handle, Self::build(owner.context_id()))
    }

    /// Same as [`Anchor::from_handle`], for a reference taken earlier.
    pub(crate) fn adopt(owner: &dyn HandleOwner, native: NativeObject) -> Option<Arc<Anchor>> {
        anchor_registry().adopt(owner, native, Self::build(owner.context_id()))
    }

    fn build(context: ContextId) -> impl FnOnce(NativeObject) -> Option<Anchor> {
        move |native| {
            let Some(info) = native.runtime().anchor_info(native.handle()) else {
                log::warn!("[anchor] no anchor info for {}, releasing", native.handle());
                return None;
            };
            Some(Anchor {
                native,
                context,
                identifier: info.identifier,
                kind: info.kind,
                transform: RwLock::new(info.transform),
            })
        }
    }

    #[inline]
    pub fn identifier(&self) -> Uuid {
        self.identifier
    }

    #[inline]
    pub fn kind(&self) -> AnchorKind {
        self.kind
    }

    pub fn transform(&self) -> Transform {
        *self.transform.read()
    }

    #[inline]
    pub fn handle(&self) -> NativeHandle {
        self.native.handle()
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.native.is_released()
    }

    /// Re-read the native transform. No-op once disposed.
    pub(crate) fn refresh(&self) {
        if self.is_disposed() {
            return;
        }
        if let Some(info) = self.native.runtime().anchor_info(self.native.handle()) {
            *self.transform.write() = info.transform;
        }
    }

    /// Release the native anchor and forget it. Returns false if already disposed.
    pub fn dispose(&self) -> bool {
        if !self.native.release() {
            return false;
        }
        anchor_registry().forget(self.context, self);
        true
    }

    pub(crate) fn purge_session(context: ContextId) -> usize {
        anchor_registry().purge(context)
    }
}

impl Registered for Anchor {
    fn native(&self) -> &NativeObject {
        &self.native
    }
}

impl std::fmt::Debug for Anchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Anchor")
            .field("identifier", &self.identifier)
            .field("kind", &self.kind)
            .field("handle", &self.native.handle())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
