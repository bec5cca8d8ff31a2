// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Map and camera snapshots.
//!
//! Both are transient: they live as long as a subscriber keeps the `Arc`
//! and release their native reference on drop.

use crate::native::{
    CameraIntrinsics, ContextId, NativeHandle, NativeObjectKind, NativeRuntime, TrackingState,
    TrackingStateReason, Transform,
};
use crate::object::NativeObject;
use crate::registry::{HandleOwner, HandleRegistry, Registered};
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

fn map_registry() -> &'static HandleRegistry<Map> {
    static REGISTRY: OnceLock<HandleRegistry<Map>> = OnceLock::new();
    REGISTRY.get_or_init(|| HandleRegistry::new(NativeObjectKind::Map))
}

pub struct Map {
    native: NativeObject,
    context: ContextId,
    identifier: Uuid,
    transform: Transform,
}

impl Map {
    /// Wrap a reference taken on the native thread, or return the live
    /// wrapper for the same handle.
    pub(crate) fn adopt(
        owner: &dyn HandleOwner,
        native: NativeObject,
        world_scale: f32,
    ) -> Option<Arc<Map>> {
        let context = owner.context_id();
        map_registry().adopt(owner, native, |native| {
            let Some(info) = native.runtime().map_info(native.handle()) else {
                log::warn!("[map] no map info for {}, releasing", native.handle());
                return None;
            };
            Some(Map {
                native,
                context,
                identifier: info.identifier,
                transform: info.transform.scaled_translation(world_scale),
            })
        })
    }

    #[inline]
    pub fn identifier(&self) -> Uuid {
        self.identifier
    }

    #[inline]
    pub fn transform(&self) -> Transform {
        self.transform
    }

    #[inline]
    pub fn handle(&self) -> NativeHandle {
        self.native.handle()
    }

    pub fn is_disposed(&self) -> bool {
        self.native.is_released()
    }

    /// Release the native map early. Returns false if already released.
    pub fn dispose(&self) -> bool {
        if !self.native.release() {
            return false;
        }
        map_registry().forget(self.context, self);
        true
    }

    pub(crate) fn purge_session(context: ContextId) -> usize {
        map_registry().purge(context)
    }
}

impl Registered for Map {
    fn native(&self) -> &NativeObject {
        &self.native
    }
}

impl std::fmt::Debug for Map {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Map")
            .field("identifier", &self.identifier)
            .field("handle", &self.native.handle())
            .finish()
    }
}

/// Tracking-state snapshot delivered with tracking-state changes.
pub struct Camera {
    native: NativeObject,
    tracking_state: TrackingState,
    reason: TrackingStateReason,
    transform: Transform,
    intrinsics: CameraIntrinsics,
}

impl Camera {
    pub(crate) fn wrap(runtime: Arc<dyn NativeRuntime>, handle: NativeHandle, world_scale: f32) -> Self {
        let info = runtime.camera_info(handle);
        Self {
            native: NativeObject::new(handle, NativeObjectKind::Camera, runtime),
            tracking_state: info.tracking_state,
            reason: info.reason,
            transform: info.transform.scaled_translation(world_scale),
            intrinsics: info.intrinsics,
        }
    }

    #[inline]
    pub fn tracking_state(&self) -> TrackingState {
        self.tracking_state
    }

    #[inline]
    pub fn tracking_state_reason(&self) -> TrackingStateReason {
        self.reason
    }

    #[inline]
    pub fn transform(&self) -> Transform {
        self.transform
    }

    #[inline]
    pub fn intrinsics(&self) -> CameraIntrinsics {
        self.intrinsics
    }
}

impl std::fmt::Debug for Camera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Camera")
            .field("handle", &self.native.handle())
            .field("tracking_state", &self.tracking_state)
            .field("reason", &self.reason)
            .finish()
    }
}
