// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Owned native reference shared by every wrapper type.

use crate::native::{NativeHandle, NativeObjectKind, NativeRuntime};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One native reference, released exactly once.
///
/// Release happens on the first of [`NativeObject::release`] or `Drop`.
pub struct NativeObject {
    handle: NativeHandle,
    kind: NativeObjectKind,
    runtime: Arc<dyn NativeRuntime>,
    released: AtomicBool,
}

impl NativeObject {
    pub(crate) fn new(
        handle: NativeHandle,
        kind: NativeObjectKind,
        runtime: Arc<dyn NativeRuntime>,
    ) -> Self {
        Self {
            handle,
            kind,
            runtime,
            released: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn handle(&self) -> NativeHandle {
        self.handle
    }

    #[inline]
    pub fn kind(&self) -> NativeObjectKind {
        self.kind
    }

    #[inline]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn runtime(&self) -> &Arc<dyn NativeRuntime> {
        &self.runtime
    }

    /// Release the native reference. Returns false if already released.
    pub(crate) fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        log::trace!("[object] release {:?} {}", self.kind, self.handle);
        self.runtime.release(self.kind, self.handle);
        true
    }
}

impl Drop for NativeObject {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for NativeObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeObject")
            .field("handle", &self.handle)
            .field("kind", &self.kind)
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::recording::RecordingRuntime;
    use crate::native::Transform;

    #[test]
    fn test_release_once() {
        let rt = Arc::new(RecordingRuntime::new());
        let handle = rt.create_anchor(&Transform::IDENTITY);
        let obj = NativeObject::new(handle, NativeObjectKind::Anchor, rt.clone());

        assert!(obj.release());
        assert!(!obj.release());
        drop(obj);

        assert_eq!(rt.release_count(handle), 1);
        assert!(rt.over_released().is_empty());
    }

    #[test]
    fn test_drop_releases() {
        let rt = Arc::new(RecordingRuntime::new());
        let handle = rt.create_anchor(&Transform::IDENTITY);
        drop(NativeObject::new(handle, NativeObjectKind::Anchor, rt.clone()));
        assert_eq!(rt.outstanding(handle), 0);
    }
}
