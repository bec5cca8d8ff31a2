// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Anchor lifecycle cache.
//!
//! The authoritative set of anchors a session believes to be alive, keyed by
//! identifier. Only the consumer thread touches it. The cache owns the
//! wrappers it holds and disposes them on removal, merge and teardown.

use crate::anchor::Anchor;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// One merge entry: the surviving parent and the children it absorbed.
pub type MergeEntry = (Arc<Anchor>, Vec<Arc<Anchor>>);

#[derive(Debug, Default)]
pub struct AnchorCache {
    anchors: HashMap<Uuid, Arc<Anchor>>,
}

impl AnchorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the identifier is already present or the anchor is gone.
    pub fn insert(&mut self, anchor: &Arc<Anchor>) -> bool {
        if anchor.is_disposed() || self.anchors.contains_key(&anchor.identifier()) {
            return false;
        }
        self.anchors.insert(anchor.identifier(), Arc::clone(anchor));
        true
    }

    pub fn on_added(&mut self, anchors: &[Arc<Anchor>]) {
        for anchor in anchors {
            self.insert(anchor);
        }
    }

    /// Refresh known anchors; insert unknown ones with a warning.
    ///
    /// Returns how many were missing.
    pub fn on_updated(&mut self, anchors: &[Arc<Anchor>]) -> usize {
        let mut missing = 0;
        for anchor in anchors {
            anchor.refresh();
            if self.anchors.contains_key(&anchor.identifier()) {
                continue;
            }
            missing += 1;
            log::warn!(
                "[cache] Updated anchor {} not found in session cache, inserting",
                anchor.identifier()
            );
            self.insert(anchor);
        }
        missing
    }

    /// Dispose and evict. Anchors already disposed (by a merge) are skipped.
    ///
    /// Returns how many were disposed.
    pub fn on_removed(&mut self, anchors: &[Arc<Anchor>]) -> usize {
        let mut disposed = 0;
        for anchor in anchors {
            if anchor.is_disposed() {
                log::trace!("[cache] removed anchor {} already disposed", anchor.identifier());
                continue;
            }
            anchor.dispose();
            self.evict(anchor);
            disposed += 1;
        }
        disposed
    }

    /// Dispose and evict every child; keep or insert each parent.
    pub fn on_merged(&mut self, merges: &[MergeEntry]) {
        for (parent, children) in merges {
            for child in children {
                if child.dispose() {
                    self.evict(child);
                }
            }
            self.insert(parent);
        }
    }

    fn evict(&mut self, anchor: &Arc<Anchor>) {
        let id = anchor.identifier();
        // Only drop the entry if it is this wrapper, or one already disposed.
        let same = self
            .anchors
            .get(&id)
            .is_some_and(|cached| Arc::ptr_eq(cached, anchor) || cached.is_disposed());
        if same {
            self.anchors.remove(&id);
        }
    }

    pub fn get(&self, identifier: &Uuid) -> Option<Arc<Anchor>> {
        self.anchors.get(identifier).cloned()
    }

    pub fn contains(&self, identifier: &Uuid) -> bool {
        self.anchors.contains_key(identifier)
    }

    pub fn identifiers(&self) -> Vec<Uuid> {
        self.anchors.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Dispose every cached anchor and empty the cache.
    pub fn dispose_all(&mut self) -> usize {
        let mut disposed = 0;
        for (_, anchor) in self.anchors.drain() {
            if anchor.dispose() {
                disposed += 1;
            }
        }
        disposed
    }
}

/// Dispose wrappers that can no longer be surfaced (session gone).
pub(crate) fn dispose_unsurfaced(anchors: &[Arc<Anchor>]) {
    for anchor in anchors {
        anchor.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::recording::RecordingRuntime;
    use crate::native::{ContextId, NativeHandle, NativeRuntime};
    use crate::registry::HandleOwner;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Owner {
        ctx: ContextId,
        live: AtomicBool,
        runtime: Arc<dyn NativeRuntime>,
    }

    impl HandleOwner for Owner {
        fn context_id(&self) -> ContextId {
            self.ctx
        }
        fn is_live(&self) -> bool {
            self.live.load(Ordering::Acquire)
        }
        fn runtime(&self) -> &Arc<dyn NativeRuntime> {
            &self.runtime
        }
    }

    fn setup() -> (Arc<RecordingRuntime>, Owner) {
        let rt = Arc::new(RecordingRuntime::new());
        let owner = Owner {
            ctx: ContextId::next(),
            live: AtomicBool::new(true),
            runtime: rt.clone(),
        };
        (rt, owner)
    }

    fn deliver(rt: &RecordingRuntime, owner: &Owner, handle: NativeHandle) -> Arc<Anchor> {
        rt.hand_out(&[handle]);
        Anchor::from_handle(owner, handle).expect("anchor")
    }

    #[test]
    fn test_add_ignores_duplicates() {
        let (rt, owner) = setup();
        let id = Uuid::new_v4();
        let handle = rt.new_anchor(id);
        let mut cache = AnchorCache::new();

        let a = deliver(&rt, &owner, handle);
        cache.on_added(&[a.clone()]);
        let b = deliver(&rt, &owner, handle);
        cache.on_added(&[b]);

        assert_eq!(cache.len(), 1);
        assert!(Arc::ptr_eq(&cache.get(&id).unwrap(), &a));
        assert_eq!(rt.outstanding(handle), 1);
    }

    #[test]
    fn test_update_self_heals() {
        let (rt, owner) = setup();
        let id = Uuid::new_v4();
        let mut cache = AnchorCache::new();

        let a = deliver(&rt, &owner, rt.new_anchor(id));
        assert_eq!(cache.on_updated(&[a.clone()]), 1);
        assert!(cache.contains(&id));
        assert_eq!(cache.on_updated(&[a]), 0);
    }

    #[test]
    fn test_remove_disposes_and_evicts() {
        let (rt, owner) = setup();
        let handle = rt.new_anchor(Uuid::new_v4());
        let mut cache = AnchorCache::new();

        let a = deliver(&rt, &owner, handle);
        cache.on_added(&[a.clone()]);
        let removed = deliver(&rt, &owner, handle);

        assert_eq!(cache.on_removed(&[removed.clone()]), 1);
        assert!(cache.is_empty());
        assert!(a.is_disposed());
        // Second removal of the same wrapper is skipped.
        assert_eq!(cache.on_removed(&[removed]), 0);
        assert_eq!(rt.outstanding(handle), 0);
        assert!(rt.over_released().is_empty());
    }

    #[test]
    fn test_merge_replaces_children() {
        let (rt, owner) = setup();
        let (pid, c1, c2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut cache = AnchorCache::new();

        let children: Vec<_> = [c1, c2]
            .iter()
            .map(|id| deliver(&rt, &owner, rt.new_anchor(*id)))
            .collect();
        cache.on_added(&children);

        let parent = deliver(&rt, &owner, rt.new_anchor(pid));
        cache.on_merged(&[(parent, children.clone())]);

        assert_eq!(cache.identifiers(), vec![pid]);
        assert!(children.iter().all(|c| c.is_disposed()));
    }

    #[test]
    fn test_dispose_all() {
        let (rt, owner) = setup();
        let mut cache = AnchorCache::new();
        for _ in 0..5 {
            let a = deliver(&rt, &owner, rt.new_anchor(Uuid::new_v4()));
            cache.insert(&a);
        }

        assert_eq!(cache.dispose_all(), 5);
        assert!(cache.is_empty());
        assert_eq!(rt.outstanding_total(), 0);
    }
}
