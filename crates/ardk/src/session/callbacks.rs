// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Native event handling.
//!
//! Each `on_*` function runs on the native thread that delivered the event.
//! It takes ownership of every handed-out reference (a [`NativeObject`] per
//! handle) and enqueues a task. Tasks run on the consumer thread, re-check
//! `destroyed` under the core lock, and only then resolve references to
//! wrappers, so wrapper identity follows queue order.
//!
//! Tasks hold the session weakly. A task that outlives its session drops its
//! payload, which releases it.

use super::{SessionShared, SessionState};
use crate::anchor::Anchor;
use crate::cache::{dispose_unsurfaced, MergeEntry};
use crate::error::ArError;
use crate::events::{
    emit_to, AnchorsChanged, AnchorsMerged, FrameUpdated, MapsChanged, MeshUpdated,
    SessionFailed, SessionInterrupted, SessionInterruptionEnded, TrackingStateChanged,
};
use crate::frame::Frame;
use crate::map::{Camera, Map};
use crate::native::{NativeHandle, NativeObjectKind};
use crate::object::NativeObject;
use std::sync::{Arc, Weak};

/// Which anchor batch a task applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum AnchorBatch {
    Added,
    Updated,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum MapBatch {
    Added,
    Updated,
}

/// Queue `task` against a weak session reference.
fn enqueue<F>(session: &Arc<SessionShared>, task: F)
where
    F: FnOnce(&SessionShared) + Send + 'static,
{
    let weak: Weak<SessionShared> = Arc::downgrade(session);
    session.queue.enqueue(move || {
        if let Some(session) = weak.upgrade() {
            task(&session);
        }
    });
}

/// One owned reference per non-null handle.
fn take_refs(session: &SessionShared, kind: NativeObjectKind, handles: &[NativeHandle]) -> Vec<NativeObject> {
    handles
        .iter()
        .filter(|handle| !handle.is_null())
        .map(|handle| NativeObject::new(*handle, kind, Arc::clone(&session.runtime)))
        .collect()
}

// =======================================================================
// Frames
// =======================================================================

/// Coalescing frame delivery: only the newest undrained frame survives.
pub(super) fn on_frame(session: &Arc<SessionShared>, frame: NativeHandle) {
    if frame.is_null() {
        return;
    }
    if session.is_destroyed() {
        session.runtime.release(NativeObjectKind::Frame, frame);
        return;
    }

    if let Some(stale) = session.mailbox.offer(frame) {
        // A drain task is already pending and will pick up `frame`.
        log::trace!("[session] Frame {} superseded by {}", stale, frame);
        session.runtime.release(NativeObjectKind::Frame, stale);
        return;
    }

    enqueue(session, consume_frame);
}

fn consume_frame(session: &SessionShared) {
    let Some(handle) = session.mailbox.take() else {
        return;
    };

    let mut core = session.core.lock();
    if session.is_destroyed() {
        drop(core);
        session.runtime.release(NativeObjectKind::Frame, handle);
        return;
    }

    let settings = session.settings.load();
    let frame = Arc::new(Frame::wrap(
        Arc::clone(&session.runtime),
        handle,
        settings.world_scale,
    ));
    session
        .runtime
        .mark_frame_consumed(session.native_handle(), handle);
    core.replace_current_frame(Some(Arc::clone(&frame)), settings.frame_disposal);
    core.update_generators(&frame);
    let handlers = session.events.frame_updated.snapshot();
    drop(core);

    emit_to("frame_updated", &handlers, &FrameUpdated { frame });
}

// =======================================================================
// Anchors
// =======================================================================

pub(super) fn on_anchors(session: &Arc<SessionShared>, batch: AnchorBatch, handles: &[NativeHandle]) {
    let refs = take_refs(session, NativeObjectKind::Anchor, handles);
    if refs.is_empty() || session.is_destroyed() {
        return;
    }
    enqueue(session, move |s| apply_anchors(s, batch, refs));
}

fn apply_anchors(session: &SessionShared, batch: AnchorBatch, refs: Vec<NativeObject>) {
    let mut core = session.core.lock();
    if session.is_destroyed() {
        return;
    }
    let anchors: Vec<Arc<Anchor>> = refs
        .into_iter()
        .filter_map(|native| Anchor::adopt(session, native))
        .collect();
    if anchors.is_empty() {
        return;
    }

    match batch {
        AnchorBatch::Added => {
            core.anchors.on_added(&anchors);
            let handlers = session.events.anchors_added.snapshot();
            drop(core);
            emit_to("anchors_added", &handlers, &AnchorsChanged { anchors });
        }
        AnchorBatch::Updated => {
            core.anchors.on_updated(&anchors);
            let handlers = session.events.anchors_updated.snapshot();
            drop(core);
            emit_to("anchors_updated", &handlers, &AnchorsChanged { anchors });
        }
        AnchorBatch::Removed => {
            // Subscribers see the anchors before they are disposed.
            let handlers = session.events.anchors_removed.snapshot();
            drop(core);
            let args = AnchorsChanged { anchors };
            emit_to("anchors_removed", &handlers, &args);

            let mut core = session.core.lock();
            if session.is_destroyed() {
                drop(core);
                dispose_unsurfaced(&args.anchors);
                return;
            }
            let disposed = core.anchors.on_removed(&args.anchors);
            log::trace!("[session] {} anchor(s) removed", disposed);
        }
    }
}

/// Owned references for one merge entry.
type MergeRefs = (NativeObject, Vec<NativeObject>);

pub(super) fn on_merged(session: &Arc<SessionShared>, entries: Vec<(NativeHandle, Vec<NativeHandle>)>) {
    let mut refs: Vec<MergeRefs> = Vec::with_capacity(entries.len());
    for (parent, children) in entries {
        let children = take_refs(session, NativeObjectKind::Anchor, &children);
        if parent.is_null() {
            log::warn!("[session] Merge entry without parent, releasing {} child(ren)", children.len());
            continue;
        }
        let parent = NativeObject::new(parent, NativeObjectKind::Anchor, Arc::clone(&session.runtime));
        refs.push((parent, children));
    }
    if refs.is_empty() || session.is_destroyed() {
        return;
    }
    enqueue(session, move |s| apply_merges(s, refs));
}

fn apply_merges(session: &SessionShared, refs: Vec<MergeRefs>) {
    let destroyed = |merges: &[MergeEntry]| {
        for (parent, children) in merges {
            dispose_unsurfaced(children);
            dispose_unsurfaced(std::slice::from_ref(parent));
        }
    };

    let core = session.core.lock();
    if session.is_destroyed() {
        return;
    }
    let mut merges: Vec<MergeEntry> = Vec::with_capacity(refs.len());
    for (parent, children) in refs {
        // Children of an unresolvable parent are dropped unresolved.
        let Some(parent) = Anchor::adopt(session, parent) else {
            continue;
        };
        let children = children
            .into_iter()
            .filter_map(|native| Anchor::adopt(session, native))
            .collect();
        merges.push((parent, children));
    }
    if merges.is_empty() {
        return;
    }
    let handlers = session.events.anchors_merged.snapshot();
    drop(core);

    for (parent, children) in &merges {
        emit_to(
            "anchors_merged",
            &handlers,
            &AnchorsMerged {
                parent: Arc::clone(parent),
                children: children.clone(),
            },
        );
    }

    let mut core = session.core.lock();
    if session.is_destroyed() {
        drop(core);
        destroyed(&merges);
        return;
    }
    core.anchors.on_merged(&merges);
}

// =======================================================================
// Maps, Mesh, Camera
// =======================================================================

pub(super) fn on_maps(session: &Arc<SessionShared>, batch: MapBatch, handles: &[NativeHandle]) {
    let refs = take_refs(session, NativeObjectKind::Map, handles);
    if refs.is_empty() || session.is_destroyed() {
        return;
    }

    enqueue(session, move |s| {
        let core = s.core.lock();
        if s.is_destroyed() {
            return;
        }
        let world_scale = s.settings.load().world_scale;
        let maps: Vec<Arc<Map>> = refs
            .into_iter()
            .filter_map(|native| Map::adopt(s, native, world_scale))
            .collect();
        if maps.is_empty() {
            return;
        }
        let (name, handlers) = match batch {
            MapBatch::Added => ("maps_added", s.events.maps_added.snapshot()),
            MapBatch::Updated => ("maps_updated", s.events.maps_updated.snapshot()),
        };
        drop(core);
        emit_to(name, &handlers, &MapsChanged { maps });
    });
}

pub(super) fn on_mesh(session: &Arc<SessionShared>, mesh: NativeHandle) {
    if mesh.is_null() {
        return;
    }
    let mesh = NativeObject::new(mesh, NativeObjectKind::Mesh, Arc::clone(&session.runtime));
    if session.is_destroyed() {
        return;
    }

    enqueue(session, move |s| {
        let mut core = s.core.lock();
        if s.is_destroyed() {
            return;
        }
        let blocks = s.runtime.mesh_blocks(mesh.handle());
        let update = core.mesh.apply(&blocks);
        let handlers = s.events.mesh_updated.snapshot();
        drop(core);
        // Mesh data is copied out; the native mesh is done.
        drop(mesh);

        log::trace!(
            "[session] Mesh v{}: {} changed, {} removed",
            update.version,
            update.changed.len(),
            update.removed.len()
        );
        emit_to("mesh_updated", &handlers, &MeshUpdated { update });
    });
}

pub(super) fn on_camera(session: &Arc<SessionShared>, camera: NativeHandle) {
    if camera.is_null() {
        return;
    }
    let world_scale = session.settings.load().world_scale;
    let camera = Arc::new(Camera::wrap(Arc::clone(&session.runtime), camera, world_scale));
    if session.is_destroyed() {
        return;
    }

    enqueue(session, move |s| {
        let core = s.core.lock();
        if s.is_destroyed() {
            return;
        }
        let handlers = s.events.tracking_state_changed.snapshot();
        drop(core);
        emit_to(
            "tracking_state_changed",
            &handlers,
            &TrackingStateChanged { camera },
        );
    });
}

// =======================================================================
// Signals
// =======================================================================

pub(super) fn on_interrupted(session: &Arc<SessionShared>) {
    enqueue(session, |s| {
        let core = s.core.lock();
        if s.is_destroyed() {
            return;
        }
        let handlers = s.events.interrupted.snapshot();
        drop(core);
        emit_to("interrupted", &handlers, &SessionInterrupted);
    });
}

pub(super) fn on_interruption_ended(session: &Arc<SessionShared>) {
    enqueue(session, |s| {
        let core = s.core.lock();
        if s.is_destroyed() {
            return;
        }
        let handlers = s.events.interruption_ended.snapshot();
        drop(core);
        emit_to("interruption_ended", &handlers, &SessionInterruptionEnded);
    });
}

/// Answered on the asking native thread.
pub(super) fn on_relocalization_query(session: &SessionShared) -> bool {
    if session.is_destroyed() {
        return false;
    }
    session.events.relocalization.ask()
}

pub(super) fn on_failed(session: &Arc<SessionShared>, code: u64) {
    let error = ArError::from_code(code);
    log::error!("[session] Native session {} failed: {}", session.stage, error);

    enqueue(session, move |s| {
        let mut core = s.core.lock();
        if s.is_destroyed() {
            return;
        }
        if core.state == SessionState::Failed {
            log::debug!(
                "[session] Ignoring repeated failure {} on {}",
                error,
                s.stage
            );
            return;
        }
        core.state = SessionState::Failed;
        core.failure = Some(error);
        let handlers = s.events.failed.snapshot();
        drop(core);
        emit_to("failed", &handlers, &SessionFailed { error });
    });
}
