// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `extern "C"` entry points handed to the native runtime.
//!
//! Every trampoline resolves its session from the opaque context, copies
//! any borrowed payload arrays before returning, and never lets a panic
//! cross the FFI boundary. Payloads delivered after the session was released
//! are handed straight back to the runtime.

use super::callbacks::{self, AnchorBatch, MapBatch};
use super::{sessions, SessionShared};
use crate::native::{
    CallbackKind, ContextId, MergeBatch, NativeCallback, NativeHandle, NativeObjectKind,
    NativeRuntime,
};
use crate::queue::panic_message;
use crate::registry::Resolved;
use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Trampoline for `kind`.
pub(crate) fn callback_for(kind: CallbackKind) -> NativeCallback {
    match kind {
        CallbackKind::FrameUpdated => NativeCallback::FrameUpdated(frame_updated),
        CallbackKind::MeshUpdated => NativeCallback::MeshUpdated(mesh_updated),
        CallbackKind::AnchorsAdded => NativeCallback::AnchorsAdded(anchors_added),
        CallbackKind::AnchorsUpdated => NativeCallback::AnchorsUpdated(anchors_updated),
        CallbackKind::AnchorsRemoved => NativeCallback::AnchorsRemoved(anchors_removed),
        CallbackKind::AnchorsMerged => NativeCallback::AnchorsMerged(anchors_merged),
        CallbackKind::MapsAdded => NativeCallback::MapsAdded(maps_added),
        CallbackKind::MapsUpdated => NativeCallback::MapsUpdated(maps_updated),
        CallbackKind::TrackingStateChanged => {
            NativeCallback::TrackingStateChanged(tracking_state_changed)
        }
        CallbackKind::Interrupted => NativeCallback::Interrupted(interrupted),
        CallbackKind::InterruptionEnded => NativeCallback::InterruptionEnded(interruption_ended),
        CallbackKind::RelocalizationQuery => {
            NativeCallback::RelocalizationQuery(relocalization_query)
        }
        CallbackKind::Failed => NativeCallback::Failed(failed),
    }
}

/// Run `f` against the session behind `context`.
///
/// For a released session, `late` gets the runtime so it can release the
/// payload. A context that was never issued (or whose runtime is gone)
/// cannot be attributed, and its payload is dropped with an error.
fn with_session<R>(
    name: &str,
    context: *mut c_void,
    fallback: R,
    f: impl FnOnce(&Arc<SessionShared>) -> R,
    late: impl FnOnce(&dyn NativeRuntime),
) -> R {
    let id = ContextId::from_ptr(context);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match sessions().resolve(id) {
        Some(Resolved::Live(session)) => Some(f(&session)),
        Some(Resolved::Retired(runtime)) => {
            log::debug!(
                "[trampoline] {} after release of context {}, releasing payload",
                name,
                id.raw()
            );
            late(&*runtime);
            None
        }
        None => {
            log::error!(
                "[trampoline] {} for unknown context {}, payload not released",
                name,
                id.raw()
            );
            None
        }
    }));

    match outcome {
        Ok(Some(result)) => result,
        Ok(None) => fallback,
        Err(payload) => {
            log::error!("[trampoline] {} panicked: {}", name, panic_message(&payload));
            fallback
        }
    }
}

fn release_all(runtime: &dyn NativeRuntime, kind: NativeObjectKind, handles: &[NativeHandle]) {
    for handle in handles.iter().filter(|handle| !handle.is_null()) {
        runtime.release(kind, *handle);
    }
}

fn no_payload(_: &dyn NativeRuntime) {}

/// Copy a borrowed native handle array.
///
/// # Safety
/// `handles` must be null or point to `count` readable handles.
unsafe fn copy_handles(handles: *const NativeHandle, count: u64) -> Vec<NativeHandle> {
    if handles.is_null() || count == 0 {
        return Vec::new();
    }
    std::slice::from_raw_parts(handles, count as usize).to_vec()
}

/// Copy a borrowed merge batch into `(parent, children)` pairs.
///
/// # Safety
/// `batch` must be null or a valid batch whose arrays are readable.
unsafe fn copy_merges(batch: *const MergeBatch) -> Vec<(NativeHandle, Vec<NativeHandle>)> {
    let Some(batch) = batch.as_ref() else {
        return Vec::new();
    };
    if batch.entries.is_null() || batch.size == 0 {
        return Vec::new();
    }
    std::slice::from_raw_parts(batch.entries, batch.size as usize)
        .iter()
        .map(|info| {
            (
                info.parent,
                copy_handles(info.children, u64::from(info.children_size)),
            )
        })
        .collect()
}

unsafe extern "C" fn frame_updated(context: *mut c_void, frame: NativeHandle) {
    with_session(
        "frame_updated",
        context,
        (),
        |s| callbacks::on_frame(s, frame),
        |rt| release_all(rt, NativeObjectKind::Frame, &[frame]),
    );
}

unsafe extern "C" fn mesh_updated(context: *mut c_void, mesh: NativeHandle) {
    with_session(
        "mesh_updated",
        context,
        (),
        |s| callbacks::on_mesh(s, mesh),
        |rt| release_all(rt, NativeObjectKind::Mesh, &[mesh]),
    );
}

unsafe extern "C" fn tracking_state_changed(context: *mut c_void, camera: NativeHandle) {
    with_session(
        "tracking_state_changed",
        context,
        (),
        |s| callbacks::on_camera(s, camera),
        |rt| release_all(rt, NativeObjectKind::Camera, &[camera]),
    );
}

/// Shared body of the anchor batch trampolines.
unsafe fn anchor_batch(
    name: &str,
    batch: AnchorBatch,
    context: *mut c_void,
    handles: *const NativeHandle,
    count: u64,
) {
    let handles = copy_handles(handles, count);
    with_session(
        name,
        context,
        (),
        |s| callbacks::on_anchors(s, batch, &handles),
        |rt| release_all(rt, NativeObjectKind::Anchor, &handles),
    );
}

unsafe extern "C" fn anchors_added(context: *mut c_void, handles: *const NativeHandle, count: u64) {
    anchor_batch("anchors_added", AnchorBatch::Added, context, handles, count);
}

unsafe extern "C" fn anchors_updated(context: *mut c_void, handles: *const NativeHandle, count: u64) {
    anchor_batch("anchors_updated", AnchorBatch::Updated, context, handles, count);
}

unsafe extern "C" fn anchors_removed(context: *mut c_void, handles: *const NativeHandle, count: u64) {
    anchor_batch("anchors_removed", AnchorBatch::Removed, context, handles, count);
}

unsafe extern "C" fn anchors_merged(context: *mut c_void, batch: *const MergeBatch) {
    let merges = copy_merges(batch);
    let handles: Vec<NativeHandle> = merges
        .iter()
        .flat_map(|(parent, children)| std::iter::once(*parent).chain(children.iter().copied()))
        .collect();
    with_session(
        "anchors_merged",
        context,
        (),
        |s| callbacks::on_merged(s, merges),
        |rt| release_all(rt, NativeObjectKind::Anchor, &handles),
    );
}

/// Shared body of the map batch trampolines.
unsafe fn map_batch(
    name: &str,
    batch: MapBatch,
    context: *mut c_void,
    handles: *const NativeHandle,
    count: u64,
) {
    let handles = copy_handles(handles, count);
    with_session(
        name,
        context,
        (),
        |s| callbacks::on_maps(s, batch, &handles),
        |rt| release_all(rt, NativeObjectKind::Map, &handles),
    );
}

unsafe extern "C" fn maps_added(context: *mut c_void, handles: *const NativeHandle, count: u64) {
    map_batch("maps_added", MapBatch::Added, context, handles, count);
}

unsafe extern "C" fn maps_updated(context: *mut c_void, handles: *const NativeHandle, count: u64) {
    map_batch("maps_updated", MapBatch::Updated, context, handles, count);
}

unsafe extern "C" fn interrupted(context: *mut c_void) {
    with_session("interrupted", context, (), callbacks::on_interrupted, no_payload);
}

unsafe extern "C" fn interruption_ended(context: *mut c_void) {
    with_session(
        "interruption_ended",
        context,
        (),
        callbacks::on_interruption_ended,
        no_payload,
    );
}

unsafe extern "C" fn relocalization_query(context: *mut c_void) -> bool {
    with_session(
        "relocalization_query",
        context,
        false,
        |s| callbacks::on_relocalization_query(s),
        no_payload,
    )
}

unsafe extern "C" fn failed(context: *mut c_void, code: u64) {
    with_session("failed", context, (), |s| callbacks::on_failed(s, code), no_payload);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::MergeInfo;

    #[test]
    fn test_unknown_context_is_ignored() {
        let ctx = ContextId::from_raw(u64::MAX - 7);
        // SAFETY: null payloads with zero counts.
        unsafe {
            frame_updated(ctx.as_ptr(), NativeHandle::NULL);
            anchors_added(ctx.as_ptr(), std::ptr::null(), 0);
            assert!(!relocalization_query(ctx.as_ptr()));
        }
    }

    #[test]
    fn test_copy_merges() {
        let children = [NativeHandle::from_raw(2), NativeHandle::from_raw(3)];
        let infos = [MergeInfo {
            parent: NativeHandle::from_raw(1),
            children: children.as_ptr(),
            children_size: 2,
        }];
        let batch = MergeBatch {
            entries: infos.as_ptr(),
            size: 1,
        };

        // SAFETY: batch and arrays are live for the call.
        let merges = unsafe { copy_merges(&batch) };
        assert_eq!(merges, vec![(NativeHandle::from_raw(1), children.to_vec())]);
        assert!(unsafe { copy_merges(std::ptr::null()) }.is_empty());
    }

    #[test]
    fn test_every_kind_has_trampoline() {
        for kind in CallbackKind::ALL {
            assert_eq!(callback_for(kind).kind(), kind);
        }
    }
}
