// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process [`NativeRuntime`] that records every call.
//!
//! Used by tests and by hosts that want to exercise the bridge without a
//! device. Objects are reference counted the way a native runtime would:
//! every handle delivered through a callback carries one reference, and
//! every [`NativeRuntime::release`] drops one. Releasing an object with no
//! outstanding reference is recorded as an over-release.
//!
//! `fire_*` methods invoke the registered trampolines synchronously on the
//! calling thread, so tests can simulate native threads by calling them from
//! spawned threads.

use super::{
    AnchorInfo, AnchorKind, AwarenessReport, CallbackKind, CameraInfo, ContextId, FrameInfo,
    MapInfo, MergeBatch, MergeInfo, MeshBlock, NativeCallback, NativeHandle, NativeObjectKind,
    NativeRuntime, RuntimeCapabilities, Transform,
};
use crate::config::{ArConfiguration, RunOptions};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Call observed by the runtime, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeCall {
    InitSession { stage: Uuid, playback: bool },
    ReleaseSession(NativeHandle),
    Run { session: NativeHandle, options: RunOptions },
    Pause(NativeHandle),
    MarkFrameConsumed(NativeHandle),
    SetCallback(CallbackKind),
    CreateAnchor(NativeHandle),
    AddAnchor(NativeHandle),
    RemoveAnchor(NativeHandle),
}

#[derive(Debug)]
enum Payload {
    None,
    Anchor(AnchorInfo),
    Frame(FrameInfo),
    Camera(CameraInfo),
    Map(MapInfo),
    Mesh(Vec<MeshBlock>),
}

#[derive(Debug)]
struct ObjectRecord {
    kind: NativeObjectKind,
    refs: u32,
    releases: u32,
    payload: Payload,
}

#[derive(Default)]
struct State {
    objects: HashMap<NativeHandle, ObjectRecord>,
    callbacks: HashMap<(NativeHandle, CallbackKind), (ContextId, NativeCallback)>,
    calls: Vec<RuntimeCall>,
    over_released: Vec<NativeHandle>,
    capabilities: RuntimeCapabilities,
    awareness: Option<AwarenessReport>,
    fail_init: bool,
    fail_create_anchor: bool,
}

/// Recording runtime. Share it as `Arc<RecordingRuntime>`.
pub struct RecordingRuntime {
    next_handle: AtomicU64,
    state: Mutex<State>,
}

impl RecordingRuntime {
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(0x1000),
            state: Mutex::new(State::default()),
        }
    }

    fn alloc(&self, kind: NativeObjectKind, refs: u32, payload: Payload) -> NativeHandle {
        let handle = NativeHandle::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.state.lock().objects.insert(
            handle,
            ObjectRecord {
                kind,
                refs,
                releases: 0,
                payload,
            },
        );
        handle
    }

    // ===================================================================
    // Object Factories (native-owned, no reference yet)
    // ===================================================================

    pub fn new_anchor(&self, identifier: Uuid) -> NativeHandle {
        self.new_anchor_with(AnchorInfo {
            identifier,
            kind: AnchorKind::Base,
            transform: Transform::IDENTITY,
        })
    }

    pub fn new_anchor_with(&self, info: AnchorInfo) -> NativeHandle {
        self.alloc(NativeObjectKind::Anchor, 0, Payload::Anchor(info))
    }

    pub fn new_frame(&self, timestamp: f64) -> NativeHandle {
        self.new_frame_with(FrameInfo {
            timestamp,
            ..FrameInfo::default()
        })
    }

    pub fn new_frame_with(&self, info: FrameInfo) -> NativeHandle {
        self.alloc(NativeObjectKind::Frame, 0, Payload::Frame(info))
    }

    pub fn new_camera(&self, info: CameraInfo) -> NativeHandle {
        self.alloc(NativeObjectKind::Camera, 0, Payload::Camera(info))
    }

    pub fn new_map(&self, identifier: Uuid) -> NativeHandle {
        self.alloc(
            NativeObjectKind::Map,
            0,
            Payload::Map(MapInfo {
                identifier,
                transform: Transform::IDENTITY,
            }),
        )
    }

    pub fn new_mesh(&self, blocks: Vec<MeshBlock>) -> NativeHandle {
        self.alloc(NativeObjectKind::Mesh, 0, Payload::Mesh(blocks))
    }

    // ===================================================================
    // Knobs
    // ===================================================================

    pub fn set_capabilities(&self, capabilities: RuntimeCapabilities) {
        self.state.lock().capabilities = capabilities;
    }

    pub fn set_awareness(&self, report: AwarenessReport) {
        self.state.lock().awareness = Some(report);
    }

    /// Make subsequent `init_session` calls return a null handle.
    pub fn fail_init(&self, fail: bool) {
        self.state.lock().fail_init = fail;
    }

    /// Make subsequent `create_anchor` calls return a null handle.
    pub fn fail_create_anchor(&self, fail: bool) {
        self.state.lock().fail_create_anchor = fail;
    }

    // ===================================================================
    // Inspection
    // ===================================================================

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.state.lock().calls.clone()
    }

    /// References currently held by the bridge on `handle`.
    pub fn outstanding(&self, handle: NativeHandle) -> u32 {
        self.state.lock().objects.get(&handle).map_or(0, |o| o.refs)
    }

    /// Sum of outstanding references over every object.
    pub fn outstanding_total(&self) -> u32 {
        self.state.lock().objects.values().map(|o| o.refs).sum()
    }

    /// Number of successful releases of `handle`.
    pub fn release_count(&self, handle: NativeHandle) -> u32 {
        self.state.lock().objects.get(&handle).map_or(0, |o| o.releases)
    }

    /// Total successful releases of objects of `kind`.
    pub fn releases_of(&self, kind: NativeObjectKind) -> u32 {
        self.state
            .lock()
            .objects
            .values()
            .filter(|o| o.kind == kind)
            .map(|o| o.releases)
            .sum()
    }

    /// Handles released more times than they were delivered.
    pub fn over_released(&self) -> Vec<NativeHandle> {
        self.state.lock().over_released.clone()
    }

    pub fn is_registered(&self, session: NativeHandle, kind: CallbackKind) -> bool {
        self.state.lock().callbacks.contains_key(&(session, kind))
    }

    // ===================================================================
    // Firing
    // ===================================================================

    fn lookup(&self, session: NativeHandle, kind: CallbackKind) -> Option<(ContextId, NativeCallback)> {
        self.state.lock().callbacks.get(&(session, kind)).copied()
    }

    /// Hand one reference per handle to the bridge, as a callback would.
    pub fn hand_out(&self, handles: &[NativeHandle]) {
        let mut state = self.state.lock();
        for handle in handles {
            if let Some(obj) = state.objects.get_mut(handle) {
                obj.refs += 1;
            }
        }
    }

    /// Deliver a single-handle callback. Returns false when nothing is registered.
    pub fn fire_handle(&self, session: NativeHandle, kind: CallbackKind, handle: NativeHandle) -> bool {
        let Some((ctx, callback)) = self.lookup(session, kind) else {
            return false;
        };
        let f = match callback {
            NativeCallback::FrameUpdated(f)
            | NativeCallback::MeshUpdated(f)
            | NativeCallback::TrackingStateChanged(f) => f,
            _ => return false,
        };
        self.hand_out(&[handle]);
        // SAFETY: trampoline registered by the bridge for this kind.
        unsafe { f(ctx.as_ptr(), handle) };
        true
    }

    pub fn fire_frame(&self, session: NativeHandle, frame: NativeHandle) -> bool {
        self.fire_handle(session, CallbackKind::FrameUpdated, frame)
    }

    pub fn fire_mesh(&self, session: NativeHandle, mesh: NativeHandle) -> bool {
        self.fire_handle(session, CallbackKind::MeshUpdated, mesh)
    }

    pub fn fire_camera(&self, session: NativeHandle, camera: NativeHandle) -> bool {
        self.fire_handle(session, CallbackKind::TrackingStateChanged, camera)
    }

    /// Deliver an anchor or map batch.
    pub fn fire_batch(&self, session: NativeHandle, kind: CallbackKind, handles: &[NativeHandle]) -> bool {
        let Some((ctx, callback)) = self.lookup(session, kind) else {
            return false;
        };
        let f = match callback {
            NativeCallback::AnchorsAdded(f)
            | NativeCallback::AnchorsUpdated(f)
            | NativeCallback::AnchorsRemoved(f)
            | NativeCallback::MapsAdded(f)
            | NativeCallback::MapsUpdated(f) => f,
            _ => return false,
        };
        self.hand_out(handles);
        // SAFETY: pointer/len describe `handles`, alive for the call.
        unsafe { f(ctx.as_ptr(), handles.as_ptr(), handles.len() as u64) };
        true
    }

    /// Deliver a merge batch: `(parent, children)` per entry.
    pub fn fire_merge(&self, session: NativeHandle, entries: &[(NativeHandle, Vec<NativeHandle>)]) -> bool {
        let Some((ctx, NativeCallback::AnchorsMerged(f))) =
            self.lookup(session, CallbackKind::AnchorsMerged)
        else {
            return false;
        };
        for (parent, children) in entries {
            self.hand_out(&[*parent]);
            self.hand_out(children);
        }
        let infos: Vec<MergeInfo> = entries
            .iter()
            .map(|(parent, children)| MergeInfo {
                parent: *parent,
                children: children.as_ptr(),
                children_size: children.len() as u32,
            })
            .collect();
        let batch = MergeBatch {
            entries: infos.as_ptr(),
            size: infos.len() as u32,
        };
        // SAFETY: batch and every child array outlive the call.
        unsafe { f(ctx.as_ptr(), &batch) };
        true
    }

    pub fn fire_signal(&self, session: NativeHandle, kind: CallbackKind) -> bool {
        let Some((ctx, callback)) = self.lookup(session, kind) else {
            return false;
        };
        match callback {
            NativeCallback::Interrupted(f) | NativeCallback::InterruptionEnded(f) => {
                // SAFETY: registered trampoline.
                unsafe { f(ctx.as_ptr()) };
                true
            }
            _ => false,
        }
    }

    /// Ask the relocalization question; `None` when nothing is registered.
    pub fn fire_relocalization_query(&self, session: NativeHandle) -> Option<bool> {
        match self.lookup(session, CallbackKind::RelocalizationQuery) {
            // SAFETY: registered trampoline.
            Some((ctx, NativeCallback::RelocalizationQuery(f))) => Some(unsafe { f(ctx.as_ptr()) }),
            _ => None,
        }
    }

    pub fn fire_failure(&self, session: NativeHandle, code: u64) -> bool {
        match self.lookup(session, CallbackKind::Failed) {
            Some((ctx, NativeCallback::Failed(f))) => {
                // SAFETY: registered trampoline.
                unsafe { f(ctx.as_ptr(), code) };
                true
            }
            _ => false,
        }
    }
}

impl Default for RecordingRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeRuntime for RecordingRuntime {
    fn init_session(&self, stage: Uuid, playback: bool) -> NativeHandle {
        self.state
            .lock()
            .calls
            .push(RuntimeCall::InitSession { stage, playback });
        if self.state.lock().fail_init {
            return NativeHandle::NULL;
        }
        self.alloc(NativeObjectKind::Session, 1, Payload::None)
    }

    fn release_session(&self, session: NativeHandle) {
        self.state.lock().calls.push(RuntimeCall::ReleaseSession(session));
        self.release(NativeObjectKind::Session, session);
        self.state.lock().callbacks.retain(|(s, _), _| *s != session);
    }

    fn run(&self, session: NativeHandle, _configuration: &ArConfiguration, options: RunOptions) {
        self.state.lock().calls.push(RuntimeCall::Run { session, options });
    }

    fn pause(&self, session: NativeHandle) {
        self.state.lock().calls.push(RuntimeCall::Pause(session));
    }

    fn mark_frame_consumed(&self, _session: NativeHandle, frame: NativeHandle) {
        self.state.lock().calls.push(RuntimeCall::MarkFrameConsumed(frame));
    }

    fn set_callback(&self, session: NativeHandle, context: ContextId, callback: NativeCallback) {
        let mut state = self.state.lock();
        state.calls.push(RuntimeCall::SetCallback(callback.kind()));
        state
            .callbacks
            .insert((session, callback.kind()), (context, callback));
    }

    fn create_anchor(&self, transform: &Transform) -> NativeHandle {
        if self.state.lock().fail_create_anchor {
            return NativeHandle::NULL;
        }
        let handle = self.alloc(
            NativeObjectKind::Anchor,
            1,
            Payload::Anchor(AnchorInfo {
                identifier: Uuid::new_v4(),
                kind: AnchorKind::Base,
                transform: *transform,
            }),
        );
        self.state.lock().calls.push(RuntimeCall::CreateAnchor(handle));
        handle
    }

    fn add_anchor(&self, _session: NativeHandle, anchor: NativeHandle) {
        self.state.lock().calls.push(RuntimeCall::AddAnchor(anchor));
    }

    fn remove_anchor(&self, _session: NativeHandle, anchor: NativeHandle) {
        self.state.lock().calls.push(RuntimeCall::RemoveAnchor(anchor));
    }

    fn release(&self, _kind: NativeObjectKind, handle: NativeHandle) {
        let mut state = self.state.lock();
        let over = match state.objects.get_mut(&handle) {
            Some(obj) if obj.refs > 0 => {
                obj.refs -= 1;
                obj.releases += 1;
                false
            }
            _ => true,
        };
        if over {
            state.over_released.push(handle);
        }
    }

    fn anchor_info(&self, anchor: NativeHandle) -> Option<AnchorInfo> {
        match self.state.lock().objects.get(&anchor).map(|o| &o.payload) {
            Some(Payload::Anchor(info)) => Some(info.clone()),
            _ => None,
        }
    }

    fn frame_info(&self, frame: NativeHandle) -> FrameInfo {
        match self.state.lock().objects.get(&frame).map(|o| &o.payload) {
            Some(Payload::Frame(info)) => info.clone(),
            _ => FrameInfo::default(),
        }
    }

    fn camera_info(&self, camera: NativeHandle) -> CameraInfo {
        match self.state.lock().objects.get(&camera).map(|o| &o.payload) {
            Some(Payload::Camera(info)) => info.clone(),
            _ => CameraInfo::default(),
        }
    }

    fn map_info(&self, map: NativeHandle) -> Option<MapInfo> {
        match self.state.lock().objects.get(&map).map(|o| &o.payload) {
            Some(Payload::Map(info)) => Some(info.clone()),
            _ => None,
        }
    }

    fn mesh_blocks(&self, mesh: NativeHandle) -> Vec<MeshBlock> {
        match self.state.lock().objects.get(&mesh).map(|o| &o.payload) {
            Some(Payload::Mesh(blocks)) => blocks.clone(),
            _ => Vec::new(),
        }
    }

    fn awareness_status(&self, _session: NativeHandle) -> AwarenessReport {
        self.state.lock().awareness.clone().unwrap_or_default()
    }

    fn capabilities(&self) -> RuntimeCapabilities {
        self.state.lock().capabilities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_counting() {
        let rt = RecordingRuntime::new();
        let anchor = rt.create_anchor(&Transform::IDENTITY);
        assert_eq!(rt.outstanding(anchor), 1);

        rt.release(NativeObjectKind::Anchor, anchor);
        assert_eq!(rt.outstanding(anchor), 0);
        assert_eq!(rt.release_count(anchor), 1);
        assert!(rt.over_released().is_empty());

        rt.release(NativeObjectKind::Anchor, anchor);
        assert_eq!(rt.over_released(), vec![anchor]);
    }

    #[test]
    fn test_fire_without_registration() {
        let rt = RecordingRuntime::new();
        let session = rt.init_session(Uuid::new_v4(), false);
        let frame = rt.new_frame(0.0);
        assert!(!rt.fire_frame(session, frame));
        assert_eq!(rt.outstanding(frame), 0);
        assert_eq!(rt.fire_relocalization_query(session), None);
    }
}
