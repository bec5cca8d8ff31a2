// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Native AR runtime abstraction.
//!
//! The session bridge never talks to a platform AR framework directly. It
//! drives a [`NativeRuntime`] implementation and registers one fixed-signature
//! `extern "C"` trampoline per [`CallbackKind`]. Native threads invoke those
//! trampolines with the opaque context pointer handed out at registration.
//!
//! # Handle ownership
//!
//! Every [`NativeHandle`] passed to a callback carries one native reference.
//! The bridge either wraps it (and releases it later through
//! [`NativeRuntime::release`]) or releases it immediately. Nothing else may
//! release it.

pub mod recording;

use crate::config::{ArConfiguration, RunOptions};
use std::ffi::c_void;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

// =======================================================================
// Handles
// =======================================================================

/// Opaque reference to an object owned by the native AR runtime.
///
/// Zero is the null handle.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct NativeHandle(u64);

impl NativeHandle {
    pub const NULL: NativeHandle = NativeHandle(0);

    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        NativeHandle(raw)
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

/// Opaque callback context handed to the native runtime.
///
/// The value is an index into the process-wide context table, never a
/// pointer. A stale or forged context resolves to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    /// Allocate a fresh, never-reused identifier.
    pub(crate) fn next() -> Self {
        ContextId(NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        ContextId(raw)
    }

    /// Encode as the `void*` context argument passed back by native code.
    #[inline]
    pub fn as_ptr(self) -> *mut c_void {
        self.0 as usize as *mut c_void
    }

    /// Decode a context argument received in a trampoline.
    #[inline]
    pub fn from_ptr(ptr: *mut c_void) -> Self {
        ContextId(ptr as usize as u64)
    }
}

/// Kind of native object behind a handle, used to pick the release call.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeObjectKind {
    Session = 0,
    Frame = 1,
    Anchor = 2,
    Map = 3,
    Camera = 4,
    Mesh = 5,
}

// =======================================================================
// Callback Kinds
// =======================================================================

/// Native callback kinds, one trampoline each.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    FrameUpdated = 0,
    MeshUpdated = 1,
    AnchorsAdded = 2,
    AnchorsUpdated = 3,
    AnchorsRemoved = 4,
    AnchorsMerged = 5,
    MapsAdded = 6,
    MapsUpdated = 7,
    TrackingStateChanged = 8,
    Interrupted = 9,
    InterruptionEnded = 10,
    RelocalizationQuery = 11,
    Failed = 12,
}

impl CallbackKind {
    pub const ALL: [CallbackKind; 13] = [
        CallbackKind::FrameUpdated,
        CallbackKind::MeshUpdated,
        CallbackKind::AnchorsAdded,
        CallbackKind::AnchorsUpdated,
        CallbackKind::AnchorsRemoved,
        CallbackKind::AnchorsMerged,
        CallbackKind::MapsAdded,
        CallbackKind::MapsUpdated,
        CallbackKind::TrackingStateChanged,
        CallbackKind::Interrupted,
        CallbackKind::InterruptionEnded,
        CallbackKind::RelocalizationQuery,
        CallbackKind::Failed,
    ];

    /// Bit used in the per-session registration mask.
    #[inline]
    pub const fn bit(self) -> u32 {
        1 << (self as u32)
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }
}

/// Single handle payload (frame, mesh, camera).
pub type HandleCallback = unsafe extern "C" fn(context: *mut c_void, handle: NativeHandle);

/// Batch payload (anchors, maps). `handles` points to `count` handles.
pub type HandleArrayCallback =
    unsafe extern "C" fn(context: *mut c_void, handles: *const NativeHandle, count: u64);

/// Merge payload.
pub type MergeCallback = unsafe extern "C" fn(context: *mut c_void, batch: *const MergeBatch);

/// No payload (interruption begin/end).
pub type VoidCallback = unsafe extern "C" fn(context: *mut c_void);

/// Synchronous query answered on the calling native thread.
pub type QueryCallback = unsafe extern "C" fn(context: *mut c_void) -> bool;

/// Terminal failure with a native error code.
pub type FailureCallback = unsafe extern "C" fn(context: *mut c_void, code: u64);

/// One parent and the children it absorbed.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MergeInfo {
    pub parent: NativeHandle,
    pub children: *const NativeHandle,
    pub children_size: u32,
}

/// Merge batch as laid out by the native runtime.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MergeBatch {
    pub entries: *const MergeInfo,
    pub size: u32,
}

/// Trampoline registration, tagged by kind.
#[derive(Debug, Clone, Copy)]
pub enum NativeCallback {
    FrameUpdated(HandleCallback),
    MeshUpdated(HandleCallback),
    AnchorsAdded(HandleArrayCallback),
    AnchorsUpdated(HandleArrayCallback),
    AnchorsRemoved(HandleArrayCallback),
    AnchorsMerged(MergeCallback),
    MapsAdded(HandleArrayCallback),
    MapsUpdated(HandleArrayCallback),
    TrackingStateChanged(HandleCallback),
    Interrupted(VoidCallback),
    InterruptionEnded(VoidCallback),
    RelocalizationQuery(QueryCallback),
    Failed(FailureCallback),
}

impl NativeCallback {
    pub fn kind(&self) -> CallbackKind {
        match self {
            NativeCallback::FrameUpdated(_) => CallbackKind::FrameUpdated,
            NativeCallback::MeshUpdated(_) => CallbackKind::MeshUpdated,
            NativeCallback::AnchorsAdded(_) => CallbackKind::AnchorsAdded,
            NativeCallback::AnchorsUpdated(_) => CallbackKind::AnchorsUpdated,
            NativeCallback::AnchorsRemoved(_) => CallbackKind::AnchorsRemoved,
            NativeCallback::AnchorsMerged(_) => CallbackKind::AnchorsMerged,
            NativeCallback::MapsAdded(_) => CallbackKind::MapsAdded,
            NativeCallback::MapsUpdated(_) => CallbackKind::MapsUpdated,
            NativeCallback::TrackingStateChanged(_) => CallbackKind::TrackingStateChanged,
            NativeCallback::Interrupted(_) => CallbackKind::Interrupted,
            NativeCallback::InterruptionEnded(_) => CallbackKind::InterruptionEnded,
            NativeCallback::RelocalizationQuery(_) => CallbackKind::RelocalizationQuery,
            NativeCallback::Failed(_) => CallbackKind::Failed,
        }
    }

    /// Erased function pointer, for runtimes that store callbacks untyped.
    pub fn as_raw(&self) -> *const c_void {
        match *self {
            NativeCallback::FrameUpdated(f)
            | NativeCallback::MeshUpdated(f)
            | NativeCallback::TrackingStateChanged(f) => f as *const c_void,
            NativeCallback::AnchorsAdded(f)
            | NativeCallback::AnchorsUpdated(f)
            | NativeCallback::AnchorsRemoved(f)
            | NativeCallback::MapsAdded(f)
            | NativeCallback::MapsUpdated(f) => f as *const c_void,
            NativeCallback::AnchorsMerged(f) => f as *const c_void,
            NativeCallback::Interrupted(f) | NativeCallback::InterruptionEnded(f) => {
                f as *const c_void
            }
            NativeCallback::RelocalizationQuery(f) => f as *const c_void,
            NativeCallback::Failed(f) => f as *const c_void,
        }
    }
}

// =======================================================================
// Snapshots
// =======================================================================

/// Column-major 4x4 transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub matrix: [f32; 16],
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        matrix: [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    };

    pub fn from_translation(x: f32, y: f32, z: f32) -> Self {
        let mut t = Self::IDENTITY;
        t.matrix[12] = x;
        t.matrix[13] = y;
        t.matrix[14] = z;
        t
    }

    #[inline]
    pub fn translation(&self) -> [f32; 3] {
        [self.matrix[12], self.matrix[13], self.matrix[14]]
    }

    /// Apply to a point (w = 1).
    pub fn transform_point(&self, p: [f32; 3]) -> [f32; 3] {
        let m = &self.matrix;
        [
            m[0] * p[0] + m[4] * p[1] + m[8] * p[2] + m[12],
            m[1] * p[0] + m[5] * p[1] + m[9] * p[2] + m[13],
            m[2] * p[0] + m[6] * p[1] + m[10] * p[2] + m[14],
        ]
    }

    /// Same rotation, translation multiplied by `scale`.
    pub fn scaled_translation(&self, scale: f32) -> Self {
        let mut t = *self;
        t.matrix[12] *= scale;
        t.matrix[13] *= scale;
        t.matrix[14] *= scale;
        t
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AnchorKind {
    #[default]
    Base,
    Plane,
    Image,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnchorInfo {
    pub identifier: Uuid,
    pub kind: AnchorKind,
    pub transform: Transform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingState {
    #[default]
    NotAvailable,
    Limited,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingStateReason {
    #[default]
    None,
    Initializing,
    Relocalizing,
    ExcessiveMotion,
    InsufficientFeatures,
    Unknown,
}

/// Pinhole intrinsics.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraIntrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CameraInfo {
    pub tracking_state: TrackingState,
    pub reason: TrackingStateReason,
    pub transform: Transform,
    pub intrinsics: CameraIntrinsics,
}

/// Row-major metric depth image.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthBuffer {
    pub width: u32,
    pub height: u32,
    pub depths: Vec<f32>,
    pub intrinsics: CameraIntrinsics,
    pub is_keyframe: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameInfo {
    pub timestamp: f64,
    pub camera: CameraInfo,
    pub depth: Option<DepthBuffer>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapInfo {
    pub identifier: Uuid,
    pub transform: Transform,
}

/// One accumulated mesh block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshBlock {
    pub coordinates: [i32; 3],
    pub version: u32,
    pub vertex_count: u32,
    pub face_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AwarenessStatus {
    #[default]
    Unknown,
    NotInitialized,
    Initializing,
    Ready,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AwarenessReport {
    pub status: AwarenessStatus,
    /// Native error code (0 = none).
    pub error: u32,
    pub message: String,
}

/// Features the native runtime supports on this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeCapabilities {
    pub world_tracking: bool,
    pub depth: bool,
    pub meshing: bool,
    pub semantic_segmentation: bool,
}

impl Default for RuntimeCapabilities {
    fn default() -> Self {
        Self {
            world_tracking: true,
            depth: true,
            meshing: true,
            semantic_segmentation: true,
        }
    }
}

// =======================================================================
// Runtime Trait
// =======================================================================

/// Entry points of a native AR runtime.
///
/// Implementations must accept calls from any thread. Query methods are only
/// called with handles the bridge still holds a reference to.
pub trait NativeRuntime: Send + Sync {
    /// Create a native session; returns [`NativeHandle::NULL`] on failure.
    fn init_session(&self, stage: Uuid, playback: bool) -> NativeHandle;

    fn release_session(&self, session: NativeHandle);

    fn run(&self, session: NativeHandle, configuration: &ArConfiguration, options: RunOptions);

    fn pause(&self, session: NativeHandle);

    /// Tell the runtime a frame was accepted for processing.
    fn mark_frame_consumed(&self, _session: NativeHandle, _frame: NativeHandle) {}

    /// Register a trampoline. `context` comes back as the first argument.
    fn set_callback(&self, session: NativeHandle, context: ContextId, callback: NativeCallback);

    /// Create a standalone anchor; the returned reference belongs to the caller.
    fn create_anchor(&self, transform: &Transform) -> NativeHandle;

    fn add_anchor(&self, session: NativeHandle, anchor: NativeHandle);

    fn remove_anchor(&self, session: NativeHandle, anchor: NativeHandle);

    /// Drop one reference to a non-session object.
    fn release(&self, kind: NativeObjectKind, handle: NativeHandle);

    fn anchor_info(&self, anchor: NativeHandle) -> Option<AnchorInfo>;

    fn frame_info(&self, frame: NativeHandle) -> FrameInfo;

    fn camera_info(&self, camera: NativeHandle) -> CameraInfo;

    fn map_info(&self, map: NativeHandle) -> Option<MapInfo>;

    fn mesh_blocks(&self, mesh: NativeHandle) -> Vec<MeshBlock>;

    fn awareness_status(&self, _session: NativeHandle) -> AwarenessReport {
        AwarenessReport {
            status: AwarenessStatus::Ready,
            ..AwarenessReport::default()
        }
    }

    fn capabilities(&self) -> RuntimeCapabilities {
        RuntimeCapabilities::default()
    }
}
