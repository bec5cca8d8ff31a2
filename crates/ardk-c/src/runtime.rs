// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Native runtime supplied by C as a function table.
//!
//! # Usage from C
//!
//! ```c
//! ArdkNativeRuntime vtable = {0};
//! vtable.init_session = my_init_session;
//! vtable.release_session = my_release_session;
//! /* ... every required entry ... */
//! vtable.user_data = my_runtime;
//! ArdkRuntime* runtime = ardk_runtime_create(&vtable);
//! ```
//!
//! Borrowed pointers handed to the table (configuration, transform, out
//! structs) are only valid for the duration of the call.

use std::ffi::CStr;
use std::os::raw::{c_char, c_void};
use std::ptr;

use ardk::config::{ArConfiguration, PlaneDetection, RunOptions};
use ardk::native::{
    AnchorInfo, AnchorKind, AwarenessReport, AwarenessStatus, CameraInfo, CameraIntrinsics,
    ContextId, DepthBuffer, FrameInfo, MapInfo, MeshBlock, NativeCallback, NativeHandle,
    NativeObjectKind, NativeRuntime, RuntimeCapabilities, TrackingState, TrackingStateReason,
    Transform,
};
use ardk::Uuid;

// =============================================================================
// C-compatible value types
// =============================================================================

/// 16-byte RFC 4122 identifier.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArdkUuid {
    pub bytes: [u8; 16],
}

impl From<Uuid> for ArdkUuid {
    fn from(id: Uuid) -> Self {
        Self {
            bytes: *id.as_bytes(),
        }
    }
}

impl From<ArdkUuid> for Uuid {
    fn from(id: ArdkUuid) -> Self {
        Uuid::from_bytes(id.bytes)
    }
}

/// Column-major 4x4 transform.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArdkTransform {
    pub m: [f32; 16],
}

impl Default for ArdkTransform {
    fn default() -> Self {
        Transform::IDENTITY.into()
    }
}

impl From<Transform> for ArdkTransform {
    fn from(t: Transform) -> Self {
        Self { m: t.matrix }
    }
}

impl From<ArdkTransform> for Transform {
    fn from(t: ArdkTransform) -> Self {
        Transform { matrix: t.m }
    }
}

/// Mirror of `ArConfiguration`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ArdkConfiguration {
    pub world_tracking: bool,
    pub depth_enabled: bool,
    pub depth_point_cloud_enabled: bool,
    pub meshing_enabled: bool,
    pub semantic_segmentation_enabled: bool,
    /// Bit 0 horizontal, bit 1 vertical.
    pub plane_detection: u32,
    pub target_frame_rate: u32,
}

impl From<&ArdkConfiguration> for ArConfiguration {
    fn from(c: &ArdkConfiguration) -> Self {
        ArConfiguration {
            world_tracking: c.world_tracking,
            depth_enabled: c.depth_enabled,
            depth_point_cloud_enabled: c.depth_point_cloud_enabled,
            meshing_enabled: c.meshing_enabled,
            semantic_segmentation_enabled: c.semantic_segmentation_enabled,
            plane_detection: PlaneDetection::from_bits(c.plane_detection),
            target_frame_rate: c.target_frame_rate,
        }
    }
}

impl From<&ArConfiguration> for ArdkConfiguration {
    fn from(c: &ArConfiguration) -> Self {
        ArdkConfiguration {
            world_tracking: c.world_tracking,
            depth_enabled: c.depth_enabled,
            depth_point_cloud_enabled: c.depth_point_cloud_enabled,
            meshing_enabled: c.meshing_enabled,
            semantic_segmentation_enabled: c.semantic_segmentation_enabled,
            plane_detection: c.plane_detection.bits(),
            target_frame_rate: c.target_frame_rate,
        }
    }
}

/// Anchor snapshot. `kind`: 0=base, 1=plane, 2=image.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ArdkAnchorInfo {
    pub identifier: ArdkUuid,
    pub kind: u32,
    pub transform: ArdkTransform,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ArdkIntrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

impl From<ArdkIntrinsics> for CameraIntrinsics {
    fn from(i: ArdkIntrinsics) -> Self {
        CameraIntrinsics {
            fx: i.fx,
            fy: i.fy,
            cx: i.cx,
            cy: i.cy,
        }
    }
}

/// Camera snapshot.
///
/// `tracking_state`: 0=not available, 1=limited, 2=normal.
/// `tracking_reason`: 0=none, 1=initializing, 2=relocalizing,
/// 3=excessive motion, 4=insufficient features, other=unknown.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ArdkCameraInfo {
    pub tracking_state: u32,
    pub tracking_reason: u32,
    pub transform: ArdkTransform,
    pub intrinsics: ArdkIntrinsics,
}

impl From<ArdkCameraInfo> for CameraInfo {
    fn from(c: ArdkCameraInfo) -> Self {
        CameraInfo {
            tracking_state: match c.tracking_state {
                1 => TrackingState::Limited,
                2 => TrackingState::Normal,
                _ => TrackingState::NotAvailable,
            },
            reason: match c.tracking_reason {
                0 => TrackingStateReason::None,
                1 => TrackingStateReason::Initializing,
                2 => TrackingStateReason::Relocalizing,
                3 => TrackingStateReason::ExcessiveMotion,
                4 => TrackingStateReason::InsufficientFeatures,
                _ => TrackingStateReason::Unknown,
            },
            transform: c.transform.into(),
            intrinsics: c.intrinsics.into(),
        }
    }
}

/// Frame snapshot. `depth` points to `depth_width * depth_height` floats
/// when `has_depth` is set; it is copied before the call returns.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ArdkFrameInfo {
    pub timestamp: f64,
    pub camera: ArdkCameraInfo,
    pub has_depth: bool,
    pub depth_width: u32,
    pub depth_height: u32,
    pub depth: *const f32,
    pub depth_intrinsics: ArdkIntrinsics,
    pub depth_is_keyframe: bool,
}

impl Default for ArdkFrameInfo {
    fn default() -> Self {
        Self {
            timestamp: 0.0,
            camera: ArdkCameraInfo::default(),
            has_depth: false,
            depth_width: 0,
            depth_height: 0,
            depth: ptr::null(),
            depth_intrinsics: ArdkIntrinsics::default(),
            depth_is_keyframe: false,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ArdkMapInfo {
    pub identifier: ArdkUuid,
    pub transform: ArdkTransform,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ArdkMeshBlock {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub version: u32,
    pub vertex_count: u32,
    pub face_count: u32,
}

/// Awareness report. `status`: 0=unknown, 1=not initialized,
/// 2=initializing, 3=ready, 4=failed. `message` may be NULL.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ArdkAwarenessInfo {
    pub status: u32,
    pub error: u32,
    pub message: *const c_char,
}

impl Default for ArdkAwarenessInfo {
    fn default() -> Self {
        Self {
            status: 0,
            error: 0,
            message: ptr::null(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ArdkCapabilities {
    pub world_tracking: bool,
    pub depth: bool,
    pub meshing: bool,
    pub semantic_segmentation: bool,
}

impl Default for ArdkCapabilities {
    fn default() -> Self {
        let caps = RuntimeCapabilities::default();
        Self {
            world_tracking: caps.world_tracking,
            depth: caps.depth,
            meshing: caps.meshing,
            semantic_segmentation: caps.semantic_segmentation,
        }
    }
}

/// One merge entry passed to the anchors-merged callback.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ArdkMergeInfo {
    pub parent: u64,
    pub children: *const u64,
    pub children_size: u32,
}

/// Merge batch passed to the anchors-merged callback. Borrowed for the call.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ArdkMergeBatch {
    pub entries: *const ArdkMergeInfo,
    pub size: u32,
}

// Layout must match what the bridge's merge trampoline reads.
const _: () = {
    assert!(std::mem::size_of::<ArdkMergeInfo>() == std::mem::size_of::<ardk::native::MergeInfo>());
    assert!(std::mem::size_of::<ArdkMergeBatch>() == std::mem::size_of::<ardk::native::MergeBatch>());
};

// =============================================================================
// Function table
// =============================================================================

/// Native runtime entry points. Optional entries may be NULL:
/// `mark_frame_consumed`, `awareness_status`, `capabilities`.
///
/// `set_callback` receives the callback kind (see `ArdkCallbackKind`), the
/// opaque context to pass back, and the function pointer to invoke. The
/// function pointer's signature depends on the kind.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ArdkNativeRuntime {
    pub init_session:
        Option<unsafe extern "C" fn(stage: *const ArdkUuid, playback: bool, user_data: *mut c_void) -> u64>,
    pub release_session: Option<unsafe extern "C" fn(session: u64, user_data: *mut c_void)>,
    pub run: Option<
        unsafe extern "C" fn(
            session: u64,
            configuration: *const ArdkConfiguration,
            options: u64,
            user_data: *mut c_void,
        ),
    >,
    pub pause: Option<unsafe extern "C" fn(session: u64, user_data: *mut c_void)>,
    pub mark_frame_consumed:
        Option<unsafe extern "C" fn(session: u64, frame: u64, user_data: *mut c_void)>,
    pub set_callback: Option<
        unsafe extern "C" fn(
            session: u64,
            kind: u32,
            context: *mut c_void,
            callback: *const c_void,
            user_data: *mut c_void,
        ),
    >,
    pub create_anchor:
        Option<unsafe extern "C" fn(transform: *const ArdkTransform, user_data: *mut c_void) -> u64>,
    pub add_anchor: Option<unsafe extern "C" fn(session: u64, anchor: u64, user_data: *mut c_void)>,
    pub remove_anchor:
        Option<unsafe extern "C" fn(session: u64, anchor: u64, user_data: *mut c_void)>,
    /// `kind`: 0=session, 1=frame, 2=anchor, 3=map, 4=camera, 5=mesh.
    pub release: Option<unsafe extern "C" fn(kind: u32, handle: u64, user_data: *mut c_void)>,
    pub anchor_info: Option<
        unsafe extern "C" fn(anchor: u64, out: *mut ArdkAnchorInfo, user_data: *mut c_void) -> bool,
    >,
    pub frame_info: Option<
        unsafe extern "C" fn(frame: u64, out: *mut ArdkFrameInfo, user_data: *mut c_void) -> bool,
    >,
    pub camera_info: Option<
        unsafe extern "C" fn(camera: u64, out: *mut ArdkCameraInfo, user_data: *mut c_void) -> bool,
    >,
    pub map_info:
        Option<unsafe extern "C" fn(map: u64, out: *mut ArdkMapInfo, user_data: *mut c_void) -> bool>,
    /// Writes up to `capacity` blocks to `out` (which may be NULL) and
    /// returns the total block count.
    pub mesh_blocks: Option<
        unsafe extern "C" fn(
            mesh: u64,
            out: *mut ArdkMeshBlock,
            capacity: u32,
            user_data: *mut c_void,
        ) -> u32,
    >,
    pub awareness_status: Option<
        unsafe extern "C" fn(session: u64, out: *mut ArdkAwarenessInfo, user_data: *mut c_void) -> bool,
    >,
    pub capabilities:
        Option<unsafe extern "C" fn(out: *mut ArdkCapabilities, user_data: *mut c_void) -> bool>,
    /// Passed back to every entry.
    pub user_data: *mut c_void,
}

impl ArdkNativeRuntime {
    /// Names of required entries left NULL.
    pub(crate) fn missing_entries(&self) -> Vec<&'static str> {
        let required = [
            ("init_session", self.init_session.is_none()),
            ("release_session", self.release_session.is_none()),
            ("run", self.run.is_none()),
            ("pause", self.pause.is_none()),
            ("set_callback", self.set_callback.is_none()),
            ("create_anchor", self.create_anchor.is_none()),
            ("add_anchor", self.add_anchor.is_none()),
            ("remove_anchor", self.remove_anchor.is_none()),
            ("release", self.release.is_none()),
            ("anchor_info", self.anchor_info.is_none()),
            ("frame_info", self.frame_info.is_none()),
            ("camera_info", self.camera_info.is_none()),
            ("map_info", self.map_info.is_none()),
            ("mesh_blocks", self.mesh_blocks.is_none()),
        ];
        required
            .iter()
            .filter(|(_, missing)| *missing)
            .map(|(name, _)| *name)
            .collect()
    }
}

pub(crate) fn object_kind_code(kind: NativeObjectKind) -> u32 {
    match kind {
        NativeObjectKind::Session => 0,
        NativeObjectKind::Frame => 1,
        NativeObjectKind::Anchor => 2,
        NativeObjectKind::Map => 3,
        NativeObjectKind::Camera => 4,
        NativeObjectKind::Mesh => 5,
    }
}

// =============================================================================
// Adapter
// =============================================================================

/// `NativeRuntime` backed by a C function table.
pub(crate) struct ForeignRuntime {
    vtable: ArdkNativeRuntime,
}

// Safety: the C runtime promises its entries and user_data may be used from
// any thread (documented on `ardk_runtime_create`).
unsafe impl Send for ForeignRuntime {}
unsafe impl Sync for ForeignRuntime {}

impl ForeignRuntime {
    pub(crate) fn new(vtable: ArdkNativeRuntime) -> Self {
        Self { vtable }
    }

    #[inline]
    fn ud(&self) -> *mut c_void {
        self.vtable.user_data
    }
}

impl NativeRuntime for ForeignRuntime {
    fn init_session(&self, stage: Uuid, playback: bool) -> NativeHandle {
        let Some(f) = self.vtable.init_session else {
            return NativeHandle::NULL;
        };
        let stage = ArdkUuid::from(stage);
        NativeHandle::from_raw(unsafe { f(&stage, playback, self.ud()) })
    }

    fn release_session(&self, session: NativeHandle) {
        if let Some(f) = self.vtable.release_session {
            unsafe { f(session.raw(), self.ud()) };
        }
    }

    fn run(&self, session: NativeHandle, configuration: &ArConfiguration, options: RunOptions) {
        if let Some(f) = self.vtable.run {
            let config = ArdkConfiguration::from(configuration);
            unsafe { f(session.raw(), &config, options.bits(), self.ud()) };
        }
    }

    fn pause(&self, session: NativeHandle) {
        if let Some(f) = self.vtable.pause {
            unsafe { f(session.raw(), self.ud()) };
        }
    }

    fn mark_frame_consumed(&self, session: NativeHandle, frame: NativeHandle) {
        if let Some(f) = self.vtable.mark_frame_consumed {
            unsafe { f(session.raw(), frame.raw(), self.ud()) };
        }
    }

    fn set_callback(&self, session: NativeHandle, context: ContextId, callback: NativeCallback) {
        if let Some(f) = self.vtable.set_callback {
            unsafe {
                f(
                    session.raw(),
                    callback.kind() as u32,
                    context.as_ptr(),
                    callback.as_raw(),
                    self.ud(),
                )
            };
        }
    }

    fn create_anchor(&self, transform: &Transform) -> NativeHandle {
        let Some(f) = self.vtable.create_anchor else {
            return NativeHandle::NULL;
        };
        let transform = ArdkTransform::from(*transform);
        NativeHandle::from_raw(unsafe { f(&transform, self.ud()) })
    }

    fn add_anchor(&self, session: NativeHandle, anchor: NativeHandle) {
        if let Some(f) = self.vtable.add_anchor {
            unsafe { f(session.raw(), anchor.raw(), self.ud()) };
        }
    }

    fn remove_anchor(&self, session: NativeHandle, anchor: NativeHandle) {
        if let Some(f) = self.vtable.remove_anchor {
            unsafe { f(session.raw(), anchor.raw(), self.ud()) };
        }
    }

    fn release(&self, kind: NativeObjectKind, handle: NativeHandle) {
        if let Some(f) = self.vtable.release {
            unsafe { f(object_kind_code(kind), handle.raw(), self.ud()) };
        }
    }

    fn anchor_info(&self, anchor: NativeHandle) -> Option<AnchorInfo> {
        let f = self.vtable.anchor_info?;
        let mut out = ArdkAnchorInfo::default();
        if !unsafe { f(anchor.raw(), &mut out, self.ud()) } {
            return None;
        }
        Some(AnchorInfo {
            identifier: out.identifier.into(),
            kind: match out.kind {
                1 => AnchorKind::Plane,
                2 => AnchorKind::Image,
                _ => AnchorKind::Base,
            },
            transform: out.transform.into(),
        })
    }

    fn frame_info(&self, frame: NativeHandle) -> FrameInfo {
        let Some(f) = self.vtable.frame_info else {
            return FrameInfo::default();
        };
        let mut out = ArdkFrameInfo::default();
        if !unsafe { f(frame.raw(), &mut out, self.ud()) } {
            log::warn!("[ffi] frame_info failed for {}", frame);
            return FrameInfo::default();
        }

        let depth = (out.has_depth && !out.depth.is_null()).then(|| {
            let len = out.depth_width as usize * out.depth_height as usize;
            // SAFETY: the runtime guarantees `len` floats behind `depth` for the call.
            let depths = unsafe { std::slice::from_raw_parts(out.depth, len) }.to_vec();
            DepthBuffer {
                width: out.depth_width,
                height: out.depth_height,
                depths,
                intrinsics: out.depth_intrinsics.into(),
                is_keyframe: out.depth_is_keyframe,
            }
        });

        FrameInfo {
            timestamp: out.timestamp,
            camera: out.camera.into(),
            depth,
        }
    }

    fn camera_info(&self, camera: NativeHandle) -> CameraInfo {
        let Some(f) = self.vtable.camera_info else {
            return CameraInfo::default();
        };
        let mut out = ArdkCameraInfo::default();
        if !unsafe { f(camera.raw(), &mut out, self.ud()) } {
            return CameraInfo::default();
        }
        out.into()
    }

    fn map_info(&self, map: NativeHandle) -> Option<MapInfo> {
        let f = self.vtable.map_info?;
        let mut out = ArdkMapInfo::default();
        if !unsafe { f(map.raw(), &mut out, self.ud()) } {
            return None;
        }
        Some(MapInfo {
            identifier: out.identifier.into(),
            transform: out.transform.into(),
        })
    }

    fn mesh_blocks(&self, mesh: NativeHandle) -> Vec<MeshBlock> {
        let Some(f) = self.vtable.mesh_blocks else {
            return Vec::new();
        };
        let count = unsafe { f(mesh.raw(), ptr::null_mut(), 0, self.ud()) };
        if count == 0 {
            return Vec::new();
        }

        let mut blocks = vec![ArdkMeshBlock::default(); count as usize];
        let written = unsafe { f(mesh.raw(), blocks.as_mut_ptr(), count, self.ud()) };
        blocks.truncate(written.min(count) as usize);
        blocks
            .into_iter()
            .map(|b| MeshBlock {
                coordinates: [b.x, b.y, b.z],
                version: b.version,
                vertex_count: b.vertex_count,
                face_count: b.face_count,
            })
            .collect()
    }

    fn awareness_status(&self, session: NativeHandle) -> AwarenessReport {
        let Some(f) = self.vtable.awareness_status else {
            return AwarenessReport {
                status: AwarenessStatus::Ready,
                ..AwarenessReport::default()
            };
        };
        let mut out = ArdkAwarenessInfo::default();
        if !unsafe { f(session.raw(), &mut out, self.ud()) } {
            return AwarenessReport::default();
        }

        let message = if out.message.is_null() {
            String::new()
        } else {
            // SAFETY: NUL-terminated, valid for the call.
            unsafe { CStr::from_ptr(out.message) }
                .to_string_lossy()
                .into_owned()
        };
        AwarenessReport {
            status: match out.status {
                1 => AwarenessStatus::NotInitialized,
                2 => AwarenessStatus::Initializing,
                3 => AwarenessStatus::Ready,
                4 => AwarenessStatus::Failed,
                _ => AwarenessStatus::Unknown,
            },
            error: out.error,
            message,
        }
    }

    fn capabilities(&self) -> RuntimeCapabilities {
        let Some(f) = self.vtable.capabilities else {
            return RuntimeCapabilities::default();
        };
        let mut out = ArdkCapabilities::default();
        if !unsafe { f(&mut out, self.ud()) } {
            return RuntimeCapabilities::default();
        }
        RuntimeCapabilities {
            world_tracking: out.world_tracking,
            depth: out.depth,
            meshing: out.meshing,
            semantic_segmentation: out.semantic_segmentation,
        }
    }
}
