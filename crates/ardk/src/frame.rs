// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Frame wrapper and the single-slot pending-frame mailbox.

use crate::generators::PointCloud;
use crate::native::{
    CameraInfo, DepthBuffer, NativeHandle, NativeObjectKind, NativeRuntime,
};
use crate::object::NativeObject;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Snapshot of one native frame.
///
/// Holds one native reference until disposed or dropped. Under
/// [`FrameDisposalPolicy::DisposeOldFrames`](crate::config::FrameDisposalPolicy)
/// the session disposes a frame as soon as a newer one replaces it; data
/// already copied out (timestamp, camera, depth) stays readable.
pub struct Frame {
    native: NativeObject,
    timestamp: f64,
    world_scale: f32,
    camera: CameraInfo,
    depth: Option<DepthBuffer>,
    point_cloud: RwLock<Option<Arc<PointCloud>>>,
}

impl Frame {
    pub(crate) fn wrap(runtime: Arc<dyn NativeRuntime>, handle: NativeHandle, world_scale: f32) -> Self {
        let info = runtime.frame_info(handle);
        let mut camera = info.camera;
        camera.transform = camera.transform.scaled_translation(world_scale);
        Self {
            native: NativeObject::new(handle, NativeObjectKind::Frame, runtime),
            timestamp: info.timestamp,
            world_scale,
            camera,
            depth: info.depth,
            point_cloud: RwLock::new(None),
        }
    }

    #[inline]
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    #[inline]
    pub fn world_scale(&self) -> f32 {
        self.world_scale
    }

    #[inline]
    pub fn camera(&self) -> &CameraInfo {
        &self.camera
    }

    #[inline]
    pub fn depth(&self) -> Option<&DepthBuffer> {
        self.depth.as_ref()
    }

    /// Point cloud derived from this frame's depth keyframe, if generated.
    pub fn depth_point_cloud(&self) -> Option<Arc<PointCloud>> {
        self.point_cloud.read().clone()
    }

    pub(crate) fn set_depth_point_cloud(&self, cloud: Arc<PointCloud>) {
        *self.point_cloud.write() = Some(cloud);
    }

    #[inline]
    pub fn handle(&self) -> NativeHandle {
        self.native.handle()
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.native.is_released()
    }

    /// Release the native frame. Returns false if already disposed.
    pub fn dispose(&self) -> bool {
        self.native.release()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("handle", &self.native.handle())
            .field("timestamp", &self.timestamp)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// =======================================================================
// Mailbox
// =======================================================================

/// At most one native frame waiting for the consumer.
///
/// Native threads [`offer`](FrameMailbox::offer) frames; the queued task
/// [`take`](FrameMailbox::take)s whatever is newest at drain time.
#[derive(Debug, Default)]
pub(crate) struct FrameMailbox {
    slot: AtomicU64,
}

impl FrameMailbox {
    /// Store `frame` as newest. Returns the frame it displaced, if any.
    ///
    /// `None` means the slot was empty and a drain task must be scheduled.
    #[inline]
    pub fn offer(&self, frame: NativeHandle) -> Option<NativeHandle> {
        let previous = NativeHandle::from_raw(self.slot.swap(frame.raw(), Ordering::AcqRel));
        (!previous.is_null()).then_some(previous)
    }

    #[inline]
    pub fn take(&self) -> Option<NativeHandle> {
        let frame = NativeHandle::from_raw(self.slot.swap(0, Ordering::AcqRel));
        (!frame.is_null()).then_some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::recording::RecordingRuntime;
    use crate::native::{FrameInfo, Transform};

    #[test]
    fn test_mailbox_last_wins() {
        let mailbox = FrameMailbox::default();
        let (f1, f2, f3) = (
            NativeHandle::from_raw(1),
            NativeHandle::from_raw(2),
            NativeHandle::from_raw(3),
        );

        assert_eq!(mailbox.offer(f1), None);
        assert_eq!(mailbox.offer(f2), Some(f1));
        assert_eq!(mailbox.offer(f3), Some(f2));
        assert_eq!(mailbox.take(), Some(f3));
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn test_frame_scales_camera() {
        let rt = Arc::new(RecordingRuntime::new());
        let handle = rt.new_frame_with(FrameInfo {
            timestamp: 4.0,
            camera: CameraInfo {
                transform: Transform::from_translation(1.0, 0.0, 0.0),
                ..CameraInfo::default()
            },
            depth: None,
        });
        rt.hand_out(&[handle]);

        let frame = Frame::wrap(rt.clone(), handle, 3.0);
        assert_eq!(frame.timestamp(), 4.0);
        assert_eq!(frame.camera().transform.translation(), [3.0, 0.0, 0.0]);

        assert!(frame.dispose());
        assert!(!frame.dispose());
        drop(frame);
        assert_eq!(rt.release_count(handle), 1);
    }
}
