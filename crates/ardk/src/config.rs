// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session configuration
//!
//! - **Static**: [`SessionConfig`] fixed at session creation (playback mode,
//!   thread affinity, dispatcher idle timeout).
//! - **Per run**: [`ArConfiguration`] capability flags and [`RunOptions`]
//!   passed to `Session::run`.
//! - **Dynamic**: [`LiveSettings`] values that may change while native
//!   callbacks are in flight (world scale, frame disposal policy). Stored in
//!   an `ArcSwap` so native threads read them without taking a lock.

use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;

/// Default idle wait for a dedicated dispatcher thread.
pub const DEFAULT_DISPATCH_IDLE: Duration = Duration::from_millis(10);

// =======================================================================
// Run Options
// =======================================================================

/// Bit set of options applied when (re)running a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RunOptions(u64);

impl RunOptions {
    /// No options.
    pub const NONE: RunOptions = RunOptions(0);
    /// Reset device tracking to a fresh origin.
    pub const RESET_TRACKING: RunOptions = RunOptions(1);
    /// Ask the native layer to drop every existing anchor.
    pub const REMOVE_EXISTING_ANCHORS: RunOptions = RunOptions(1 << 1);
    /// Clear accumulated mesh blocks before running.
    pub const REMOVE_EXISTING_MESH: RunOptions = RunOptions(1 << 2);

    /// Build from raw bits (unknown bits are kept and forwarded to native).
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        RunOptions(bits)
    }

    /// Raw bits forwarded to the native run call.
    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Whether every bit of `other` is set.
    #[inline]
    pub const fn contains(self, other: RunOptions) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for RunOptions {
    type Output = RunOptions;

    fn bitor(self, rhs: RunOptions) -> RunOptions {
        RunOptions(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for RunOptions {
    fn bitor_assign(&mut self, rhs: RunOptions) {
        self.0 |= rhs.0;
    }
}

// =======================================================================
// AR Configuration
// =======================================================================

/// Plane orientations the native layer should detect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PlaneDetection(u32);

impl PlaneDetection {
    pub const NONE: PlaneDetection = PlaneDetection(0);
    pub const HORIZONTAL: PlaneDetection = PlaneDetection(1);
    pub const VERTICAL: PlaneDetection = PlaneDetection(1 << 1);

    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        PlaneDetection(bits)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: PlaneDetection) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for PlaneDetection {
    type Output = PlaneDetection;

    fn bitor(self, rhs: PlaneDetection) -> PlaneDetection {
        PlaneDetection(self.0 | rhs.0)
    }
}

/// Capability bundle consumed by `Session::run`.
///
/// # Example
///
/// ```
/// use ardk::config::{ArConfiguration, PlaneDetection};
///
/// let config = ArConfiguration::world_tracking()
///     .with_depth(true)
///     .with_depth_point_cloud(true)
///     .with_plane_detection(PlaneDetection::HORIZONTAL);
///
/// assert!(config.depth_enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArConfiguration {
    /// Whether the session should track the world (false = orientation only).
    pub world_tracking: bool,
    /// Produce per-frame depth buffers.
    pub depth_enabled: bool,
    /// Derive a point cloud from keyframe depth buffers (requires depth).
    pub depth_point_cloud_enabled: bool,
    /// Accumulate a world mesh.
    pub meshing_enabled: bool,
    /// Produce semantic segmentation buffers.
    pub semantic_segmentation_enabled: bool,
    /// Plane orientations to detect.
    pub plane_detection: PlaneDetection,
    /// Target frame rate requested from the native layer (0 = native default).
    pub target_frame_rate: u32,
}

impl ArConfiguration {
    /// World tracking with every optional capability disabled.
    pub fn world_tracking() -> Self {
        Self {
            world_tracking: true,
            ..Self::default()
        }
    }

    pub fn with_depth(mut self, enabled: bool) -> Self {
        self.depth_enabled = enabled;
        self
    }

    pub fn with_depth_point_cloud(mut self, enabled: bool) -> Self {
        self.depth_point_cloud_enabled = enabled;
        self
    }

    pub fn with_meshing(mut self, enabled: bool) -> Self {
        self.meshing_enabled = enabled;
        self
    }

    pub fn with_semantic_segmentation(mut self, enabled: bool) -> Self {
        self.semantic_segmentation_enabled = enabled;
        self
    }

    pub fn with_plane_detection(mut self, planes: PlaneDetection) -> Self {
        self.plane_detection = planes;
        self
    }

    pub fn with_target_frame_rate(mut self, fps: u32) -> Self {
        self.target_frame_rate = fps;
        self
    }

    /// Whether the derived depth point cloud generator should run.
    #[inline]
    pub fn wants_depth_point_cloud(&self) -> bool {
        self.world_tracking && self.depth_enabled && self.depth_point_cloud_enabled
    }
}

// =======================================================================
// Live Settings (ArcSwap)
// =======================================================================

/// What happens to a frame when a newer one replaces it as current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameDisposalPolicy {
    /// Release the native frame as soon as it stops being current.
    #[default]
    DisposeOldFrames,
    /// Keep it alive until every holder drops its reference.
    ReturnOldFrames,
}

/// Values readable from native threads while the session runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveSettingsSnapshot {
    pub world_scale: f32,
    pub frame_disposal: FrameDisposalPolicy,
}

/// Lock-free holder for [`LiveSettingsSnapshot`].
#[derive(Debug)]
pub struct LiveSettings {
    current: ArcSwap<LiveSettingsSnapshot>,
}

impl LiveSettings {
    pub fn new(world_scale: f32, frame_disposal: FrameDisposalPolicy) -> Self {
        Self {
            current: ArcSwap::new(Arc::new(LiveSettingsSnapshot {
                world_scale,
                frame_disposal,
            })),
        }
    }

    #[inline]
    pub fn load(&self) -> LiveSettingsSnapshot {
        **self.current.load()
    }

    /// Set world scale (non-finite or non-positive values are ignored).
    pub fn set_world_scale(&self, world_scale: f32) {
        if !world_scale.is_finite() || world_scale <= 0.0 {
            log::warn!(
                "[config] Ignoring invalid world scale {} (must be finite and > 0)",
                world_scale
            );
            return;
        }
        self.current.rcu(|cur| {
            Arc::new(LiveSettingsSnapshot {
                world_scale,
                ..**cur
            })
        });
    }

    pub fn set_frame_disposal(&self, frame_disposal: FrameDisposalPolicy) {
        self.current.rcu(|cur| {
            Arc::new(LiveSettingsSnapshot {
                frame_disposal,
                ..**cur
            })
        });
    }
}

// =======================================================================
// Session Config (static)
// =======================================================================

/// Settings fixed when a session is created.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Run against a recorded dataset instead of live sensors.
    pub playback: bool,
    /// Initial world scale applied to wrapped frames, maps and cameras.
    pub world_scale: f32,
    /// Initial frame disposal policy.
    pub frame_disposal: FrameDisposalPolicy,
    /// Log an error when session methods are called off the creating thread.
    pub enforce_thread_affinity: bool,
    /// Idle wait used by a dedicated dispatcher thread.
    pub dispatch_idle: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            playback: false,
            world_scale: 1.0,
            frame_disposal: FrameDisposalPolicy::default(),
            enforce_thread_affinity: true,
            dispatch_idle: DEFAULT_DISPATCH_IDLE,
        }
    }
}

impl SessionConfig {
    pub fn playback(mut self, enabled: bool) -> Self {
        self.playback = enabled;
        self
    }

    pub fn world_scale(mut self, scale: f32) -> Self {
        self.world_scale = scale;
        self
    }

    pub fn frame_disposal(mut self, policy: FrameDisposalPolicy) -> Self {
        self.frame_disposal = policy;
        self
    }

    pub fn enforce_thread_affinity(mut self, enforce: bool) -> Self {
        self.enforce_thread_affinity = enforce;
        self
    }

    pub fn dispatch_idle(mut self, idle: Duration) -> Self {
        self.dispatch_idle = idle;
        self
    }
}
