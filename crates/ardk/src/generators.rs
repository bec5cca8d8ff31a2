// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Outputs derived from frames on the consumer thread.
//!
//! The session creates a [`DepthPointCloudGenerator`] lazily, the first time a
//! depth keyframe arrives while the run configuration asks for depth point
//! clouds. Each `run` and the session's disposal throw it away.

use crate::native::{CameraIntrinsics, DepthBuffer, Transform};

/// World-space points back-projected from one depth keyframe.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointCloud {
    pub points: Vec<[f32; 3]>,
}

impl PointCloud {
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[derive(Debug)]
pub struct DepthPointCloudGenerator {
    stride: u32,
    generated: u64,
    disposed: bool,
}

impl DepthPointCloudGenerator {
    /// Sample every `stride`th pixel in both directions (minimum 1).
    pub fn new(stride: u32) -> Self {
        Self {
            stride: stride.max(1),
            generated: 0,
            disposed: false,
        }
    }

    /// Back-project `depth` through its intrinsics, then into world space
    /// with `camera_to_world`. Samples that are not finite and positive are
    /// skipped. Returns `None` after disposal or for degenerate intrinsics.
    pub fn generate(&mut self, depth: &DepthBuffer, camera_to_world: &Transform) -> Option<PointCloud> {
        if self.disposed {
            return None;
        }
        let CameraIntrinsics { fx, fy, cx, cy } = depth.intrinsics;
        if fx == 0.0 || fy == 0.0 {
            log::debug!("[generators] degenerate depth intrinsics, skipping point cloud");
            return None;
        }

        let (width, height) = (depth.width as usize, depth.height as usize);
        let expected = width * height;
        if depth.depths.len() < expected {
            log::warn!(
                "[generators] depth buffer too short ({} < {})",
                depth.depths.len(),
                expected
            );
            return None;
        }

        let stride = self.stride as usize;
        let mut points = Vec::new();
        for v in (0..height).step_by(stride) {
            for u in (0..width).step_by(stride) {
                let d = depth.depths[v * width + u];
                if !d.is_finite() || d <= 0.0 {
                    continue;
                }
                let x = (u as f32 - cx) * d / fx;
                let y = (v as f32 - cy) * d / fy;
                points.push(camera_to_world.transform_point([x, y, d]));
            }
        }

        self.generated += 1;
        Some(PointCloud { points })
    }

    #[inline]
    pub fn generated(&self) -> u64 {
        self.generated
    }

    pub fn dispose(&mut self) {
        self.disposed = true;
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl Default for DepthPointCloudGenerator {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(depths: Vec<f32>) -> DepthBuffer {
        DepthBuffer {
            width: 2,
            height: 2,
            depths,
            intrinsics: CameraIntrinsics {
                fx: 1.0,
                fy: 1.0,
                cx: 0.0,
                cy: 0.0,
            },
            is_keyframe: true,
        }
    }

    #[test]
    fn test_back_projection() {
        let mut gen = DepthPointCloudGenerator::default();
        let cloud = gen
            .generate(&buffer(vec![1.0, 2.0, 0.0, f32::NAN]), &Transform::IDENTITY)
            .unwrap();

        assert_eq!(cloud.points, vec![[0.0, 0.0, 1.0], [2.0, 0.0, 2.0]]);
        assert_eq!(gen.generated(), 1);
    }

    #[test]
    fn test_row_major_indexing_with_stride() {
        let mut gen = DepthPointCloudGenerator::new(2);
        let depth = DepthBuffer {
            width: 3,
            height: 3,
            depths: (1..=9).map(|d| d as f32).collect(),
            ..buffer(Vec::new())
        };
        let cloud = gen.generate(&depth, &Transform::IDENTITY).unwrap();

        // Samples (0,0), (2,0), (0,2), (2,2).
        let zs: Vec<f32> = cloud.points.iter().map(|p| p[2]).collect();
        assert_eq!(zs, vec![1.0, 3.0, 7.0, 9.0]);
    }

    #[test]
    fn test_world_transform_applied() {
        let mut gen = DepthPointCloudGenerator::default();
        let cloud = gen
            .generate(
                &buffer(vec![1.0, 0.0, 0.0, 0.0]),
                &Transform::from_translation(0.0, 5.0, 0.0),
            )
            .unwrap();
        assert_eq!(cloud.points, vec![[0.0, 5.0, 1.0]]);
    }

    #[test]
    fn test_disposed_generator_yields_nothing() {
        let mut gen = DepthPointCloudGenerator::default();
        gen.dispose();
        assert!(gen.generate(&buffer(vec![1.0; 4]), &Transform::IDENTITY).is_none());
    }

    #[test]
    fn test_short_buffer_rejected() {
        let mut gen = DepthPointCloudGenerator::default();
        assert!(gen.generate(&buffer(vec![1.0]), &Transform::IDENTITY).is_none());
    }
}
