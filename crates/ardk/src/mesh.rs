// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Accumulated world mesh.

use crate::native::MeshBlock;
use std::collections::HashMap;

/// Blocks changed by one native mesh update.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MeshUpdate {
    /// Blocks new or at a higher version than before.
    pub changed: Vec<MeshBlock>,
    /// Blocks reported with zero faces, dropped from the mesh.
    pub removed: Vec<[i32; 3]>,
    /// Mesh version after the update.
    pub version: u64,
}

/// Session-owned mesh, keyed by block coordinates.
#[derive(Debug, Default)]
pub struct MeshState {
    blocks: HashMap<[i32; 3], MeshBlock>,
    version: u64,
}

impl MeshState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a batch. Stale block versions are ignored.
    pub fn apply(&mut self, batch: &[MeshBlock]) -> MeshUpdate {
        let mut update = MeshUpdate::default();

        for block in batch {
            if block.face_count == 0 {
                if self.blocks.remove(&block.coordinates).is_some() {
                    update.removed.push(block.coordinates);
                }
                continue;
            }
            match self.blocks.get(&block.coordinates) {
                Some(existing) if existing.version >= block.version => {}
                _ => {
                    self.blocks.insert(block.coordinates, *block);
                    update.changed.push(*block);
                }
            }
        }

        if !update.changed.is_empty() || !update.removed.is_empty() {
            self.version += 1;
        }
        update.version = self.version;
        update
    }

    /// Drop every block.
    pub fn clear(&mut self) {
        if !self.blocks.is_empty() {
            self.blocks.clear();
            self.version += 1;
        }
    }

    pub fn block(&self, coordinates: [i32; 3]) -> Option<&MeshBlock> {
        self.blocks.get(&coordinates)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn vertex_count(&self) -> u64 {
        self.blocks.values().map(|b| b.vertex_count as u64).sum()
    }

    pub fn face_count(&self) -> u64 {
        self.blocks.values().map(|b| b.face_count as u64).sum()
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }
}
