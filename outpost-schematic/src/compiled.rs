//! Precompiled marker index.
//!
//! Scanning a large placed region for signs and containers is the slow part
//! of post-processing. A compiled index lists the blueprint-local positions
//! of those cells up front so only they are visited.

use serde::{Deserialize, Serialize};

use outpost_world::BlockPos;

use crate::Blueprint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerIndex {
    pub size: [i32; 3],
    /// Local positions of every sign/container cell.
    pub positions: Vec<BlockPos>,
}

impl MarkerIndex {
    pub fn compile(blueprint: &Blueprint) -> Self {
        let mut positions = blueprint.block_entity_positions();
        positions.sort_by_key(|p| (p.y, p.z, p.x));
        Self {
            size: blueprint.size,
            positions,
        }
    }

    /// A stale index (blueprint re-saved with another size) must not be used.
    pub fn matches(&self, blueprint: &Blueprint) -> bool {
        self.size == blueprint.size
    }
}
