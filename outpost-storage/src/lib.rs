//! Record of placed structures and "what is near here" queries.
//!
//! The engine never talks to this crate directly; the host forwards
//! completed placements to a [`StructureDatabase`].

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use outpost_world::{BlockPos, Rotation};
use serde::{Deserialize, Serialize};

pub use memory::MemoryDatabase;

/// One completed top-level placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedStructure {
    pub structure: String,
    pub world: String,
    pub min: BlockPos,
    pub max: BlockPos,
    pub rotation: Rotation,
    /// Tick the placement completed on.
    pub tick: u64,
}

impl PlacedStructure {
    /// Horizontal center of the placed bounds.
    pub fn center(&self) -> (i32, i32) {
        ((self.min.x + self.max.x) / 2, (self.min.z + self.max.z) / 2)
    }

    /// Squared horizontal distance from the center to `(x, z)`.
    pub fn distance_sq(&self, x: i32, z: i32) -> i64 {
        let (cx, cz) = self.center();
        let (dx, dz) = ((cx - x) as i64, (cz - z) as i64);
        dx * dx + dz * dz
    }
}

#[async_trait]
pub trait StructureDatabase: Send + Sync {
    async fn record(&self, placed: PlacedStructure) -> Result<()>;

    /// Closest placement in `world`, optionally only of one structure.
    async fn nearest(&self, world: &str, x: i32, z: i32, structure: Option<&str>) -> Result<Option<PlacedStructure>>;

    /// Every placement in `world` whose center lies within `radius` blocks,
    /// closest first.
    async fn within(&self, world: &str, x: i32, z: i32, radius: u32) -> Result<Vec<PlacedStructure>>;

    async fn count(&self) -> Result<usize>;
}
