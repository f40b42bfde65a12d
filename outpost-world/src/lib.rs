//! World model shared by the blueprint store and the placement engine.
//!
//! This crate handles:
//! - Coordinates, facings and yaw rotation
//! - Blocks, signs and containers
//! - The `World` trait the engine reads and mutates
//! - An in-memory world and a flat terrain generator for simulation

pub mod block;
pub mod generator;
pub mod memory;
pub mod pos;

pub use block::{
    AIR, Block, BlockEntity, Container, ContainerKind, ItemStack, MAX_STACK, Sign, SlotRole,
    is_air, is_lava, is_plant_like, is_water_like, normalize_kind,
};
pub use generator::{ColumnBuilder, FlatGenerator, TerrainGenerator};
pub use memory::MemoryWorld;
pub use pos::{BlockPos, CHUNK_SIZE, ChunkPos, Facing, Rotation};

/// Live world the engine queries and mutates.
///
/// All calls happen on the single world-mutation thread.
pub trait World {
    fn name(&self) -> &str;

    /// Lowest buildable Y.
    fn min_y(&self) -> i32;

    /// Highest buildable Y.
    fn max_y(&self) -> i32;

    /// Block at `pos`; `None` means air.
    fn block(&self, pos: BlockPos) -> Option<&Block>;

    /// Replace the block at `pos`. Writing air clears the cell.
    fn set_block(&mut self, pos: BlockPos, block: Block);

    /// Y of the highest non-air block in the column, if any.
    fn highest_block_y(&self, x: i32, z: i32) -> Option<i32>;

    fn biome(&self, pos: BlockPos) -> String;

    /// Positions of every sign/container inside the inclusive box.
    fn block_entities_in(&self, min: BlockPos, max: BlockPos) -> Vec<BlockPos>;

    fn container_mut(&mut self, pos: BlockPos) -> Option<&mut Container>;

    fn spawn_entity(&mut self, kind: &str, pos: BlockPos);

    /// Kind id at `pos`, air included.
    fn kind_at(&self, pos: BlockPos) -> &str {
        self.block(pos).map_or(AIR, |b| b.kind.as_str())
    }
}
