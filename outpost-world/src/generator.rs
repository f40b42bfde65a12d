//! Flat terrain generation for simulated chunk loads.

use anyhow::Result;
use std::collections::BTreeMap;

use crate::block::Block;
use crate::pos::{BlockPos, CHUNK_SIZE, ChunkPos};
use crate::World;

/// Produces the terrain of a chunk the first time it is loaded.
pub trait TerrainGenerator: Send + Sync {
    fn generate_chunk(&self, world: &mut dyn World, chunk: ChunkPos) -> Result<()>;
}

/// Collects the layers of one chunk before writing them into a world.
#[derive(Default)]
pub struct ColumnBuilder {
    // Key: y, Value: block id covering the whole 16x16 layer
    full_layers: BTreeMap<i32, String>,
}

impl ColumnBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill an entire Y-layer with a block. A later call for the same layer wins.
    pub fn fill_layer(&mut self, y: i32, name: &str) {
        self.full_layers.insert(y, name.to_string());
    }

    /// Write the collected layers into `world`, bottom up.
    pub fn build(self, world: &mut dyn World, chunk: ChunkPos) {
        let base_x = chunk.min_block_x();
        let base_z = chunk.min_block_z();

        for (y, name) in &self.full_layers {
            let block = Block::new(name);
            for z in 0..CHUNK_SIZE {
                for x in 0..CHUNK_SIZE {
                    world.set_block(BlockPos::new(base_x + x, *y, base_z + z), block.clone());
                }
            }
        }
    }
}

/// Layered flat terrain with an optional sea.
pub struct FlatGenerator {
    pub surface_y: i32,
    pub surface_block: String,
    /// Water fills from the surface up to this level when it is higher.
    pub sea_level: Option<i32>,
}

impl Default for FlatGenerator {
    fn default() -> Self {
        Self {
            surface_y: 64,
            surface_block: "minecraft:grass_block".to_string(),
            sea_level: None,
        }
    }
}

impl TerrainGenerator for FlatGenerator {
    fn generate_chunk(&self, world: &mut dyn World, chunk: ChunkPos) -> Result<()> {
        let mut builder = ColumnBuilder::new();

        // 1. Bedrock floor
        builder.fill_layer(self.surface_y - 4, "minecraft:bedrock");

        // 2. Dirt layers
        for y in self.surface_y - 3..self.surface_y {
            builder.fill_layer(y, "minecraft:dirt");
        }

        // 3. Surface
        builder.fill_layer(self.surface_y, &self.surface_block);

        // 4. Sea above the surface
        if let Some(sea) = self.sea_level {
            for y in self.surface_y + 1..=sea {
                builder.fill_layer(y, "minecraft:water");
            }
        }

        builder.build(world, chunk);
        Ok(())
    }
}
