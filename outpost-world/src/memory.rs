//! HashMap-backed world used by tests and the simulation binary.

use std::collections::HashMap;

use crate::block::{Block, BlockEntity, Container};
use crate::pos::BlockPos;
use crate::World;

/// Sparse in-memory world. Missing cells are air.
pub struct MemoryWorld {
    name: String,
    min_y: i32,
    max_y: i32,
    blocks: HashMap<BlockPos, Block>,
    default_biome: String,
    biomes: HashMap<(i32, i32), String>,
    entities: Vec<(String, BlockPos)>,
}

impl MemoryWorld {
    /// Overworld-sized world (-64..=319).
    pub fn new(name: &str) -> Self {
        Self::with_height(name, -64, 319)
    }

    pub fn with_height(name: &str, min_y: i32, max_y: i32) -> Self {
        Self {
            name: name.to_string(),
            min_y,
            max_y,
            blocks: HashMap::new(),
            default_biome: "minecraft:plains".to_string(),
            biomes: HashMap::new(),
            entities: Vec::new(),
        }
    }

    pub fn set_default_biome(&mut self, biome: &str) {
        self.default_biome = biome.to_string();
    }

    /// Override the biome of one column.
    pub fn set_biome(&mut self, x: i32, z: i32, biome: &str) {
        self.biomes.insert((x, z), biome.to_string());
    }

    /// Fill an inclusive box with copies of `block`.
    pub fn fill(&mut self, min: BlockPos, max: BlockPos, block: &Block) {
        for x in min.x..=max.x {
            for y in min.y..=max.y {
                for z in min.z..=max.z {
                    self.set_block(BlockPos::new(x, y, z), block.clone());
                }
            }
        }
    }

    /// Number of non-air cells stored.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn entities(&self) -> &[(String, BlockPos)] {
        &self.entities
    }

    /// Every container in the world, in no particular order.
    pub fn containers(&self) -> impl Iterator<Item = (BlockPos, &Container)> {
        self.blocks.iter().filter_map(|(pos, block)| match &block.entity {
            Some(BlockEntity::Container(c)) => Some((*pos, c)),
            _ => None,
        })
    }
}

impl World for MemoryWorld {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_y(&self) -> i32 {
        self.min_y
    }

    fn max_y(&self) -> i32 {
        self.max_y
    }

    fn block(&self, pos: BlockPos) -> Option<&Block> {
        self.blocks.get(&pos)
    }

    fn set_block(&mut self, pos: BlockPos, block: Block) {
        if pos.y < self.min_y || pos.y > self.max_y {
            log::trace!("Ignoring write outside world height at {}", pos);
            return;
        }
        if block.is_air() {
            self.blocks.remove(&pos);
        } else {
            self.blocks.insert(pos, block);
        }
    }

    fn highest_block_y(&self, x: i32, z: i32) -> Option<i32> {
        (self.min_y..=self.max_y)
            .rev()
            .find(|y| self.blocks.contains_key(&BlockPos::new(x, *y, z)))
    }

    fn biome(&self, pos: BlockPos) -> String {
        self.biomes
            .get(&(pos.x, pos.z))
            .unwrap_or(&self.default_biome)
            .clone()
    }

    fn block_entities_in(&self, min: BlockPos, max: BlockPos) -> Vec<BlockPos> {
        let mut found: Vec<BlockPos> = self
            .blocks
            .iter()
            .filter(|(pos, block)| block.entity.is_some() && pos.within(min, max))
            .map(|(pos, _)| *pos)
            .collect();
        // Scan order: bottom layer first, then z, then x.
        found.sort_by_key(|p| (p.y, p.z, p.x));
        found
    }

    fn container_mut(&mut self, pos: BlockPos) -> Option<&mut Container> {
        match self.blocks.get_mut(&pos)?.entity.as_mut()? {
            BlockEntity::Container(c) => Some(c),
            BlockEntity::Sign(_) => None,
        }
    }

    fn spawn_entity(&mut self, kind: &str, pos: BlockPos) {
        self.entities.push((kind.to_string(), pos));
    }
}
