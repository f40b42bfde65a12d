use outpost_world::{BlockPos, ChunkPos, World};

/// A candidate location: the anchor may be re-pointed during refinement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub world: String,
    pub chunk: ChunkPos,
    pub anchor: BlockPos,
}

impl Site {
    pub fn new(world: &str, anchor: BlockPos) -> Self {
        Self {
            world: world.to_string(),
            chunk: anchor.chunk(),
            anchor,
        }
    }

    /// Site at the centre column of a freshly loaded chunk, anchored on the
    /// column's top block (or the world floor when the column is empty).
    pub fn for_chunk(world: &dyn World, chunk: ChunkPos) -> Self {
        let (x, z) = chunk.center_column();
        let y = world.highest_block_y(x, z).unwrap_or(world.min_y());
        Self {
            world: world.name().to_string(),
            chunk,
            anchor: BlockPos::new(x, y, z),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outpost_world::{Block, MemoryWorld};

    #[test]
    fn test_chunk_site_uses_column_top() {
        let mut world = MemoryWorld::new("world");
        let chunk = ChunkPos::new(2, -1);
        let (x, z) = chunk.center_column();
        world.set_block(BlockPos::new(x, 70, z), Block::new("stone"));

        let site = Site::for_chunk(&world, chunk);
        assert_eq!(site.anchor, BlockPos::new(x, 70, z));
        assert_eq!(site.chunk, chunk);
        assert_eq!(site.world, "world");

        let empty = Site::for_chunk(&world, ChunkPos::new(9, 9));
        assert_eq!(empty.anchor.y, world.min_y());
    }
}
