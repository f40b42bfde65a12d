//! Capture a world region as a blueprint (structure authoring).

use outpost_world::{Block, BlockPos, World};

use crate::Blueprint;

/// Copy the inclusive box `a..=b` out of `world`.
///
/// `pivot` is the world position that becomes the blueprint origin, i.e.
/// the cell that lands on the paste target.
pub fn capture(world: &dyn World, a: BlockPos, b: BlockPos, pivot: BlockPos) -> Blueprint {
    let min = a.min(b);
    let max = a.max(b);
    let mut blueprint = Blueprint::new([max.x - min.x + 1, max.y - min.y + 1, max.z - min.z + 1]);
    blueprint.origin = pivot - min;

    for y in min.y..=max.y {
        for z in min.z..=max.z {
            for x in min.x..=max.x {
                let pos = BlockPos::new(x, y, z);
                let block = world.block(pos).cloned().unwrap_or_else(Block::air);
                blueprint.cells.push((pos - min, block));
            }
        }
    }
    blueprint
}

#[cfg(test)]
mod tests {
    use super::*;
    use outpost_world::{MemoryWorld, Rotation};

    #[test]
    fn test_capture_keeps_air_and_pivot() {
        let mut world = MemoryWorld::new("world");
        world.set_block(BlockPos::new(5, 64, 5), Block::new("stone"));
        let bp = capture(&world, BlockPos::new(6, 65, 6), BlockPos::new(5, 64, 5), BlockPos::new(5, 64, 5));

        assert_eq!(bp.size, [2, 2, 2]);
        assert_eq!(bp.cells.len(), 8);
        assert_eq!(bp.origin, BlockPos::ORIGIN);
        assert_eq!(bp.get(BlockPos::ORIGIN).map(|b| b.kind.as_str()), Some("minecraft:stone"));
        assert!(bp.get(BlockPos::new(1, 1, 1)).is_some_and(Block::is_air));

        // Pasting at the pivot reproduces the original coordinates
        assert_eq!(
            bp.place_point(BlockPos::new(5, 64, 5), Rotation::None, BlockPos::new(1, 0, 0)),
            BlockPos::new(6, 64, 5)
        );
    }
}
