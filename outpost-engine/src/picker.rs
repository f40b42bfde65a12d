//! Per-site scan: one candidate structure per step.
//!
//! A picker builds the site's [`PriorityStructureQueue`] on its first step,
//! then refines one candidate per step until a candidate survives
//! refinement (committed and placed) or the queue runs dry.

use std::sync::Arc;

use outpost_world::{BlockPos, World, is_lava, is_plant_like, is_water_like};
use rand::Rng;

use crate::context::PlacementContext;
use crate::placement::place_structure;
use crate::queue::PriorityStructureQueue;
use crate::site::Site;
use crate::structure::{FlatMode, Flatness, StructureDefinition, VerticalRule};

/// Why a candidate was discarded for a site.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("column is empty")]
    Void,
    #[error("probe gave up after {0} steps")]
    ProbeLimit(u32),
    #[error("anchor y {0} is outside the world")]
    OutOfWorld(i32),
    #[error("anchor {0} is not whitelisted")]
    NotWhitelisted(String),
    #[error("anchor {0} is blacklisted")]
    Blacklisted(String),
    #[error("anchor is in water")]
    Water,
    #[error("anchor is in lava")]
    Lava,
    #[error("anchor y {y} is above the height limit {limit}")]
    TooHigh { y: i32, limit: i32 },
    #[error("{failed} of {total} footprint cells are not flat")]
    NotFlat { failed: usize, total: usize },
}

/// Walk down from `y` while `keep_going` holds for the block kind.
fn probe_down(
    world: &dyn World,
    x: i32,
    mut y: i32,
    z: i32,
    max_steps: u32,
    keep_going: impl Fn(&str) -> bool,
) -> Result<i32, Rejection> {
    let mut steps = 0;
    while keep_going(world.kind_at(BlockPos::new(x, y, z))) {
        if steps >= max_steps {
            return Err(Rejection::ProbeLimit(max_steps));
        }
        y -= 1;
        steps += 1;
        if y < world.min_y() {
            return Err(Rejection::Void);
        }
    }
    Ok(y)
}

fn resolve_vertical<R: Rng + ?Sized>(
    structure: &StructureDefinition,
    world: &dyn World,
    x: i32,
    z: i32,
    rng: &mut R,
    max_steps: u32,
) -> Result<i32, Rejection> {
    let spawn = structure.spawn();
    let top = match world.highest_block_y(x, z) {
        Some(y) => y,
        None if spawn.in_void => world.min_y(),
        None => return Err(Rejection::Void),
    };
    let surface = || {
        if spawn.ignore_plants {
            probe_down(world, x, top, z, max_steps, is_plant_like)
        } else {
            Ok(top)
        }
    };

    Ok(match structure.location().vertical {
        VerticalRule::Top => surface()?,
        VerticalRule::OceanFloor => probe_down(world, x, top, z, max_steps, is_water_like)?,
        VerticalRule::Fixed(y) => y,
        VerticalRule::Offset(dy) => surface()? + dy,
        VerticalRule::Range { min, max } => rng.gen_range(min..=max),
        VerticalRule::OffsetRange { min, max } => surface()? + rng.gen_range(min..=max),
    })
}

/// Share of footprint cells that are not flat ground at the anchor's height.
fn check_flatness(world: &dyn World, anchor: BlockPos, flatness: &Flatness) -> Result<(), Rejection> {
    let total = flatness.area();
    let mut failed = 0;
    for (dx, dz) in flatness.cells() {
        let ground = anchor.offset(dx, 0, dz);
        let above = world.kind_at(ground.up());
        let cell_ok = (outpost_world::is_air(above) || is_plant_like(above))
            && !outpost_world::is_air(world.kind_at(ground));
        if cell_ok {
            continue;
        }
        failed += 1;
        if flatness.mode == FlatMode::Flat {
            return Err(Rejection::NotFlat { failed, total });
        }
    }
    match flatness.mode {
        FlatMode::FlatError { max_ratio } if failed as f64 / total as f64 > max_ratio => {
            Err(Rejection::NotFlat { failed, total })
        }
        _ => Ok(()),
    }
}

/// Resolve the anchor of `structure` in column `(x, z)` and run every
/// surface check against it.
pub fn refine<R: Rng + ?Sized>(
    structure: &StructureDefinition,
    world: &dyn World,
    x: i32,
    z: i32,
    rng: &mut R,
    max_probe_steps: u32,
) -> Result<BlockPos, Rejection> {
    let y = resolve_vertical(structure, world, x, z, rng, max_probe_steps)?;
    if y < world.min_y() || y > world.max_y() {
        return Err(Rejection::OutOfWorld(y));
    }
    let anchor = BlockPos::new(x, y, z);
    let kind = world.kind_at(anchor);
    let limits = structure.limits();
    let spawn = structure.spawn();

    if !limits.whitelist.is_empty() && !limits.whitelist.contains(kind) {
        return Err(Rejection::NotWhitelisted(kind.to_string()));
    }
    if limits.blacklist.contains(kind) {
        return Err(Rejection::Blacklisted(kind.to_string()));
    }
    if !spawn.in_water && is_water_like(kind) {
        return Err(Rejection::Water);
    }
    if !spawn.in_lava && is_lava(kind) {
        return Err(Rejection::Lava);
    }
    if let Some(limit) = limits.height_limit {
        if y > limit {
            return Err(Rejection::TooHigh { y, limit });
        }
    }
    if let Some(flatness) = &limits.flatness {
        check_flatness(world, anchor, flatness)?;
    }
    Ok(anchor)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    /// Number of candidates examined so far.
    Scanning(usize),
    Committed,
    Exhausted,
    Cancelled,
}

impl ScanState {
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Committed | Self::Exhausted | Self::Cancelled)
    }
}

pub struct StructurePicker {
    site: Site,
    structures: Arc<Vec<Arc<StructureDefinition>>>,
    queue: Option<PriorityStructureQueue>,
    state: ScanState,
}

impl StructurePicker {
    pub fn new(site: Site, structures: Arc<Vec<Arc<StructureDefinition>>>) -> Self {
        Self {
            site,
            structures,
            queue: None,
            state: ScanState::Idle,
        }
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Stop before the next step. Nothing has been placed by an unfinished scan.
    pub fn cancel(&mut self) {
        if !self.state.is_finished() {
            self.state = ScanState::Cancelled;
        }
    }

    /// Examine at most one candidate.
    pub fn step<W: World + 'static>(&mut self, ctx: &mut PlacementContext<W>) -> ScanState {
        let examined = match self.state {
            ScanState::Idle => 0,
            ScanState::Scanning(n) => n,
            finished => return finished,
        };

        if self.queue.is_none() {
            let biome = ctx.world.biome(self.site.anchor);
            let queue = PriorityStructureQueue::build(&self.structures, &self.site, &biome, &mut ctx.rng);
            log::debug!(
                "Site {} in {} ({}): {} eligible of {}",
                self.site.anchor,
                self.site.world,
                biome,
                queue.len(),
                self.structures.len()
            );
            self.queue = Some(queue);
        }

        let Some(candidate) = self.queue.as_mut().and_then(Iterator::next) else {
            log::debug!("Site {} in {}: no structure fits", self.site.anchor, self.site.world);
            self.state = ScanState::Exhausted;
            return self.state;
        };
        self.state = ScanState::Scanning(examined + 1);

        let (x, z) = (self.site.anchor.x, self.site.anchor.z);
        match refine(&candidate, &ctx.world, x, z, &mut ctx.rng, ctx.settings.max_probe_steps) {
            Err(rejection) => {
                log::debug!("{} rejected at {}: {}", candidate.name(), self.site.anchor, rejection);
            }
            Ok(anchor) => {
                self.site.anchor = anchor;
                self.state = ScanState::Committed;
                match place_structure(ctx, Arc::clone(&candidate), anchor) {
                    Ok(paste) => log::info!(
                        "Placing {} in {} at {} ({}°)",
                        candidate.name(),
                        self.site.world,
                        anchor,
                        paste.rotation.degrees()
                    ),
                    // Latched and logged by place_structure
                    Err(e) if e.is_fatal() => {}
                    Err(e) => log::warn!("Could not place {} at {}: {}", candidate.name(), anchor, e),
                }
            }
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::StructureBuilder;
    use outpost_world::{Block, MemoryWorld};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(3)
    }

    fn def(builder: StructureBuilder) -> StructureDefinition {
        builder.schematic("s").chance(1, 1).build().expect("valid")
    }

    /// Grass plain at y=64 over 0..8 x 0..8.
    fn meadow() -> MemoryWorld {
        let mut world = MemoryWorld::new("world");
        world.fill(BlockPos::new(0, 60, 0), BlockPos::new(7, 63, 7), &Block::new("dirt"));
        world.fill(BlockPos::new(0, 64, 0), BlockPos::new(7, 64, 7), &Block::new("grass_block"));
        world
    }

    #[test]
    fn test_top_probes_through_plants() {
        let mut world = meadow();
        world.set_block(BlockPos::new(2, 65, 2), Block::new("tall_grass"));
        let anchor = refine(&def(StructureDefinition::builder("a")), &world, 2, 2, &mut rng(), 20).expect("ok");
        assert_eq!(anchor, BlockPos::new(2, 64, 2));

        let rigid = def(StructureDefinition::builder("b").ignore_plants(false));
        let anchor = refine(&rigid, &world, 2, 2, &mut rng(), 20).expect("ok");
        assert_eq!(anchor, BlockPos::new(2, 65, 2));
    }

    #[test]
    fn test_ocean_floor_and_probe_cap() {
        let mut world = meadow();
        world.fill(BlockPos::new(0, 65, 0), BlockPos::new(0, 70, 0), &Block::new("water"));
        let floor = def(StructureDefinition::builder("wreck").vertical(VerticalRule::OceanFloor));
        assert_eq!(refine(&floor, &world, 0, 0, &mut rng(), 20), Ok(BlockPos::new(0, 64, 0)));
        assert_eq!(refine(&floor, &world, 0, 0, &mut rng(), 3), Err(Rejection::ProbeLimit(3)));

        let dry = def(StructureDefinition::builder("hut").in_water(false));
        assert_eq!(refine(&dry, &world, 0, 0, &mut rng(), 20), Err(Rejection::Water));
    }

    #[test]
    fn test_fixed_offset_and_ranges() {
        let world = meadow();
        let fixed = def(StructureDefinition::builder("f").spawn_y("40"));
        assert_eq!(refine(&fixed, &world, 1, 1, &mut rng(), 20), Ok(BlockPos::new(1, 40, 1)));

        let offset = def(StructureDefinition::builder("o").spawn_y("@-3"));
        assert_eq!(refine(&offset, &world, 1, 1, &mut rng(), 20), Ok(BlockPos::new(1, 61, 1)));

        let range = def(StructureDefinition::builder("r").spawn_y("[@-2;@+2]"));
        let mut r = rng();
        for _ in 0..50 {
            let y = refine(&range, &world, 1, 1, &mut r, 20).expect("ok").y;
            assert!((62..=66).contains(&y));
        }
    }

    #[test]
    fn test_void_column() {
        let world = MemoryWorld::new("world");
        let strict = def(StructureDefinition::builder("s"));
        assert_eq!(refine(&strict, &world, 100, 100, &mut rng(), 20), Err(Rejection::Void));

        let floating = def(StructureDefinition::builder("f").in_void(true).ignore_plants(false));
        assert_eq!(
            refine(&floating, &world, 100, 100, &mut rng(), 20),
            Ok(BlockPos::new(100, world.min_y(), 100))
        );
    }

    #[test]
    fn test_whitelist_blacklist_and_height() {
        let world = meadow();
        let sand_only = def(StructureDefinition::builder("w").whitelist("sand"));
        assert_eq!(
            refine(&sand_only, &world, 1, 1, &mut rng(), 20),
            Err(Rejection::NotWhitelisted("minecraft:grass_block".into()))
        );
        let no_grass = def(StructureDefinition::builder("b").blacklist("grass_block"));
        assert!(matches!(refine(&no_grass, &world, 1, 1, &mut rng(), 20), Err(Rejection::Blacklisted(_))));
        let low = def(StructureDefinition::builder("h").height_limit(50));
        assert_eq!(refine(&low, &world, 1, 1, &mut rng(), 20), Err(Rejection::TooHigh { y: 64, limit: 50 }));
    }

    #[test]
    fn test_flatness_modes() {
        let mut world = meadow();
        // One of nine footprint cells has a boulder on top
        world.set_block(BlockPos::new(3, 65, 3), Block::new("cobblestone"));
        let flat = |mode| Flatness { mode, x1: -1, z1: -1, x2: 1, z2: 1 };

        let strict = def(StructureDefinition::builder("s").flatness(flat(FlatMode::Flat)));
        assert_eq!(
            refine(&strict, &world, 2, 2, &mut rng(), 20),
            Err(Rejection::NotFlat { failed: 1, total: 9 })
        );

        let tolerant = def(StructureDefinition::builder("t").flatness(flat(FlatMode::FlatError { max_ratio: 0.2 })));
        assert_eq!(refine(&tolerant, &world, 2, 2, &mut rng(), 20), Ok(BlockPos::new(2, 64, 2)));

        let picky = def(StructureDefinition::builder("p").flatness(flat(FlatMode::FlatError { max_ratio: 0.1 })));
        assert!(refine(&picky, &world, 2, 2, &mut rng(), 20).is_err());

        // Footprint hanging over the edge of the plain fails below
        let edge = def(StructureDefinition::builder("e").flatness(flat(FlatMode::Flat)));
        assert!(refine(&edge, &world, 7, 7, &mut rng(), 20).is_err());
    }
}
