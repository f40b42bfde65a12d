//! Blueprint placement.
//!
//! A paste is two phases:
//! 1. The bulk copy, run inline: rotate, mask and write every cell.
//! 2. The deferred pass, scheduled `post_process_delay` ticks later: block
//!    substitutions, marker dispatch (which may paste children one level
//!    deeper), loot fill, and for top-level pastes the completion record.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;

use outpost_schematic::{Blueprint, BlueprintError};
use outpost_world::{Block, BlockEntity, BlockPos, Facing, Rotation, World};
use rand::Rng;

use crate::context::PlacementContext;
use crate::error::PlacementError;
use crate::events::{PasteRecord, PlacementRecord};
use crate::loot;
use crate::marker::{Marker, MarkerContext, MarkerEffect};
use crate::structure::StructureDefinition;

/// Containers already claimed for filling by one top-level placement.
/// Shared by every paste in its tree, children included.
#[derive(Debug, Clone, Default)]
pub struct FilledContainers(Rc<RefCell<HashSet<BlockPos>>>);

impl FilledContainers {
    /// False if `pos` was already claimed.
    pub fn claim(&self, pos: BlockPos) -> bool {
        self.0.borrow_mut().insert(pos)
    }
}

/// One blueprint paste. Rotation is carried here, never on the structure.
#[derive(Debug, Clone)]
pub struct PasteRequest {
    pub structure: Arc<StructureDefinition>,
    pub blueprint: String,
    pub location: BlockPos,
    pub rotation: Rotation,
    pub include_air: bool,
    pub depth: u32,
    pub filled: FilledContainers,
}

impl PasteRequest {
    /// Depth-0 request for the structure's primary blueprint. Rotation is
    /// the configured one, or a uniform pick when random rotation is on.
    pub fn top_level<R: Rng + ?Sized>(structure: Arc<StructureDefinition>, location: BlockPos, rng: &mut R) -> Self {
        let spawn = *structure.spawn();
        let rotation = if spawn.random_rotation {
            Rotation::ALL[rng.gen_range(0..Rotation::ALL.len())]
        } else {
            spawn.rotation
        };
        Self {
            blueprint: structure.schematic().to_string(),
            structure,
            location,
            rotation,
            include_air: spawn.place_air,
            depth: 0,
            filled: FilledContainers::default(),
        }
    }
}

/// State carried from the bulk copy to its deferred pass.
struct PostProcess {
    structure: Arc<StructureDefinition>,
    blueprint: String,
    min: BlockPos,
    max: BlockPos,
    rotation: Rotation,
    depth: u32,
    /// World positions from a compiled marker index, when one was usable.
    indexed: Option<Vec<BlockPos>>,
    filled: FilledContainers,
}

fn load_error(err: BlueprintError, req: &PasteRequest) -> PlacementError {
    match err {
        BlueprintError::NotFound { .. } => PlacementError::MissingBlueprint {
            blueprint: req.blueprint.clone(),
            depth: req.depth,
        },
        BlueprintError::Io { source, .. } => PlacementError::BlueprintIo {
            blueprint: req.blueprint.clone(),
            depth: req.depth,
            reason: source.to_string(),
        },
        BlueprintError::Corrupt { reason, .. } => PlacementError::CorruptBlueprint {
            blueprint: req.blueprint.clone(),
            reason,
        },
    }
}

/// Marker/container positions from the structure's compiled index, mapped
/// into the world. Missing or stale indexes fall back to a region scan.
fn compiled_positions<W: World>(
    ctx: &PlacementContext<W>,
    req: &PasteRequest,
    blueprint: &Blueprint,
) -> Option<Vec<BlockPos>> {
    let name = req.structure.compiled()?;
    match ctx.blueprints.load_compiled(name) {
        Ok(index) if index.matches(blueprint) => Some(
            index
                .positions
                .iter()
                .map(|local| blueprint.place_point(req.location, req.rotation, *local))
                .collect(),
        ),
        Ok(_) => {
            log::warn!("Compiled index {} is stale for {}; scanning instead", name, req.blueprint);
            None
        }
        Err(e) => {
            log::warn!("Compiled index {} unavailable ({}); scanning instead", name, e);
            None
        }
    }
}

/// Place a structure's primary blueprint at `anchor`.
///
/// Fatal errors are also latched on the context so the host sees them on
/// its next tick.
pub fn place_structure<W: World + 'static>(
    ctx: &mut PlacementContext<W>,
    structure: Arc<StructureDefinition>,
    anchor: BlockPos,
) -> Result<PasteRecord, PlacementError> {
    let request = PasteRequest::top_level(structure, anchor, &mut ctx.rng);
    let result = paste(ctx, request);
    if let Err(e) = &result {
        if e.is_fatal() {
            ctx.latch_fatal(e.clone());
        }
    }
    result
}

/// Bulk-copy one blueprint and schedule its deferred pass.
pub fn paste<W: World + 'static>(
    ctx: &mut PlacementContext<W>,
    req: PasteRequest,
) -> Result<PasteRecord, PlacementError> {
    let limit = req.structure.limits().iteration_limit;
    if req.depth > limit {
        log::error!(
            "Structure {} hit its iteration limit ({}) placing {} at {}; nothing placed at depth {}",
            req.structure.name(),
            limit,
            req.blueprint,
            req.location,
            req.depth
        );
        return Err(PlacementError::RecursionLimit {
            structure: req.structure.name().to_string(),
            depth: req.depth,
            limit,
        });
    }

    let blueprint = ctx.blueprints.load(&req.blueprint).map_err(|e| load_error(e, &req))?;
    let (min, max) = blueprint.placed_bounds(req.location, req.rotation);
    let indexed = if req.depth == 0 {
        compiled_positions(ctx, &req, &blueprint)
    } else {
        None
    };

    let source_mask = req.structure.source_mask();
    let target_mask = req.structure.target_mask();
    let (floor, ceiling) = (ctx.world.min_y(), ctx.world.max_y());
    let mut written = 0;
    for (local, block) in &blueprint.cells {
        if block.is_air() && !req.include_air {
            continue;
        }
        if !source_mask.allows(&block.kind) {
            continue;
        }
        let dest = blueprint.place_point(req.location, req.rotation, *local);
        if dest.y < floor || dest.y > ceiling {
            continue;
        }
        if !target_mask.allows(ctx.world.kind_at(dest)) {
            continue;
        }
        ctx.world.set_block(dest, block.clone().rotated(req.rotation));
        written += 1;
    }
    for (kind, local) in &blueprint.entities {
        let pos = blueprint.place_point(req.location, req.rotation, *local);
        ctx.world.spawn_entity(kind, pos);
    }

    let record = PasteRecord {
        structure: req.structure.name().to_string(),
        blueprint: req.blueprint.clone(),
        location: req.location,
        min,
        max,
        rotation: req.rotation,
        depth: req.depth,
        cells_written: written,
    };
    log::debug!(
        "Pasted {} for {} at {} (depth {}, {}°, {} cells)",
        record.blueprint,
        record.structure,
        record.location,
        record.depth,
        record.rotation.degrees(),
        written
    );
    ctx.events.paste(&record);

    let job = PostProcess {
        structure: req.structure,
        blueprint: req.blueprint,
        min,
        max,
        rotation: req.rotation,
        depth: req.depth,
        indexed,
        filled: req.filled,
    };
    let delay = ctx.settings.post_process_delay;
    ctx.scheduler
        .run_later(delay, move |ctx: &mut PlacementContext<W>| post_process(ctx, job));
    Ok(record)
}

fn post_process<W: World + 'static>(ctx: &mut PlacementContext<W>, job: PostProcess) {
    let positions = match &job.indexed {
        Some(positions) => positions.clone(),
        None => ctx.world.block_entities_in(job.min, job.max),
    };

    let mut markers = Vec::new();
    let mut containers = Vec::new();
    for pos in positions {
        let Some(block) = ctx.world.block(pos) else {
            continue;
        };
        match &block.entity {
            Some(BlockEntity::Sign(sign)) => {
                if let Some(marker) = Marker::parse(sign) {
                    markers.push((pos, sign.facing, marker));
                }
            }
            Some(BlockEntity::Container(container)) => {
                // Both halves of a double chest are one container. Cells an
                // enclosing paste already claimed are skipped.
                if !job.filled.claim(pos) {
                    continue;
                }
                if let Some(offset) = container.partner {
                    job.filled.claim(pos + offset);
                }
                containers.push(pos);
            }
            None => {}
        }
    }

    apply_replacements(ctx, &job);

    let marker_positions: Vec<BlockPos> = markers.iter().map(|(pos, _, _)| *pos).collect();
    for (pos, facing, marker) in markers {
        dispatch_marker(ctx, &job, pos, facing, marker);
    }

    for pos in &containers {
        loot::fill_container(ctx, &job.structure, *pos);
    }

    if job.depth == 0 {
        let record = PlacementRecord {
            structure: job.structure.name().to_string(),
            blueprint: job.blueprint.clone(),
            world: ctx.world.name().to_string(),
            min: job.min,
            max: job.max,
            rotation: job.rotation,
            depth: job.depth,
            markers: marker_positions,
            containers,
        };
        log::info!(
            "Structure {} completed in {} at {}..{}",
            record.structure,
            record.world,
            record.min,
            record.max
        );
        ctx.events.structure_placed(&record);
    }
}

/// Swap block kinds per the structure's substitution table. Signs and
/// containers are left alone.
fn apply_replacements<W: World>(ctx: &mut PlacementContext<W>, job: &PostProcess) {
    let replacements = &job.structure.limits().replacements;
    if replacements.is_empty() {
        return;
    }
    for x in job.min.x..=job.max.x {
        for y in job.min.y..=job.max.y {
            for z in job.min.z..=job.max.z {
                let pos = BlockPos::new(x, y, z);
                let replacement = match ctx.world.block(pos) {
                    Some(block) if block.entity.is_none() => replacements.get(&block.kind).map(|to| Block {
                        kind: to.clone(),
                        properties: block.properties.clone(),
                        entity: None,
                    }),
                    _ => None,
                };
                if let Some(block) = replacement {
                    ctx.world.set_block(pos, block);
                }
            }
        }
    }
}

fn dispatch_marker<W: World + 'static>(
    ctx: &mut PlacementContext<W>,
    job: &PostProcess,
    pos: BlockPos,
    facing: Facing,
    marker: Marker,
) {
    let Some(handler) = ctx.markers.get(&marker.tag) else {
        log::warn!("Unknown marker [{}] at {} in {}; left in place", marker.tag, pos, job.structure.name());
        return;
    };

    let resolved = {
        let mut marker_ctx = MarkerContext {
            location: pos,
            facing,
            world: ctx.world.name(),
            structure: &job.structure,
            rng: &mut ctx.rng,
        };
        handler.resolve(&marker.args, &mut marker_ctx)
    };
    let effect = match resolved {
        Ok(effect) => effect,
        Err(e) => {
            log::warn!("{} at {} in {}", e, pos, job.structure.name());
            return;
        }
    };

    ctx.events.marker(pos, &effect);
    ctx.world.set_block(pos, Block::air());

    match effect {
        MarkerEffect::SpawnEntity { kind, count } => {
            for _ in 0..count {
                ctx.world.spawn_entity(&kind, pos);
            }
        }
        MarkerEffect::Command(_) | MarkerEffect::Hook { .. } => {}
        MarkerEffect::SubBlueprint(sub) => {
            let rotation = if sub.use_rotation {
                Rotation::from_facing(facing)
            } else {
                Rotation::None
            };
            let request = PasteRequest {
                structure: Arc::clone(&job.structure),
                blueprint: sub.schematic,
                location: pos,
                rotation,
                include_air: sub.place_air,
                depth: job.depth + 1,
                filled: job.filled.clone(),
            };
            match paste(ctx, request) {
                Ok(_) => {}
                // Already logged at error level
                Err(PlacementError::RecursionLimit { .. }) => {}
                Err(e) => log::warn!("Skipping sub-blueprint of {} at {}: {}", job.structure.name(), pos, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EngineSettings;
    use crate::events::PlacementObserver;
    use crate::loot::{FillReport, LootItem, LootRegistry, LootTable};
    use crate::mask::{MaskPredicate, MaskSet, MaskUnion};
    use crate::scheduler;
    use crate::structure::SubBlueprint;
    use outpost_schematic::MemoryBlueprintStore;
    use outpost_world::MemoryWorld;

    fn context_with_loot(store: MemoryBlueprintStore, loot: LootRegistry) -> PlacementContext<MemoryWorld> {
        let settings = EngineSettings {
            post_process_delay: 0,
            ..EngineSettings::default()
        };
        PlacementContext::new(MemoryWorld::new("world"), Arc::new(store), loot, settings, 1)
    }

    fn context(store: MemoryBlueprintStore) -> PlacementContext<MemoryWorld> {
        context_with_loot(store, LootRegistry::new())
    }

    struct Fills(Rc<RefCell<Vec<BlockPos>>>);

    impl PlacementObserver for Fills {
        fn on_filled(&mut self, pos: BlockPos, _report: &FillReport) {
            self.0.borrow_mut().push(pos);
        }
    }

    /// Parent: `[schematic]` sign at x=0, chest at x=1. The child is pasted
    /// unrotated at the sign, so its bounds cover the parent's chest.
    fn nested(child: Blueprint) -> (PlacementContext<MemoryWorld>, Arc<StructureDefinition>, Rc<RefCell<Vec<BlockPos>>>) {
        let mut parent = Blueprint::new([3, 1, 1]);
        parent.set(BlockPos::new(0, 0, 0), Block::sign(Facing::North, ["[schematic]", "", "", ""]));
        parent.set(BlockPos::new(1, 0, 0), Block::container("chest").expect("chest stores items"));
        let store = MemoryBlueprintStore::new();
        store.insert("bp", parent);
        store.insert("room", child);

        let mut loot = LootRegistry::new();
        loot.insert(LootTable::new("supplies", 1).with_item(1.0, LootItem::single("apple")));
        let mut ctx = context_with_loot(store, loot);
        let fills = Rc::new(RefCell::new(Vec::new()));
        ctx.events.subscribe(Fills(Rc::clone(&fills)));

        let mut room = SubBlueprint::new("room");
        room.use_rotation = false;
        let def = structure(
            StructureDefinition::builder("outpost")
                .sub_blueprint(room)
                .loot(None, "supplies", 1.0),
        );
        (ctx, def, fills)
    }

    fn run_until_idle(ctx: &mut PlacementContext<MemoryWorld>) {
        for _ in 0..10 {
            if ctx.scheduler.is_idle() {
                return;
            }
            scheduler::tick(ctx);
        }
        panic!("placement still busy after 10 ticks");
    }

    fn items_at(ctx: &PlacementContext<MemoryWorld>, pos: BlockPos) -> u32 {
        ctx.world
            .block(pos)
            .and_then(|b| b.container_entity())
            .map(|c| c.item_count())
            .unwrap_or(0)
    }

    fn two_kinds() -> Blueprint {
        let mut bp = Blueprint::new([2, 1, 1]);
        bp.set(BlockPos::new(0, 0, 0), Block::new("stone"));
        bp.set(BlockPos::new(1, 0, 0), Block::new("dirt"));
        bp
    }

    fn structure(builder: crate::structure::StructureBuilder) -> Arc<StructureDefinition> {
        Arc::new(builder.schematic("bp").chance(1, 1).build().expect("valid"))
    }

    #[test]
    fn test_and_mask_with_contradiction_places_nothing() {
        let store = MemoryBlueprintStore::new();
        store.insert("bp", two_kinds());
        let mut ctx = context(store);
        let mask = MaskSet::new(MaskUnion::And)
            .with(MaskPredicate::include(["stone"]))
            .with(MaskPredicate::include(["dirt"]));
        let def = structure(StructureDefinition::builder("masked").source_mask(mask));

        let record = place_structure(&mut ctx, def, BlockPos::new(0, 64, 0)).expect("placed");
        assert_eq!(record.cells_written, 0);
        assert_eq!(ctx.world.block_count(), 0);
    }

    #[test]
    fn test_or_mask_places_either_kind() {
        let store = MemoryBlueprintStore::new();
        store.insert("bp", two_kinds());
        let mut ctx = context(store);
        let mask = MaskSet::new(MaskUnion::Or)
            .with(MaskPredicate::include(["stone"]))
            .with(MaskPredicate::include(["dirt"]));
        let def = structure(StructureDefinition::builder("masked").source_mask(mask));

        let record = place_structure(&mut ctx, def, BlockPos::new(0, 64, 0)).expect("placed");
        assert_eq!(record.cells_written, 2);
    }

    #[test]
    fn test_target_mask_protects_destination() {
        let store = MemoryBlueprintStore::new();
        store.insert("bp", two_kinds());
        let mut ctx = context(store);
        ctx.world.set_block(BlockPos::new(1, 64, 0), Block::new("bedrock"));
        let def = structure(
            StructureDefinition::builder("gentle")
                .target_mask(MaskSet::new(MaskUnion::And).with(MaskPredicate::exclude(["bedrock"]))),
        );

        place_structure(&mut ctx, def, BlockPos::new(0, 64, 0)).expect("placed");
        assert_eq!(ctx.world.kind_at(BlockPos::new(0, 64, 0)), "minecraft:stone");
        assert_eq!(ctx.world.kind_at(BlockPos::new(1, 64, 0)), "minecraft:bedrock");
    }

    #[test]
    fn test_air_only_copied_when_included() {
        let mut bp = two_kinds();
        bp.set(BlockPos::new(1, 0, 0), Block::air());
        let store = MemoryBlueprintStore::new();
        store.insert("bp", bp);
        let mut ctx = context(store);
        ctx.world.set_block(BlockPos::new(1, 64, 0), Block::new("grass_block"));

        let keep = structure(StructureDefinition::builder("keep").place_air(false));
        place_structure(&mut ctx, keep, BlockPos::new(0, 64, 0)).expect("placed");
        assert_eq!(ctx.world.kind_at(BlockPos::new(1, 64, 0)), "minecraft:grass_block");

        let carve = structure(StructureDefinition::builder("carve").place_air(true));
        place_structure(&mut ctx, carve, BlockPos::new(0, 64, 0)).expect("placed");
        assert!(ctx.world.block(BlockPos::new(1, 64, 0)).is_none());
    }

    #[test]
    fn test_rotation_applies_to_cells_and_facing() {
        let mut bp = Blueprint::new([2, 1, 1]);
        bp.set(BlockPos::new(0, 0, 0), Block::new("stone"));
        bp.set(BlockPos::new(1, 0, 0), Block::new("furnace").with_property("facing", "north"));
        let store = MemoryBlueprintStore::new();
        store.insert("bp", bp);
        let mut ctx = context(store);
        let def = structure(StructureDefinition::builder("turned").rotation_degrees(90));

        let record = place_structure(&mut ctx, def, BlockPos::new(0, 64, 0)).expect("placed");
        assert_eq!(record.rotation, Rotation::Clockwise90);
        let furnace = ctx.world.block(BlockPos::new(0, 64, 1)).expect("rotated onto +z");
        assert_eq!(furnace.properties.get("facing").map(String::as_str), Some("east"));
    }

    #[test]
    fn test_missing_blueprint_is_fatal_only_at_top_level() {
        let mut ctx = context(MemoryBlueprintStore::new());
        let def = structure(StructureDefinition::builder("ghost"));
        let err = place_structure(&mut ctx, Arc::clone(&def), BlockPos::new(0, 64, 0)).expect_err("missing");
        assert!(err.is_fatal());
        assert_eq!(ctx.fatal(), Some(&err));

        let mut ctx = context(MemoryBlueprintStore::new());
        let child = PasteRequest {
            structure: def,
            blueprint: "ghost_room".into(),
            location: BlockPos::new(0, 64, 0),
            rotation: Rotation::None,
            include_air: false,
            depth: 1,
            filled: FilledContainers::default(),
        };
        let err = paste(&mut ctx, child).expect_err("missing");
        assert!(!err.is_fatal());
        assert!(ctx.fatal().is_none());
    }

    #[test]
    fn test_substitution_and_mob_marker_in_deferred_pass() {
        let mut bp = Blueprint::new([1, 2, 1]);
        bp.set(BlockPos::new(0, 0, 0), Block::new("cobblestone"));
        bp.set(BlockPos::new(0, 1, 0), Block::sign(Facing::South, ["[mob]", "zombie", "2", ""]));
        let store = MemoryBlueprintStore::new();
        store.insert("bp", bp);
        let mut ctx = context(store);
        let def = structure(StructureDefinition::builder("crypt").replace("cobblestone", "mossy_cobblestone"));

        place_structure(&mut ctx, def, BlockPos::new(3, 64, 3)).expect("placed");
        // Deferred: nothing happened yet
        assert_eq!(ctx.world.kind_at(BlockPos::new(3, 64, 3)), "minecraft:cobblestone");
        assert!(ctx.world.entities().is_empty());

        scheduler::tick(&mut ctx);
        assert_eq!(ctx.world.kind_at(BlockPos::new(3, 64, 3)), "minecraft:mossy_cobblestone");
        assert!(ctx.world.block(BlockPos::new(3, 65, 3)).is_none());
        assert_eq!(ctx.world.entities().len(), 2);
    }

    #[test]
    fn test_child_pass_leaves_parent_container_alone() {
        // Child writes its origin and a chest of its own at x=2
        let mut child = Blueprint::new([3, 1, 1]);
        child.set(BlockPos::new(0, 0, 0), Block::new("stone"));
        child.set(BlockPos::new(2, 0, 0), Block::container("barrel").expect("barrel stores items"));
        let (mut ctx, def, fills) = nested(child);

        place_structure(&mut ctx, def, BlockPos::new(0, 64, 0)).expect("placed");
        run_until_idle(&mut ctx);

        assert_eq!(*fills.borrow(), vec![BlockPos::new(1, 64, 0), BlockPos::new(2, 64, 0)]);
        assert_eq!(items_at(&ctx, BlockPos::new(1, 64, 0)), 1);
        assert_eq!(items_at(&ctx, BlockPos::new(2, 64, 0)), 1);
        assert_eq!(ctx.world.kind_at(BlockPos::new(0, 64, 0)), "minecraft:stone");
    }

    #[test]
    fn test_child_container_over_parent_container_filled_once() {
        let mut child = Blueprint::new([2, 1, 1]);
        child.set(BlockPos::new(0, 0, 0), Block::new("stone"));
        child.set(BlockPos::new(1, 0, 0), Block::container("chest").expect("chest stores items"));
        let (mut ctx, def, fills) = nested(child);

        place_structure(&mut ctx, def, BlockPos::new(0, 64, 0)).expect("placed");
        run_until_idle(&mut ctx);

        assert_eq!(*fills.borrow(), vec![BlockPos::new(1, 64, 0)]);
        assert_eq!(items_at(&ctx, BlockPos::new(1, 64, 0)), 1);
    }
}
