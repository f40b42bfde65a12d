//! Loot tables and container filling.

use std::collections::HashMap;
use std::sync::Arc;

use outpost_world::{BlockPos, Container, ItemStack, MAX_STACK, SlotRole, World};
use rand::Rng;
use serde::Serialize;

use crate::context::PlacementContext;
use crate::events::FillEvent;
use crate::structure::StructureDefinition;
use crate::weighted::WeightedCollection;

/// Container custom-name prefix that pins a loot table: `[lootable]<table>[:<rolls>]`.
pub const LOOTABLE_PREFIX: &str = "[lootable]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LootItem {
    pub item: String,
    pub min_count: u32,
    pub max_count: u32,
}

impl LootItem {
    pub fn new(item: &str, min_count: u32, max_count: u32) -> Self {
        Self {
            item: outpost_world::normalize_kind(item),
            min_count: min_count.min(max_count).max(1),
            max_count: max_count.max(min_count).max(1),
        }
    }

    pub fn single(item: &str) -> Self {
        Self::new(item, 1, 1)
    }

    fn draw_count<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        if self.min_count == self.max_count {
            self.min_count
        } else {
            rng.gen_range(self.min_count..=self.max_count)
        }
    }
}

#[derive(Debug, Clone)]
pub struct LootTable {
    pub name: String,
    /// Item draws per fill.
    pub rolls: u32,
    /// Slot used in furnaces, brewing stands and the like.
    pub slot: SlotRole,
    items: WeightedCollection<LootItem>,
}

impl LootTable {
    pub fn new(name: &str, rolls: u32) -> Self {
        Self {
            name: name.to_string(),
            rolls,
            slot: SlotRole::Ingredient,
            items: WeightedCollection::new(),
        }
    }

    pub fn with_item(mut self, weight: f64, item: LootItem) -> Self {
        self.items.add(weight, item);
        self
    }

    pub fn with_slot(mut self, slot: SlotRole) -> Self {
        self.slot = slot;
        self
    }

    pub fn add_item(&mut self, weight: f64, item: LootItem) {
        self.items.add(weight, item);
    }

    pub fn items(&self) -> &WeightedCollection<LootItem> {
        &self.items
    }
}

#[derive(Debug, Clone, Default)]
pub struct LootRegistry {
    tables: HashMap<String, Arc<LootTable>>,
}

impl LootRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: LootTable) {
        self.tables.insert(table.name.clone(), Arc::new(table));
    }

    pub fn get(&self, name: &str) -> Option<Arc<LootTable>> {
        self.tables.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Outcome of one container fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FillReport {
    pub table: String,
    pub rolls: u32,
    /// Item units actually inserted.
    pub units_placed: u32,
}

/// Parse a `[lootable]<table>[:<rolls>]` container name.
pub fn parse_override(custom_name: &str) -> Option<(String, Option<u32>)> {
    let name = custom_name.trim();
    let head = name.get(..LOOTABLE_PREFIX.len())?;
    if !head.eq_ignore_ascii_case(LOOTABLE_PREFIX) {
        return None;
    }
    let rest = name[LOOTABLE_PREFIX.len()..].trim();
    // Table names may be namespaced, so only a numeric suffix counts as rolls
    let (table, rolls) = match rest.rsplit_once(':') {
        Some((table, n)) => match n.trim().parse::<u32>() {
            Ok(n) => (table.trim(), Some(n)),
            Err(_) => (rest, None),
        },
        None => (rest, None),
    };
    if table.is_empty() {
        return None;
    }
    Some((table.to_string(), rolls))
}

fn place_single(container: &mut Container, role: SlotRole, item: &str, count: u32) -> u32 {
    let role = if role == SlotRole::General { SlotRole::Ingredient } else { role };
    let roles = container.kind.slot_roles();
    let free = container
        .slots
        .iter_mut()
        .zip(roles)
        .find(|(slot, r)| **r == role && slot.is_none());
    match free {
        Some((slot, _)) => {
            let count = count.min(MAX_STACK);
            *slot = Some(ItemStack::new(item, count));
            count
        }
        None => 0,
    }
}

fn place_units<R: Rng + ?Sized>(container: &mut Container, item: &str, count: u32, rng: &mut R) -> u32 {
    let slots = container.slots.len();
    if slots == 0 {
        return 0;
    }
    let mut placed = 0;
    'units: for _ in 0..count {
        for _ in 0..slots {
            let slot = &mut container.slots[rng.gen_range(0..slots)];
            match slot {
                None => {
                    *slot = Some(ItemStack::new(item, 1));
                    placed += 1;
                    continue 'units;
                }
                Some(stack) if stack.item == item && stack.count < MAX_STACK => {
                    stack.count += 1;
                    placed += 1;
                    continue 'units;
                }
                Some(_) => {}
            }
        }
        // No room found; the rest of this roll is dropped
        break;
    }
    placed
}

/// Fill `container` with `rolls` draws from `table`. Never fails: a full
/// container just receives nothing.
pub fn fill<R: Rng + ?Sized>(container: &mut Container, table: &LootTable, rolls: u32, rng: &mut R) -> FillReport {
    let mut units_placed = 0;
    for _ in 0..rolls {
        let Some(item) = table.items.try_next(rng) else {
            break;
        };
        let count = item.draw_count(rng);
        units_placed += if container.kind.is_single_purpose() {
            place_single(container, table.slot, &item.item, count)
        } else {
            place_units(container, &item.item, count, rng)
        };
    }
    FillReport {
        table: table.name.clone(),
        rolls,
        units_placed,
    }
}

/// Choose a table for the container at `pos`, offer the fill to observers
/// and fill it.
///
/// Returns `None` when the container is gone, no table applies, or an
/// observer cancelled the fill.
pub(crate) fn fill_container<W: World>(
    ctx: &mut PlacementContext<W>,
    structure: &StructureDefinition,
    pos: BlockPos,
) -> Option<FillReport> {
    let (kind, custom_name) = {
        let container = ctx.world.container_mut(pos)?;
        (container.kind, container.custom_name.clone())
    };

    let pinned = custom_name.as_deref().and_then(parse_override);
    let (table, rolls) = match &pinned {
        Some((name, rolls)) => {
            let Some(table) = ctx.loot.get(name) else {
                log::warn!("Container at {} in {} names unknown loot table {}", pos, structure.name(), name);
                return None;
            };
            let rolls = rolls.unwrap_or(table.rolls);
            (table, rolls)
        }
        None => {
            let names = structure.loot_tables(kind)?;
            let name = names.try_next(&mut ctx.rng)?.clone();
            let Some(table) = ctx.loot.get(&name) else {
                log::warn!("Structure {} references unknown loot table {}", structure.name(), name);
                return None;
            };
            let rolls = table.rolls;
            (table, rolls)
        }
    };

    let mut event = FillEvent::new(structure.name(), pos, kind, &table, rolls);
    if !ctx.events.before_fill(&mut event) {
        log::debug!("Fill of {:?} at {} cancelled by an observer", kind, pos);
        return None;
    }

    let container = ctx.world.container_mut(pos)?;
    if pinned.is_some() {
        container.custom_name = None;
    }
    let report = fill(container, &table, rolls, &mut ctx.rng);
    log::debug!(
        "Filled {:?} at {} from {} ({} units over {} rolls)",
        kind,
        pos,
        report.table,
        report.units_placed,
        report.rolls
    );
    ctx.events.filled(pos, &report);
    Some(report)
}
