//! Structure definitions and site eligibility.
//!
//! A [`StructureDefinition`] is only ever produced by [`StructureBuilder`],
//! which validates every mandatory field up front. Definitions are immutable
//! and shared as `Arc<StructureDefinition>` between scans and placements.

mod builder;
mod vertical;

use std::collections::{BTreeMap, HashMap, HashSet};

use outpost_world::{ContainerKind, Rotation, normalize_kind};
use rand::Rng;

use crate::mask::MaskSet;
use crate::site::Site;
use crate::weighted::WeightedCollection;

pub use builder::StructureBuilder;
pub use vertical::VerticalRule;

/// Default recursion depth for sub-blueprints.
pub const DEFAULT_ITERATION_LIMIT: u32 = 2;

/// `number` out of `out_of`, drawn as an integer over `[0, out_of]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chance {
    pub number: u32,
    pub out_of: u32,
}

impl Chance {
    pub fn probability(&self) -> f64 {
        self.number as f64 / self.out_of as f64
    }

    /// Inclusive on both ends: `number == out_of` always passes and
    /// `number == 0` still passes on a draw of zero.
    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen_range(0..=self.out_of) <= self.number
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationRules {
    /// Allowed world names; empty allows all.
    pub worlds: HashSet<String>,
    /// Allowed biomes (normalized ids); empty allows all.
    pub biomes: HashSet<String>,
    /// Minimum |x| of the anchor.
    pub x_limit: i32,
    /// Minimum |z| of the anchor.
    pub z_limit: i32,
    pub vertical: VerticalRule,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlatMode {
    /// Any failing footprint cell rejects the site.
    Flat,
    /// Rejects only when the failing share of the footprint exceeds `max_ratio`.
    FlatError { max_ratio: f64 },
}

/// Footprint rectangle relative to the anchor, inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Flatness {
    pub mode: FlatMode,
    pub x1: i32,
    pub z1: i32,
    pub x2: i32,
    pub z2: i32,
}

impl Flatness {
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        let (x1, x2) = (self.x1.min(self.x2), self.x1.max(self.x2));
        let (z1, z2) = (self.z1.min(self.z2), self.z1.max(self.z2));
        (x1..=x2).flat_map(move |dx| (z1..=z2).map(move |dz| (dx, dz)))
    }

    pub fn area(&self) -> usize {
        let w = (self.x2 - self.x1).unsigned_abs() as usize + 1;
        let d = (self.z2 - self.z1).unsigned_abs() as usize + 1;
        w * d
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Limitations {
    /// Kinds the anchor must be; empty allows all.
    pub whitelist: HashSet<String>,
    /// Kinds the anchor must not be.
    pub blacklist: HashSet<String>,
    pub flatness: Option<Flatness>,
    /// Highest anchor Y allowed.
    pub height_limit: Option<i32>,
    /// Block kind substitutions applied by the deferred pass.
    pub replacements: HashMap<String, String>,
    pub iteration_limit: u32,
}

impl Default for Limitations {
    fn default() -> Self {
        Self {
            whitelist: HashSet::new(),
            blacklist: HashSet::new(),
            flatness: None,
            height_limit: None,
            replacements: HashMap::new(),
            iteration_limit: DEFAULT_ITERATION_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnRules {
    /// Fixed yaw used when `random_rotation` is off.
    pub rotation: Rotation,
    pub random_rotation: bool,
    pub place_air: bool,
    pub in_water: bool,
    pub in_lava: bool,
    pub in_void: bool,
    /// Probe down through foliage for a solid anchor.
    pub ignore_plants: bool,
}

impl Default for SpawnRules {
    fn default() -> Self {
        Self {
            rotation: Rotation::None,
            random_rotation: false,
            place_air: true,
            in_water: true,
            in_lava: false,
            in_void: false,
            ignore_plants: true,
        }
    }
}

/// A child blueprint referenced from a `[schematic]` or `[advschematic]` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubBlueprint {
    pub schematic: String,
    pub place_air: bool,
    /// Align with the triggering marker's facing; otherwise placed unrotated.
    pub use_rotation: bool,
}

impl SubBlueprint {
    pub fn new(schematic: &str) -> Self {
        Self {
            schematic: schematic.to_string(),
            place_air: false,
            use_rotation: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StructureDefinition {
    name: String,
    schematic: String,
    compiled: Option<String>,
    chance: Chance,
    priority: i32,
    location: LocationRules,
    limits: Limitations,
    spawn: SpawnRules,
    source_mask: MaskSet,
    target_mask: MaskSet,
    loot: BTreeMap<ContainerKind, WeightedCollection<String>>,
    default_loot: WeightedCollection<String>,
    sub_blueprints: Vec<SubBlueprint>,
    categories: HashMap<String, WeightedCollection<SubBlueprint>>,
}

impl StructureDefinition {
    pub fn builder(name: &str) -> StructureBuilder {
        StructureBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Primary blueprint name.
    pub fn schematic(&self) -> &str {
        &self.schematic
    }

    /// Name of the precompiled marker index, if any.
    pub fn compiled(&self) -> Option<&str> {
        self.compiled.as_deref()
    }

    pub fn chance(&self) -> Chance {
        self.chance
    }

    pub fn probability(&self) -> f64 {
        self.chance.probability()
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn location(&self) -> &LocationRules {
        &self.location
    }

    pub fn limits(&self) -> &Limitations {
        &self.limits
    }

    pub fn spawn(&self) -> &SpawnRules {
        &self.spawn
    }

    pub fn source_mask(&self) -> &MaskSet {
        &self.source_mask
    }

    pub fn target_mask(&self) -> &MaskSet {
        &self.target_mask
    }

    /// Loot tables for a container kind, falling back to the kind-less set.
    pub fn loot_tables(&self, kind: ContainerKind) -> Option<&WeightedCollection<String>> {
        match self.loot.get(&kind) {
            Some(tables) if !tables.is_empty() => Some(tables),
            _ if !self.default_loot.is_empty() => Some(&self.default_loot),
            _ => None,
        }
    }

    /// Every loot table name this structure references.
    pub fn referenced_loot_tables(&self) -> impl Iterator<Item = &String> {
        self.loot
            .values()
            .chain(std::iter::once(&self.default_loot))
            .flat_map(|c| c.iter().map(|(_, name)| name))
    }

    pub fn sub_blueprints(&self) -> &[SubBlueprint] {
        &self.sub_blueprints
    }

    pub fn category(&self, name: &str) -> Option<&WeightedCollection<SubBlueprint>> {
        self.categories.get(name)
    }

    /// Cheap site eligibility. Refinement (surface, flatness, liquids) is
    /// left to the picker.
    ///
    /// Checks short-circuit in a fixed order: world, distance from origin,
    /// chance draw, biome. The chance draw consumes randomness only when the
    /// first two checks pass.
    pub fn can_spawn<R: Rng + ?Sized>(&self, site: &Site, biome: &str, rng: &mut R) -> bool {
        let location = &self.location;
        if !location.worlds.is_empty() && !location.worlds.contains(&site.world) {
            return false;
        }
        if site.anchor.x.abs() < location.x_limit || site.anchor.z.abs() < location.z_limit {
            return false;
        }
        if !self.chance.roll(rng) {
            return false;
        }
        location.biomes.is_empty() || location.biomes.contains(&normalize_kind(biome))
    }
}
