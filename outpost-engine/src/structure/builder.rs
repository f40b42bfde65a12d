use std::collections::{BTreeMap, HashMap, HashSet};

use outpost_world::{ContainerKind, Rotation, normalize_kind};

use super::{
    Chance, FlatMode, Flatness, Limitations, LocationRules, SpawnRules, StructureDefinition,
    SubBlueprint, VerticalRule,
};
use crate::error::ConfigError;
use crate::mask::{MaskPredicate, MaskSet};
use crate::weighted::WeightedCollection;

/// Collects raw settings and validates them once in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct StructureBuilder {
    name: String,
    schematic: Option<String>,
    compiled: Option<String>,
    chance_number: Option<u32>,
    chance_out_of: Option<u32>,
    priority: i32,
    worlds: HashSet<String>,
    biomes: HashSet<String>,
    x_limit: i32,
    z_limit: i32,
    vertical: Result<VerticalRule, String>,
    limits: Limitations,
    spawn: SpawnRules,
    rotation_degrees: i32,
    source_mask: MaskSet,
    target_mask: MaskSet,
    loot: Vec<(Option<ContainerKind>, String, f64)>,
    sub_blueprints: Vec<SubBlueprint>,
    categories: Vec<(String, f64, SubBlueprint)>,
}

impl StructureBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            schematic: None,
            compiled: None,
            chance_number: None,
            chance_out_of: None,
            priority: 0,
            worlds: HashSet::new(),
            biomes: HashSet::new(),
            x_limit: 0,
            z_limit: 0,
            vertical: Ok(VerticalRule::Top),
            limits: Limitations::default(),
            spawn: SpawnRules::default(),
            rotation_degrees: 0,
            source_mask: MaskSet::default(),
            target_mask: MaskSet::default(),
            loot: Vec::new(),
            sub_blueprints: Vec::new(),
            categories: Vec::new(),
        }
    }

    pub fn schematic(mut self, name: &str) -> Self {
        self.schematic = Some(name.to_string());
        self
    }

    pub fn compiled(mut self, name: &str) -> Self {
        self.compiled = Some(name.to_string());
        self
    }

    pub fn chance(self, number: u32, out_of: u32) -> Self {
        self.chance_number(number).chance_out_of(out_of)
    }

    pub fn chance_number(mut self, number: u32) -> Self {
        self.chance_number = Some(number);
        self
    }

    pub fn chance_out_of(mut self, out_of: u32) -> Self {
        self.chance_out_of = Some(out_of);
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn world(mut self, world: &str) -> Self {
        self.worlds.insert(world.to_string());
        self
    }

    pub fn biome(mut self, biome: &str) -> Self {
        self.biomes.insert(normalize_kind(biome));
        self
    }

    pub fn distance_limits(mut self, x: i32, z: i32) -> Self {
        self.x_limit = x;
        self.z_limit = z;
        self
    }

    pub fn vertical(mut self, rule: VerticalRule) -> Self {
        self.vertical = Ok(rule);
        self
    }

    /// Vertical rule in its configuration form, e.g. `@+2` or `[10;40]`.
    pub fn spawn_y(mut self, rule: &str) -> Self {
        self.vertical = rule.parse();
        self
    }

    pub fn whitelist(mut self, kind: &str) -> Self {
        self.limits.whitelist.insert(normalize_kind(kind));
        self
    }

    pub fn blacklist(mut self, kind: &str) -> Self {
        self.limits.blacklist.insert(normalize_kind(kind));
        self
    }

    pub fn flatness(mut self, flatness: Flatness) -> Self {
        self.limits.flatness = Some(flatness);
        self
    }

    pub fn height_limit(mut self, y: i32) -> Self {
        self.limits.height_limit = Some(y);
        self
    }

    pub fn replace(mut self, from: &str, to: &str) -> Self {
        self.limits.replacements.insert(normalize_kind(from), normalize_kind(to));
        self
    }

    pub fn iteration_limit(mut self, limit: u32) -> Self {
        self.limits.iteration_limit = limit;
        self
    }

    pub fn rotation_degrees(mut self, degrees: i32) -> Self {
        self.rotation_degrees = degrees;
        self
    }

    pub fn random_rotation(mut self, on: bool) -> Self {
        self.spawn.random_rotation = on;
        self
    }

    pub fn place_air(mut self, on: bool) -> Self {
        self.spawn.place_air = on;
        self
    }

    pub fn in_water(mut self, on: bool) -> Self {
        self.spawn.in_water = on;
        self
    }

    pub fn in_lava(mut self, on: bool) -> Self {
        self.spawn.in_lava = on;
        self
    }

    pub fn in_void(mut self, on: bool) -> Self {
        self.spawn.in_void = on;
        self
    }

    pub fn ignore_plants(mut self, on: bool) -> Self {
        self.spawn.ignore_plants = on;
        self
    }

    pub fn source_mask(mut self, mask: MaskSet) -> Self {
        self.source_mask = mask;
        self
    }

    pub fn target_mask(mut self, mask: MaskSet) -> Self {
        self.target_mask = mask;
        self
    }

    /// Reference a loot table; `None` applies to every container kind
    /// without its own tables.
    pub fn loot(mut self, kind: Option<ContainerKind>, table: &str, weight: f64) -> Self {
        self.loot.push((kind, table.to_string(), weight));
        self
    }

    pub fn sub_blueprint(mut self, sub: SubBlueprint) -> Self {
        self.sub_blueprints.push(sub);
        self
    }

    pub fn category(mut self, category: &str, weight: f64, sub: SubBlueprint) -> Self {
        self.categories.push((category.to_string(), weight, sub));
        self
    }

    fn check_mask(&self, field: &str, mask: &MaskSet) -> Result<(), ConfigError> {
        for predicate in &mask.predicates {
            let kinds = match predicate {
                MaskPredicate::Include(k) | MaskPredicate::Exclude(k) => k,
            };
            if kinds.is_empty() {
                return Err(ConfigError::invalid(&self.name, field, "predicate lists no block kinds"));
            }
        }
        Ok(())
    }

    pub fn build(self) -> Result<StructureDefinition, ConfigError> {
        let name = self.name.as_str();
        if name.trim().is_empty() {
            return Err(ConfigError::invalid(name, "name", "must not be empty"));
        }

        let schematic = match self.schematic.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => return Err(ConfigError::MissingField { structure: name.to_string(), field: "schematic" }),
        };

        let Some(number) = self.chance_number else {
            return Err(ConfigError::MissingField { structure: name.to_string(), field: "chance_number" });
        };
        let Some(out_of) = self.chance_out_of else {
            return Err(ConfigError::MissingField { structure: name.to_string(), field: "chance_out_of" });
        };
        if out_of == 0 {
            return Err(ConfigError::invalid(name, "chance_out_of", "must be greater than zero"));
        }

        let vertical = self
            .vertical
            .clone()
            .and_then(|rule| match rule {
                VerticalRule::Range { min, max } | VerticalRule::OffsetRange { min, max } if min > max => {
                    Err(format!("range minimum {min} is above its maximum {max}"))
                }
                rule => Ok(rule),
            })
            .map_err(|reason| ConfigError::invalid(name, "spawn_y", reason))?;

        let mut spawn = self.spawn;
        spawn.rotation = Rotation::from_degrees(self.rotation_degrees).ok_or_else(|| {
            ConfigError::invalid(name, "rotation", format!("{} is not a multiple of 90", self.rotation_degrees))
        })?;

        if let Some(Flatness { mode: FlatMode::FlatError { max_ratio }, .. }) = self.limits.flatness {
            if !(0.0..=1.0).contains(&max_ratio) {
                return Err(ConfigError::invalid(name, "flatness", format!("error ratio {max_ratio} outside 0..=1")));
            }
        }

        self.check_mask("source_mask", &self.source_mask)?;
        self.check_mask("target_mask", &self.target_mask)?;

        let mut loot: BTreeMap<ContainerKind, WeightedCollection<String>> = BTreeMap::new();
        let mut default_loot = WeightedCollection::new();
        for (kind, table, weight) in &self.loot {
            if table.trim().is_empty() || !(*weight > 0.0) {
                return Err(ConfigError::invalid(name, "loot_tables", format!("bad entry `{table}` ({weight})")));
            }
            match kind {
                Some(kind) => loot.entry(*kind).or_default().add(*weight, table.clone()),
                None => default_loot.add(*weight, table.clone()),
            };
        }

        if let Some(sub) = self.sub_blueprints.iter().find(|s| s.schematic.trim().is_empty()) {
            return Err(ConfigError::invalid(name, "sub_schematics", format!("entry without a file: {sub:?}")));
        }

        let mut categories: HashMap<String, WeightedCollection<SubBlueprint>> = HashMap::new();
        for (category, weight, sub) in &self.categories {
            let field = format!("advanced_sub_schematics.{category}");
            if category.trim().is_empty() {
                return Err(ConfigError::invalid(name, "advanced_sub_schematics", "category without a name"));
            }
            if sub.schematic.trim().is_empty() {
                return Err(ConfigError::invalid(name, &field, "entry without a file"));
            }
            if !(*weight > 0.0) {
                return Err(ConfigError::invalid(name, &field, format!("weight {weight} must be positive")));
            }
            categories.entry(category.clone()).or_default().add(*weight, sub.clone());
        }

        Ok(StructureDefinition {
            name: self.name.clone(),
            schematic,
            compiled: self.compiled.clone(),
            chance: Chance { number, out_of },
            priority: self.priority,
            location: LocationRules {
                worlds: self.worlds.clone(),
                biomes: self.biomes.clone(),
                x_limit: self.x_limit,
                z_limit: self.z_limit,
                vertical,
            },
            limits: self.limits.clone(),
            spawn,
            source_mask: self.source_mask.clone(),
            target_mask: self.target_mask.clone(),
            loot,
            default_loot,
            sub_blueprints: self.sub_blueprints.clone(),
            categories,
        })
    }
}
