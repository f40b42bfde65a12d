//! JSON configuration.
//!
//! - `structures/<name>.json`: one structure per file, named after the file.
//! - `loot/<name>.json`: one loot table per file.
//! - `outpost.json`: optional [`EngineSettings`].
//!
//! Raw files deserialize into permissive `*Config` structs; validation
//! happens in [`StructureBuilder`]. A bad file is logged and skipped, it
//! never stops the others from loading.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use outpost_world::{ContainerKind, SlotRole};
use serde::Deserialize;

use crate::context::EngineSettings;
use crate::error::ConfigError;
use crate::loot::{LootItem, LootRegistry, LootTable};
use crate::mask::{MaskPredicate, MaskSet, MaskUnion};
use crate::structure::{FlatMode, Flatness, StructureBuilder, StructureDefinition, SubBlueprint};

/// Key in `loot_tables` that applies to every container kind.
pub const ANY_CONTAINER: &str = "default";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub worlds: Vec<String>,
    pub biomes: Vec<String>,
    pub x_limitation: i32,
    pub z_limitation: i32,
    pub spawn_y: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    pub rotation: i32,
    pub random_rotation: bool,
    pub place_air: Option<bool>,
    pub in_water: Option<bool>,
    pub in_lava: Option<bool>,
    pub in_void: Option<bool>,
    pub ignore_plants: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlatModeConfig {
    Flat,
    FlatError,
}

#[derive(Debug, Deserialize)]
pub struct FlatnessConfig {
    pub mode: FlatModeConfig,
    #[serde(default)]
    pub error: f64,
    pub x1: i32,
    pub z1: i32,
    pub x2: i32,
    pub z2: i32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LimitationsConfig {
    pub whitelist: Vec<String>,
    pub blacklist: Vec<String>,
    pub flatness: Option<FlatnessConfig>,
    pub height_limit: Option<i32>,
    pub replace_blocks: BTreeMap<String, String>,
    pub iteration_limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskEntryConfig {
    Include(Vec<String>),
    Exclude(Vec<String>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MaskConfig {
    pub union: MaskUnion,
    pub predicates: Vec<MaskEntryConfig>,
}

impl MaskConfig {
    fn into_mask(self) -> MaskSet {
        let mut mask = MaskSet::new(self.union);
        for entry in self.predicates {
            mask = mask.with(match entry {
                MaskEntryConfig::Include(kinds) => MaskPredicate::include(kinds.iter().map(String::as_str)),
                MaskEntryConfig::Exclude(kinds) => MaskPredicate::exclude(kinds.iter().map(String::as_str)),
            });
        }
        mask
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SubSchematicConfig {
    pub file: String,
    pub place_air: bool,
    pub use_rotation: Option<bool>,
    pub weight: Option<f64>,
}

impl SubSchematicConfig {
    fn to_sub(&self) -> SubBlueprint {
        SubBlueprint {
            schematic: self.file.clone(),
            place_air: self.place_air,
            use_rotation: self.use_rotation.unwrap_or(true),
        }
    }
}

/// One structure file as written.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    pub schematic: Option<String>,
    pub compiled_schematic: Option<String>,
    pub chance_number: Option<u32>,
    pub chance_out_of: Option<u32>,
    pub priority: i32,
    pub location: LocationConfig,
    pub spawn: SpawnConfig,
    pub limitations: LimitationsConfig,
    pub source_mask: MaskConfig,
    pub target_mask: MaskConfig,
    /// Container kind (or `default`) -> table name -> weight.
    pub loot_tables: BTreeMap<String, BTreeMap<String, f64>>,
    pub sub_schematics: Vec<SubSchematicConfig>,
    pub advanced_sub_schematics: BTreeMap<String, Vec<SubSchematicConfig>>,
}

impl StructureConfig {
    pub fn into_definition(self, name: &str, loot: &LootRegistry) -> Result<StructureDefinition, ConfigError> {
        let mut b = StructureBuilder::new(name).priority(self.priority);
        if let Some(s) = &self.schematic {
            b = b.schematic(s);
        }
        if let Some(c) = &self.compiled_schematic {
            b = b.compiled(c);
        }
        if let Some(n) = self.chance_number {
            b = b.chance_number(n);
        }
        if let Some(n) = self.chance_out_of {
            b = b.chance_out_of(n);
        }

        let location = &self.location;
        for world in &location.worlds {
            b = b.world(world);
        }
        for biome in &location.biomes {
            b = b.biome(biome);
        }
        b = b.distance_limits(location.x_limitation, location.z_limitation);
        if let Some(rule) = &location.spawn_y {
            b = b.spawn_y(rule);
        }

        let spawn = &self.spawn;
        b = b.rotation_degrees(spawn.rotation).random_rotation(spawn.random_rotation);
        if let Some(on) = spawn.place_air {
            b = b.place_air(on);
        }
        if let Some(on) = spawn.in_water {
            b = b.in_water(on);
        }
        if let Some(on) = spawn.in_lava {
            b = b.in_lava(on);
        }
        if let Some(on) = spawn.in_void {
            b = b.in_void(on);
        }
        if let Some(on) = spawn.ignore_plants {
            b = b.ignore_plants(on);
        }

        let limits = &self.limitations;
        for kind in &limits.whitelist {
            b = b.whitelist(kind);
        }
        for kind in &limits.blacklist {
            b = b.blacklist(kind);
        }
        if let Some(flat) = &limits.flatness {
            let mode = match flat.mode {
                FlatModeConfig::Flat => FlatMode::Flat,
                FlatModeConfig::FlatError => FlatMode::FlatError { max_ratio: flat.error },
            };
            b = b.flatness(Flatness { mode, x1: flat.x1, z1: flat.z1, x2: flat.x2, z2: flat.z2 });
        }
        if let Some(y) = limits.height_limit {
            b = b.height_limit(y);
        }
        for (from, to) in &limits.replace_blocks {
            b = b.replace(from, to);
        }
        if let Some(limit) = limits.iteration_limit {
            b = b.iteration_limit(limit);
        }

        for (key, tables) in &self.loot_tables {
            let kind = if key == ANY_CONTAINER {
                None
            } else {
                let kind: ContainerKind = serde_json::from_value(serde_json::Value::String(key.clone()))
                    .map_err(|_| ConfigError::invalid(name, "loot_tables", format!("unknown container kind `{key}`")))?;
                Some(kind)
            };
            for (table, weight) in tables {
                if !loot.contains(table) {
                    return Err(ConfigError::UnknownLootTable {
                        structure: name.to_string(),
                        table: table.clone(),
                    });
                }
                b = b.loot(kind, table, *weight);
            }
        }

        for sub in &self.sub_schematics {
            b = b.sub_blueprint(sub.to_sub());
        }
        for (category, subs) in &self.advanced_sub_schematics {
            for sub in subs {
                b = b.category(category, sub.weight.unwrap_or(1.0), sub.to_sub());
            }
        }

        b.source_mask(self.source_mask.into_mask())
            .target_mask(self.target_mask.into_mask())
            .build()
    }
}

#[derive(Debug, Deserialize)]
pub struct LootItemConfig {
    pub item: String,
    #[serde(default = "one")]
    pub weight: f64,
    pub amount: Option<u32>,
    pub min: Option<u32>,
    pub max: Option<u32>,
}

fn one() -> f64 {
    1.0
}

fn one_roll() -> u32 {
    1
}

/// One loot table file as written.
#[derive(Debug, Deserialize)]
pub struct LootTableConfig {
    #[serde(default = "one_roll")]
    pub rolls: u32,
    #[serde(default)]
    pub slot: Option<SlotRole>,
    pub items: Vec<LootItemConfig>,
}

impl LootTableConfig {
    pub fn into_table(self, name: &str) -> Result<LootTable, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidLootTable { table: name.to_string(), reason };
        if self.items.is_empty() {
            return Err(invalid("no items".to_string()));
        }
        let mut table = LootTable::new(name, self.rolls);
        if let Some(slot) = self.slot {
            table = table.with_slot(slot);
        }
        for entry in &self.items {
            if entry.item.trim().is_empty() {
                return Err(invalid("item without an id".to_string()));
            }
            if !(entry.weight > 0.0) {
                return Err(invalid(format!("{} has weight {}", entry.item, entry.weight)));
            }
            let (min, max) = match (entry.amount, entry.min, entry.max) {
                (Some(n), _, _) => (n, n),
                (None, min, max) => (min.unwrap_or(1), max.or(min).unwrap_or(1)),
            };
            table.add_item(entry.weight, LootItem::new(&entry.item, min, max));
        }
        Ok(table)
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })
}

fn parse<T: for<'de> Deserialize<'de>>(path: &Path, text: &str) -> Result<T, ConfigError> {
    serde_json::from_str(text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
}

/// `.json` files of a directory, sorted by name.
fn json_files(dir: &Path) -> Result<Vec<(String, PathBuf)>, ConfigError> {
    let entries = fs::read_dir(dir).map_err(|source| ConfigError::Io { path: dir.to_path_buf(), source })?;
    let mut files: Vec<(String, PathBuf)> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|e| e == "json"))
        .filter_map(|p| Some((p.file_stem()?.to_str()?.to_string(), p)))
        .collect();
    files.sort();
    Ok(files)
}

/// Load every loot table in `dir`. Bad tables are logged and returned
/// alongside the registry.
pub fn load_loot_tables(dir: &Path) -> Result<(LootRegistry, Vec<ConfigError>), ConfigError> {
    let mut registry = LootRegistry::new();
    let mut skipped = Vec::new();
    for (name, path) in json_files(dir)? {
        let table = read(&path)
            .and_then(|text| parse::<LootTableConfig>(&path, &text))
            .and_then(|config| config.into_table(&name));
        match table {
            Ok(table) => registry.insert(table),
            Err(e) => {
                log::warn!("Skipping loot table {}: {}", name, e);
                skipped.push(e);
            }
        }
    }
    log::info!("Loaded {} loot tables from {:?}", registry.len(), dir);
    Ok((registry, skipped))
}

/// Load every structure in `dir`. Invalid structures are logged, excluded
/// and returned alongside the valid ones.
pub fn load_structures(
    dir: &Path,
    loot: &LootRegistry,
) -> Result<(Vec<StructureDefinition>, Vec<ConfigError>), ConfigError> {
    let mut structures = Vec::new();
    let mut skipped = Vec::new();
    for (name, path) in json_files(dir)? {
        let def = read(&path)
            .and_then(|text| parse::<StructureConfig>(&path, &text))
            .and_then(|config| config.into_definition(&name, loot));
        match def {
            Ok(def) => structures.push(def),
            Err(e) => {
                log::warn!("Skipping structure {}: {}", name, e);
                skipped.push(e);
            }
        }
    }
    log::info!("Loaded {} structures from {:?}", structures.len(), dir);
    Ok((structures, skipped))
}

/// Engine settings from an optional file, then environment overrides.
pub fn load_settings(path: Option<&Path>) -> Result<EngineSettings, ConfigError> {
    let settings = match path {
        Some(path) if path.exists() => parse(path, &read(path)?)?,
        _ => EngineSettings::default(),
    };
    Ok(settings.with_env_overrides())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::VerticalRule;
    use outpost_world::Rotation;

    const TOWER: &str = r#"{
        "schematic": "tower.nbt",
        "compiled_schematic": "tower",
        "chance_number": 1,
        "chance_out_of": 50,
        "priority": 2,
        "location": { "worlds": ["world"], "biomes": ["plains"], "x_limitation": 200, "spawn_y": "@-1" },
        "spawn": { "rotation": 180, "in_water": false },
        "limitations": {
            "flatness": { "mode": "flat_error", "error": 0.25, "x1": -2, "z1": -2, "x2": 2, "z2": 2 },
            "replace_blocks": { "stone_bricks": "cracked_stone_bricks" },
            "iteration_limit": 3
        },
        "source_mask": { "union": "or", "predicates": [ { "exclude": ["structure_void"] } ] },
        "loot_tables": { "chest": { "tower_chest": 3 }, "default": { "tower_misc": 1 } },
        "sub_schematics": [ { "file": "tower_room" } ],
        "advanced_sub_schematics": { "roofs": [ { "file": "spire", "weight": 2 }, { "file": "dome" } ] }
    }"#;

    fn loot() -> LootRegistry {
        let mut registry = LootRegistry::new();
        registry.insert(LootTable::new("tower_chest", 2).with_item(1.0, LootItem::single("bread")));
        registry.insert(LootTable::new("tower_misc", 1).with_item(1.0, LootItem::single("stick")));
        registry
    }

    #[test]
    fn test_full_structure_config() {
        let config: StructureConfig = serde_json::from_str(TOWER).expect("parse");
        let def = config.into_definition("tower", &loot()).expect("valid");

        assert_eq!(def.schematic(), "tower.nbt");
        assert_eq!(def.compiled(), Some("tower"));
        assert_eq!(def.priority(), 2);
        assert!(def.location().biomes.contains("minecraft:plains"));
        assert_eq!(def.location().vertical, VerticalRule::Offset(-1));
        assert_eq!(def.spawn().rotation, Rotation::Clockwise180);
        assert!(!def.spawn().in_water);
        assert_eq!(def.limits().iteration_limit, 3);
        assert!(matches!(
            def.limits().flatness.map(|f| f.mode),
            Some(FlatMode::FlatError { max_ratio }) if max_ratio == 0.25
        ));
        assert!(!def.source_mask().allows("minecraft:structure_void"));
        assert!(def.loot_tables(ContainerKind::Chest).is_some());
        assert_eq!(
            def.loot_tables(ContainerKind::Barrel).map(|c| c.to_vec()),
            Some(vec!["tower_misc".to_string()])
        );
        assert_eq!(def.sub_blueprints().len(), 1);
        assert_eq!(def.category("roofs").map(|c| c.total_weight()), Some(3.0));
    }

    #[test]
    fn test_unknown_loot_table_rejects_structure() {
        let config: StructureConfig = serde_json::from_str(TOWER).expect("parse");
        let err = config.into_definition("tower", &LootRegistry::new()).expect_err("unknown table");
        assert!(matches!(err, ConfigError::UnknownLootTable { .. }));
    }

    #[test]
    fn test_unknown_container_kind() {
        let config: StructureConfig = serde_json::from_str(
            r#"{ "schematic": "a", "chance_number": 1, "chance_out_of": 1, "loot_tables": { "cupboard": { "x": 1 } } }"#,
        )
        .expect("parse");
        let err = config.into_definition("a", &loot()).expect_err("bad kind");
        assert!(matches!(err, ConfigError::InvalidField { ref field, .. } if field == "loot_tables"));
    }

    #[test]
    fn test_loot_table_config() {
        let config: LootTableConfig = serde_json::from_str(
            r#"{ "rolls": 3, "slot": "fuel", "items": [
                { "item": "coal", "weight": 4, "min": 2, "max": 6 },
                { "item": "charcoal", "amount": 5 }
            ] }"#,
        )
        .expect("parse");
        let table = config.into_table("fuel").expect("valid");
        assert_eq!(table.rolls, 3);
        assert_eq!(table.slot, SlotRole::Fuel);
        let items = table.items().to_vec();
        assert_eq!(items[0], LootItem::new("coal", 2, 6));
        assert_eq!(items[1], LootItem::new("charcoal", 5, 5));

        let empty: LootTableConfig = serde_json::from_str(r#"{ "items": [] }"#).expect("parse");
        assert!(matches!(empty.into_table("e"), Err(ConfigError::InvalidLootTable { .. })));
    }

    #[test]
    fn test_load_directories_skip_bad_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loot_dir = dir.path().join("loot");
        let structure_dir = dir.path().join("structures");
        fs::create_dir_all(&loot_dir).expect("mkdir");
        fs::create_dir_all(&structure_dir).expect("mkdir");

        fs::write(loot_dir.join("tower_chest.json"), r#"{ "items": [ { "item": "bread" } ] }"#).expect("write");
        fs::write(loot_dir.join("tower_misc.json"), r#"{ "items": [ { "item": "stick" } ] }"#).expect("write");
        fs::write(loot_dir.join("broken.json"), "{ nope").expect("write");
        fs::write(structure_dir.join("tower.json"), TOWER).expect("write");
        fs::write(structure_dir.join("no_chance.json"), r#"{ "schematic": "x" }"#).expect("write");
        fs::write(structure_dir.join("notes.txt"), "ignored").expect("write");

        let (registry, bad_tables) = load_loot_tables(&loot_dir).expect("dir readable");
        assert_eq!(registry.len(), 2);
        assert_eq!(bad_tables.len(), 1);

        let (structures, bad) = load_structures(&structure_dir, &registry).expect("dir readable");
        assert_eq!(structures.iter().map(|s| s.name()).collect::<Vec<_>>(), vec!["tower"]);
        assert_eq!(bad.len(), 1);
        assert!(matches!(bad[0], ConfigError::MissingField { field: "chance_number", .. }));
    }

    #[test]
    fn test_settings_file_missing_uses_defaults() {
        let settings = load_settings(Some(Path::new("/definitely/not/here.json"))).expect("defaults");
        assert_eq!(settings.max_probe_steps, crate::context::DEFAULT_MAX_PROBE_STEPS);
    }
}
