//! NBT (Named Binary Tag) structures for vanilla structure files.
//!
//! These structures are (de)serialized with fastnbt and match the layout
//! the game writes from a structure block (`.nbt`, gzip-compressed).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use fastnbt::Value;
use outpost_world::{
    Block, BlockEntity, BlockPos, Container, ContainerKind, Facing, ItemStack, Rotation, Sign,
    normalize_kind,
};

use crate::Blueprint;

/// Minecraft data version for 1.21.11 (default).
/// Can be overridden by OUTPOST_DATA_VERSION env var.
pub fn get_data_version() -> i32 {
    std::env::var("OUTPOST_DATA_VERSION")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(4671)
}

const STRUCTURE_VOID: &str = "minecraft:structure_void";

/// Root of a structure file.
#[derive(Debug, Serialize, Deserialize)]
pub struct StructureFile {
    #[serde(rename = "DataVersion")]
    pub data_version: i32,

    // [x, y, z]
    pub size: Vec<i32>,

    // Single palette. Files saved with random variants use `palettes`.
    #[serde(default)]
    pub palette: Vec<PaletteEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub palettes: Option<Vec<Vec<PaletteEntry>>>,

    pub blocks: Vec<StructureBlock>,

    #[serde(default)]
    pub entities: Vec<StructureEntity>,
}

// --- Palette entry (block state) ---
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PaletteEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Properties", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

// --- Single block: palette index + local position + block entity data ---
#[derive(Debug, Serialize, Deserialize)]
pub struct StructureBlock {
    pub state: i32,
    pub pos: Vec<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbt: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StructureEntity {
    pub pos: Vec<f64>,
    #[serde(rename = "blockPos")]
    pub block_pos: Vec<i32>,
    pub nbt: Value,
}

fn triple(v: &[i32]) -> Option<BlockPos> {
    match v {
        [x, y, z] => Some(BlockPos::new(*x, *y, *z)),
        _ => None,
    }
}

fn get<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Compound(map) => map.get(key),
        _ => None,
    }
}

fn as_str(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        _ => None,
    }
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Byte(v) => Some(*v as i64),
        Value::Short(v) => Some(*v as i64),
        Value::Int(v) => Some(*v as i64),
        Value::Long(v) => Some(*v),
        _ => None,
    }
}

/// Sign and name texts are JSON text components; plain strings pass through.
fn text_component(raw: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::String(s)) => s,
        Ok(serde_json::Value::Object(obj)) => obj
            .get("text")
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string(),
        _ => raw.to_string(),
    }
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(text_component(s)),
        Value::Compound(_) => get(value, "text").and_then(as_str).map(str::to_string),
        _ => None,
    }
}

fn sign_lines(nbt: &Value) -> [String; 4] {
    let mut lines: [String; 4] = Default::default();
    if let Some(Value::List(messages)) = get(nbt, "front_text").and_then(|t| get(t, "messages")) {
        for (line, message) in lines.iter_mut().zip(messages) {
            *line = text_value(message).unwrap_or_default();
        }
        return lines;
    }
    // Pre-1.20 layout
    for (i, line) in lines.iter_mut().enumerate() {
        if let Some(text) = get(nbt, &format!("Text{}", i + 1)).and_then(text_value) {
            *line = text;
        }
    }
    lines
}

fn sign_facing(properties: &BTreeMap<String, String>) -> Facing {
    if let Some(facing) = properties.get("facing").and_then(|f| Facing::parse(f)) {
        return facing;
    }
    properties
        .get("rotation")
        .and_then(|r| r.parse::<u8>().ok())
        .map(Facing::from_sign_rotation)
        .unwrap_or(Facing::North)
}

fn container_items(nbt: &Value, container: &mut Container) {
    let Some(Value::List(items)) = get(nbt, "Items") else {
        return;
    };
    for item in items {
        let slot = get(item, "Slot").and_then(as_int);
        let id = get(item, "id").and_then(as_str);
        let count = get(item, "count")
            .or_else(|| get(item, "Count"))
            .and_then(as_int)
            .unwrap_or(1);
        if let (Some(slot), Some(id)) = (slot, id) {
            if let Some(cell) = container.slots.get_mut(slot as usize) {
                *cell = Some(ItemStack::new(id, count.max(1) as u32));
            }
        }
    }
}

/// Relative position of the other half of a double chest.
fn chest_partner(properties: &BTreeMap<String, String>) -> Option<BlockPos> {
    let facing = properties.get("facing").and_then(|f| Facing::parse(f))?;
    match properties.get("type").map(String::as_str) {
        Some("left") => Some(Rotation::Clockwise90.apply_facing(facing).step()),
        Some("right") => Some(Rotation::CounterClockwise90.apply_facing(facing).step()),
        _ => None,
    }
}

fn decode_block(entry: &PaletteEntry, nbt: Option<&Value>) -> Block {
    let mut block = Block::new(&entry.name);
    block.properties = entry.properties.clone();

    if block.kind.ends_with("_sign") {
        let lines = nbt.map(sign_lines).unwrap_or_default();
        let facing = sign_facing(&block.properties);
        block.entity = Some(BlockEntity::Sign(Sign { facing, lines }));
    } else if let Some(kind) = ContainerKind::from_block_kind(&block.kind) {
        let mut container = Container::new(kind);
        if let Some(nbt) = nbt {
            container_items(nbt, &mut container);
            container.custom_name = get(nbt, "CustomName").and_then(text_value);
        }
        container.partner = chest_partner(&block.properties);
        block.entity = Some(BlockEntity::Container(container));
    }
    block
}

impl StructureFile {
    /// Convert into an in-memory blueprint; the error is a reason string.
    pub fn into_blueprint(self) -> Result<Blueprint, String> {
        let size = triple(&self.size).ok_or_else(|| format!("bad size {:?}", self.size))?;
        let palette = if self.palette.is_empty() {
            self.palettes
                .and_then(|p| p.into_iter().next())
                .unwrap_or_default()
        } else {
            self.palette
        };

        let mut blueprint = Blueprint::new([size.x, size.y, size.z]);
        for block in self.blocks {
            let pos = triple(&block.pos).ok_or_else(|| format!("bad block pos {:?}", block.pos))?;
            let entry = palette
                .get(block.state as usize)
                .ok_or_else(|| format!("palette index {} out of range", block.state))?;
            if normalize_kind(&entry.name) == STRUCTURE_VOID {
                continue;
            }
            blueprint.cells.push((pos, decode_block(entry, block.nbt.as_ref())));
        }

        for entity in self.entities {
            let id = get(&entity.nbt, "id").and_then(as_str).map(str::to_string);
            if let (Some(id), Some(pos)) = (id, triple(&entity.block_pos)) {
                blueprint.entities.push((id, pos));
            }
        }
        Ok(blueprint)
    }

    /// Build the on-disk representation of a blueprint.
    pub fn from_blueprint(blueprint: &Blueprint) -> Self {
        let mut palette: Vec<PaletteEntry> = Vec::new();
        let mut index: HashMap<PaletteEntry, i32> = HashMap::new();
        let mut blocks = Vec::with_capacity(blueprint.cells.len());

        for (pos, block) in &blueprint.cells {
            let entry = PaletteEntry {
                name: block.kind.clone(),
                properties: block.properties.clone(),
            };
            let state = *index.entry(entry.clone()).or_insert_with(|| {
                palette.push(entry);
                palette.len() as i32 - 1
            });
            blocks.push(StructureBlock {
                state,
                pos: vec![pos.x, pos.y, pos.z],
                nbt: block.entity.as_ref().map(|e| encode_entity(&block.kind, e)),
            });
        }

        let entities = blueprint
            .entities
            .iter()
            .map(|(id, pos)| StructureEntity {
                pos: vec![pos.x as f64 + 0.5, pos.y as f64, pos.z as f64 + 0.5],
                block_pos: vec![pos.x, pos.y, pos.z],
                nbt: Value::Compound(HashMap::from([("id".to_string(), Value::String(id.clone()))])),
            })
            .collect();

        Self {
            data_version: get_data_version(),
            size: blueprint.size.to_vec(),
            palette,
            palettes: None,
            blocks,
            entities,
        }
    }
}

fn json_text(text: &str) -> Value {
    Value::String(serde_json::Value::String(text.to_string()).to_string())
}

fn encode_entity(kind: &str, entity: &BlockEntity) -> Value {
    let mut map = HashMap::new();
    match entity {
        BlockEntity::Sign(sign) => {
            map.insert("id".to_string(), Value::String("minecraft:sign".to_string()));
            let messages = sign.lines.iter().map(|l| json_text(l)).collect();
            let front = HashMap::from([
                ("messages".to_string(), Value::List(messages)),
                ("color".to_string(), Value::String("black".to_string())),
                ("has_glowing_text".to_string(), Value::Byte(0)),
            ]);
            map.insert("front_text".to_string(), Value::Compound(front));
        }
        BlockEntity::Container(container) => {
            map.insert("id".to_string(), Value::String(kind.to_string()));
            let items = container
                .slots
                .iter()
                .enumerate()
                .filter_map(|(slot, stack)| {
                    let stack = stack.as_ref()?;
                    Some(Value::Compound(HashMap::from([
                        ("Slot".to_string(), Value::Byte(slot as i8)),
                        ("id".to_string(), Value::String(stack.item.clone())),
                        ("count".to_string(), Value::Int(stack.count as i32)),
                    ])))
                })
                .collect();
            map.insert("Items".to_string(), Value::List(items));
            if let Some(name) = &container.custom_name {
                map.insert("CustomName".to_string(), json_text(name));
            }
        }
    }
    Value::Compound(map)
}
