//! Blocks, block entities and block-kind classification.
//!
//! Block kinds are namespaced ids such as `minecraft:stone`. Ids without a
//! namespace are treated as `minecraft:` ids by [`normalize_kind`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::pos::{BlockPos, Facing, Rotation};

pub const AIR: &str = "minecraft:air";

/// Maximum stack size for every item (tools are not special-cased).
pub const MAX_STACK: u32 = 64;

/// Add the `minecraft:` namespace to bare ids and lower-case them.
pub fn normalize_kind(kind: &str) -> String {
    let kind = kind.trim().to_ascii_lowercase();
    if kind.contains(':') {
        kind
    } else {
        format!("minecraft:{kind}")
    }
}

fn path(kind: &str) -> &str {
    kind.split_once(':').map_or(kind, |(_, p)| p)
}

pub fn is_air(kind: &str) -> bool {
    matches!(path(kind), "air" | "cave_air" | "void_air")
}

/// Water and the blocks that only exist submerged.
pub fn is_water_like(kind: &str) -> bool {
    matches!(
        path(kind),
        "water" | "bubble_column" | "kelp" | "kelp_plant" | "seagrass" | "tall_seagrass"
    )
}

pub fn is_lava(kind: &str) -> bool {
    path(kind) == "lava"
}

/// Foliage a structure may be placed through when it ignores plants.
pub fn is_plant_like(kind: &str) -> bool {
    let p = path(kind);
    matches!(
        p,
        "grass"
            | "short_grass"
            | "tall_grass"
            | "fern"
            | "large_fern"
            | "dead_bush"
            | "vine"
            | "snow"
            | "sweet_berry_bush"
            | "sugar_cane"
            | "dandelion"
            | "poppy"
            | "blue_orchid"
            | "allium"
            | "azure_bluet"
            | "oxeye_daisy"
            | "cornflower"
            | "lily_of_the_valley"
            | "sunflower"
            | "lilac"
            | "rose_bush"
            | "peony"
    ) || p.ends_with("_leaves")
        || p.ends_with("_sapling")
        || p.ends_with("_tulip")
        || p.ends_with("_mushroom")
}

/// Role of a slot in a container with fixed-purpose slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotRole {
    General,
    Ingredient,
    Fuel,
    Result,
}

/// Kinds of storage block the loot engine knows how to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Chest,
    TrappedChest,
    Barrel,
    ShulkerBox,
    Hopper,
    Dispenser,
    Dropper,
    Furnace,
    BlastFurnace,
    Smoker,
    BrewingStand,
}

impl ContainerKind {
    /// Container kind for a block id, if the block stores items.
    pub fn from_block_kind(kind: &str) -> Option<Self> {
        let p = path(kind);
        Some(match p {
            "chest" => Self::Chest,
            "trapped_chest" => Self::TrappedChest,
            "barrel" => Self::Barrel,
            "hopper" => Self::Hopper,
            "dispenser" => Self::Dispenser,
            "dropper" => Self::Dropper,
            "furnace" => Self::Furnace,
            "blast_furnace" => Self::BlastFurnace,
            "smoker" => Self::Smoker,
            "brewing_stand" => Self::BrewingStand,
            _ if p.ends_with("shulker_box") => Self::ShulkerBox,
            _ => return None,
        })
    }

    /// Slot layout; general containers have only `General` slots.
    pub fn slot_roles(self) -> &'static [SlotRole] {
        use SlotRole::*;
        match self {
            Self::Chest | Self::TrappedChest | Self::Barrel | Self::ShulkerBox => &[General; 27],
            Self::Hopper => &[General; 5],
            Self::Dispenser | Self::Dropper => &[General; 9],
            Self::Furnace | Self::BlastFurnace | Self::Smoker => &[Ingredient, Fuel, Result],
            Self::BrewingStand => &[Result, Result, Result, Ingredient, Fuel],
        }
    }

    pub fn slot_count(self) -> usize {
        self.slot_roles().len()
    }

    /// Single-purpose containers never stack and fill by slot role.
    pub fn is_single_purpose(self) -> bool {
        !self.slot_roles().iter().all(|r| *r == SlotRole::General)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item: String,
    pub count: u32,
}

impl ItemStack {
    pub fn new(item: impl Into<String>, count: u32) -> Self {
        Self { item: item.into(), count }
    }
}

/// Inventory-bearing block entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub kind: ContainerKind,
    pub slots: Vec<Option<ItemStack>>,
    #[serde(default)]
    pub custom_name: Option<String>,
    /// Relative offset of the other half of a double chest.
    #[serde(default)]
    pub partner: Option<BlockPos>,
}

impl Container {
    pub fn new(kind: ContainerKind) -> Self {
        Self {
            kind,
            slots: vec![None; kind.slot_count()],
            custom_name: None,
            partner: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn item_count(&self) -> u32 {
        self.slots.iter().flatten().map(|s| s.count).sum()
    }
}

/// Sign used as an in-world marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sign {
    pub facing: Facing,
    pub lines: [String; 4],
}

impl Sign {
    pub fn new(facing: Facing, lines: [&str; 4]) -> Self {
        Self {
            facing,
            lines: lines.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlockEntity {
    Sign(Sign),
    Container(Container),
}

/// One cell of the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub kind: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub entity: Option<BlockEntity>,
}

impl Block {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: normalize_kind(kind),
            properties: BTreeMap::new(),
            entity: None,
        }
    }

    pub fn air() -> Self {
        Self::new(AIR)
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_entity(mut self, entity: BlockEntity) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Wall sign carrying marker text.
    pub fn sign(facing: Facing, lines: [&str; 4]) -> Self {
        Self::new("minecraft:oak_wall_sign")
            .with_property("facing", facing.name())
            .with_entity(BlockEntity::Sign(Sign::new(facing, lines)))
    }

    /// Empty container block of the given id.
    pub fn container(kind: &str) -> Option<Self> {
        let block = Self::new(kind);
        let container_kind = ContainerKind::from_block_kind(&block.kind)?;
        Some(block.with_entity(BlockEntity::Container(Container::new(container_kind))))
    }

    pub fn is_air(&self) -> bool {
        is_air(&self.kind)
    }

    pub fn sign_entity(&self) -> Option<&Sign> {
        match &self.entity {
            Some(BlockEntity::Sign(sign)) => Some(sign),
            _ => None,
        }
    }

    pub fn container_entity(&self) -> Option<&Container> {
        match &self.entity {
            Some(BlockEntity::Container(container)) => Some(container),
            _ => None,
        }
    }

    /// Turn every direction-bearing part of the block by `rotation`.
    pub fn rotated(mut self, rotation: Rotation) -> Self {
        if rotation == Rotation::None {
            return self;
        }
        if let Some(facing) = self.properties.get("facing").and_then(|f| Facing::parse(f)) {
            let turned = rotation.apply_facing(facing);
            self.properties.insert("facing".to_string(), turned.name().to_string());
        }
        // Standing signs and banners use sixteenths of a turn
        if let Some(r) = self.properties.get("rotation").and_then(|r| r.parse::<i32>().ok()) {
            let turned = (r + rotation.degrees() / 90 * 4).rem_euclid(16);
            self.properties.insert("rotation".to_string(), turned.to_string());
        }
        match &mut self.entity {
            Some(BlockEntity::Sign(sign)) => sign.facing = rotation.apply_facing(sign.facing),
            Some(BlockEntity::Container(container)) => {
                container.partner = container.partner.map(|p| rotation.apply(p));
            }
            None => {}
        }
        self
    }
}
