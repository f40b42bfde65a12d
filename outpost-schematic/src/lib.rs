//! Blueprints ("schematics") and the stores they are loaded from.
//!
//! This module handles:
//! - The in-memory blueprint region with its own local origin
//! - Reading and writing vanilla structure files (gzip + NBT)
//! - Capturing a world region as a new blueprint
//! - Precompiled marker indexes that skip the post-placement region scan

pub mod capture;
pub mod compiled;
pub mod nbt;
pub mod store;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use outpost_world::{Block, BlockPos, Rotation};

pub use capture::capture;
pub use compiled::MarkerIndex;
pub use store::NbtBlueprintStore;

#[derive(Debug, thiserror::Error)]
pub enum BlueprintError {
    #[error("blueprint `{name}` not found ({path:?})")]
    NotFound { name: String, path: Option<PathBuf> },
    #[error("blueprint `{name}` is corrupt: {reason}")]
    Corrupt { name: String, reason: String },
    #[error("I/O error on blueprint `{name}`: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl BlueprintError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A saved 3-D block capture with its own local origin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Blueprint {
    /// Extent of the capture on each axis.
    pub size: [i32; 3],
    /// Local pivot; cells are placed at `target + rotate(local - origin)`.
    pub origin: BlockPos,
    /// Local positions in `0..size`. Air cells are kept; structure voids are not.
    pub cells: Vec<(BlockPos, Block)>,
    /// Entities by id and local block position.
    pub entities: Vec<(String, BlockPos)>,
}

impl Blueprint {
    pub fn new(size: [i32; 3]) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    pub fn set(&mut self, local: BlockPos, block: Block) {
        if let Some(slot) = self.cells.iter_mut().find(|(p, _)| *p == local) {
            slot.1 = block;
        } else {
            self.cells.push((local, block));
        }
    }

    pub fn get(&self, local: BlockPos) -> Option<&Block> {
        self.cells.iter().find(|(p, _)| *p == local).map(|(_, b)| b)
    }

    /// World position of a local cell for a paste at `target`.
    pub fn place_point(&self, target: BlockPos, rotation: Rotation, local: BlockPos) -> BlockPos {
        target + rotation.apply(local - self.origin)
    }

    /// Inclusive world bounds of the whole capture pasted at `target`.
    pub fn placed_bounds(&self, target: BlockPos, rotation: Rotation) -> (BlockPos, BlockPos) {
        let hi = BlockPos::new(
            (self.size[0] - 1).max(0),
            (self.size[1] - 1).max(0),
            (self.size[2] - 1).max(0),
        );
        let mut min = self.place_point(target, rotation, BlockPos::ORIGIN);
        let mut max = min;
        for x in [0, hi.x] {
            for y in [0, hi.y] {
                for z in [0, hi.z] {
                    let p = self.place_point(target, rotation, BlockPos::new(x, y, z));
                    min = min.min(p);
                    max = max.max(p);
                }
            }
        }
        (min, max)
    }

    /// Local positions of cells carrying a sign or container.
    pub fn block_entity_positions(&self) -> Vec<BlockPos> {
        self.cells
            .iter()
            .filter(|(_, b)| b.entity.is_some())
            .map(|(p, _)| *p)
            .collect()
    }
}

/// Source of blueprints by name.
pub trait BlueprintStore: Send + Sync {
    fn load(&self, name: &str) -> Result<Arc<Blueprint>, BlueprintError>;

    /// Persist a captured blueprint (authoring only).
    fn save(&self, name: &str, blueprint: &Blueprint) -> Result<(), BlueprintError>;

    /// Precompiled marker index stored next to a blueprint.
    fn load_compiled(&self, name: &str) -> Result<MarkerIndex, BlueprintError>;

    fn save_compiled(&self, name: &str, index: &MarkerIndex) -> Result<(), BlueprintError>;
}

/// Store backed by a map, for tests and embedded content.
#[derive(Default)]
pub struct MemoryBlueprintStore {
    blueprints: RwLock<HashMap<String, Arc<Blueprint>>>,
    compiled: RwLock<HashMap<String, MarkerIndex>>,
}

impl MemoryBlueprintStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: &str, blueprint: Blueprint) {
        if let Ok(mut map) = self.blueprints.write() {
            map.insert(name.to_string(), Arc::new(blueprint));
        }
    }
}

fn poisoned(name: &str) -> BlueprintError {
    BlueprintError::Corrupt {
        name: name.to_string(),
        reason: "store lock poisoned".to_string(),
    }
}

impl BlueprintStore for MemoryBlueprintStore {
    fn load(&self, name: &str) -> Result<Arc<Blueprint>, BlueprintError> {
        let map = self.blueprints.read().map_err(|_| poisoned(name))?;
        map.get(name).cloned().ok_or_else(|| BlueprintError::NotFound {
            name: name.to_string(),
            path: None,
        })
    }

    fn save(&self, name: &str, blueprint: &Blueprint) -> Result<(), BlueprintError> {
        let mut map = self.blueprints.write().map_err(|_| poisoned(name))?;
        map.insert(name.to_string(), Arc::new(blueprint.clone()));
        Ok(())
    }

    fn load_compiled(&self, name: &str) -> Result<MarkerIndex, BlueprintError> {
        let map = self.compiled.read().map_err(|_| poisoned(name))?;
        map.get(name).cloned().ok_or_else(|| BlueprintError::NotFound {
            name: name.to_string(),
            path: None,
        })
    }

    fn save_compiled(&self, name: &str, index: &MarkerIndex) -> Result<(), BlueprintError> {
        let mut map = self.compiled.write().map_err(|_| poisoned(name))?;
        map.insert(name.to_string(), index.clone());
        Ok(())
    }
}
