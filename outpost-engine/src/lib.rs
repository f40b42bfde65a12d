//! Structure selection and placement for a voxel world.
//!
//! This crate handles:
//! - Structure definitions, their eligibility rules and JSON configuration
//! - Ordering candidates per chunk and refining each one to an anchor
//! - Pasting blueprints, then a deferred pass over markers and containers
//! - Weighted loot filling with per-container overrides
//! - A tick scheduler that drives all of the above on the world thread

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod loot;
pub mod marker;
pub mod mask;
pub mod picker;
pub mod placement;
pub mod queue;
pub mod scheduler;
pub mod site;
pub mod structure;
pub mod weighted;

pub use context::{EngineSettings, PlacementContext};
pub use engine::{Engine, StructureRegistry};
pub use error::{ConfigError, MarkerError, PlacementError};
pub use events::{FillEvent, OnPlaced, PasteRecord, PlacementObserver, PlacementRecord};
pub use loot::{FillReport, LootItem, LootRegistry, LootTable};
pub use marker::{MarkerHandler, MarkerRegistry};
pub use mask::{MaskPredicate, MaskSet, MaskUnion};
pub use picker::{Rejection, ScanState, StructurePicker};
pub use placement::{FilledContainers, PasteRequest, paste, place_structure};
pub use queue::PriorityStructureQueue;
pub use scheduler::{Repeat, Scheduler, TaskHandle};
pub use site::Site;
pub use structure::{StructureBuilder, StructureDefinition, SubBlueprint, VerticalRule};
pub use weighted::WeightedCollection;
