//! Host-facing facade: structure registry, chunk-load scans and ticking.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use outpost_schematic::BlueprintStore;
use outpost_world::{BlockPos, ChunkPos, World};

use crate::context::{EngineSettings, PlacementContext};
use crate::error::PlacementError;
use crate::events::{PasteRecord, PlacementObserver};
use crate::loot::LootRegistry;
use crate::picker::{ScanState, StructurePicker};
use crate::placement::place_structure;
use crate::scheduler::{self, Repeat, TaskHandle};
use crate::site::Site;
use crate::structure::StructureDefinition;

/// Read-only set of loaded structures, replaced wholesale on reload.
#[derive(Debug, Clone, Default)]
pub struct StructureRegistry {
    structures: Arc<Vec<Arc<StructureDefinition>>>,
}

impl StructureRegistry {
    /// Later definitions with an already registered name are dropped.
    pub fn new(definitions: Vec<StructureDefinition>) -> Self {
        let mut seen = HashSet::new();
        let mut structures = Vec::with_capacity(definitions.len());
        for def in definitions {
            if !seen.insert(def.name().to_string()) {
                log::warn!("Duplicate structure {} ignored", def.name());
                continue;
            }
            structures.push(Arc::new(def));
        }
        Self {
            structures: Arc::new(structures),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<StructureDefinition>> {
        self.structures.iter().find(|s| s.name() == name).cloned()
    }

    pub fn get_index(&self, index: usize) -> Option<Arc<StructureDefinition>> {
        self.structures.get(index).cloned()
    }

    /// The current set; scans keep the snapshot they started with.
    pub fn snapshot(&self) -> Arc<Vec<Arc<StructureDefinition>>> {
        Arc::clone(&self.structures)
    }

    pub fn names(&self) -> Vec<&str> {
        self.structures.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.structures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }
}

pub struct Engine<W: World + 'static> {
    ctx: PlacementContext<W>,
    registry: StructureRegistry,
    scans: HashMap<ChunkPos, TaskHandle>,
    scanned: HashSet<ChunkPos>,
}

impl<W: World + 'static> Engine<W> {
    pub fn new(
        world: W,
        blueprints: Arc<dyn BlueprintStore>,
        loot: LootRegistry,
        structures: Vec<StructureDefinition>,
        settings: EngineSettings,
        seed: u64,
    ) -> Self {
        let registry = StructureRegistry::new(structures);
        log::info!("Engine ready with {} structures, {} loot tables", registry.len(), loot.len());
        Self {
            ctx: PlacementContext::new(world, blueprints, loot, settings, seed),
            registry,
            scans: HashMap::new(),
            scanned: HashSet::new(),
        }
    }

    pub fn from_context(ctx: PlacementContext<W>, structures: Vec<StructureDefinition>) -> Self {
        Self {
            ctx,
            registry: StructureRegistry::new(structures),
            scans: HashMap::new(),
            scanned: HashSet::new(),
        }
    }

    pub fn registry(&self) -> &StructureRegistry {
        &self.registry
    }

    pub fn context(&self) -> &PlacementContext<W> {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut PlacementContext<W> {
        &mut self.ctx
    }

    pub fn world(&self) -> &W {
        &self.ctx.world
    }

    pub fn world_mut(&mut self) -> &mut W {
        &mut self.ctx.world
    }

    pub fn subscribe(&mut self, observer: impl PlacementObserver + 'static) {
        self.ctx.events.subscribe(observer);
    }

    /// Current tick.
    pub fn now(&self) -> u64 {
        self.ctx.scheduler.now()
    }

    /// Replace every structure and loot table. Running scans are cancelled;
    /// deferred passes already queued finish with the old definitions.
    pub fn reload(&mut self, structures: Vec<StructureDefinition>, loot: LootRegistry) {
        self.cancel_scans();
        self.registry = StructureRegistry::new(structures);
        self.ctx.loot = Arc::new(loot);
        log::info!("Reloaded {} structures", self.registry.len());
    }

    /// Start scanning a freshly loaded chunk. Each chunk is scanned at most
    /// once; chunks in ignored worlds are never scanned.
    pub fn on_chunk_load(&mut self, chunk: ChunkPos) -> Option<TaskHandle> {
        if self.ctx.settings.ignored_worlds.contains(self.ctx.world.name()) {
            return None;
        }
        if self.registry.is_empty() || !self.scanned.insert(chunk) {
            return None;
        }

        let site = Site::for_chunk(&self.ctx.world, chunk);
        let mut picker = StructurePicker::new(site, self.registry.snapshot());
        let interval = self.ctx.settings.scan_interval;
        let handle = self.ctx.scheduler.run_repeating(interval, move |ctx: &mut PlacementContext<W>| {
            match picker.step(ctx) {
                ScanState::Idle | ScanState::Scanning(_) => Repeat::Continue,
                ScanState::Committed | ScanState::Exhausted | ScanState::Cancelled => Repeat::Done,
            }
        });
        self.scans.insert(chunk, handle);
        Some(handle)
    }

    /// Cancel the scan of one chunk, if still running.
    pub fn cancel_scan(&mut self, chunk: ChunkPos) {
        if let Some(handle) = self.scans.remove(&chunk) {
            self.ctx.scheduler.cancel(handle);
        }
    }

    pub fn cancel_scans(&mut self) {
        for (_, handle) in self.scans.drain() {
            self.ctx.scheduler.cancel(handle);
        }
    }

    pub fn active_scans(&self) -> usize {
        self.scans
            .values()
            .filter(|h| self.ctx.scheduler.is_scheduled(**h))
            .count()
    }

    /// Place a structure by name at `anchor` right now, skipping eligibility
    /// and refinement.
    pub fn place_now(&mut self, name: &str, anchor: BlockPos) -> Result<PasteRecord, PlacementError> {
        let structure = self
            .registry
            .get(name)
            .ok_or_else(|| PlacementError::UnknownStructure(name.to_string()))?;
        place_structure(&mut self.ctx, structure, anchor)
    }

    /// Run one tick. A fatal placement error latched during this or an
    /// earlier tick is returned, after which the host should stop.
    pub fn tick(&mut self) -> Result<usize, PlacementError> {
        let ran = scheduler::tick(&mut self.ctx);
        let scheduler = &self.ctx.scheduler;
        self.scans.retain(|_, h| scheduler.is_scheduled(*h));
        match self.ctx.take_fatal() {
            Some(err) => Err(err),
            None => Ok(ran),
        }
    }

    /// Tick until nothing is queued, at most `max_ticks` times. Returns the
    /// number of ticks run.
    pub fn run_until_idle(&mut self, max_ticks: u64) -> Result<u64, PlacementError> {
        if let Some(err) = self.ctx.take_fatal() {
            return Err(err);
        }
        let mut ticks = 0;
        while ticks < max_ticks && !self.ctx.scheduler.is_idle() {
            self.tick()?;
            ticks += 1;
        }
        Ok(ticks)
    }
}
