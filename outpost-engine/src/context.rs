//! Everything a placement needs, passed explicitly.

use std::collections::HashSet;
use std::sync::Arc;

use outpost_schematic::BlueprintStore;
use outpost_world::World;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;

use crate::error::PlacementError;
use crate::events::EventBus;
use crate::loot::LootRegistry;
use crate::marker::MarkerRegistry;
use crate::scheduler::{Scheduler, TaskHost};

pub const DEFAULT_POST_PROCESS_DELAY: u64 = 20;
pub const DEFAULT_MAX_PROBE_STEPS: u32 = 20;

/// Get a tick count from the environment or the given default
fn env_ticks(var: &str, default: u64) -> u64 {
    match std::env::var(var).ok().and_then(|v| v.trim().parse().ok()) {
        Some(v) => {
            log::info!("{} overridden to {}", var, v);
            v
        }
        None => default,
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Ticks between a bulk copy and its marker/loot pass.
    pub post_process_delay: u64,
    /// Ticks between two candidates of one site scan.
    pub scan_interval: u64,
    /// Cap on downward probe steps while resolving an anchor.
    pub max_probe_steps: u32,
    /// Worlds in which chunk loads never start a scan.
    pub ignored_worlds: HashSet<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            post_process_delay: DEFAULT_POST_PROCESS_DELAY,
            scan_interval: 1,
            max_probe_steps: DEFAULT_MAX_PROBE_STEPS,
            ignored_worlds: HashSet::new(),
        }
    }
}

impl EngineSettings {
    /// Apply `OUTPOST_PASTE_DELAY` and `OUTPOST_SCAN_INTERVAL`.
    pub fn with_env_overrides(mut self) -> Self {
        self.post_process_delay = env_ticks("OUTPOST_PASTE_DELAY", self.post_process_delay);
        self.scan_interval = env_ticks("OUTPOST_SCAN_INTERVAL", self.scan_interval);
        self
    }
}

pub struct PlacementContext<W: World> {
    pub world: W,
    pub scheduler: Scheduler<PlacementContext<W>>,
    pub rng: ChaCha8Rng,
    pub events: EventBus,
    pub blueprints: Arc<dyn BlueprintStore>,
    pub markers: Arc<MarkerRegistry>,
    pub loot: Arc<LootRegistry>,
    pub settings: EngineSettings,
    fatal: Option<PlacementError>,
}

impl<W: World> PlacementContext<W> {
    /// Context with the built-in marker handlers and a seeded random source.
    pub fn new(
        world: W,
        blueprints: Arc<dyn BlueprintStore>,
        loot: LootRegistry,
        settings: EngineSettings,
        seed: u64,
    ) -> Self {
        Self {
            world,
            scheduler: Scheduler::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            events: EventBus::new(),
            blueprints,
            markers: Arc::new(MarkerRegistry::new()),
            loot: Arc::new(loot),
            settings,
            fatal: None,
        }
    }

    pub fn with_markers(mut self, markers: MarkerRegistry) -> Self {
        self.markers = Arc::new(markers);
        self
    }

    /// Record an error that must stop the host. The first one wins.
    pub fn latch_fatal(&mut self, err: PlacementError) {
        log::error!("Fatal placement error: {}", err);
        if self.fatal.is_none() {
            self.fatal = Some(err);
        }
    }

    pub fn fatal(&self) -> Option<&PlacementError> {
        self.fatal.as_ref()
    }

    pub fn take_fatal(&mut self) -> Option<PlacementError> {
        self.fatal.take()
    }
}

impl<W: World> TaskHost for PlacementContext<W> {
    fn scheduler(&mut self) -> &mut Scheduler<Self> {
        &mut self.scheduler
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults_and_partial_json() {
        let settings: EngineSettings =
            serde_json::from_str(r#"{ "post_process_delay": 5, "ignored_worlds": ["lobby"] }"#).expect("parse");
        assert_eq!(settings.post_process_delay, 5);
        assert_eq!(settings.scan_interval, 1);
        assert_eq!(settings.max_probe_steps, DEFAULT_MAX_PROBE_STEPS);
        assert!(settings.ignored_worlds.contains("lobby"));
    }
}
