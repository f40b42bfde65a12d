//! Observer interface for placements, marker effects and container fills.

use outpost_world::{BlockPos, ContainerKind, Rotation};
use serde::Serialize;

use crate::loot::{FillReport, LootTable};
use crate::marker::MarkerEffect;

/// One bulk copy, at any depth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PasteRecord {
    pub structure: String,
    pub blueprint: String,
    pub location: BlockPos,
    pub min: BlockPos,
    pub max: BlockPos,
    pub rotation: Rotation,
    pub depth: u32,
    pub cells_written: usize,
}

/// Emitted once per top-level placement, after its own deferred pass.
///
/// Sub-blueprints placed by that pass schedule deferred passes of their own
/// which may still be pending when this record is emitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacementRecord {
    pub structure: String,
    pub blueprint: String,
    pub world: String,
    pub min: BlockPos,
    pub max: BlockPos,
    pub rotation: Rotation,
    pub depth: u32,
    /// Every marker sign the deferred pass dispatched.
    pub markers: Vec<BlockPos>,
    /// Every container visited, one entry per multi-cell container.
    pub containers: Vec<BlockPos>,
}

/// Offered to observers before a container is filled.
#[derive(Debug)]
pub struct FillEvent<'a> {
    pub structure: &'a str,
    pub pos: BlockPos,
    pub container: ContainerKind,
    pub table: &'a LootTable,
    pub rolls: u32,
    cancelled: bool,
}

impl<'a> FillEvent<'a> {
    pub fn new(structure: &'a str, pos: BlockPos, container: ContainerKind, table: &'a LootTable, rolls: u32) -> Self {
        Self {
            structure,
            pos,
            container,
            table,
            rolls,
            cancelled: false,
        }
    }

    /// Suppress the whole fill for this container.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Every callback defaults to a no-op.
pub trait PlacementObserver {
    fn on_paste(&mut self, _paste: &PasteRecord) {}

    fn on_marker(&mut self, _pos: BlockPos, _effect: &MarkerEffect) {}

    fn on_before_fill(&mut self, _event: &mut FillEvent<'_>) {}

    fn on_filled(&mut self, _pos: BlockPos, _report: &FillReport) {}

    fn on_structure_placed(&mut self, _record: &PlacementRecord) {}
}

#[derive(Default)]
pub struct EventBus {
    observers: Vec<Box<dyn PlacementObserver>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: impl PlacementObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub(crate) fn paste(&mut self, paste: &PasteRecord) {
        for o in &mut self.observers {
            o.on_paste(paste);
        }
    }

    pub(crate) fn marker(&mut self, pos: BlockPos, effect: &MarkerEffect) {
        for o in &mut self.observers {
            o.on_marker(pos, effect);
        }
    }

    /// Returns false when any observer cancelled the fill.
    pub(crate) fn before_fill(&mut self, event: &mut FillEvent<'_>) -> bool {
        for o in &mut self.observers {
            o.on_before_fill(event);
        }
        !event.is_cancelled()
    }

    pub(crate) fn filled(&mut self, pos: BlockPos, report: &FillReport) {
        for o in &mut self.observers {
            o.on_filled(pos, report);
        }
    }

    pub(crate) fn structure_placed(&mut self, record: &PlacementRecord) {
        for o in &mut self.observers {
            o.on_structure_placed(record);
        }
    }
}

/// Observer that hands completed placements to a closure.
pub struct OnPlaced<F>(pub F);

impl<F: FnMut(&PlacementRecord)> PlacementObserver for OnPlaced<F> {
    fn on_structure_placed(&mut self, record: &PlacementRecord) {
        (self.0)(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Veto;

    impl PlacementObserver for Veto {
        fn on_before_fill(&mut self, event: &mut FillEvent<'_>) {
            if event.container == ContainerKind::Barrel {
                event.cancel();
            }
        }
    }

    #[test]
    fn test_any_observer_can_cancel_fill() {
        let mut bus = EventBus::new();
        bus.subscribe(Veto);
        let table = LootTable::new("t", 1);

        let mut chest = FillEvent::new("hut", BlockPos::ORIGIN, ContainerKind::Chest, &table, 1);
        assert!(bus.before_fill(&mut chest));

        let mut barrel = FillEvent::new("hut", BlockPos::ORIGIN, ContainerKind::Barrel, &table, 1);
        assert!(!bus.before_fill(&mut barrel));
    }

    #[test]
    fn test_on_placed_closure() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut bus = EventBus::new();
        bus.subscribe(OnPlaced(move |r: &PlacementRecord| sink.borrow_mut().push(r.structure.clone())));

        bus.structure_placed(&PlacementRecord {
            structure: "hut".into(),
            blueprint: "hut".into(),
            world: "world".into(),
            min: BlockPos::ORIGIN,
            max: BlockPos::new(2, 2, 2),
            rotation: Rotation::None,
            depth: 0,
            markers: vec![],
            containers: vec![],
        });
        assert_eq!(*seen.borrow(), vec!["hut".to_string()]);
    }
}
