//! Best-first ordering of the structures eligible for one site.

use std::collections::VecDeque;
use std::sync::Arc;

use rand::Rng;

use crate::site::Site;
use crate::structure::StructureDefinition;

/// Eligible structures for a site, ascending priority then ascending
/// probability. Equal keys keep registration order.
#[derive(Debug, Clone, Default)]
pub struct PriorityStructureQueue {
    entries: VecDeque<Arc<StructureDefinition>>,
}

impl PriorityStructureQueue {
    /// Filter `structures` through [`StructureDefinition::can_spawn`] and
    /// order the survivors.
    pub fn build<R: Rng + ?Sized>(
        structures: &[Arc<StructureDefinition>],
        site: &Site,
        biome: &str,
        rng: &mut R,
    ) -> Self {
        let eligible = structures
            .iter()
            .filter(|s| s.can_spawn(site, biome, rng))
            .cloned()
            .collect();
        Self::ordered(eligible)
    }

    /// Order without any eligibility filtering.
    pub fn ordered(mut structures: Vec<Arc<StructureDefinition>>) -> Self {
        structures.sort_by(|a, b| {
            a.priority()
                .cmp(&b.priority())
                .then_with(|| a.probability().total_cmp(&b.probability()))
        });
        Self {
            entries: structures.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|s| s.name()).collect()
    }
}

impl Iterator for PriorityStructureQueue {
    type Item = Arc<StructureDefinition>;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outpost_world::BlockPos;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn def(name: &str, priority: i32, number: u32, out_of: u32) -> Arc<StructureDefinition> {
        Arc::new(
            StructureDefinition::builder(name)
                .schematic(name)
                .chance(number, out_of)
                .priority(priority)
                .build()
                .expect("valid"),
        )
    }

    #[test]
    fn test_priority_then_rarity() {
        let structures = vec![def("A", 1, 50, 100), def("B", 1, 10, 100), def("C", 0, 90, 100)];
        let queue = PriorityStructureQueue::ordered(structures);
        assert_eq!(queue.names(), vec!["C", "B", "A"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let structures = vec![def("x", 0, 1, 2), def("y", 0, 2, 4), def("z", 0, 5, 10)];
        let queue = PriorityStructureQueue::ordered(structures);
        assert_eq!(queue.names(), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_build_filters_ineligible() {
        let mut other_world = StructureDefinition::builder("nether_only")
            .schematic("n")
            .chance(1, 1)
            .world("world_nether");
        other_world = other_world.priority(-5);
        let structures = vec![
            def("always", 3, 1, 1),
            Arc::new(other_world.build().expect("valid")),
            def("also", 1, 1, 1),
        ];
        let site = Site::new("world", BlockPos::new(100, 64, 100));
        let mut rng = ChaCha8Rng::seed_from_u64(2);

        let mut queue = PriorityStructureQueue::build(&structures, &site, "minecraft:plains", &mut rng);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.next().map(|s| s.name().to_string()), Some("also".to_string()));
        assert_eq!(queue.next().map(|s| s.name().to_string()), Some("always".to_string()));
        assert!(queue.next().is_none());
    }
}
