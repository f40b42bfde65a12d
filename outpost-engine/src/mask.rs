//! Block-kind masks applied to the blueprint and to the destination region.

use std::collections::HashSet;

use outpost_world::normalize_kind;
use serde::Deserialize;

/// How the predicates of a mask set are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskUnion {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaskPredicate {
    /// Matches kinds in the set.
    Include(HashSet<String>),
    /// Matches kinds not in the set.
    Exclude(HashSet<String>),
}

impl MaskPredicate {
    pub fn include<'a>(kinds: impl IntoIterator<Item = &'a str>) -> Self {
        Self::Include(kinds.into_iter().map(normalize_kind).collect())
    }

    pub fn exclude<'a>(kinds: impl IntoIterator<Item = &'a str>) -> Self {
        Self::Exclude(kinds.into_iter().map(normalize_kind).collect())
    }

    pub fn matches(&self, kind: &str) -> bool {
        match self {
            Self::Include(kinds) => kinds.contains(kind),
            Self::Exclude(kinds) => !kinds.contains(kind),
        }
    }
}

/// Ordered predicate list. An empty set allows everything.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MaskSet {
    pub union: MaskUnion,
    pub predicates: Vec<MaskPredicate>,
}

impl MaskSet {
    pub fn new(union: MaskUnion) -> Self {
        Self {
            union,
            predicates: Vec::new(),
        }
    }

    pub fn with(mut self, predicate: MaskPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// `kind` must already be normalized (world and blueprint kinds are).
    pub fn allows(&self, kind: &str) -> bool {
        if self.predicates.is_empty() {
            return true;
        }
        match self.union {
            MaskUnion::And => self.predicates.iter().all(|p| p.matches(kind)),
            MaskUnion::Or => self.predicates.iter().any(|p| p.matches(kind)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KINDS: [&str; 4] = [
        "minecraft:stone",
        "minecraft:dirt",
        "minecraft:oak_planks",
        "minecraft:air",
    ];

    fn placeable(mask: &MaskSet) -> Vec<&'static str> {
        KINDS.iter().copied().filter(|k| mask.allows(k)).collect()
    }

    #[test]
    fn test_empty_mask_allows_everything() {
        assert_eq!(placeable(&MaskSet::default()).len(), KINDS.len());
    }

    #[test]
    fn test_contradictory_and_mask_allows_nothing() {
        let mask = MaskSet::new(MaskUnion::And)
            .with(MaskPredicate::include(["stone"]))
            .with(MaskPredicate::include(["dirt"]));
        assert!(placeable(&mask).is_empty());
    }

    #[test]
    fn test_or_mask_allows_either() {
        let mask = MaskSet::new(MaskUnion::Or)
            .with(MaskPredicate::include(["stone"]))
            .with(MaskPredicate::include(["dirt"]));
        assert_eq!(placeable(&mask), vec!["minecraft:stone", "minecraft:dirt"]);
    }

    #[test]
    fn test_exclude_predicate() {
        let mask = MaskSet::new(MaskUnion::And).with(MaskPredicate::exclude(["air", "minecraft:dirt"]));
        assert_eq!(placeable(&mask), vec!["minecraft:stone", "minecraft:oak_planks"]);
    }
}
