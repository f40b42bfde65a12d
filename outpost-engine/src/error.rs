//! Error tiers.
//!
//! - `ConfigError`: one structure or loot table is skipped at load time.
//! - `PlacementError`: one placement attempt is skipped, unless
//!   [`PlacementError::is_fatal`] says the host must stop.
//! - `MarkerError`: one marker is left unresolved.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("structure `{structure}`: missing required field `{field}`")]
    MissingField { structure: String, field: &'static str },

    #[error("structure `{structure}`: invalid `{field}`: {reason}")]
    InvalidField {
        structure: String,
        field: String,
        reason: String,
    },

    #[error("structure `{structure}`: unknown loot table `{table}`")]
    UnknownLootTable { structure: String, table: String },

    #[error("loot table `{table}`: {reason}")]
    InvalidLootTable { table: String, reason: String },

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(structure: &str, field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            structure: structure.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlacementError {
    #[error("blueprint `{blueprint}` does not exist (depth {depth})")]
    MissingBlueprint { blueprint: String, depth: u32 },

    #[error("blueprint `{blueprint}` could not be read (depth {depth}): {reason}")]
    BlueprintIo {
        blueprint: String,
        depth: u32,
        reason: String,
    },

    #[error("blueprint `{blueprint}` is corrupt: {reason}")]
    CorruptBlueprint { blueprint: String, reason: String },

    #[error("structure `{structure}` exceeded its iteration limit {limit} at depth {depth}")]
    RecursionLimit {
        structure: String,
        depth: u32,
        limit: u32,
    },

    #[error("no structure named `{0}`")]
    UnknownStructure(String),
}

impl PlacementError {
    /// A top-level blueprint that cannot be opened stops the host: the engine
    /// cannot keep placing structures it cannot find.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::MissingBlueprint { depth, .. } | Self::BlueprintIo { depth, .. } => *depth == 0,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MarkerError {
    #[error("[{tag}] marker is missing argument {index}")]
    MissingArgument { tag: String, index: usize },

    #[error("[{tag}] marker has invalid argument `{value}`")]
    InvalidArgument { tag: String, value: String },

    #[error("[{tag}] marker references unknown category `{category}`")]
    UnknownCategory { tag: String, category: String },

    #[error("[{tag}] marker used but the structure defines no sub-blueprints")]
    NoSubBlueprints { tag: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_top_level_blueprint_failures_are_fatal() {
        let top = PlacementError::MissingBlueprint { blueprint: "a".into(), depth: 0 };
        let child = PlacementError::MissingBlueprint { blueprint: "a".into(), depth: 1 };
        let io = PlacementError::BlueprintIo { blueprint: "a".into(), depth: 0, reason: "denied".into() };
        let corrupt = PlacementError::CorruptBlueprint { blueprint: "a".into(), reason: "bad".into() };
        assert!(top.is_fatal());
        assert!(io.is_fatal());
        assert!(!child.is_fatal());
        assert!(!corrupt.is_fatal());
    }

    #[test]
    fn test_config_error_names_structure_and_field() {
        let err = ConfigError::MissingField { structure: "tower".into(), field: "schematic" };
        assert_eq!(err.to_string(), "structure `tower`: missing required field `schematic`");
    }
}
