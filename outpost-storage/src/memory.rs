use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{PlacedStructure, StructureDatabase};

/// Placement records kept in memory, optionally persisted as a JSON array.
#[derive(Default)]
pub struct MemoryDatabase {
    records: RwLock<Vec<PlacedStructure>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load records previously written by [`MemoryDatabase::export`]. A
    /// missing file yields an empty database.
    pub async fn import(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            log::info!("No placement records at {:?}, starting empty", path);
            return Ok(Self::new());
        }
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read placement records from {:?}", path))?;
        let records: Vec<PlacedStructure> =
            serde_json::from_str(&text).with_context(|| format!("Failed to parse placement records in {:?}", path))?;
        log::info!("Loaded {} placement records from {:?}", records.len(), path);
        Ok(Self {
            records: RwLock::new(records),
        })
    }

    pub async fn export(&self, path: &Path) -> Result<()> {
        let records = self.records.read().await;
        let text = serde_json::to_string_pretty(&*records).context("Failed to serialize placement records")?;
        tokio::fs::write(path, text)
            .await
            .with_context(|| format!("Failed to write placement records to {:?}", path))?;
        log::debug!("Wrote {} placement records to {:?}", records.len(), path);
        Ok(())
    }

    pub async fn all(&self) -> Vec<PlacedStructure> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl StructureDatabase for MemoryDatabase {
    async fn record(&self, placed: PlacedStructure) -> Result<()> {
        log::debug!("Recording {} in {} at {}..{}", placed.structure, placed.world, placed.min, placed.max);
        self.records.write().await.push(placed);
        Ok(())
    }

    async fn nearest(&self, world: &str, x: i32, z: i32, structure: Option<&str>) -> Result<Option<PlacedStructure>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.world == world)
            .filter(|r| structure.is_none_or(|name| r.structure == name))
            .min_by_key(|r| r.distance_sq(x, z))
            .cloned())
    }

    async fn within(&self, world: &str, x: i32, z: i32, radius: u32) -> Result<Vec<PlacedStructure>> {
        let limit = radius as i64 * radius as i64;
        let records = self.records.read().await;
        let mut found: Vec<PlacedStructure> = records
            .iter()
            .filter(|r| r.world == world && r.distance_sq(x, z) <= limit)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.distance_sq(x, z));
        Ok(found)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outpost_world::{BlockPos, Rotation};

    fn placed(structure: &str, world: &str, x: i32, z: i32) -> PlacedStructure {
        PlacedStructure {
            structure: structure.to_string(),
            world: world.to_string(),
            min: BlockPos::new(x - 2, 64, z - 2),
            max: BlockPos::new(x + 2, 70, z + 2),
            rotation: Rotation::None,
            tick: 0,
        }
    }

    async fn seeded() -> MemoryDatabase {
        let db = MemoryDatabase::new();
        db.record(placed("tower", "world", 100, 100)).await.unwrap();
        db.record(placed("well", "world", 10, 0)).await.unwrap();
        db.record(placed("tower", "world", -40, 0)).await.unwrap();
        db.record(placed("tower", "world_nether", 1, 1)).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_nearest_respects_world_and_name() {
        let db = seeded().await;
        let any = db.nearest("world", 0, 0, None).await.unwrap().unwrap();
        assert_eq!(any.structure, "well");

        let tower = db.nearest("world", 0, 0, Some("tower")).await.unwrap().unwrap();
        assert_eq!(tower.center(), (-40, 0));

        assert!(db.nearest("world_the_end", 0, 0, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_within_radius_sorted() {
        let db = seeded().await;
        let found = db.within("world", 0, 0, 50).await.unwrap();
        let names: Vec<(i32, i32)> = found.iter().map(|r| r.center()).collect();
        assert_eq!(names, vec![(10, 0), (-40, 0)]);
        assert!(db.within("world", 0, 0, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_export_import() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("placed.json");
        let db = seeded().await;
        db.export(&path).await.unwrap();

        let restored = MemoryDatabase::import(&path).await.unwrap();
        assert_eq!(restored.count().await.unwrap(), 4);
        assert_eq!(restored.all().await, db.all().await);

        let empty = MemoryDatabase::import(&dir.path().join("missing.json")).await.unwrap();
        assert_eq!(empty.count().await.unwrap(), 0);
    }
}
