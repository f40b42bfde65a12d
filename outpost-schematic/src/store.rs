//! On-disk blueprint store.
//!
//! Blueprints are vanilla structure files in one directory. A name without
//! an extension resolves to `<name>.nbt`. Compiled marker indexes live next
//! to them as `<name>.markers.json`.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::nbt::StructureFile;
use crate::{Blueprint, BlueprintError, BlueprintStore, MarkerIndex};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub struct NbtBlueprintStore {
    dir: PathBuf,
}

impl NbtBlueprintStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn stem(name: &str) -> &str {
        name.strip_suffix(".nbt").unwrap_or(name)
    }

    fn blueprint_path(&self, name: &str) -> Option<PathBuf> {
        // Names are relative to the store; no escaping it
        if name.is_empty() || name.contains("..") || Path::new(name).is_absolute() {
            return None;
        }
        Some(self.dir.join(format!("{}.nbt", Self::stem(name))))
    }

    fn compiled_path(&self, name: &str) -> Option<PathBuf> {
        let path = self.blueprint_path(name)?;
        Some(path.with_extension("markers.json"))
    }

    fn read(&self, name: &str, path: Option<PathBuf>) -> Result<Vec<u8>, BlueprintError> {
        let Some(path) = path else {
            return Err(BlueprintError::NotFound { name: name.to_string(), path: None });
        };
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlueprintError::NotFound { name: name.to_string(), path: Some(path) })
            }
            Err(source) => Err(BlueprintError::Io { name: name.to_string(), source }),
        }
    }

    fn write(&self, name: &str, path: Option<PathBuf>, bytes: &[u8]) -> Result<(), BlueprintError> {
        let Some(path) = path else {
            return Err(BlueprintError::NotFound { name: name.to_string(), path: None });
        };
        let io = |source| BlueprintError::Io { name: name.to_string(), source };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io)?;
        }
        fs::write(&path, bytes).map_err(io)
    }
}

/// Decode a (possibly gzipped) structure file.
pub fn decode(name: &str, bytes: &[u8]) -> Result<Blueprint, BlueprintError> {
    let corrupt = |reason: String| BlueprintError::Corrupt { name: name.to_string(), reason };

    let raw = if bytes.starts_with(&GZIP_MAGIC) {
        let mut decoder = GzDecoder::new(bytes);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| corrupt(format!("gzip: {e}")))?;
        decompressed
    } else {
        bytes.to_vec()
    };

    let file: StructureFile = fastnbt::from_bytes(&raw).map_err(|e| corrupt(format!("nbt: {e}")))?;
    file.into_blueprint().map_err(corrupt)
}

/// Encode a blueprint as a gzipped structure file.
pub fn encode(name: &str, blueprint: &Blueprint) -> Result<Vec<u8>, BlueprintError> {
    let corrupt = |reason: String| BlueprintError::Corrupt { name: name.to_string(), reason };

    let file = StructureFile::from_blueprint(blueprint);
    let nbt = fastnbt::to_bytes(&file).map_err(|e| corrupt(format!("nbt: {e}")))?;

    let io = |source| BlueprintError::Io { name: name.to_string(), source };
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&nbt).map_err(io)?;
    encoder.finish().map_err(io)
}

impl BlueprintStore for NbtBlueprintStore {
    fn load(&self, name: &str) -> Result<Arc<Blueprint>, BlueprintError> {
        let bytes = self.read(name, self.blueprint_path(name))?;
        let blueprint = decode(name, &bytes)?;
        log::debug!("Loaded blueprint {} ({} cells)", name, blueprint.cells.len());
        Ok(Arc::new(blueprint))
    }

    fn save(&self, name: &str, blueprint: &Blueprint) -> Result<(), BlueprintError> {
        let bytes = encode(name, blueprint)?;
        self.write(name, self.blueprint_path(name), &bytes)?;
        log::info!("Saved blueprint {} to {:?}", name, self.dir);
        Ok(())
    }

    fn load_compiled(&self, name: &str) -> Result<MarkerIndex, BlueprintError> {
        let bytes = self.read(name, self.compiled_path(name))?;
        serde_json::from_slice(&bytes).map_err(|e| BlueprintError::Corrupt {
            name: name.to_string(),
            reason: format!("marker index: {e}"),
        })
    }

    fn save_compiled(&self, name: &str, index: &MarkerIndex) -> Result<(), BlueprintError> {
        let bytes = serde_json::to_vec_pretty(index).map_err(|e| BlueprintError::Corrupt {
            name: name.to_string(),
            reason: format!("marker index: {e}"),
        })?;
        self.write(name, self.compiled_path(name), &bytes)
    }
}
