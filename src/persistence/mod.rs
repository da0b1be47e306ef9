//! Persistence layer
//!
//! The snapshot file is the authoritative form of the document store. The
//! companion index artifact next to it is a cache: it is written only when the
//! index is freshly built, and any problem reading it falls back to an empty
//! index that queries rebuild lazily.

mod artifact;
mod snapshot;

pub use artifact::{load_artifact, remove_artifact, save_artifact, ArtifactError};
pub use snapshot::{load_snapshot, save_snapshot};

use crate::config::StorageConfig;
use crate::error::{KindexError, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Extension of the companion index artifact
pub const ARTIFACT_EXTENSION: &str = "vidx";

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// How persisted files are encoded
#[derive(Debug, Clone, Copy)]
pub struct PersistOptions {
    pub compress: bool,
    pub compression_level: i32,
}

impl Default for PersistOptions {
    fn default() -> Self {
        Self {
            compress: true,
            compression_level: 3,
        }
    }
}

impl From<&StorageConfig> for PersistOptions {
    fn from(config: &StorageConfig) -> Self {
        Self {
            compress: config.compress,
            compression_level: config.compression_level,
        }
    }
}

/// Companion artifact path: same location and stem, `.vidx` extension
pub fn artifact_path(snapshot: &Path) -> PathBuf {
    let candidate = snapshot.with_extension(ARTIFACT_EXTENSION);
    if candidate == snapshot {
        // Snapshot already uses the artifact extension; append instead
        let mut name = snapshot.as_os_str().to_os_string();
        name.push(".");
        name.push(ARTIFACT_EXTENSION);
        PathBuf::from(name)
    } else {
        candidate
    }
}

fn encode(payload: Vec<u8>, options: PersistOptions) -> std::io::Result<Vec<u8>> {
    if options.compress {
        zstd::encode_all(&payload[..], options.compression_level)
    } else {
        Ok(payload)
    }
}

/// Decompress zstd frames; plain payloads pass through
fn decode(data: Vec<u8>) -> std::io::Result<Vec<u8>> {
    if data.starts_with(&ZSTD_MAGIC) {
        zstd::decode_all(&data[..])
    } else {
        Ok(data)
    }
}

/// Write `data` to a temp file beside `path`, then rename over it
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| KindexError::Io {
        source: e,
        context: format!("Failed to create directory: {}", parent.display()),
    })?;

    let file_name = path
        .file_name()
        .ok_or_else(|| KindexError::InvalidArgument(format!("Not a file path: {}", path.display())))?
        .to_string_lossy();
    let temp_path = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    let mut file = fs::File::create(&temp_path).map_err(|e| KindexError::Io {
        source: e,
        context: format!("Failed to create temp file: {}", temp_path.display()),
    })?;
    file.write_all(data).map_err(|e| KindexError::Io {
        source: e,
        context: format!("Failed to write temp file: {}", temp_path.display()),
    })?;
    file.sync_all().map_err(|e| KindexError::Io {
        source: e,
        context: format!("Failed to sync temp file: {}", temp_path.display()),
    })?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        KindexError::Io {
            source: e,
            context: format!(
                "Failed to rename {} -> {}",
                temp_path.display(),
                path.display()
            ),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_artifact_path_derivation() {
        assert_eq!(
            artifact_path(Path::new("/data/kb.pkl")),
            PathBuf::from("/data/kb.vidx")
        );
        assert_eq!(
            artifact_path(Path::new("/data/knowledge")),
            PathBuf::from("/data/knowledge.vidx")
        );
        assert_eq!(
            artifact_path(Path::new("/data/kb.vidx")),
            PathBuf::from("/data/kb.vidx.vidx")
        );
    }

    #[test]
    fn test_encode_decode_both_modes() {
        let payload = b"{\"texts\":[]}".repeat(64);

        let compressed = encode(payload.clone(), PersistOptions::default()).unwrap();
        assert!(compressed.starts_with(&ZSTD_MAGIC));
        assert_eq!(decode(compressed).unwrap(), payload);

        let plain_options = PersistOptions {
            compress: false,
            compression_level: 3,
        };
        let plain = encode(payload.clone(), plain_options).unwrap();
        assert_eq!(decode(plain).unwrap(), payload);
    }

    #[test]
    fn test_write_atomic_replaces_and_leaves_no_temp() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("kb.kb");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
