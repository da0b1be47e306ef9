/// Companion index artifact
use super::{decode, encode, write_atomic, PersistOptions};
use crate::error::{KindexError, Result};
use crate::index::{fingerprint, FlatIndex, VectorIndex};
use crate::store::DocumentStore;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

const ARTIFACT_VERSION: u32 = 1;

/// Why a companion artifact could not be used. Never fatal to a load.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("artifact not found")]
    Missing,

    #[error("failed to read artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode artifact: {0}")]
    Decode(String),

    #[error("unsupported artifact version {0}")]
    Version(u32),

    #[error("artifact covers {indexed} vectors of {dimension}D, store has {stored} of {stored_dimension:?}")]
    ShapeMismatch {
        indexed: usize,
        dimension: usize,
        stored: usize,
        stored_dimension: Option<usize>,
    },

    #[error("artifact was built from different vectors")]
    FingerprintMismatch,

    #[error("index has not been built")]
    NotBuilt,
}

#[derive(Serialize)]
struct ArtifactRef<'a> {
    format_version: u32,
    fingerprint: &'a str,
    index: &'a FlatIndex,
}

#[derive(Deserialize)]
struct IndexArtifact {
    format_version: u32,
    fingerprint: String,
    index: FlatIndex,
}

/// Persist a built index; fails with `InvalidArgument` if nothing is built
pub fn save_artifact(index: &VectorIndex, path: &Path, options: PersistOptions) -> Result<()> {
    let (flat, fingerprint) = match (index.flat(), index.fingerprint()) {
        (Some(flat), Some(fingerprint)) => (flat, fingerprint),
        _ => {
            return Err(KindexError::InvalidArgument(
                ArtifactError::NotBuilt.to_string(),
            ))
        }
    };

    let artifact = ArtifactRef {
        format_version: ARTIFACT_VERSION,
        fingerprint,
        index: flat,
    };
    let payload = serde_json::to_vec(&artifact).map_err(|e| KindexError::Json {
        source: e,
        context: "Failed to serialize index artifact".to_string(),
    })?;
    let data = encode(payload, options).map_err(|e| KindexError::Io {
        source: e,
        context: "Failed to compress index artifact".to_string(),
    })?;

    write_atomic(path, &data)?;
    tracing::debug!("Saved index artifact to {}", path.display());
    Ok(())
}

/// Load an artifact and check it matches `store` exactly
pub fn load_artifact(
    path: &Path,
    store: &DocumentStore,
) -> std::result::Result<VectorIndex, ArtifactError> {
    if !path.exists() {
        return Err(ArtifactError::Missing);
    }

    let data = decode(std::fs::read(path)?)?;
    let artifact: IndexArtifact =
        serde_json::from_slice(&data).map_err(|e| ArtifactError::Decode(e.to_string()))?;

    if artifact.format_version != ARTIFACT_VERSION {
        return Err(ArtifactError::Version(artifact.format_version));
    }

    let flat = artifact.index;
    if flat.len() != store.len() || Some(flat.dimension()) != store.dimension() {
        return Err(ArtifactError::ShapeMismatch {
            indexed: flat.len(),
            dimension: flat.dimension(),
            stored: store.len(),
            stored_dimension: store.dimension(),
        });
    }

    if artifact.fingerprint != fingerprint(store.vectors()) {
        return Err(ArtifactError::FingerprintMismatch);
    }

    Ok(VectorIndex::from_parts(flat, artifact.fingerprint))
}

/// Remove an artifact that no longer reflects the store
pub fn remove_artifact(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path).map_err(|e| KindexError::Io {
            source: e,
            context: format!("Failed to remove index artifact: {}", path.display()),
        })?;
        tracing::debug!("Removed outdated index artifact {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexState;
    use crate::store::Metadata;
    use tempfile::TempDir;

    fn store_with(vectors: &[Vec<f32>]) -> DocumentStore {
        let mut store = DocumentStore::new();
        for (i, v) in vectors.iter().enumerate() {
            store
                .push(format!("doc {}", i), Metadata::new(), v.clone())
                .unwrap();
        }
        store
    }

    #[test]
    fn test_artifact_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("kb.vidx");
        let store = store_with(&[vec![1.0, 0.0], vec![1.0, 1.0]]);

        let mut index = VectorIndex::new();
        index.build(store.vectors()).unwrap();
        save_artifact(&index, &path, PersistOptions::default()).unwrap();

        let loaded = load_artifact(&path, &store).unwrap();
        assert_eq!(loaded.state(), IndexState::Built);
        assert_eq!(loaded.len(), 2);
        assert_eq!(
            loaded.search(&[1.0, 0.0], 2).unwrap(),
            index.search(&[1.0, 0.0], 2).unwrap()
        );
    }

    #[test]
    fn test_missing_artifact() {
        let temp = TempDir::new().unwrap();
        let store = store_with(&[vec![1.0]]);
        assert!(matches!(
            load_artifact(&temp.path().join("none.vidx"), &store),
            Err(ArtifactError::Missing)
        ));
    }

    #[test]
    fn test_garbage_artifact() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.vidx");
        std::fs::write(&path, b"\x00\x01garbage").unwrap();

        let store = store_with(&[vec![1.0]]);
        assert!(matches!(
            load_artifact(&path, &store),
            Err(ArtifactError::Decode(_))
        ));
    }

    #[test]
    fn test_artifact_from_other_store_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("kb.vidx");

        let original = store_with(&[vec![1.0, 0.0], vec![0.0, 1.0]]);
        let mut index = VectorIndex::new();
        index.build(original.vectors()).unwrap();
        save_artifact(&index, &path, PersistOptions::default()).unwrap();

        let same_shape = store_with(&[vec![1.0, 0.0], vec![0.5, 1.0]]);
        assert!(matches!(
            load_artifact(&path, &same_shape),
            Err(ArtifactError::FingerprintMismatch)
        ));

        let grown = store_with(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]]);
        assert!(matches!(
            load_artifact(&path, &grown),
            Err(ArtifactError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_save_unbuilt_index_rejected() {
        let temp = TempDir::new().unwrap();
        let result = save_artifact(
            &VectorIndex::new(),
            &temp.path().join("kb.vidx"),
            PersistOptions::default(),
        );
        assert!(result.is_err());
    }
}
