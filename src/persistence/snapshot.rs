/// Snapshot encoding of the document store
use super::{decode, encode, write_atomic, PersistOptions};
use crate::error::{KindexError, Result};
use crate::store::{DocumentStore, Metadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    format_version: u32,
    saved_at: DateTime<Utc>,
    texts: &'a [String],
    metadata: &'a [Metadata],
    vectors: &'a [Vec<f32>],
}

#[derive(Deserialize)]
struct Snapshot {
    format_version: u32,
    #[allow(dead_code)]
    saved_at: DateTime<Utc>,
    texts: Vec<String>,
    metadata: Vec<Metadata>,
    vectors: Vec<Vec<f32>>,
}

/// Write the store's three sequences to `path`
pub fn save_snapshot(store: &DocumentStore, path: &Path, options: PersistOptions) -> Result<()> {
    let snapshot = SnapshotRef {
        format_version: SNAPSHOT_VERSION,
        saved_at: Utc::now(),
        texts: store.texts(),
        metadata: store.metadata(),
        vectors: store.vectors(),
    };

    let payload = serde_json::to_vec(&snapshot).map_err(|e| KindexError::Json {
        source: e,
        context: "Failed to serialize snapshot".to_string(),
    })?;
    let data = encode(payload, options).map_err(|e| KindexError::Io {
        source: e,
        context: "Failed to compress snapshot".to_string(),
    })?;

    write_atomic(path, &data)?;
    tracing::debug!(
        "Saved snapshot with {} documents to {}",
        store.len(),
        path.display()
    );
    Ok(())
}

/// Read a snapshot; any decoding or alignment problem is `SnapshotCorrupt`
pub fn load_snapshot(path: &Path) -> Result<DocumentStore> {
    let data = std::fs::read(path).map_err(|e| KindexError::Io {
        source: e,
        context: format!("Failed to read snapshot: {}", path.display()),
    })?;

    let corrupt = |reason: String| KindexError::SnapshotCorrupt {
        path: path.to_path_buf(),
        reason,
    };

    let payload = decode(data).map_err(|e| corrupt(format!("decompression failed: {}", e)))?;
    let snapshot: Snapshot =
        serde_json::from_slice(&payload).map_err(|e| corrupt(format!("malformed: {}", e)))?;

    if snapshot.format_version != SNAPSHOT_VERSION {
        return Err(corrupt(format!(
            "unsupported format version {}",
            snapshot.format_version
        )));
    }

    DocumentStore::from_parts(snapshot.texts, snapshot.metadata, snapshot.vectors)
        .map_err(|e| corrupt(e.to_string()))
}
