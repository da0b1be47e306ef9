//! Vector index
//!
//! A derived, rebuildable view over the document store's vectors. The index is
//! never authoritative: it can always be rebuilt from the store, and every
//! rebuild replaces the previous structure wholesale.

mod flat;

pub use flat::{normalize, FlatIndex, SearchHit};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of the vector index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexState {
    /// Nothing built, or built from zero vectors
    Empty,
    /// Reflects the store as of the last build
    Built,
    /// The store has grown since the last build
    Stale,
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IndexState::Empty => "empty",
            IndexState::Built => "built",
            IndexState::Stale => "stale",
        };
        f.write_str(s)
    }
}

/// When a query triggers an automatic rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebuildPolicy {
    /// Rebuild whenever the index is not `Built`
    #[default]
    OnStale,
    /// Rebuild only when the index is `Empty`; stale indexes serve old results
    WhenEmpty,
}

impl RebuildPolicy {
    pub fn needs_rebuild(self, state: IndexState) -> bool {
        match self {
            RebuildPolicy::OnStale => state != IndexState::Built,
            RebuildPolicy::WhenEmpty => state == IndexState::Empty,
        }
    }
}

impl FromStr for RebuildPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "on_stale" => Ok(RebuildPolicy::OnStale),
            "when_empty" => Ok(RebuildPolicy::WhenEmpty),
            other => Err(format!(
                "Rebuild policy must be 'on_stale' or 'when_empty', got '{}'",
                other
            )),
        }
    }
}

/// Stable content fingerprint of a vector snapshot
///
/// Covers count, dimension and every component, so an index artifact can be
/// matched against the store it was built from.
pub fn fingerprint(vectors: &[Vec<f32>]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(vectors.len() as u64).to_le_bytes());
    for vector in vectors {
        hasher.update(&(vector.len() as u64).to_le_bytes());
        for component in vector {
            hasher.update(&component.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

#[derive(Debug, Clone)]
struct BuiltIndex {
    flat: FlatIndex,
    fingerprint: String,
}

/// Three-state vector index: `Empty → Built → Stale`
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    built: Option<BuiltIndex>,
    stale: bool,
}

impl VectorIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a previously built index, e.g. from a persisted artifact
    pub fn from_parts(flat: FlatIndex, fingerprint: String) -> Self {
        if flat.is_empty() {
            return Self::new();
        }
        Self {
            built: Some(BuiltIndex { flat, fingerprint }),
            stale: false,
        }
    }

    /// Replace the index with one built from `vectors`
    ///
    /// Zero vectors leave the index `Empty`.
    pub fn build(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        if vectors.is_empty() {
            *self = Self::new();
            return Ok(());
        }

        let flat = FlatIndex::from_vectors(vectors)?;
        tracing::debug!(
            "Built vector index: {} vectors, {}D",
            flat.len(),
            flat.dimension()
        );
        *self = Self::from_parts(flat, fingerprint(vectors));
        Ok(())
    }

    pub fn state(&self) -> IndexState {
        match (&self.built, self.stale) {
            (None, _) => IndexState::Empty,
            (Some(_), false) => IndexState::Built,
            (Some(_), true) => IndexState::Stale,
        }
    }

    /// Record that the store changed after the last build
    pub fn mark_stale(&mut self) {
        if self.built.is_some() {
            self.stale = true;
        }
    }

    /// Drop the built structure
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Top `k` positions by similarity; an empty index yields no hits
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        match &self.built {
            Some(built) => built.flat.search(query, k),
            None => Ok(Vec::new()),
        }
    }

    /// Number of vectors covered by the last build
    pub fn len(&self) -> usize {
        self.built.as_ref().map_or(0, |b| b.flat.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> Option<usize> {
        self.built.as_ref().map(|b| b.flat.dimension())
    }

    /// Fingerprint of the vectors the index was built from
    pub fn fingerprint(&self) -> Option<&str> {
        self.built.as_ref().map(|b| b.fingerprint.as_str())
    }

    pub fn flat(&self) -> Option<&FlatIndex> {
        self.built.as_ref().map(|b| &b.flat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let mut index = VectorIndex::new();
        assert_eq!(index.state(), IndexState::Empty);

        // Marking an empty index stale is a no-op
        index.mark_stale();
        assert_eq!(index.state(), IndexState::Empty);

        index.build(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        assert_eq!(index.state(), IndexState::Built);
        assert_eq!(index.len(), 2);

        index.mark_stale();
        assert_eq!(index.state(), IndexState::Stale);

        index.build(&[vec![1.0, 0.0]]).unwrap();
        assert_eq!(index.state(), IndexState::Built);
        assert_eq!(index.len(), 1);

        index.build(&[]).unwrap();
        assert_eq!(index.state(), IndexState::Empty);
    }

    #[test]
    fn test_empty_index_search() {
        let index = VectorIndex::new();
        assert!(index.search(&[1.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_stale_index_still_searchable() {
        let mut index = VectorIndex::new();
        index.build(&[vec![1.0, 0.0]]).unwrap();
        index.mark_stale();

        let hits = index.search(&[1.0, 0.0], 5).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_rebuild_policy() {
        assert!(RebuildPolicy::OnStale.needs_rebuild(IndexState::Empty));
        assert!(RebuildPolicy::OnStale.needs_rebuild(IndexState::Stale));
        assert!(!RebuildPolicy::OnStale.needs_rebuild(IndexState::Built));

        assert!(RebuildPolicy::WhenEmpty.needs_rebuild(IndexState::Empty));
        assert!(!RebuildPolicy::WhenEmpty.needs_rebuild(IndexState::Stale));

        assert_eq!(
            "when_empty".parse::<RebuildPolicy>(),
            Ok(RebuildPolicy::WhenEmpty)
        );
        assert!("sometimes".parse::<RebuildPolicy>().is_err());
    }

    #[test]
    fn test_fingerprint_sensitivity() {
        let a = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let b = vec![vec![1.0, 0.0], vec![0.0, 1.5]];
        assert_eq!(fingerprint(&a), fingerprint(&a.clone()));
        assert_ne!(fingerprint(&a), fingerprint(&b));
        assert_ne!(fingerprint(&a), fingerprint(&a[..1]));
    }
}
