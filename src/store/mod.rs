//! Document store
//!
//! Append-only, positionally aligned sequences of texts, metadata records and
//! embedding vectors. Position `i` in each sequence is the same document; the
//! position is the only identity a document has.

use crate::embedding::EmbeddingProvider;
use crate::error::{KindexError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Scalar metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

/// Metadata record attached to a document
pub type Metadata = BTreeMap<String, MetadataValue>;

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(b) => write!(f, "{}", b),
            MetadataValue::Integer(i) => write!(f, "{}", i),
            MetadataValue::Float(x) => write!(f, "{}", x),
            MetadataValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

/// Build a metadata record from key/value pairs
pub fn metadata<K, V, I>(pairs: I) -> Metadata
where
    K: Into<String>,
    V: Into<MetadataValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Non-finite floats serialize as JSON `null` and could not be read back
fn check_metadata(record: &Metadata) -> Result<()> {
    for (key, value) in record {
        if let MetadataValue::Float(x) = value {
            if !x.is_finite() {
                return Err(KindexError::InvalidArgument(format!(
                    "metadata '{}' is not a finite number",
                    key
                )));
            }
        }
    }
    Ok(())
}

/// Borrowed view of one stored document
#[derive(Debug, Clone, Copy)]
pub struct DocumentView<'a> {
    pub position: usize,
    pub text: &'a str,
    pub metadata: &'a Metadata,
    pub vector: &'a [f32],
}

/// Ordered, append-only document collection
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    texts: Vec<String>,
    metadata: Vec<Metadata>,
    vectors: Vec<Vec<f32>>,
    /// Fixed by the first vector ever stored
    dimension: Option<usize>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from its three sequences, validating alignment and dimensions
    pub fn from_parts(
        texts: Vec<String>,
        metadata: Vec<Metadata>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self> {
        if texts.len() != metadata.len() || texts.len() != vectors.len() {
            return Err(KindexError::InvalidArgument(format!(
                "Misaligned sequences: {} texts, {} metadata records, {} vectors",
                texts.len(),
                metadata.len(),
                vectors.len()
            )));
        }

        let mut store = Self::new();
        for record in &metadata {
            check_metadata(record)?;
        }
        for vector in &vectors {
            store.check_vector(vector)?;
            store.dimension.get_or_insert(vector.len());
        }
        store.texts = texts;
        store.metadata = metadata;
        store.vectors = vectors;
        Ok(store)
    }

    /// Embed `text` and append it; returns the new document's position
    ///
    /// On embedding failure the store is left untouched.
    pub fn add(
        &mut self,
        provider: &dyn EmbeddingProvider,
        text: impl Into<String>,
        metadata: Metadata,
    ) -> Result<usize> {
        let text = text.into();
        let vector = provider.embed(&text)?;
        self.push(text, metadata, vector)
    }

    /// Append an already-embedded document
    pub fn push(&mut self, text: String, metadata: Metadata, vector: Vec<f32>) -> Result<usize> {
        self.check_vector(&vector)?;
        check_metadata(&metadata)?;

        self.dimension.get_or_insert(vector.len());
        self.texts.push(text);
        self.metadata.push(metadata);
        self.vectors.push(vector);
        Ok(self.texts.len() - 1)
    }

    fn check_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.is_empty() {
            return Err(KindexError::InvalidVector("vector is empty".to_string()));
        }
        if let Some(position) = vector.iter().position(|x| !x.is_finite()) {
            return Err(KindexError::InvalidVector(format!(
                "non-finite component at position {}",
                position
            )));
        }
        if let Some(expected) = self.dimension {
            if vector.len() != expected {
                return Err(KindexError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }
        Ok(())
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// Dimension fixed by the first stored vector
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn get(&self, position: usize) -> Option<DocumentView<'_>> {
        Some(DocumentView {
            position,
            text: self.texts.get(position)?,
            metadata: self.metadata.get(position)?,
            vector: self.vectors.get(position)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = DocumentView<'_>> {
        (0..self.len()).filter_map(move |position| self.get(position))
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn metadata(&self) -> &[Metadata] {
        &self.metadata
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    /// Count documents by the text value of a metadata key
    pub fn count_by(&self, key: &str) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.metadata {
            if let Some(value) = record.get(key) {
                *counts.entry(value.to_string()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Discard every document, including the fixed dimension
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}
