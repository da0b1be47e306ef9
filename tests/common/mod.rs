// Shared helpers for integration tests

use kindex::embedding::{EmbeddingError, EmbeddingProvider};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Deterministic provider: fixed vectors per text, failures for unknown text
pub struct FixedProvider {
    vectors: HashMap<String, Vec<f32>>,
    calls: AtomicUsize,
}

impl FixedProvider {
    pub fn new(entries: &[(&str, Vec<f32>)]) -> Self {
        Self {
            vectors: entries
                .iter()
                .map(|(text, v)| (text.to_string(), v.clone()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    #[allow(dead_code)]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingProvider for FixedProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| EmbeddingError::Transport(format!("no vector for {:?}", text)))
    }

    fn dimension(&self) -> Option<usize> {
        None
    }

    fn model_name(&self) -> &str {
        "fixed"
    }
}

/// Bag-of-words provider over a small vocabulary
pub struct KeywordProvider {
    vocabulary: Vec<&'static str>,
}

impl KeywordProvider {
    #[allow(dead_code)]
    pub fn new(vocabulary: &[&'static str]) -> Self {
        Self {
            vocabulary: vocabulary.to_vec(),
        }
    }
}

impl EmbeddingProvider for KeywordProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }
        let lower = text.to_lowercase();
        Ok(self
            .vocabulary
            .iter()
            .map(|word| lower.matches(word).count() as f32)
            .collect())
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.vocabulary.len())
    }

    fn model_name(&self) -> &str {
        "keyword"
    }
}
