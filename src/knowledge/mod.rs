//! Knowledge base: document store, vector index and query engine
//!
//! `KnowledgeBase` owns the store and its derived index together with the
//! embedding provider. All mutation goes through `&mut self`; sharing a
//! knowledge base across threads requires wrapping it in a mutex.

mod source;

pub use source::{knowledge_context, KnowledgeSource, NO_KNOWLEDGE_BASE};

use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::error::{KindexError, Result};
use crate::index::{IndexState, RebuildPolicy, VectorIndex};
use crate::ingest::{Fragment, IngestReport};
use crate::persistence::{self, PersistOptions};
use crate::store::{DocumentStore, Metadata};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tunables for querying and bulk ingestion
#[derive(Debug, Clone, Copy)]
pub struct KnowledgeSettings {
    pub rebuild: RebuildPolicy,
    pub default_top_k: usize,
    /// Hits scoring at or below this are dropped
    pub min_score: f32,
    pub batch_size: usize,
    pub persist: PersistOptions,
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self {
            rebuild: RebuildPolicy::OnStale,
            default_top_k: 5,
            min_score: 0.1,
            batch_size: 32,
            persist: PersistOptions::default(),
        }
    }
}

impl From<&Config> for KnowledgeSettings {
    fn from(config: &Config) -> Self {
        Self {
            rebuild: config.index.rebuild,
            default_top_k: config.query.default_top_k,
            min_score: config.query.min_score,
            batch_size: config.embedding.batch_size,
            persist: PersistOptions::from(&config.storage),
        }
    }
}

/// A ranked retrieval result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHit {
    /// Position of the document in the store
    pub position: usize,
    pub text: String,
    pub metadata: Metadata,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
}

/// Summary of a knowledge base
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeStats {
    pub documents: usize,
    pub dimension: Option<usize>,
    pub index_state: IndexState,
    pub indexed: usize,
    /// Document counts per metadata `type`
    pub by_type: BTreeMap<String, usize>,
}

impl KnowledgeStats {
    pub fn collect(store: &DocumentStore, index: &VectorIndex) -> Self {
        Self {
            documents: store.len(),
            dimension: store.dimension(),
            index_state: index.state(),
            indexed: index.len(),
            by_type: store.count_by("type"),
        }
    }
}

/// Retrieval store over embedded knowledge fragments
pub struct KnowledgeBase {
    store: DocumentStore,
    index: VectorIndex,
    provider: Arc<dyn EmbeddingProvider>,
    settings: KnowledgeSettings,
}

impl KnowledgeBase {
    /// Create an empty knowledge base
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store: DocumentStore::new(),
            index: VectorIndex::new(),
            provider,
            settings: KnowledgeSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: KnowledgeSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &KnowledgeSettings {
        &self.settings
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn index_state(&self) -> IndexState {
        self.index.state()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Embed and append one fragment; returns its position
    ///
    /// A built index becomes stale. Embedding failures leave everything unchanged.
    pub fn add(&mut self, text: impl Into<String>, metadata: Metadata) -> Result<usize> {
        let position = self.store.add(self.provider.as_ref(), text, metadata)?;
        self.index.mark_stale();
        debug!("Added document at position {}", position);
        Ok(position)
    }

    /// Add many fragments, embedding them in batches
    ///
    /// A failing batch is retried item by item so one bad fragment does not
    /// sink its neighbours. Every individual append stays atomic.
    pub fn add_batch(&mut self, fragments: Vec<Fragment>) -> IngestReport {
        let mut report = IngestReport::default();
        let batch_size = self.settings.batch_size.max(1);

        for chunk in fragments.chunks(batch_size) {
            let texts: Vec<String> = chunk.iter().map(|f| f.text.clone()).collect();

            match self.provider.embed_batch(&texts) {
                Ok(vectors) if vectors.len() == chunk.len() => {
                    for (fragment, vector) in chunk.iter().zip(vectors) {
                        self.push_counted(fragment, vector, &mut report);
                    }
                }
                Ok(vectors) => {
                    warn!(
                        "Embedding batch returned {} vectors for {} texts; retrying individually",
                        vectors.len(),
                        chunk.len()
                    );
                    self.add_individually(chunk, &mut report);
                }
                Err(e) => {
                    warn!("Embedding batch failed: {}; retrying individually", e);
                    self.add_individually(chunk, &mut report);
                }
            }
        }

        if report.added > 0 {
            self.index.mark_stale();
        }
        info!(
            "Ingested {} fragments ({} failed)",
            report.added, report.failed
        );
        report
    }

    fn add_individually(&mut self, chunk: &[Fragment], report: &mut IngestReport) {
        for fragment in chunk {
            match self.provider.embed(&fragment.text) {
                Ok(vector) => self.push_counted(fragment, vector, report),
                Err(e) => {
                    warn!("Failed to embed fragment: {}", e);
                    report.failed += 1;
                }
            }
        }
    }

    fn push_counted(&mut self, fragment: &Fragment, vector: Vec<f32>, report: &mut IngestReport) {
        match self
            .store
            .push(fragment.text.clone(), fragment.metadata.clone(), vector)
        {
            Ok(_) => report.added += 1,
            Err(e) => {
                warn!("Rejected embedded fragment: {}", e);
                report.failed += 1;
            }
        }
    }

    /// Rebuild the index from the store's current vectors
    pub fn build_index(&mut self) -> Result<()> {
        self.index.build(self.store.vectors())?;
        info!(
            "Vector index {} with {} vectors",
            self.index.state(),
            self.index.len()
        );
        Ok(())
    }

    /// Retrieve up to `top_k` fragments similar to `text`
    pub fn query(&mut self, text: &str, top_k: usize) -> Result<Vec<QueryHit>> {
        if top_k == 0 {
            return Err(KindexError::InvalidArgument(
                "top_k must be at least 1".to_string(),
            ));
        }
        if self.store.is_empty() {
            warn!("Knowledge base is empty. No documents to search.");
            return Ok(Vec::new());
        }

        let embedding = self.provider.embed(text)?;
        self.query_embedding(&embedding, top_k)
    }

    /// Query with the configured default `top_k`
    pub fn query_default(&mut self, text: &str) -> Result<Vec<QueryHit>> {
        self.query(text, self.settings.default_top_k)
    }

    /// Retrieve by an already computed query embedding
    pub fn query_embedding(&mut self, embedding: &[f32], top_k: usize) -> Result<Vec<QueryHit>> {
        if top_k == 0 {
            return Err(KindexError::InvalidArgument(
                "top_k must be at least 1".to_string(),
            ));
        }

        if self.settings.rebuild.needs_rebuild(self.index.state()) {
            info!("Building search index ({})", self.index.state());
            self.build_index()?;
        }

        let min_score = self.settings.min_score;
        let hits = self.index.search(embedding, top_k)?;

        Ok(hits
            .into_iter()
            .filter(|hit| hit.score > min_score)
            .filter_map(|hit| {
                let doc = self.store.get(hit.position)?;
                Some(QueryHit {
                    position: hit.position,
                    text: doc.text.to_string(),
                    metadata: doc.metadata.clone(),
                    score: hit.score,
                })
            })
            .collect())
    }

    /// Discard every document and the index
    pub fn clear(&mut self) {
        self.store.clear();
        self.index.clear();
    }

    pub fn stats(&self) -> KnowledgeStats {
        KnowledgeStats::collect(&self.store, &self.index)
    }

    /// Write the snapshot, plus the index artifact when the index is built
    pub fn save(&self, path: &Path) -> Result<()> {
        persistence::save_snapshot(&self.store, path, self.settings.persist)?;

        let artifact = persistence::artifact_path(path);
        match self.index.state() {
            IndexState::Built => {
                persistence::save_artifact(&self.index, &artifact, self.settings.persist)?
            }
            IndexState::Empty | IndexState::Stale => persistence::remove_artifact(&artifact)?,
        }

        info!(
            "Saved knowledge base ({} documents, index {}) to {}",
            self.store.len(),
            self.index.state(),
            path.display()
        );
        Ok(())
    }

    /// Load a snapshot and, when usable, its index artifact
    ///
    /// Snapshot problems are errors; artifact problems only leave the index empty.
    /// Settings are not persisted, so the caller supplies them.
    pub fn load(
        path: &Path,
        provider: Arc<dyn EmbeddingProvider>,
        settings: KnowledgeSettings,
    ) -> Result<Self> {
        let store = persistence::load_snapshot(path)?;

        let artifact = persistence::artifact_path(path);
        let index = match persistence::load_artifact(&artifact, &store) {
            Ok(index) => index,
            Err(e) => {
                info!(
                    "Index artifact {} unavailable ({}); will rebuild when needed",
                    artifact.display(),
                    e
                );
                VectorIndex::new()
            }
        };

        info!(
            "Loaded knowledge base with {} documents (index {})",
            store.len(),
            index.state()
        );

        Ok(Self {
            store,
            index,
            provider,
            settings,
        })
    }

    /// Load a snapshot that must contain at least one document
    pub fn import(
        path: &Path,
        provider: Arc<dyn EmbeddingProvider>,
        settings: KnowledgeSettings,
    ) -> Result<Self> {
        let kb = Self::load(path, provider, settings)?;
        if kb.is_empty() {
            return Err(KindexError::InvalidArgument(format!(
                "Knowledge base at {} is empty",
                path.display()
            )));
        }
        Ok(kb)
    }
}
