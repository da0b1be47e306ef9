//! Kindex - Semantic knowledge index for analysis pipelines
//!
//! Stores textual knowledge fragments with their embeddings and metadata,
//! answers top-k similarity queries through a lazily rebuilt vector index,
//! and persists everything to a snapshot file with an optional index artifact.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod ingest;
pub mod knowledge;
pub mod persistence;
pub mod pipeline;
pub mod store;

pub use error::{KindexError, Result};
pub use knowledge::{KnowledgeBase, KnowledgeSettings, QueryHit};
