//! Analysis pipeline state shared between stages

use crate::config::IngestConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::ingest::{self, Extraction, IngestError, IngestReport};
use crate::knowledge::{knowledge_context, KnowledgeBase, KnowledgeSettings, KnowledgeSource};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Explicit state passed to every pipeline stage
#[derive(Default)]
pub struct PipelineContext {
    knowledge_base: Option<KnowledgeBase>,
    /// Set once a stage has produced a usable knowledge base
    pub processing_complete: bool,
    /// Set when the knowledge base was built from raw datasets
    pub kb_created: bool,
    /// Outcome of the last dataset build, successful or not
    pub build_summary: Option<BuildSummary>,
}

/// Dataset and document counts from building a knowledge base
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub datasets_processed: usize,
    /// Datasets that could not be read or lacked required columns
    pub datasets_failed: usize,
    pub documents: IngestReport,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a knowledge base, replacing any previous one
    pub fn attach(&mut self, kb: KnowledgeBase, created: bool) {
        self.knowledge_base = Some(kb);
        self.kb_created = created;
        self.processing_complete = true;
    }

    pub fn knowledge_base(&self) -> Option<&KnowledgeBase> {
        self.knowledge_base.as_ref()
    }

    pub fn knowledge_base_mut(&mut self) -> Option<&mut KnowledgeBase> {
        self.knowledge_base.as_mut()
    }

    pub fn take_knowledge_base(&mut self) -> Option<KnowledgeBase> {
        self.processing_complete = false;
        self.kb_created = false;
        self.knowledge_base.take()
    }

    pub fn knowledge_source(&mut self) -> Option<&mut dyn KnowledgeSource> {
        self.knowledge_base
            .as_mut()
            .map(|kb| kb as &mut dyn KnowledgeSource)
    }

    /// Context text for a downstream prompt
    pub fn context_for(&mut self, query: &str, top_k: usize) -> Result<String> {
        knowledge_context(self.knowledge_source(), query, top_k)
    }
}

/// One step of the pipeline
pub trait Stage {
    fn name(&self) -> &str;
    fn run(&mut self, ctx: &mut PipelineContext) -> Result<()>;
}

/// Run stages in order, stopping at the first failure
pub fn run_stages(stages: &mut [Box<dyn Stage>], ctx: &mut PipelineContext) -> Result<()> {
    for stage in stages.iter_mut() {
        let start = Instant::now();
        tracing::info!("Running stage '{}'", stage.name());
        stage.run(ctx)?;
        tracing::debug!(
            "Stage '{}' finished in {:?}",
            stage.name(),
            start.elapsed()
        );
    }
    Ok(())
}

/// Build a fresh knowledge base from tabular and transcript datasets
pub struct BuildKnowledgeStage {
    provider: Arc<dyn EmbeddingProvider>,
    settings: KnowledgeSettings,
    ingest: IngestConfig,
    tables: Vec<PathBuf>,
    transcripts: Vec<PathBuf>,
}

impl BuildKnowledgeStage {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        settings: KnowledgeSettings,
        ingest: IngestConfig,
    ) -> Self {
        Self {
            provider,
            settings,
            ingest,
            tables: Vec::new(),
            transcripts: Vec::new(),
        }
    }

    pub fn with_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.tables.push(path.into());
        self
    }

    pub fn with_transcripts(mut self, path: impl Into<PathBuf>) -> Self {
        self.transcripts.push(path.into());
        self
    }

    fn ingest_dataset(
        kb: &mut KnowledgeBase,
        summary: &mut BuildSummary,
        path: &Path,
        extracted: std::result::Result<Extraction, IngestError>,
    ) {
        match extracted {
            Ok(extraction) => {
                let mut report = kb.add_batch(extraction.fragments);
                report.skipped += extraction.skipped;
                summary.documents += report;
                summary.datasets_processed += 1;
            }
            Err(e) => {
                tracing::warn!("Skipping dataset {}: {}", path.display(), e);
                summary.datasets_failed += 1;
            }
        }
    }
}

impl Stage for BuildKnowledgeStage {
    fn name(&self) -> &str {
        "build_knowledge"
    }

    /// Unreadable datasets are skipped; the stage fails only if nothing was added
    fn run(&mut self, ctx: &mut PipelineContext) -> Result<()> {
        let mut kb = KnowledgeBase::new(self.provider.clone()).with_settings(self.settings);
        let mut summary = BuildSummary::default();

        for path in &self.tables {
            let extracted = ingest::summarize_table_file(path, &self.ingest);
            Self::ingest_dataset(&mut kb, &mut summary, path, extracted);
        }
        for path in &self.transcripts {
            let extracted = ingest::extract_transcripts_file(path, &self.ingest);
            Self::ingest_dataset(&mut kb, &mut summary, path, extracted);
        }

        ctx.build_summary = Some(summary);
        if kb.is_empty() {
            return Err(IngestError::NothingIngested {
                datasets: summary.datasets_processed + summary.datasets_failed,
                failed: summary.documents.failed,
            }
            .into());
        }

        kb.build_index()?;
        tracing::info!(
            "Knowledge base created with {} documents from {} datasets ({} skipped)",
            kb.len(),
            summary.datasets_processed,
            summary.datasets_failed
        );
        ctx.attach(kb, true);
        Ok(())
    }
}

/// Attach a previously saved, non-empty knowledge base
pub struct ImportKnowledgeStage {
    path: PathBuf,
    provider: Arc<dyn EmbeddingProvider>,
    settings: KnowledgeSettings,
}

impl ImportKnowledgeStage {
    pub fn new(
        path: impl Into<PathBuf>,
        provider: Arc<dyn EmbeddingProvider>,
        settings: KnowledgeSettings,
    ) -> Self {
        Self {
            path: path.into(),
            provider,
            settings,
        }
    }
}

impl Stage for ImportKnowledgeStage {
    fn name(&self) -> &str {
        "import_knowledge"
    }

    fn run(&mut self, ctx: &mut PipelineContext) -> Result<()> {
        let kb = KnowledgeBase::import(&self.path, self.provider.clone(), self.settings)?;
        ctx.attach(kb, false);
        Ok(())
    }
}
