//! Turn CSV datasets into knowledge fragments
//!
//! Tabular datasets become one summary sentence per column. Transcript
//! datasets become one fragment per sufficiently long transcript cell.
//! Nothing here embeds; the fragments are handed to
//! [`KnowledgeBase::add_batch`](crate::knowledge::KnowledgeBase::add_batch).

mod table;

pub use table::{summarize_column, ColumnKind};

use crate::config::IngestConfig;
use crate::store::{metadata, Metadata};
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

pub const CATEGORICAL_ANALYSIS: &str = "categorical_analysis";
pub const NUMERICAL_ANALYSIS: &str = "numerical_analysis";
pub const QUALITATIVE_TRANSCRIPT: &str = "qualitative_transcript";

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Dataset '{0}' has no rows")]
    EmptyDataset(String),

    #[error("Dataset '{dataset}' has no column '{column}'")]
    MissingColumn { dataset: String, column: String },

    #[error("No documents ingested from {datasets} datasets ({failed} fragments failed)")]
    NothingIngested { datasets: usize, failed: usize },
}

/// A text fragment ready to be embedded
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub text: String,
    pub metadata: Metadata,
}

impl Fragment {
    pub fn new(text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }
}

/// Outcome of a bulk ingestion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub added: usize,
    /// Rows or columns that produced no fragment
    pub skipped: usize,
    /// Fragments whose embedding or append failed
    pub failed: usize,
}

impl std::ops::AddAssign for IngestReport {
    fn add_assign(&mut self, other: Self) {
        self.added += other.added;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Fragments plus how many source items were passed over
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub fragments: Vec<Fragment>,
    pub skipped: usize,
}

/// Dataset name derived from a file stem, e.g. `knowbe4_data.csv` → `knowbe4_data`
pub fn dataset_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn open(path: &Path) -> Result<File, IngestError> {
    File::open(path).map_err(|source| IngestError::Open {
        path: path.display().to_string(),
        source,
    })
}

/// One summary fragment per column of a tabular CSV
pub fn summarize_table<R: Read>(
    reader: R,
    dataset: &str,
    config: &IngestConfig,
) -> Result<Extraction, IngestError> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = csv.headers()?.clone();

    let mut columns: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    let mut rows = 0usize;
    for record in csv.records() {
        let record = record?;
        for (column, value) in columns.iter_mut().zip(record.iter()) {
            column.push(value.to_string());
        }
        rows += 1;
    }

    if rows == 0 {
        return Err(IngestError::EmptyDataset(dataset.to_string()));
    }

    let mut extraction = Extraction::default();
    for (name, values) in headers.iter().zip(&columns) {
        match summarize_column(dataset, name, values, config.categorical_top_values) {
            Some((text, kind)) => extraction.fragments.push(Fragment::new(
                text,
                metadata([
                    ("type", kind.metadata_type()),
                    ("dataset", dataset),
                    ("column", name),
                ]),
            )),
            None => {
                tracing::debug!("Column '{}' in '{}' has no values", name, dataset);
                extraction.skipped += 1;
            }
        }
    }

    tracing::info!(
        "Summarized {} columns over {} rows from '{}'",
        extraction.fragments.len(),
        rows,
        dataset
    );
    Ok(extraction)
}

pub fn summarize_table_file(path: &Path, config: &IngestConfig) -> Result<Extraction, IngestError> {
    summarize_table(open(path)?, &dataset_name(path), config)
}

/// One fragment per transcript cell longer than `min_transcript_chars`
pub fn extract_transcripts<R: Read>(
    reader: R,
    dataset: &str,
    config: &IngestConfig,
) -> Result<Extraction, IngestError> {
    let mut csv = csv::ReaderBuilder::new().from_reader(reader);
    let column = csv
        .headers()?
        .iter()
        .position(|h| h.trim() == config.transcript_column)
        .ok_or_else(|| IngestError::MissingColumn {
            dataset: dataset.to_string(),
            column: config.transcript_column.clone(),
        })?;

    let mut extraction = Extraction::default();
    for record in csv.records() {
        let record = record?;
        let text = record.get(column).unwrap_or("").trim();

        if text.chars().count() > config.min_transcript_chars {
            extraction.fragments.push(Fragment::new(
                text,
                metadata([("type", QUALITATIVE_TRANSCRIPT), ("dataset", dataset)]),
            ));
        } else {
            extraction.skipped += 1;
        }
    }

    tracing::info!(
        "Extracted {} transcripts from '{}' ({} too short)",
        extraction.fragments.len(),
        dataset,
        extraction.skipped
    );
    Ok(extraction)
}

pub fn extract_transcripts_file(
    path: &Path,
    config: &IngestConfig,
) -> Result<Extraction, IngestError> {
    extract_transcripts(open(path)?, &dataset_name(path), config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SURVEY: &str = "\
Department,Action,Score
IT,Clicked,4
HR,Reported,2
IT,Clicked,5
Sales,Ignored,1
";

    #[test]
    fn test_summarize_table() {
        let extraction =
            summarize_table(SURVEY.as_bytes(), "survey", &IngestConfig::default()).unwrap();

        let texts: Vec<&str> = extraction
            .fragments
            .iter()
            .map(|f| f.text.as_str())
            .collect();
        assert_eq!(
            texts,
            vec![
                "In survey, column Department shows: {IT: 2, HR: 1, Sales: 1}",
                "In survey, column Action shows: {Clicked: 2, Reported: 1, Ignored: 1}",
                "In survey, Score has mean 3.00, std 1.83, range 1.00-5.00",
            ]
        );

        let score = &extraction.fragments[2].metadata;
        assert_eq!(score["type"].as_str(), Some(NUMERICAL_ANALYSIS));
        assert_eq!(score["dataset"].as_str(), Some("survey"));
        assert_eq!(score["column"].as_str(), Some("Score"));
        assert_eq!(
            extraction.fragments[0].metadata["type"].as_str(),
            Some(CATEGORICAL_ANALYSIS)
        );
    }

    #[test]
    fn test_summarize_header_only_is_empty() {
        let result = summarize_table("a,b\n".as_bytes(), "blank", &IngestConfig::default());
        assert!(matches!(result, Err(IngestError::EmptyDataset(name)) if name == "blank"));
    }

    #[test]
    fn test_all_empty_column_skipped() {
        let extraction = summarize_table(
            "a,b\n1,\n2,\n".as_bytes(),
            "sparse",
            &IngestConfig::default(),
        )
        .unwrap();
        assert_eq!(extraction.fragments.len(), 1);
        assert_eq!(extraction.skipped, 1);
    }

    #[test]
    fn test_extract_transcripts() {
        let long = "I always hover over links before clicking anything in an email.";
        let csv = format!(
            "participant,transcript_text\np1,\"{}\"\np2,too short\np3,\n",
            long
        );

        let extraction =
            extract_transcripts(csv.as_bytes(), "interviews", &IngestConfig::default()).unwrap();
        assert_eq!(extraction.fragments.len(), 1);
        assert_eq!(extraction.skipped, 2);
        assert_eq!(extraction.fragments[0].text, long);
        assert_eq!(
            extraction.fragments[0].metadata["type"].as_str(),
            Some(QUALITATIVE_TRANSCRIPT)
        );
    }

    #[test]
    fn test_transcript_length_is_strict() {
        let config = IngestConfig {
            min_transcript_chars: 5,
            ..IngestConfig::default()
        };
        let extraction =
            extract_transcripts("transcript_text\nfives\nsixsix\n".as_bytes(), "t", &config)
                .unwrap();
        assert_eq!(extraction.fragments.len(), 1);
        assert_eq!(extraction.fragments[0].text, "sixsix");
    }

    #[test]
    fn test_missing_transcript_column() {
        let result = extract_transcripts(
            "participant,notes\np1,hello\n".as_bytes(),
            "interviews",
            &IngestConfig::default(),
        );
        assert!(matches!(result, Err(IngestError::MissingColumn { column, .. }) if column == "transcript_text"));
    }

    #[test]
    fn test_dataset_name() {
        assert_eq!(
            dataset_name(Path::new("/data/KnowBe4 Data.csv")),
            "KnowBe4 Data"
        );
    }
}
