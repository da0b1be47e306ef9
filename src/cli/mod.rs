//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "kindex",
    version,
    about = "Semantic knowledge index for analysis pipelines",
    long_about = "Kindex stores knowledge fragments (dataset summaries, observations, transcripts) \
                  with their embeddings, answers top-k similarity queries, and persists the \
                  knowledge base to a snapshot file."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/kindex/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Knowledge base snapshot (defaults to <data_dir>/<snapshot_name>)
    #[arg(long, global = true, value_name = "FILE")]
    pub kb: Option<PathBuf>,

    /// Configuration profile to apply
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a single knowledge fragment
    Add {
        /// Fragment text
        text: String,

        /// Metadata entries as key=value
        #[arg(short, long = "meta", value_name = "KEY=VALUE")]
        metadata: Vec<String>,
    },

    /// Ingest datasets from CSV files
    Ingest {
        #[command(subcommand)]
        source: IngestSource,
    },

    /// Rebuild the vector index and save it alongside the snapshot
    Build,

    /// Query the knowledge base
    Query {
        /// Search query text
        query: String,

        /// Maximum number of results (defaults to query.default_top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show knowledge base statistics
    Stats {
        /// Show statistics in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum IngestSource {
    /// Summarize each column of a tabular dataset
    Table {
        /// CSV file
        file: PathBuf,

        /// Dataset name (defaults to the file stem)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Add each long-enough transcript as a fragment
    Transcripts {
        /// CSV file
        file: PathBuf,

        /// Dataset name (defaults to the file stem)
        #[arg(short, long)]
        name: Option<String>,

        /// Column holding transcript text (defaults to ingest.transcript_column)
        #[arg(long)]
        column: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Show only a specific section
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Split `key=value` metadata arguments
pub fn parse_metadata_pairs(pairs: &[String]) -> Result<Vec<(String, String)>, String> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.trim().to_string()))
            }
            _ => Err(format!("Expected KEY=VALUE, got '{}'", pair)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_query() {
        let cli = Cli::parse_from(["kindex", "--kb", "/tmp/kb.kb", "query", "phishing", "-k", "3"]);
        assert_eq!(cli.kb, Some(PathBuf::from("/tmp/kb.kb")));
        match cli.command {
            Commands::Query { query, top_k, json } => {
                assert_eq!(query, "phishing");
                assert_eq!(top_k, Some(3));
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_metadata_pairs() {
        let pairs = parse_metadata_pairs(&["type=note".to_string(), "source = ops ".to_string()])
            .unwrap();
        assert_eq!(
            pairs,
            vec![
                ("type".to_string(), "note".to_string()),
                ("source".to_string(), "ops".to_string())
            ]
        );
        assert!(parse_metadata_pairs(&["novalue".to_string()]).is_err());
        assert!(parse_metadata_pairs(&["=x".to_string()]).is_err());
    }
}
