//! Configuration management for kindex
//!
//! Loads the TOML configuration, applies profile and environment overrides,
//! and validates the result before any component is constructed.

use crate::error::{KindexError, Result};
use crate::index::RebuildPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub query: QueryConfig,
    pub ingest: IngestConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Snapshot storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// File name of the default snapshot inside `data_dir`
    pub snapshot_name: String,
    /// Compress snapshot and index artifact with zstd
    pub compress: bool,
    pub compression_level: i32,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub mode: String, // "offline" or "online"
    pub model: String,
    pub batch_size: usize,
    /// Base URL of the OpenAI-compatible endpoint (online mode)
    pub base_url: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub rebuild: RebuildPolicy,
}

/// Query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub default_top_k: usize,
    /// Results scoring at or below this value are dropped
    pub min_score: f32,
}

/// Tabular and transcript ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub categorical_top_values: usize,
    pub min_transcript_chars: usize,
    pub transcript_column: String,
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_top_k: Option<usize>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(KindexError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| KindexError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| KindexError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        Self::load(path)?.finish(Some(profile))
    }

    /// Built-in defaults with environment overrides, used when no config file exists
    pub fn from_defaults(profile: Option<&str>) -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.finish(profile)
    }

    fn finish(mut self, profile: Option<&str>) -> Result<Self> {
        if let Some(profile) = profile {
            self.apply_profile(profile)?;
        }
        ConfigValidator::validate(&self)?;
        Ok(self)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| KindexError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(mode) = overrides.embedding_mode {
            self.embedding.mode = mode;
        }
        if let Some(model) = overrides.embedding_model {
            self.embedding.model = model;
        }
        if let Some(top_k) = overrides.default_top_k {
            self.query.default_top_k = top_k;
        }
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: KINDEX_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("KINDEX_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        let invalid = |message: String| KindexError::InvalidConfigValue {
            path: path.to_string(),
            message,
        };

        match path {
            "STORAGE__DATA_DIR" => {
                self.storage.data_dir = PathBuf::from(value);
            }
            "EMBEDDING__MODE" => {
                self.embedding.mode = value.to_string();
            }
            "EMBEDDING__MODEL" => {
                self.embedding.model = value.to_string();
            }
            "EMBEDDING__BASE_URL" => {
                self.embedding.base_url = value.to_string();
            }
            "INDEX__REBUILD" => {
                self.index.rebuild = value.parse().map_err(invalid)?;
            }
            "QUERY__DEFAULT_TOP_K" => {
                self.query.default_top_k = value
                    .parse()
                    .map_err(|_| invalid(format!("Cannot parse '{}' as integer", value)))?;
            }
            "QUERY__MIN_SCORE" => {
                self.query.min_score = value
                    .parse()
                    .map_err(|_| invalid(format!("Cannot parse '{}' as float", value)))?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Path of the default snapshot, with `~` expanded
    pub fn snapshot_path(&self) -> Result<PathBuf> {
        Ok(expand_path(&self.storage.data_dir)?.join(&self.storage.snapshot_name))
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| KindexError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("kindex").join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("~/.kindex"),
                snapshot_name: "knowledge.kb".to_string(),
                compress: true,
                compression_level: 3,
            },
            embedding: EmbeddingConfig {
                mode: "online".to_string(),
                model: "text-embedding-3-small".to_string(),
                batch_size: 32,
                base_url: "https://api.openai.com/v1".to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
                timeout_secs: 30,
                max_retries: 0,
            },
            index: IndexConfig {
                rebuild: RebuildPolicy::OnStale,
            },
            query: QueryConfig {
                default_top_k: 5,
                min_score: 0.1,
            },
            ingest: IngestConfig::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            categorical_top_values: 5,
            min_transcript_chars: 50,
            transcript_column: "transcript_text".to_string(),
        }
    }
}

/// Expand a leading `~/` to the user's home directory
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| KindexError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| KindexError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_roundtrips_through_toml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let config = Config::default();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.query.default_top_k, 5);
        assert_eq!(loaded.index.rebuild, RebuildPolicy::OnStale);
        assert_eq!(loaded.storage.snapshot_name, "knowledge.kb");
    }

    #[test]
    fn test_missing_config_file() {
        let result = Config::load(Path::new("/nonexistent/kindex/config.toml"));
        assert!(matches!(result, Err(KindexError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_apply_profile() {
        let mut config = Config::default();
        config.profiles.insert(
            "local".to_string(),
            ProfileOverrides {
                embedding_mode: Some("offline".to_string()),
                embedding_model: Some("all-MiniLM-L6-v2".to_string()),
                default_top_k: Some(10),
            },
        );

        config.apply_profile("local").unwrap();
        assert_eq!(config.embedding.mode, "offline");
        assert_eq!(config.embedding.model, "all-MiniLM-L6-v2");
        assert_eq!(config.query.default_top_k, 10);

        assert!(config.apply_profile("missing").is_err());
    }

    #[test]
    fn test_env_value_parsing() {
        let mut config = Config::default();
        config.set_value_from_env("INDEX__REBUILD", "when_empty").unwrap();
        config.set_value_from_env("QUERY__MIN_SCORE", "0.25").unwrap();
        assert_eq!(config.index.rebuild, RebuildPolicy::WhenEmpty);
        assert!((config.query.min_score - 0.25).abs() < f32::EPSILON);

        assert!(config.set_value_from_env("QUERY__DEFAULT_TOP_K", "many").is_err());
    }

    #[test]
    fn test_env_override_is_validated_without_file() {
        let mut config = Config::default();
        config.set_value_from_env("QUERY__MIN_SCORE", "NaN").unwrap();
        match config.finish(None) {
            Err(KindexError::ConfigValidation { errors }) => {
                assert_eq!(errors[0].path, "query.min_score");
            }
            other => panic!("expected validation errors, got {:?}", other),
        }

        assert!(Config::default().finish(Some("missing")).is_err());
        assert!(Config::default().finish(None).is_ok());
    }

    #[test]
    fn test_expand_path() {
        let plain = expand_path(Path::new("/tmp/kb")).unwrap();
        assert_eq!(plain, PathBuf::from("/tmp/kb"));

        let expanded = expand_path(Path::new("~/kb")).unwrap();
        assert!(!expanded.starts_with("~"));
    }
}
