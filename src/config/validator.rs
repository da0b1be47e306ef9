use crate::config::Config;
use crate::error::{KindexError, Result, ValidationError};

/// Upper bound on `embedding.max_retries`; backoff is capped, so more only adds wait
pub const MAX_RETRIES: u32 = 10;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_query(config, &mut errors);
        Self::validate_ingest(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(KindexError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.data_dir",
                "Data directory cannot be empty",
            ));
        }

        if config.storage.snapshot_name.is_empty() {
            errors.push(ValidationError::new(
                "storage.snapshot_name",
                "Snapshot name cannot be empty",
            ));
        }

        // zstd accepts 1..=22 for regular levels
        if !(1..=22).contains(&config.storage.compression_level) {
            errors.push(ValidationError::new(
                "storage.compression_level",
                format!(
                    "Compression level must be between 1 and 22, got {}",
                    config.storage.compression_level
                ),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let mode = &config.embedding.mode;
        if mode != "offline" && mode != "online" {
            errors.push(ValidationError::new(
                "embedding.mode",
                format!("Mode must be 'offline' or 'online', got '{}'", mode),
            ));
        }

        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if mode == "online" {
            let url = &config.embedding.base_url;
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(ValidationError::new(
                    "embedding.base_url",
                    format!("Base URL must start with http:// or https://, got '{}'", url),
                ));
            }

            if config.embedding.api_key_env.is_empty() {
                errors.push(ValidationError::new(
                    "embedding.api_key_env",
                    "API key environment variable name cannot be empty",
                ));
            }

            if config.embedding.timeout_secs == 0 {
                errors.push(ValidationError::new(
                    "embedding.timeout_secs",
                    "Timeout must be greater than 0",
                ));
            }
        }

        if config.embedding.max_retries > MAX_RETRIES {
            errors.push(ValidationError::new(
                "embedding.max_retries",
                format!(
                    "Max retries must be at most {}, got {}",
                    MAX_RETRIES, config.embedding.max_retries
                ),
            ));
        }
    }

    fn validate_query(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.query.default_top_k == 0 {
            errors.push(ValidationError::new(
                "query.default_top_k",
                "Default top_k must be at least 1",
            ));
        }

        // Scores are cosine similarities
        let min_score = config.query.min_score;
        if !(-1.0..=1.0).contains(&min_score) {
            errors.push(ValidationError::new(
                "query.min_score",
                format!("Minimum score must be between -1.0 and 1.0, got {}", min_score),
            ));
        }
    }

    fn validate_ingest(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.ingest.categorical_top_values == 0 {
            errors.push(ValidationError::new(
                "ingest.categorical_top_values",
                "Categorical top values must be greater than 0",
            ));
        }

        if config.ingest.transcript_column.is_empty() {
            errors.push(ValidationError::new(
                "ingest.transcript_column",
                "Transcript column name cannot be empty",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_mode() {
        let mut config = Config::default();
        config.embedding.mode = "invalid".to_string();
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = Config::default();
        config.storage.data_dir = PathBuf::new();
        config.query.default_top_k = 0;
        config.query.min_score = 1.5;

        match ConfigValidator::validate(&config) {
            Err(KindexError::ConfigValidation { errors }) => {
                assert_eq!(errors.len(), 3);
                assert_eq!(errors[0].path, "storage.data_dir");
            }
            other => panic!("expected validation errors, got {:?}", other),
        }
    }

    #[test]
    fn test_offline_mode_skips_endpoint_checks() {
        let mut config = Config::default();
        config.embedding.mode = "offline".to_string();
        config.embedding.base_url = String::new();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_max_retries_bounded() {
        let mut config = Config::default();
        config.embedding.max_retries = MAX_RETRIES;
        assert!(ConfigValidator::validate(&config).is_ok());

        config.embedding.max_retries = 1000;
        match ConfigValidator::validate(&config) {
            Err(KindexError::ConfigValidation { errors }) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].path, "embedding.max_retries");
            }
            other => panic!("expected validation errors, got {:?}", other),
        }
    }

    #[test]
    fn test_nan_min_score_rejected() {
        let mut config = Config::default();
        config.query.min_score = f32::NAN;
        assert!(ConfigValidator::validate(&config).is_err());
    }
}
