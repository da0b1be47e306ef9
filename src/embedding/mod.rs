//! Embedding providers
//!
//! Every document and every query is turned into a vector by an
//! `EmbeddingProvider`. Two backends ship with the crate:
//! - FastEmbedProvider for local embedding ("offline" mode)
//! - OpenAiProvider for an OpenAI-compatible HTTP endpoint ("online" mode)

mod provider;
mod remote;

pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};
pub use remote::OpenAiProvider;

use crate::config::EmbeddingConfig;
use std::sync::Arc;

/// Build the provider selected by `embedding.mode`
pub fn provider_from_config(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    match config.mode.as_str() {
        "offline" => Ok(Arc::new(FastEmbedProvider::new(&config.model)?)),
        "online" => Ok(Arc::new(OpenAiProvider::from_config(config)?)),
        other => Err(EmbeddingError::InitializationError(format!(
            "Unknown embedding mode: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_unknown_mode_rejected() {
        let mut config = Config::default().embedding;
        config.mode = "telepathy".to_string();
        assert!(matches!(
            provider_from_config(&config),
            Err(EmbeddingError::InitializationError(_))
        ));
    }
}
