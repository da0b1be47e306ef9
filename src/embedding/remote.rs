//! OpenAI-compatible embedding endpoint

use super::{EmbeddingError, EmbeddingProvider};
use crate::config::EmbeddingConfig;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::thread::sleep;
use std::time::Duration;

const RETRY_BASE_DELAY_MS: u64 = 500;
const MAX_RETRY_DELAY_MS: u64 = 30_000;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// Blocking client for `POST {base_url}/embeddings`
///
/// Transport failures, 429 and 5xx responses are retried up to `max_retries`
/// times with exponential backoff. Authentication failures are returned at once.
pub struct OpenAiProvider {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_retries: u32,
    dimension: OnceLock<usize>,
}

impl OpenAiProvider {
    pub fn new(
        base_url: &str,
        api_key: String,
        model: &str,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            api_key,
            model: model.to_string(),
            max_retries,
            dimension: OnceLock::new(),
        })
    }

    /// Build from config, reading the API key from `embedding.api_key_env`
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| EmbeddingError::MissingApiKey(config.api_key_env.clone()))?;

        Self::new(
            &config.base_url,
            api_key,
            &config.model,
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )
    }

    fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut attempt = 0;
        loop {
            match self.send_once(texts) {
                Ok(embeddings) => return Ok(embeddings),
                Err(e) if attempt < self.max_retries && is_retryable(&e) => {
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        "Embedding request failed (attempt {}/{}): {}; retrying in {:?}",
                        attempt + 1,
                        self.max_retries + 1,
                        e,
                        delay
                    );
                    sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn send_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .map_err(|e| EmbeddingError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().unwrap_or_default();
            return Err(EmbeddingError::Authentication(body));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(EmbeddingError::Service {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .map_err(|e| EmbeddingError::GenerationError(format!("Malformed response: {}", e)))?;

        self.collect_embeddings(parsed, texts.len())
    }

    fn collect_embeddings(
        &self,
        mut response: EmbeddingResponse,
        expected: usize,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if response.data.len() != expected {
            return Err(EmbeddingError::GenerationError(format!(
                "Embedding count mismatch: expected {}, got {}",
                expected,
                response.data.len()
            )));
        }

        response.data.sort_by_key(|datum| datum.index);
        if let Some(position) = response.data.iter().enumerate().position(|(i, d)| d.index != i) {
            return Err(EmbeddingError::GenerationError(format!(
                "Unexpected embedding index {} at position {}",
                response.data[position].index, position
            )));
        }
        let embeddings: Vec<Vec<f32>> = response.data.into_iter().map(|d| d.embedding).collect();

        for embedding in &embeddings {
            let dimension = *self.dimension.get_or_init(|| embedding.len());
            if embedding.len() != dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: dimension,
                    actual: embedding.len(),
                });
            }
        }

        Ok(embeddings)
    }
}

/// Exponential backoff from `RETRY_BASE_DELAY_MS`, capped at `MAX_RETRY_DELAY_MS`
fn backoff_delay(attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(
        RETRY_BASE_DELAY_MS
            .saturating_mul(factor)
            .min(MAX_RETRY_DELAY_MS),
    )
}

fn is_retryable(error: &EmbeddingError) -> bool {
    match error {
        EmbeddingError::Transport(_) => true,
        EmbeddingError::Service { status, .. } => *status == 429 || *status >= 500,
        _ => false,
    }
}

impl EmbeddingProvider for OpenAiProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        self.request(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::GenerationError("No embeddings generated".to_string()))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(position) = texts.iter().position(|t| t.is_empty()) {
            return Err(EmbeddingError::InvalidInput(format!(
                "Empty text at position {}",
                position
            )));
        }
        self.request(texts)
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
