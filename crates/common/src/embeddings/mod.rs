//! Embedding service abstraction
//!
//! Provides a unified interface over embedding providers:
//! - OpenAI-compatible HTTP endpoints (text-embedding-3-small and friends)
//! - A deterministic local embedder for offline runs and tests
//!
//! The same preprocessing is applied at index time and query time; the
//! `EmbeddingIndex` normalizes vectors centrally, so implementations here
//! return raw model output.

use crate::config::EmbeddingConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use backoff::{future::retry, Error as BackoffError, ExponentialBackoffBuilder};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

/// OpenAI-compatible embedding client
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimension: usize,
    base_url: String,
    timeout: Duration,
    retry_window: Duration,
}

#[derive(Serialize)]
struct EmbeddingsRequest {
    input: Vec<String>,
    model: String,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    /// Create a new embedder from configuration
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AppError::Configuration {
                message: "embedding.api_key is required for the openai provider".to_string(),
            })?;

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            dimension: config.dimension,
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            timeout,
            retry_window: Duration::from_secs(config.retry_window_secs),
        })
    }

    /// Make a request, retrying transient failures with exponential backoff
    async fn request_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let policy = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(self.retry_window))
            .build();

        retry(policy, || async {
            self.make_request(texts).await.map_err(|e| {
                if e.is_retryable() {
                    tracing::warn!(error = %e, "Embedding request failed, retrying");
                    BackoffError::transient(e)
                } else {
                    BackoffError::permanent(e)
                }
            })
        })
        .await
    }

    async fn make_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);

        let request = EmbeddingsRequest {
            input: texts.to_vec(),
            model: self.model.clone(),
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EmbeddingRequest {
                message: format!("API error {}: {}", status, body),
                retryable: status.as_u16() == 429 || status.is_server_error(),
            });
        }

        let result: EmbeddingsResponse =
            response
                .json()
                .await
                .map_err(|e| AppError::EmbeddingRequest {
                    message: format!("failed to parse response: {}", e),
                    retryable: false,
                })?;

        let vectors: Vec<Vec<f32>> = result.data.into_iter().map(|d| d.embedding).collect();

        if vectors.len() != texts.len() {
            return Err(AppError::EmbeddingRequest {
                message: format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    vectors.len()
                ),
                retryable: false,
            });
        }
        for vector in &vectors {
            if vector.len() != self.dimension {
                return Err(AppError::EmbeddingRequest {
                    message: format!(
                        "embedding dimension mismatch: expected {}, got {}",
                        self.dimension,
                        vector.len()
                    ),
                    retryable: false,
                });
            }
        }

        Ok(vectors)
    }

    fn transport_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::EmbeddingTimeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            AppError::EmbeddingRequest {
                message: format!("request failed: {}", e),
                retryable: e.is_connect(),
            }
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.request_with_retry(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| AppError::EmbeddingRequest {
                message: "empty response".to_string(),
                retryable: false,
            })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // The API caps inputs per request well above this; stay conservative
        const MAX_INPUTS_PER_REQUEST: usize = 100;

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_INPUTS_PER_REQUEST) {
            let embeddings = self.request_with_retry(batch).await?;
            all_embeddings.extend(embeddings);
        }

        Ok(all_embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Deterministic local embedder for offline runs and tests.
///
/// Feature-hashes lowercased alphanumeric tokens into a fixed number of
/// buckets, so texts sharing vocabulary land near each other under cosine
/// similarity. Empty or punctuation-only input is rejected, which exercises
/// the malformed-input failure path.
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn bucket(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let raw = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]);
        raw as usize % self.dimension
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0f32; self.dimension];
        let mut seen_any = false;

        for raw in text.split_whitespace() {
            let token: String = raw
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(|c| c.to_lowercase())
                .collect();
            if token.is_empty() {
                continue;
            }
            seen_any = true;
            vector[self.bucket(&token)] += 1.0;
        }

        if !seen_any {
            return Err(AppError::EmbeddingRequest {
                message: "cannot embed empty text".to_string(),
                retryable: false,
            });
        }

        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    fn model_name(&self) -> &str {
        "mock-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiEmbedder::new(config)?)),
        "mock" => Ok(Arc::new(MockEmbedder::new(config.dimension))),
        other => {
            tracing::warn!(provider = other, "Unknown embedding provider, using mock");
            Ok(Arc::new(MockEmbedder::new(config.dimension)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        dot / (na * nb)
    }

    #[tokio::test]
    async fn test_mock_is_deterministic() {
        let embedder = MockEmbedder::new(256);
        let a = embedder.embed("notice period probation").await.unwrap();
        let b = embedder.embed("notice period probation").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 256);
    }

    #[tokio::test]
    async fn test_mock_shared_vocabulary_scores_higher() {
        let embedder = MockEmbedder::new(256);
        let target = embedder
            .embed("The notice period is one month at month-end.")
            .await
            .unwrap();
        let related = embedder.embed("What is the notice period?").await.unwrap();
        let unrelated = embedder
            .embed("Quarterly revenue grew by twelve percent.")
            .await
            .unwrap();

        assert!(cosine(&target, &related) > cosine(&target, &unrelated));
    }

    #[tokio::test]
    async fn test_mock_ignores_case_and_punctuation() {
        let embedder = MockEmbedder::new(256);
        let a = embedder.embed("Probation!").await.unwrap();
        let b = embedder.embed("probation").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_mock_rejects_empty_text() {
        let embedder = MockEmbedder::new(256);
        let err = embedder.embed("  ?! ").await.unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_mock_batch() {
        let embedder = MockEmbedder::new(64);
        let texts = vec!["first text".to_string(), "second text".to_string()];
        let embeddings = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].len(), 64);
    }

    #[test]
    fn test_factory_falls_back_to_mock() {
        let config = EmbeddingConfig {
            provider: "definitely-not-a-provider".to_string(),
            ..EmbeddingConfig::default()
        };
        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.model_name(), "mock-embedding");
    }

    #[test]
    fn test_openai_requires_api_key() {
        let config = EmbeddingConfig::default();
        assert!(OpenAiEmbedder::new(&config).is_err());
    }
}
