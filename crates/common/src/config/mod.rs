//! Configuration management for the DocQA core
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use crate::errors::{AppError, Result};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct AppConfig {
    /// Chunking configuration
    #[serde(default)]
    #[validate(nested)]
    pub chunking: ChunkingConfig,

    /// Embedding service configuration
    #[serde(default)]
    #[validate(nested)]
    pub embedding: EmbeddingConfig,

    /// Vector store configuration
    #[serde(default)]
    #[validate(nested)]
    pub store: StoreConfig,

    /// Retrieval configuration
    #[serde(default)]
    #[validate(nested)]
    pub retrieval: RetrievalConfig,

    /// Language model configuration
    #[serde(default)]
    #[validate(nested)]
    pub llm: LlmConfig,

    /// Price table for cost accounting
    #[serde(default)]
    #[validate(nested)]
    pub pricing: PricingConfig,

    /// Indexing pipeline configuration
    #[serde(default)]
    #[validate(nested)]
    pub indexing: IndexingConfig,

    /// Observability configuration
    #[serde(default)]
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ChunkingConfig {
    /// Window size in tokens
    #[serde(default = "default_window_tokens")]
    #[validate(range(min = 1))]
    pub window_tokens: usize,

    /// Fraction of the window shared between consecutive chunks
    #[serde(default = "default_overlap_fraction")]
    #[validate(range(min = 0.0, max = 0.9))]
    pub overlap_fraction: f64,

    /// Fraction of the window searched backwards for a sentence boundary
    #[serde(default = "default_lookback_fraction")]
    #[validate(range(min = 0.0, max = 0.5))]
    pub boundary_lookback_fraction: f64,

    /// Tokenizer identifier: cl100k_base, whitespace
    #[serde(default = "default_tokenizer")]
    pub tokenizer: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, mock
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for the embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    #[validate(range(min = 1))]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Maximum elapsed retry time in seconds for transient failures
    #[serde(default = "default_embedding_retry_window")]
    pub retry_window_secs: u64,

    /// Batch size for embedding requests
    #[serde(default = "default_embedding_batch_size")]
    #[validate(range(min = 1))]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct StoreConfig {
    /// Path of the persisted vector store file
    #[serde(default = "default_store_path")]
    #[validate(length(min = 1))]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per question
    #[serde(default = "default_top_k")]
    #[validate(range(min = 1))]
    pub top_k: usize,

    /// Results scoring below this similarity are dropped
    #[serde(default = "default_min_score")]
    #[validate(range(min = -1.0, max = 1.0))]
    pub min_score: f32,

    /// Token-overlap ratio above which same-page results are deduplicated
    #[serde(default = "default_dedup_overlap")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub dedup_overlap: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct LlmConfig {
    /// Chat completions endpoint
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// API key for the language model
    pub api_key: Option<String>,

    /// Model name
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Maximum tokens generated per answer
    #[serde(default = "default_llm_max_tokens")]
    #[validate(range(min = 1))]
    pub max_tokens: usize,

    /// Sampling temperature (0 = deterministic, preferred for grounded answers)
    #[serde(default = "default_llm_temperature")]
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct PricingConfig {
    /// Price table version, recorded with every session snapshot
    #[serde(default = "default_price_version")]
    pub version: String,

    /// USD per 1000 prompt tokens
    #[serde(default = "default_prompt_price")]
    #[validate(range(min = 0.0))]
    pub prompt_usd_per_1k: f64,

    /// USD per 1000 completion tokens
    #[serde(default = "default_completion_price")]
    #[validate(range(min = 0.0))]
    pub completion_usd_per_1k: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct IndexingConfig {
    /// Documents processed concurrently
    #[serde(default = "default_max_concurrent_documents")]
    #[validate(range(min = 1))]
    pub max_concurrent_documents: usize,

    /// Behavior when a chunk fails to embed: skip, abort
    #[serde(default = "default_on_embedding_error")]
    pub on_embedding_error: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_window_tokens() -> usize { 500 }
fn default_overlap_fraction() -> f64 { 0.10 }
fn default_lookback_fraction() -> f64 { 0.10 }
fn default_tokenizer() -> String { "cl100k_base".to_string() }
fn default_embedding_provider() -> String { "openai".to_string() }
fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }
fn default_embedding_dimension() -> usize { 1536 }
fn default_embedding_timeout() -> u64 { 30 }
fn default_embedding_retry_window() -> u64 { 60 }
fn default_embedding_batch_size() -> usize { 32 }
fn default_store_path() -> String { "data/vector_store.json".to_string() }
fn default_top_k() -> usize { 3 }
fn default_min_score() -> f32 { 0.25 }
fn default_dedup_overlap() -> f32 { 0.5 }
fn default_llm_endpoint() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_llm_model() -> String { "gpt-4o-mini".to_string() }
fn default_llm_max_tokens() -> usize { 1024 }
fn default_llm_temperature() -> f32 { 0.0 }
fn default_llm_timeout() -> u64 { 30 }
fn default_price_version() -> String { "openai-2025-06".to_string() }
fn default_prompt_price() -> f64 { 0.0005 }
fn default_completion_price() -> f64 { 0.0015 }
fn default_max_concurrent_documents() -> usize { 4 }
fn default_on_embedding_error() -> String { "skip".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { false }
fn default_service_name() -> String { "docqa".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__CHUNKING__WINDOW_TOKENS=400
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_error)?;

        let config: AppConfig = config.try_deserialize().map_err(config_error)?;
        config.check()?;
        Ok(config)
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_error)?;

        let config: AppConfig = config.try_deserialize().map_err(config_error)?;
        config.check()?;
        Ok(config)
    }

    /// Validate field ranges after deserialization
    pub fn check(&self) -> Result<()> {
        self.validate().map_err(|e| AppError::Configuration {
            message: e.to_string(),
        })
    }

    /// Get embedding request timeout as Duration
    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding.timeout_secs)
    }

    /// Get language-model request timeout as Duration
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_secs)
    }

    /// Overlap between consecutive chunks, in tokens
    pub fn overlap_tokens(&self) -> usize {
        (self.chunking.window_tokens as f64 * self.chunking.overlap_fraction).floor() as usize
    }
}

fn config_error(e: ConfigError) -> AppError {
    AppError::Configuration {
        message: e.to_string(),
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_tokens: default_window_tokens(),
            overlap_fraction: default_overlap_fraction(),
            boundary_lookback_fraction: default_lookback_fraction(),
            tokenizer: default_tokenizer(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            retry_window_secs: default_embedding_retry_window(),
            batch_size: default_embedding_batch_size(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: default_min_score(),
            dedup_overlap: default_dedup_overlap(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            api_key: None,
            model: default_llm_model(),
            max_tokens: default_llm_max_tokens(),
            temperature: default_llm_temperature(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            version: default_price_version(),
            prompt_usd_per_1k: default_prompt_price(),
            completion_usd_per_1k: default_completion_price(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            max_concurrent_documents: default_max_concurrent_documents(),
            on_embedding_error: default_on_embedding_error(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            service_name: default_service_name(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            store: StoreConfig::default(),
            retrieval: RetrievalConfig::default(),
            llm: LlmConfig::default(),
            pricing: PricingConfig::default(),
            indexing: IndexingConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.chunking.window_tokens, 500);
        assert_eq!(config.overlap_tokens(), 50);
        assert_eq!(config.retrieval.top_k, 3);
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_invalid_overlap_rejected() {
        let mut config = AppConfig::default();
        config.chunking.overlap_fraction = 1.5;
        assert!(config.check().is_err());
    }

    #[test]
    fn test_timeouts() {
        let config = AppConfig::default();
        assert_eq!(config.embedding_timeout(), Duration::from_secs(30));
        assert_eq!(config.llm_timeout(), Duration::from_secs(30));
    }
}
