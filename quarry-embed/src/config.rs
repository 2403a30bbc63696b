//! Configuration for the remote embedding provider

use std::time::Duration;

/// Environment variable holding the provider API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable overriding the provider base URL.
pub const API_BASE_ENV: &str = "OPENAI_BASE_URL";

/// Configuration for the remote embedding provider.
///
/// Defaults target `text-embedding-3-small` (1536 dimensions) with batches of
/// 100 inputs per request and three attempts per batch with linearly
/// increasing backoff.
#[derive(Debug, Clone)]
pub struct EmbedConfig {
    /// Base URL of the embedding API (the `/embeddings` path is appended).
    pub api_base: String,
    /// API key; falls back to [`API_KEY_ENV`] when absent.
    pub api_key: Option<String>,
    /// Model identifier sent with each request.
    pub model: String,
    /// Expected vector dimensionality for the selected model.
    pub dimension: usize,
    /// Number of texts sent in a single API call.
    pub batch_size: usize,
    /// Attempts per batch before the batch is given up.
    pub max_retries: u32,
    /// Base backoff delay; attempt N waits `base_delay * N`.
    pub base_delay: Duration,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        let model = "text-embedding-3-small".to_string();
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            dimension: dimension_for_model(&model),
            model,
            batch_size: 100,
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

impl EmbedConfig {
    /// Create a configuration for the named model with defaults for
    /// everything else. The dimension is inferred from the model name.
    pub fn new(model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            dimension: dimension_for_model(&model),
            model,
            ..Self::default()
        }
    }

    /// Create a configuration from the environment, reading
    /// [`API_KEY_ENV`] and an optional [`API_BASE_ENV`] override.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.api_key = std::env::var(API_KEY_ENV).ok();
        if let Ok(base) = std::env::var(API_BASE_ENV) {
            config.api_base = base;
        }
        config
    }

    /// Set the API key explicitly.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Override the provider base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set the number of texts per API call.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set the number of attempts per batch.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Set the base backoff delay between attempts.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Override the expected vector dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }
}

/// Vector dimensionality for known embedding models.
pub fn dimension_for_model(model: &str) -> usize {
    match model {
        "text-embedding-3-small" => 1536,
        "text-embedding-3-large" => 3072,
        // Older models all produce 1536-dimension vectors
        _ => 1536,
    }
}
