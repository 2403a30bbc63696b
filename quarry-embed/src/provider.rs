//! Embedding provider trait and the remote HTTP implementation

use crate::config::{API_KEY_ENV, EmbedConfig};
use crate::error::{EmbedError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Trait for embedding providers that can generate vectors from text.
///
/// `embed_texts` returns one slot per input, preserving order. A `None` slot
/// signals a hard failure for that input's batch rather than an error: the
/// caller decides whether partial success is acceptable. `Err` is reserved
/// for conditions under which no batch could even be attempted.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text (a one-item batch).
    async fn embed_text(&self, text: &str) -> Result<Option<Vec<f32>>> {
        let texts = [text.to_string()];
        let mut result = self.embed_texts(&texts).await?;
        Ok(result.pop().flatten())
    }

    /// Generate embeddings for multiple texts, batching as needed.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>>;

    /// The dimension of vectors produced by this provider.
    fn dimension(&self) -> usize;

    /// The name/identifier of this provider.
    fn provider_name(&self) -> &str;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    total_tokens: u64,
}

/// Remote embedding provider speaking the OpenAI `/embeddings` wire format.
///
/// Texts are grouped into batches of `batch_size`; each batch is one POST.
/// A failed call is retried up to `max_retries` times with linearly
/// increasing delay (`base_delay * attempt`). A batch that exhausts its
/// retries resolves to `None` for every slot it covers, and the failure is
/// logged with the batch boundaries for diagnosis.
///
/// This client has no knowledge of documents or chunks.
pub struct RemoteEmbeddingProvider {
    config: EmbedConfig,
    client: reqwest::Client,
    api_key: String,
}

impl std::fmt::Debug for RemoteEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteEmbeddingProvider")
            .field("model", &self.config.model)
            .field("api_base", &self.config.api_base)
            .field("dimension", &self.config.dimension)
            .finish()
    }
}

impl RemoteEmbeddingProvider {
    /// Create a provider from configuration.
    ///
    /// The API key is taken from the configuration or, failing that, the
    /// `OPENAI_API_KEY` environment variable.
    pub fn new(config: EmbedConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .ok_or_else(|| EmbedError::MissingApiKey {
                env_var: API_KEY_ENV.to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            config,
            client,
            api_key,
        })
    }

    /// Send one batch with retry/backoff and return vectors in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.config.api_base.trim_end_matches('/'));
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
        };

        let mut last_err = None;

        for attempt in 1..=self.config.max_retries {
            if attempt > 1 {
                tokio::time::sleep(self.config.base_delay * (attempt - 1)).await;
            }

            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await;

            match response {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body: EmbeddingResponse = response.json().await?;
                        return self.sort_and_validate(body, texts.len());
                    }

                    let body = response.text().await.unwrap_or_default();

                    // Rate limits and server errors are transient
                    if status.as_u16() == 429 || status.is_server_error() {
                        tracing::warn!(
                            attempt,
                            max_retries = self.config.max_retries,
                            %status,
                            "embedding call failed, will retry"
                        );
                        last_err = Some(EmbedError::Api {
                            status: status.as_u16(),
                            body,
                        });
                        continue;
                    }

                    // Any other client error is not retryable
                    return Err(EmbedError::Api {
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_retries = self.config.max_retries,
                        error = %e,
                        "embedding call failed, will retry"
                    );
                    last_err = Some(e.into());
                }
            }
        }

        Err(last_err.unwrap_or_else(|| EmbedError::malformed("no attempt was made")))
    }

    /// Order response rows by their input index and validate shape.
    fn sort_and_validate(
        &self,
        response: EmbeddingResponse,
        expected_len: usize,
    ) -> Result<Vec<Vec<f32>>> {
        if response.data.len() != expected_len {
            return Err(EmbedError::malformed(format!(
                "expected {expected_len} embeddings, got {}",
                response.data.len()
            )));
        }

        if let Some(usage) = &response.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                total_tokens = usage.total_tokens,
                "embedding batch usage"
            );
        }

        let mut ordered: Vec<Option<Vec<f32>>> = vec![None; expected_len];
        for row in response.data {
            if row.embedding.len() != self.config.dimension {
                return Err(EmbedError::DimensionMismatch {
                    expected: self.config.dimension,
                    actual: row.embedding.len(),
                });
            }
            let slot = ordered.get_mut(row.index).ok_or_else(|| {
                EmbedError::malformed(format!("embedding index {} out of range", row.index))
            })?;
            *slot = Some(row.embedding);
        }

        ordered
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| EmbedError::malformed("duplicate or missing embedding index"))
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbeddingProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let batch_size = self.config.batch_size.max(1);

        for (batch_number, batch_start) in (0..texts.len()).step_by(batch_size).enumerate() {
            let batch_end = (batch_start + batch_size).min(texts.len());
            let batch = &texts[batch_start..batch_end];

            tracing::debug!(
                batch_number,
                batch_start,
                batch_end,
                "embedding batch of {} texts",
                batch.len()
            );

            match self.embed_batch(batch).await {
                Ok(vectors) => {
                    for (slot, vector) in results[batch_start..batch_end].iter_mut().zip(vectors) {
                        *slot = Some(vector);
                    }
                }
                Err(e) => {
                    tracing::error!(
                        batch_start,
                        batch_end,
                        error = %e,
                        "embedding batch failed after {} attempts",
                        self.config.max_retries
                    );
                }
            }
        }

        let succeeded = results.iter().filter(|r| r.is_some()).count();
        tracing::debug!("generated {succeeded}/{} embeddings", texts.len());

        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}
