use crate::embeddings::{EmbeddingMatrix, Encoder};
use crate::error::{RagvalError, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default endpoint for the OpenAI embeddings API
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Largest `input` array the API accepts per request
const MAX_REQUEST_BATCH: usize = 2048;

/// Request structure for OpenAI embeddings API
#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Response structure from OpenAI embeddings API
#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

/// Individual embedding data in API response
#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// A failed request, tagged with whether it is worth retrying.
struct ApiFailure {
    retryable: bool,
    message: String,
}

/// Encoder backed by an OpenAI-compatible embeddings endpoint.
///
/// Texts are sent in sub-batches of `batch_size`. Rate limits (429) and
/// server errors (5xx) are retried with exponential backoff; anything else
/// fails the call.
pub struct OpenAIEncoder {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    batch_size: usize,
    dimensions: usize,
    query_instruction: Option<String>,
    max_retries: usize,
}

impl OpenAIEncoder {
    /// Create a new encoder
    ///
    /// # Arguments
    ///
    /// * `api_key` - API key sent as a bearer token
    /// * `model` - Model name (e.g., "text-embedding-3-small")
    /// * `batch_size` - Maximum number of texts per API request (capped at 2048)
    /// * `dimensions` - Expected embedding dimension; responses of any other size are rejected
    pub fn new(api_key: String, model: String, batch_size: usize, dimensions: usize) -> Result<Self> {
        let batch_size = batch_size.clamp(1, MAX_REQUEST_BATCH);

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RagvalError::Embedding(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model,
            batch_size,
            dimensions,
            query_instruction: None,
            max_retries: 3,
        })
    }

    /// Point the encoder at another OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Prefix prepended to every query text (not to corpus passages).
    pub fn with_query_instruction(mut self, instruction: Option<String>) -> Self {
        self.query_instruction = instruction.filter(|s| !s.is_empty());
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Embed texts in order, splitting into API-sized batches.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut all_embeddings = Vec::with_capacity(texts.len());
        let total_batches = texts.len().div_ceil(self.batch_size);

        for (i, chunk) in texts.chunks(self.batch_size).enumerate() {
            let embeddings = self.embed_batch_with_retry(chunk).await?;
            all_embeddings.extend(embeddings);
            log::debug!("Embedded batch {}/{} ({} texts)", i + 1, total_batches, chunk.len());

            // Rate limiting: small delay between full batches
            if chunk.len() == self.batch_size && i + 1 < total_batches {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }

        Ok(all_embeddings)
    }

    async fn embed_batch_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = std::time::Instant::now();
        let mut attempt = 0;
        let mut delay = Duration::from_secs(1);

        loop {
            match self.embed_batch_internal(texts).await {
                Ok(embeddings) => {
                    log::debug!(
                        "Embedding API call took {:?} (attempt {})",
                        start.elapsed(),
                        attempt + 1
                    );
                    return Ok(embeddings);
                }
                Err(failure) if failure.retryable && attempt < self.max_retries => {
                    log::warn!(
                        "Retry {}/{} after error: {}",
                        attempt + 1,
                        self.max_retries,
                        failure.message
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(failure) => return Err(RagvalError::Embedding(failure.message)),
            }
        }
    }

    /// Make a single API request
    async fn embed_batch_internal(
        &self,
        texts: &[String],
    ) -> std::result::Result<Vec<Vec<f32>>, ApiFailure> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiFailure {
                retryable: e.is_timeout() || e.is_connect(),
                message: format!("Network error: {}", e),
            })?;

        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(ApiFailure {
                retryable: is_retryable(status),
                message: format!("Embeddings API error {}: {}", status, body),
            });
        }

        let result: EmbeddingResponse = response.json().await.map_err(|e| ApiFailure {
            retryable: false,
            message: format!("Failed to parse response: {}", e),
        })?;

        order_by_index(result.data, texts.len()).map_err(|message| ApiFailure {
            retryable: false,
            message,
        })
    }

    fn to_matrix(&self, rows: Vec<Vec<f32>>) -> Result<EmbeddingMatrix> {
        if let Some(bad) = rows.iter().find(|r| r.len() != self.dimensions) {
            return Err(RagvalError::DimensionMismatch {
                context: "embeddings API response",
                expected: self.dimensions,
                actual: bad.len(),
            });
        }
        EmbeddingMatrix::from_rows(rows)
    }
}

impl Encoder for OpenAIEncoder {
    type Elem = f32;

    async fn encode_queries(&self, texts: &[String]) -> Result<EmbeddingMatrix> {
        let prepared = apply_instruction(self.query_instruction.as_deref(), texts);
        let rows = self.embed_texts(&prepared).await?;
        self.to_matrix(rows)
    }

    async fn encode_corpus(&self, texts: &[String]) -> Result<EmbeddingMatrix> {
        let rows = self.embed_texts(texts).await?;
        self.to_matrix(rows)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn apply_instruction(instruction: Option<&str>, texts: &[String]) -> Vec<String> {
    match instruction {
        Some(prefix) => texts.iter().map(|t| format!("{}{}", prefix, t)).collect(),
        None => texts.to_vec(),
    }
}

/// The API may return items out of order; place each at its `index`.
fn order_by_index(
    data: Vec<EmbeddingData>,
    expected: usize,
) -> std::result::Result<Vec<Vec<f32>>, String> {
    if data.len() != expected {
        return Err(format!(
            "Expected {} embeddings in response, got {}",
            expected,
            data.len()
        ));
    }
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in data {
        let Some(slot) = slots.get_mut(item.index) else {
            return Err(format!("Embedding index {} out of range", item.index));
        };
        if slot.is_some() {
            return Err(format!("Duplicate embedding index {}", item.index));
        }
        *slot = Some(item.embedding);
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(i, s)| s.ok_or_else(|| format!("Missing embedding for input {}", i)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder(batch_size: usize) -> OpenAIEncoder {
        OpenAIEncoder::new(
            "test-key".to_string(),
            "text-embedding-3-small".to_string(),
            batch_size,
            1536,
        )
        .unwrap()
    }

    #[test]
    fn test_encoder_new() {
        let enc = encoder(100);
        assert_eq!(enc.model_name(), "text-embedding-3-small");
        assert_eq!(enc.batch_size, 100);
        assert_eq!(enc.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_encoder_batch_size_limit() {
        assert_eq!(encoder(5000).batch_size, 2048);
        assert_eq!(encoder(2048).batch_size, 2048);
        assert_eq!(encoder(0).batch_size, 1);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let enc = encoder(10).with_base_url("http://localhost:8080/v1/");
        assert_eq!(enc.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_query_instruction_applied_to_queries_only() {
        let texts = vec!["why do cats purr".to_string()];
        let prepared = apply_instruction(Some("Represent this question: "), &texts);
        assert_eq!(prepared, vec!["Represent this question: why do cats purr"]);
        assert_eq!(apply_instruction(None, &texts), texts);

        let enc = encoder(10).with_query_instruction(Some(String::new()));
        assert!(enc.query_instruction.is_none());
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_order_by_index_restores_input_order() {
        let data = vec![
            EmbeddingData { embedding: vec![2.0], index: 1 },
            EmbeddingData { embedding: vec![1.0], index: 0 },
        ];
        let ordered = order_by_index(data, 2).unwrap();
        assert_eq!(ordered, vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn test_order_by_index_rejects_bad_responses() {
        let short = vec![EmbeddingData { embedding: vec![1.0], index: 0 }];
        assert!(order_by_index(short, 2).is_err());

        let dup = vec![
            EmbeddingData { embedding: vec![1.0], index: 0 },
            EmbeddingData { embedding: vec![2.0], index: 0 },
        ];
        assert!(order_by_index(dup, 2).is_err());

        let out_of_range = vec![EmbeddingData { embedding: vec![1.0], index: 5 }];
        assert!(order_by_index(out_of_range, 1).is_err());
    }

    #[test]
    fn test_to_matrix_checks_dimension() {
        let enc = OpenAIEncoder::new("k".into(), "m".into(), 8, 3).unwrap();
        assert!(enc.to_matrix(vec![vec![0.0; 3], vec![0.0; 3]]).is_ok());
        let err = enc.to_matrix(vec![vec![0.0; 4]]).unwrap_err();
        assert!(matches!(err, RagvalError::DimensionMismatch { expected: 3, actual: 4, .. }));
    }
}
