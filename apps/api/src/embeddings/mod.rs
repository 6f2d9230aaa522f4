//! Embedding Gateway: maps ordered text sequences to fixed-dimension vectors.
//!
//! Failures here are hard faults: ingestion and retrieval cannot proceed without a
//! vector, so errors propagate to the caller instead of degrading.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Invalid embedding input: {0}")]
    InvalidInput(String),

    #[error("Malformed embedding response: {0}")]
    Shape(String),
}

#[async_trait]
pub trait EmbeddingGateway: Send + Sync {
    /// Embeds `texts`, returning one vector per input in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| EmbeddingError::Shape("no vector returned for a single input".into()))
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    message: String,
}

/// OpenAI `/v1/embeddings` client with the same retry policy as the generation client.
#[derive(Clone)]
pub struct OpenAiEmbeddingClient {
    client: Client,
    api_key: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbeddingClient {
    pub fn new(api_key: String, model: String, dimension: usize) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            model,
            dimension,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request(&self, texts: &[String]) -> Result<EmbeddingResponse, EmbeddingError> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        let mut last_error: Option<EmbeddingError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Embedding call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self
                .client
                .post(OPENAI_EMBEDDINGS_URL)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(EmbeddingError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                let message = response.text().await.unwrap_or_default();
                warn!("Embedding API returned {}: {}", status, message);
                last_error = Some(EmbeddingError::Api {
                    status: status.as_u16(),
                    message,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<OpenAiError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(EmbeddingError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(response.json().await?);
        }

        Err(last_error.unwrap_or(EmbeddingError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl EmbeddingGateway for OpenAiEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        check_inputs(texts)?;

        let response = self.request(texts).await?;
        debug!("Embedded {} texts with {}", texts.len(), self.model);
        restore_order(response.data, texts.len(), self.dimension)
    }
}

/// The embeddings endpoint rejects blank strings, so they are refused up front.
pub fn check_inputs(texts: &[String]) -> Result<(), EmbeddingError> {
    match texts.iter().position(|t| t.trim().is_empty()) {
        Some(i) => Err(EmbeddingError::InvalidInput(format!("input {i} is empty"))),
        None => Ok(()),
    }
}

/// Places each returned vector at its reported input index. The transport does
/// not guarantee ordering; a missing, duplicated or mis-sized entry is an error.
fn restore_order(
    data: Vec<EmbeddingDatum>,
    expected: usize,
    dimension: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if data.len() != expected {
        return Err(EmbeddingError::Shape(format!(
            "expected {expected} embeddings, received {}",
            data.len()
        )));
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for datum in data {
        if datum.embedding.len() != dimension {
            return Err(EmbeddingError::Shape(format!(
                "embedding {} has dimension {}, expected {dimension}",
                datum.index,
                datum.embedding.len()
            )));
        }
        let Some(slot) = slots.get_mut(datum.index) else {
            return Err(EmbeddingError::Shape(format!(
                "embedding index {} out of range",
                datum.index
            )));
        };
        if slot.is_some() {
            return Err(EmbeddingError::Shape(format!(
                "duplicate embedding for index {}",
                datum.index
            )));
        }
        *slot = Some(datum.embedding);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.ok_or_else(|| EmbeddingError::Shape(format!("no embedding for index {i}")))
        })
        .collect()
}
