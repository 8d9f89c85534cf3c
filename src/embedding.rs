//! Embedding provider abstraction and implementations.
//!
//! The [`Embedder`] trait turns chunk or query text into a fixed-dimension
//! vector. The same provider must be used for ingestion and retrieval;
//! mixing models makes similarity scores meaningless, and the store
//! rejects vectors whose dimensionality differs from its contents.
//!
//! Providers:
//! - **`openai`** — `POST /v1/embeddings` with bearer auth.
//! - **`azure`** — Azure OpenAI deployment endpoint with `api-key` auth.
//! - **`hash`** — deterministic offline byte-bigram histogram, for
//!   development and tests.
//!
//! Remote providers retry transient failures with exponential backoff
//! (429/5xx/network errors; other 4xx fail immediately) and bound every
//! request with the configured timeout. A provider error is fatal to the
//! current ingest or query — it is never converted into a zero vector.
//!
//! Also provides the vector helpers shared by the SQLite backend:
//! [`vec_to_blob`], [`blob_to_vec`], and [`cosine_similarity`].

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use crate::config::EmbeddingConfig;

/// An embedding provider: converts text into a fixed-dimension vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-large"`).
    fn model_name(&self) -> &str;

    /// Embedding dimensionality (e.g. 1536 or 3072).
    fn dims(&self) -> usize;

    /// Embed a single chunk or query text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Instantiate the provider named in the configuration.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiEmbedder::new(config)?)),
        "azure" => Ok(Box::new(AzureEmbedder::new(config)?)),
        "hash" => Ok(Box::new(HashEmbedder::new(config.dims))),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

// ============ OpenAI provider ============

/// OpenAI embeddings API provider. Reads the key from `OPENAI_API_KEY`.
pub struct OpenAiEmbedder {
    model: String,
    dims: usize,
    api_key: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            api_key,
            client,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });
        let request = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body);
        let json = send_with_retry(request, self.max_retries).await?;
        let vector = parse_embedding_response(&json)?;
        check_dims(&vector, self.dims, &self.model)?;
        Ok(vector)
    }
}

// ============ Azure OpenAI provider ============

/// Azure OpenAI embeddings provider. The endpoint, deployment name, and
/// API version come from config; the key from `AZURE_OPENAI_API_KEY`.
pub struct AzureEmbedder {
    deployment: String,
    dims: usize,
    url: String,
    api_key: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl AzureEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let endpoint = config
            .azure_endpoint
            .as_deref()
            .context("embedding.azure_endpoint required for the azure provider")?;
        let api_version = config
            .azure_api_version
            .as_deref()
            .context("embedding.azure_api_version required for the azure provider")?;
        let api_key = std::env::var("AZURE_OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("AZURE_OPENAI_API_KEY environment variable not set"))?;
        let url = format!(
            "{}/openai/deployments/{}/embeddings?api-version={}",
            endpoint.trim_end_matches('/'),
            config.model,
            api_version
        );
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            deployment: config.model.clone(),
            dims: config.dims,
            url,
            api_key,
            client,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for AzureEmbedder {
    fn model_name(&self) -> &str {
        &self.deployment
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({ "input": text });
        let request = self
            .client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&body);
        let json = send_with_retry(request, self.max_retries).await?;
        let vector = parse_embedding_response(&json)?;
        check_dims(&vector, self.dims, &self.deployment)?;
        Ok(vector)
    }
}

// ============ Hash provider ============

/// Deterministic offline embedder: an L2-normalized histogram of byte
/// bigrams. Not semantically meaningful, but identical text always maps
/// to an identical vector, which is what development and tests need.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dims];
        let bytes = text.as_bytes();
        for window in bytes.windows(2) {
            let bucket = (window[0] as usize * 31 + window[1] as usize) % self.dims;
            vector[bucket] += 1.0;
        }
        if bytes.len() == 1 {
            vector[bytes[0] as usize % self.dims] += 1.0;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

// ============ Shared HTTP plumbing ============

/// Send a request with exponential backoff: 429/5xx/network errors retry
/// (1s, 2s, 4s, ... capped at 2^5), other 4xx fail immediately.
async fn send_with_retry(
    request: reqwest::RequestBuilder,
    max_retries: u32,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let req = request
            .try_clone()
            .context("embedding request is not cloneable")?;

        match req.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response.json().await?);
                }
                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow::anyhow!(
                        "embedding API error {}: {}",
                        status,
                        body_text
                    ));
                    continue;
                }
                bail!("embedding API error {}: {}", status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("embedding failed after retries")))
}

/// Pull the first `data[].embedding` array out of an embeddings API
/// response (OpenAI and Azure share the shape).
fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let embedding = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|item| item.get("embedding"))
        .and_then(|e| e.as_array())
        .context("invalid embeddings response: missing data[0].embedding")?;

    embedding
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .context("invalid embeddings response: non-numeric vector entry")
        })
        .collect()
}

fn check_dims(vector: &[f32], expected: usize, model: &str) -> Result<()> {
    if vector.len() != expected {
        bail!(
            "model {} returned a {}-dimensional vector, expected {} (check embedding.dims)",
            model,
            vector.len(),
            expected
        );
    }
    Ok(())
}

// ============ Vector helpers ============

/// Encode a float vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cosine similarity between two vectors, clamped to `[-1.0, 1.0]`.
///
/// Floating error can push the raw ratio slightly outside the range;
/// clamping keeps ranking scores well defined. Empty or mismatched
/// vectors score `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    (dot / denom).clamp(-1.0, 1.0)
}
