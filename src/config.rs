//! TOML configuration loading and validation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// SQLite database path.
    pub path: PathBuf,
    /// `"sqlite"` or `"memory"`.
    #[serde(default = "default_backend")]
    pub backend: String,
}

fn default_backend() -> String {
    "sqlite".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters repeated between consecutive chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    4000
}
fn default_chunk_overlap() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"openai"`, `"azure"`, or `"hash"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model name (OpenAI) or deployment name (Azure).
    #[serde(default = "default_model")]
    pub model: String,
    /// Vector dimensionality; every stored vector is validated against it.
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Upper bound on every provider call; a hung provider cannot block
    /// the pipeline.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Azure resource endpoint, e.g. `https://myresource.openai.azure.com`.
    #[serde(default)]
    pub azure_endpoint: Option<String>,
    #[serde(default)]
    pub azure_api_version: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dims: default_dims(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            azure_endpoint: None,
            azure_api_version: None,
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "text-embedding-3-large".to_string()
}
fn default_dims() -> usize {
    3072
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Default number of chunks returned per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.chunk_overlap must be smaller than chunking.chunk_size");
    }
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    match config.embedding.provider.as_str() {
        "openai" | "hash" => {}
        "azure" => {
            if config.embedding.azure_endpoint.is_none() {
                anyhow::bail!("embedding.azure_endpoint required for the azure provider");
            }
            if config.embedding.azure_api_version.is_none() {
                anyhow::bail!("embedding.azure_api_version required for the azure provider");
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be openai, azure, or hash.",
            other
        ),
    }
    match config.store.backend.as_str() {
        "sqlite" | "memory" => {}
        other => anyhow::bail!("Unknown store backend: '{}'. Must be sqlite or memory.", other),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("docvault.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        (tmp, path)
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let (_tmp, path) = write_config(
            r#"[store]
path = "/tmp/docvault.sqlite"
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.chunking.chunk_size, 4000);
        assert_eq!(cfg.chunking.chunk_overlap, 50);
        assert_eq!(cfg.embedding.provider, "openai");
        assert_eq!(cfg.retrieval.top_k, 5);
        assert_eq!(cfg.store.backend, "sqlite");
    }

    #[test]
    fn overlap_must_stay_below_size() {
        let (_tmp, path) = write_config(
            r#"[store]
path = "/tmp/docvault.sqlite"

[chunking]
chunk_size = 100
chunk_overlap = 100
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn azure_requires_endpoint_and_version() {
        let (_tmp, path) = write_config(
            r#"[store]
path = "/tmp/docvault.sqlite"

[embedding]
provider = "azure"
model = "text-embedding-3-large"
dims = 3072
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let (_tmp, path) = write_config(
            r#"[store]
path = "/tmp/docvault.sqlite"

[embedding]
provider = "carrier-pigeon"
"#,
        );
        assert!(load_config(&path).is_err());
    }
}
