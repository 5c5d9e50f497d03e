//! Runtime configuration: one immutable value threaded through every call.
//!
//! No module-level state and no in-place mutation; callers build a
//! [`RagConfig`] once (directly, or via [`RagConfig::from_env`]) and pass it
//! by reference.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::RagError;

/// Distance function used for the vector space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceKind {
    /// Cosine distance (recommended for most embeddings).
    Cosine,
    /// Dot product (useful for normalized vectors).
    Dot,
    /// Euclidean distance (L2).
    Euclid,
}

impl DistanceKind {
    /// Parse from an env string (case-insensitive). Defaults to Cosine.
    pub fn parse_or_default(s: Option<String>) -> Self {
        match s
            .unwrap_or_else(|| "Cosine".to_string())
            .to_lowercase()
            .as_str()
        {
            "dot" | "dotproduct" => DistanceKind::Dot,
            "euclid" | "euclidean" | "l2" => DistanceKind::Euclid,
            _ => DistanceKind::Cosine,
        }
    }
}

/// Qdrant connectivity and collection parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QdrantConfig {
    /// gRPC URL for Qdrant, e.g. `http://localhost:6334`.
    pub url: String,
    /// Optional API key for Qdrant Cloud.
    pub api_key: Option<String>,
    /// Target collection name.
    pub collection: String,
    /// Vector distance metric (Cosine by default).
    pub distance: DistanceKind,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            api_key: None,
            collection: "rag_chunks".to_string(),
            distance: DistanceKind::Cosine,
        }
    }
}

/// Embedding configuration (model, dimension, and concurrency).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding model identifier (e.g., "bge-m3").
    pub model: String,
    /// Embedding vector dimensionality, fixed per collection.
    pub dim: usize,
    /// Max concurrent embedding requests per batch.
    pub concurrency: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "bge-m3".to_string(),
            dim: 1024,
            concurrency: 4,
        }
    }
}

/// Text splitting parameters.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks to preserve context.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

/// Search behavior knobs.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of final results to return.
    pub k: usize,
    /// Initial candidate pool size for MMR (must be >= `k`).
    pub fetch_k: usize,
    /// Relevance/diversity trade-off: 1.0 = pure relevance, 0.0 = max diversity.
    pub mmr_lambda: f32,
    /// Add a keyword-filtered pass over the `search_terms` payload field.
    pub hybrid: bool,
    /// Optional minimum relevance score for candidates.
    pub min_score: Option<f32>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            k: 5,
            fetch_k: 20,
            mmr_lambda: 1.0,
            hybrid: true,
            min_score: None,
        }
    }
}

/// Bounded exponential backoff applied around store and embedding calls.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_retries: usize,
    /// Delay before the second attempt; doubles on each further attempt.
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 500,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// Top-level configuration for ingestion and retrieval.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RagConfig {
    /// Qdrant connectivity & collection settings.
    pub qdrant: QdrantConfig,
    /// Embedding backend settings.
    pub embedding: EmbeddingConfig,
    /// Text splitting settings.
    pub chunking: ChunkingConfig,
    /// Retrieval settings.
    pub search: SearchConfig,
    /// Retry/backoff settings.
    pub retry: RetryConfig,
    /// Upsert batch size (bounds peak memory and payload size).
    pub upsert_batch: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            qdrant: QdrantConfig::default(),
            embedding: EmbeddingConfig::default(),
            chunking: ChunkingConfig::default(),
            search: SearchConfig::default(),
            retry: RetryConfig::default(),
            upsert_batch: 64,
        }
    }
}

impl RagConfig {
    /// Creates a sane default config for a given Qdrant endpoint and
    /// collection name.
    pub fn new_default(url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            qdrant: QdrantConfig {
                url: url.into(),
                collection: collection.into(),
                ..QdrantConfig::default()
            },
            ..Self::default()
        }
    }

    /// Build configuration from environment variables.
    ///
    /// Environment variables used (all optional):
    /// - `QDRANT_URL` (default: "http://localhost:6334")
    /// - `QDRANT_API_KEY`
    /// - `QDRANT_COLLECTION` (default: "rag_chunks")
    /// - `QDRANT_DISTANCE` (values: "Cosine" | "Dot" | "Euclid")
    /// - `EMBEDDING_MODEL` (default: "bge-m3")
    /// - `EMBEDDING_DIM` (default: 1024)
    /// - `EMBEDDING_CONCURRENCY` (default: 4)
    /// - `CHUNK_SIZE` (default: 1000)
    /// - `CHUNK_OVERLAP` (default: 100)
    /// - `RAG_TOP_K` (default: 5)
    /// - `RAG_FETCH_K` (default: 20)
    /// - `RAG_MMR_LAMBDA` (default: 1.0)
    /// - `RAG_HYBRID` (default: true)
    /// - `RAG_MIN_SCORE` (optional)
    /// - `UPSERT_BATCH_SIZE` (default: 64)
    /// - `RETRY_MAX_ATTEMPTS` (default: 5)
    /// - `RETRY_BASE_DELAY_MS` (default: 500)
    pub fn from_env() -> Result<Self, RagError> {
        let cfg = Self {
            qdrant: QdrantConfig {
                url: std::env::var("QDRANT_URL")
                    .unwrap_or_else(|_| "http://localhost:6334".into()),
                api_key: std::env::var("QDRANT_API_KEY").ok(),
                collection: std::env::var("QDRANT_COLLECTION")
                    .unwrap_or_else(|_| "rag_chunks".into()),
                distance: DistanceKind::parse_or_default(std::env::var("QDRANT_DISTANCE").ok()),
            },
            embedding: EmbeddingConfig {
                model: std::env::var("EMBEDDING_MODEL").unwrap_or_else(|_| "bge-m3".into()),
                dim: read_usize_env("EMBEDDING_DIM").unwrap_or(1024),
                concurrency: read_usize_env("EMBEDDING_CONCURRENCY").unwrap_or(4),
            },
            chunking: ChunkingConfig {
                chunk_size: read_usize_env("CHUNK_SIZE").unwrap_or(1000),
                chunk_overlap: read_usize_env("CHUNK_OVERLAP").unwrap_or(100),
            },
            search: SearchConfig {
                k: read_usize_env("RAG_TOP_K").unwrap_or(5),
                fetch_k: read_usize_env("RAG_FETCH_K").unwrap_or(20),
                mmr_lambda: read_f32_env("RAG_MMR_LAMBDA").unwrap_or(1.0),
                hybrid: read_bool_env("RAG_HYBRID").unwrap_or(true),
                min_score: read_f32_env("RAG_MIN_SCORE").ok(),
            },
            retry: RetryConfig {
                max_retries: read_usize_env("RETRY_MAX_ATTEMPTS").unwrap_or(5),
                base_delay_ms: read_usize_env("RETRY_BASE_DELAY_MS").unwrap_or(500) as u64,
            },
            upsert_batch: read_usize_env("UPSERT_BATCH_SIZE").unwrap_or(64),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates config values at the boundary, before any network call.
    pub fn validate(&self) -> Result<(), RagError> {
        if self.qdrant.url.trim().is_empty() {
            return Err(RagError::Config("qdrant url is empty".into()));
        }
        if self.qdrant.collection.trim().is_empty() {
            return Err(RagError::Config("collection is empty".into()));
        }
        if self.embedding.dim == 0 {
            return Err(RagError::Config("embedding dim must be > 0".into()));
        }
        if self.chunking.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be > 0".into()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.search.k == 0 {
            return Err(RagError::Config("k must be > 0".into()));
        }
        if self.search.fetch_k < self.search.k {
            return Err(RagError::Config(format!(
                "fetch_k {} must be >= k {}",
                self.search.fetch_k, self.search.k
            )));
        }
        if !(0.0..=1.0).contains(&self.search.mmr_lambda) {
            return Err(RagError::Config(format!(
                "mmr_lambda {} must be within [0.0, 1.0]",
                self.search.mmr_lambda
            )));
        }
        if self.upsert_batch == 0 {
            return Err(RagError::Config("upsert_batch must be > 0".into()));
        }
        if self.retry.max_retries == 0 {
            return Err(RagError::Config("max_retries must be > 0".into()));
        }
        Ok(())
    }
}

/// Read a `usize` from env, with error mapped to `RagError`.
fn read_usize_env(key: &str) -> Result<usize, RagError> {
    match std::env::var(key) {
        Ok(v) => v
            .parse::<usize>()
            .map_err(|_| RagError::Config(format!("failed to parse env {key} = '{v}'"))),
        Err(_) => Err(RagError::Config(format!("missing env {key}"))),
    }
}

/// Read an `f32` from env.
fn read_f32_env(key: &str) -> Result<f32, RagError> {
    match std::env::var(key) {
        Ok(v) => v
            .parse::<f32>()
            .map_err(|_| RagError::Config(format!("failed to parse env {key} = '{v}'"))),
        Err(_) => Err(RagError::Config(format!("missing env {key}"))),
    }
}

/// Read a `bool` from env.
fn read_bool_env(key: &str) -> Result<bool, RagError> {
    match std::env::var(key) {
        Ok(v) => v
            .parse::<bool>()
            .map_err(|_| RagError::Config(format!("failed to parse env {key} = '{v}'"))),
        Err(_) => Err(RagError::Config(format!("missing env {key}"))),
    }
}
