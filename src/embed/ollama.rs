//! Ollama embedding provider.
//!
//! Calls the `/api/embeddings` endpoint with bounded per-batch concurrency.

use std::{future::Future, pin::Pin, time::Duration};

use futures::stream::{self, StreamExt};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embed::EmbeddingProvider;
use crate::errors::RagError;

/// Configuration for the Ollama embedding backend.
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server.
    pub url: String,
    /// Embedding model identifier (e.g., "bge-m3").
    pub model: String,
    /// Expected embedding dimension size.
    pub dim: usize,
    /// Max concurrent embedding requests per batch.
    pub concurrency: usize,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".to_string(),
            model: "bge-m3".to_string(),
            dim: 1024,
            concurrency: 4,
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Ollama embedding provider (async).
pub struct OllamaEmbedder {
    http: reqwest::Client,
    cfg: OllamaConfig,
}

impl OllamaEmbedder {
    /// Constructs a new embedder from configuration.
    ///
    /// # Errors
    /// Returns `RagError::Embedding` if the HTTP client cannot be built.
    pub fn new(cfg: OllamaConfig) -> Result<Self, RagError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| RagError::Embedding(format!("http client build: {e}")))?;
        Ok(Self { http, cfg })
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let url = format!("{}/api/embeddings", self.cfg.url);
        let req = EmbedRequest {
            model: &self.cfg.model,
            prompt: text,
        };

        let resp = self
            .http
            .post(&url)
            .json(&req)
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("POST {url}: {e}")))?;

        if resp.status() != StatusCode::OK {
            let code = resp.status();
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".into());
            return Err(RagError::Embedding(format!(
                "ollama embeddings non-200: {code}; body: {body}"
            )));
        }

        let parsed: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("parse embeddings json: {e}")))?;

        if parsed.embedding.len() != self.cfg.dim {
            return Err(RagError::VectorSizeMismatch {
                got: parsed.embedding.len(),
                want: self.cfg.dim,
            });
        }
        Ok(parsed.embedding)
    }
}

impl EmbeddingProvider for OllamaEmbedder {
    fn embed<'a>(
        &'a self,
        texts: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Vec<f32>>, RagError>> + Send + 'a>> {
        Box::pin(async move {
            debug!(
                "embedding {} texts via ollama model '{}'",
                texts.len(),
                self.cfg.model
            );

            let indexed: Vec<(usize, Vec<f32>)> = stream::iter(0..texts.len())
                .map(|i| async move { Ok::<_, RagError>((i, self.embed_one(&texts[i]).await?)) })
                .buffer_unordered(self.cfg.concurrency.max(1))
                .collect::<Vec<_>>()
                .await
                .into_iter()
                .collect::<Result<Vec<_>, _>>()?;

            // buffer_unordered completes out of order; restore input order.
            let mut out = vec![Vec::new(); texts.len()];
            for (i, v) in indexed {
                out[i] = v;
            }
            Ok(out)
        })
    }

    fn embed_query<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, RagError>> + Send + 'a>> {
        Box::pin(self.embed_one(text))
    }
}
