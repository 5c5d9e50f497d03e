//! Embedding provider interface.

use std::{future::Future, pin::Pin};

use crate::errors::RagError;

/// Provider interface for embedding generation.
///
/// Implement this trait to plug in your own embedding backend (e.g., Ollama,
/// OpenAI, local models). Async is expressed through boxed futures so the
/// trait stays object-safe.
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a batch of texts, one vector per input, in input order.
    fn embed<'a>(
        &'a self,
        texts: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Vec<f32>>, RagError>> + Send + 'a>>;

    /// Embeds a single query string.
    fn embed_query<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<f32>, RagError>> + Send + 'a>> {
        Box::pin(async move {
            let texts = vec![text.to_string()];
            let mut vectors = self.embed(&texts).await?;
            vectors
                .pop()
                .ok_or_else(|| RagError::Embedding("empty embedding response".into()))
        })
    }
}

pub mod ollama;
