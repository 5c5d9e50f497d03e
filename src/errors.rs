//! Unified error types for the crate.

use thiserror::Error;

/// Top-level error for pipeline operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// I/O or filesystem errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing / serialization errors.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Invalid or unsupported configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Source file missing, unreadable, or in an unsupported format.
    #[error("ingest error: {0}")]
    Ingest(String),

    /// Invalid split parameters.
    #[error("chunking error: {0}")]
    Chunking(String),

    /// Mismatch between an embedding and the collection's vector size.
    #[error("vector size mismatch: got {got}, want {want}")]
    VectorSizeMismatch { got: usize, want: usize },

    /// Embedding backend failed to embed inputs.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Vector store unreachable or collection schema mismatch.
    #[error("collection error: {0}")]
    Collection(String),

    /// Batch write failure after retry exhaustion. Earlier batches stay
    /// committed; `committed` counts the points already written.
    #[error("upsert failed at batch {batch_index} ({committed} points committed): {source}")]
    Upsert {
        batch_index: usize,
        committed: usize,
        #[source]
        source: Box<RagError>,
    },

    /// Query embedding or retrieval failure.
    #[error("search error: {0}")]
    Search(String),

    /// A retried operation failed on every attempt.
    #[error("operation failed after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: usize,
        #[source]
        source: Box<RagError>,
    },

    /// Generic error from anyhow chain.
    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl RagError {
    /// Whether another attempt can plausibly succeed.
    ///
    /// Transport-level failures (store, embedding backend, retrieval) are
    /// transient; bad input, bad configuration and schema mismatches are
    /// final and must not burn the retry budget.
    pub fn is_retryable(&self) -> bool {
        match self {
            RagError::Collection(_) | RagError::Embedding(_) | RagError::Search(_) => true,
            RagError::Upsert { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_failures_are_retryable() {
        assert!(RagError::Collection("unreachable".into()).is_retryable());
        assert!(RagError::Embedding("timeout".into()).is_retryable());
        assert!(!RagError::Config("bad k".into()).is_retryable());
        assert!(!RagError::VectorSizeMismatch { got: 3, want: 4 }.is_retryable());
        assert!(!RagError::Ingest("missing file".into()).is_retryable());
    }

    #[test]
    fn upsert_retryability_follows_the_wrapped_error() {
        let transient = RagError::Upsert {
            batch_index: 2,
            committed: 128,
            source: Box::new(RagError::Collection("down".into())),
        };
        assert!(transient.is_retryable());

        let fatal = RagError::Upsert {
            batch_index: 0,
            committed: 0,
            source: Box::new(RagError::VectorSizeMismatch { got: 8, want: 4 }),
        };
        assert!(!fatal.is_retryable());
    }
}
