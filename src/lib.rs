//! Hybrid retrieval pipeline over a pluggable vector store.
//!
//! This crate provides a clean API to:
//! - Load PDF / Markdown / plain-text sources into page-preserving documents
//! - Split them into bounded, overlapping chunks with deterministic ids
//! - Embed and upsert chunks in batches, with retry-with-backoff
//! - Manage the collection lifecycle idempotently (ensure / recreate)
//! - Retrieve top-k context with hybrid dense+keyword search and MMR
//!
//! The design is flat (no deep nesting) and splits responsibilities into
//! focused modules. The vector store and the embedding backend are external
//! collaborators behind narrow traits.

mod chunker;
mod collection;
mod config;
mod document;
mod embed;
mod errors;
mod ingest;
mod memory_store;
mod qdrant_store;
mod retry;
mod search;
mod store;
mod upsert;

pub use config::{
    ChunkingConfig, DistanceKind, EmbeddingConfig, QdrantConfig, RagConfig, RetryConfig,
    SearchConfig,
};
pub use document::{Chunk, Document, DocumentSegment, stable_uuid};
pub use embed::EmbeddingProvider;
pub use embed::ollama::{OllamaConfig, OllamaEmbedder};
pub use errors::RagError;
pub use memory_store::MemoryStore;
pub use qdrant_store::QdrantStore;
pub use retry::with_retry;
pub use search::{SearchHit, format_context};
pub use store::{KeywordFilter, PointRecord, ScoredRecord, StoreFuture, VectorSpace, VectorStore};

pub use chunker::split as split_document;
pub use ingest::load as load_document;

use std::sync::Arc;

use tracing::{debug, trace};

/// Outcome of a full ingestion run.
#[derive(Clone, Copy, Debug, Default)]
pub struct IngestReport {
    pub segments: usize,
    pub chunks: usize,
    pub upserted: usize,
}

/// High-level facade that wires configuration and a vector store.
///
/// This is the single entry point recommended for application code.
pub struct RagPipeline {
    cfg: RagConfig,
    store: Arc<dyn VectorStore>,
}

impl std::fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagPipeline")
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

impl RagPipeline {
    /// Constructs a pipeline over an explicit store (e.g. [`MemoryStore`]).
    ///
    /// # Errors
    /// Returns `RagError::Config` when the configuration is invalid.
    pub fn new(cfg: RagConfig, store: Arc<dyn VectorStore>) -> Result<Self, RagError> {
        cfg.validate()?;
        trace!("RagPipeline::new collection={}", cfg.qdrant.collection);
        Ok(Self { cfg, store })
    }

    /// Constructs a pipeline backed by Qdrant, per `cfg.qdrant`.
    ///
    /// # Errors
    /// Returns `RagError::Config` for invalid configuration or
    /// `RagError::Collection` if the client initialization fails.
    pub fn connect(cfg: RagConfig) -> Result<Self, RagError> {
        cfg.validate()?;
        let store: Arc<dyn VectorStore> = Arc::new(QdrantStore::new(&cfg.qdrant)?);
        Ok(Self { cfg, store })
    }

    pub fn config(&self) -> &RagConfig {
        &self.cfg
    }

    fn vector_space(&self) -> VectorSpace {
        VectorSpace {
            size: self.cfg.embedding.dim,
            distance: self.cfg.qdrant.distance,
        }
    }

    /// Creates the collection if absent; verifies the vector size otherwise.
    pub async fn ensure_collection(&self) -> Result<(), RagError> {
        collection::ensure_collection(
            self.store.as_ref(),
            &self.cfg.qdrant.collection,
            &self.vector_space(),
            &self.cfg.retry,
        )
        .await
    }

    /// Destroys and recreates the collection, losing all prior records.
    pub async fn recreate_collection(&self) -> Result<(), RagError> {
        collection::recreate_collection(
            self.store.as_ref(),
            &self.cfg.qdrant.collection,
            &self.vector_space(),
            &self.cfg.retry,
        )
        .await
    }

    /// Loads a source file, splits it and upserts the chunks.
    ///
    /// # Errors
    /// Returns errors on ingest, chunking, vector size mismatch, or store
    /// failures.
    pub async fn ingest_file(
        &self,
        path: impl AsRef<std::path::Path>,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<IngestReport, RagError> {
        debug!("RagPipeline::ingest_file path={:?}", path.as_ref());
        let doc = ingest::load(path)?;
        self.index_document(&doc, embedder).await
    }

    /// Splits an in-memory document and upserts the chunks.
    pub async fn index_document(
        &self,
        doc: &Document,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<IngestReport, RagError> {
        let chunks = chunker::split(doc, &self.cfg.chunking)?;
        self.ensure_collection().await?;
        let upserted = self.upsert_chunks(&chunks, embedder).await?;
        Ok(IngestReport {
            segments: doc.segments.len(),
            chunks: chunks.len(),
            upserted,
        })
    }

    /// Embeds and writes prepared chunks in batches.
    ///
    /// Record ids are deterministic, so re-running with identical chunks
    /// leaves the collection count unchanged.
    pub async fn upsert_chunks(
        &self,
        chunks: &[Chunk],
        embedder: &dyn EmbeddingProvider,
    ) -> Result<usize, RagError> {
        upsert::upsert_chunks(
            self.store.as_ref(),
            &self.cfg,
            &self.cfg.qdrant.collection,
            chunks,
            embedder,
        )
        .await
    }

    /// Hybrid search returning at most `cfg.search.k` hits, best first.
    pub async fn search(
        &self,
        query: &str,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Vec<SearchHit>, RagError> {
        trace!("RagPipeline::search k={}", self.cfg.search.k);
        search::search(
            self.store.as_ref(),
            &self.cfg,
            &self.cfg.qdrant.collection,
            query,
            embedder,
        )
        .await
    }

    /// Number of records currently in the collection.
    pub async fn count(&self) -> Result<usize, RagError> {
        self.store.count(&self.cfg.qdrant.collection).await
    }
}
