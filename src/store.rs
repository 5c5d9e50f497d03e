//! Vector store interface and the record types flowing through it.
//!
//! The store is an external collaborator behind a narrow trait so the
//! pipeline can run against Qdrant ([`crate::QdrantStore`]) or fully
//! in-process ([`crate::MemoryStore`]).

use std::{future::Future, pin::Pin};

use serde_json::Value;
use uuid::Uuid;

use crate::config::DistanceKind;
use crate::errors::RagError;

/// Describes the vector space of a collection.
#[derive(Clone, Copy, Debug)]
pub struct VectorSpace {
    /// Dimensionality of vectors.
    pub size: usize,
    /// Distance function.
    pub distance: DistanceKind,
}

/// A single `(vector, payload)` point keyed by a deterministic id.
#[derive(Clone, Debug)]
pub struct PointRecord {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: Value,
}

/// Store-level hit. Vectors come back with the payload so the re-ranker can
/// measure candidate-to-candidate similarity.
#[derive(Clone, Debug)]
pub struct ScoredRecord {
    pub id: Uuid,
    pub score: f32,
    pub vector: Vec<f32>,
    pub payload: Value,
}

/// Keyword filter over the `search_terms` payload field: a record matches
/// when it carries at least one of the terms.
#[derive(Clone, Debug, Default)]
pub struct KeywordFilter {
    pub terms: Vec<String>,
}

/// Boxed future returned by [`VectorStore`] methods (object-safe async).
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RagError>> + Send + 'a>>;

/// Narrow interface over the backing vector database.
pub trait VectorStore: Send + Sync {
    /// Vector size of an existing collection; `None` when the collection is
    /// absent.
    fn collection_dim<'a>(&'a self, name: &'a str) -> StoreFuture<'a, Option<usize>>;

    fn create_collection<'a>(
        &'a self,
        name: &'a str,
        space: &'a VectorSpace,
    ) -> StoreFuture<'a, ()>;

    fn delete_collection<'a>(&'a self, name: &'a str) -> StoreFuture<'a, ()>;

    /// Writes points, replacing any existing record with the same id.
    /// Returns the number of points written.
    fn upsert<'a>(&'a self, name: &'a str, points: Vec<PointRecord>) -> StoreFuture<'a, usize>;

    /// Nearest records by vector similarity, best first, optionally
    /// restricted by a keyword filter.
    fn search<'a>(
        &'a self,
        name: &'a str,
        vector: Vec<f32>,
        limit: usize,
        filter: Option<&'a KeywordFilter>,
    ) -> StoreFuture<'a, Vec<ScoredRecord>>;

    fn count<'a>(&'a self, name: &'a str) -> StoreFuture<'a, usize>;
}

/// Cosine similarity; 0.0 for zero-length or degenerate vectors.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|y| y * y).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 1.0], &[-1.0, -1.0]) + 1.0).abs() < 1e-6);
    }
}
