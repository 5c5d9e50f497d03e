//! In-process [`VectorStore`] used by tests and Qdrant-free runs.
//!
//! Brute-force scoring over a `BTreeMap`; fine for corpora that fit in
//! memory, not a substitute for a real ANN index.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use serde_json::Value;
use uuid::Uuid;

use crate::config::DistanceKind;
use crate::errors::RagError;
use crate::store::{
    KeywordFilter, PointRecord, ScoredRecord, StoreFuture, VectorSpace, VectorStore,
    cosine_similarity,
};

struct MemCollection {
    space: VectorSpace,
    points: BTreeMap<Uuid, (Vec<f32>, Value)>,
}

/// In-memory vector store keyed by collection name.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, MemCollection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn score_for(distance: DistanceKind, query: &[f32], point: &[f32]) -> f32 {
    match distance {
        DistanceKind::Cosine => cosine_similarity(query, point),
        DistanceKind::Dot => query.iter().zip(point).map(|(a, b)| a * b).sum(),
        // Negated so that "higher is better" holds for every metric.
        DistanceKind::Euclid => {
            -query
                .iter()
                .zip(point)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f32>()
                .sqrt()
        }
    }
}

fn matches_filter(payload: &Value, filter: &KeywordFilter) -> bool {
    let Some(terms) = payload.get("search_terms").and_then(|v| v.as_array()) else {
        return false;
    };
    terms
        .iter()
        .filter_map(|v| v.as_str())
        .any(|t| filter.terms.iter().any(|q| q == t))
}

fn missing(name: &str) -> RagError {
    RagError::Collection(format!("collection '{name}' not found"))
}

impl VectorStore for MemoryStore {
    fn collection_dim<'a>(&'a self, name: &'a str) -> StoreFuture<'a, Option<usize>> {
        Box::pin(async move {
            let collections = self.collections.lock().expect("memory store poisoned");
            Ok(collections.get(name).map(|c| c.space.size))
        })
    }

    fn create_collection<'a>(
        &'a self,
        name: &'a str,
        space: &'a VectorSpace,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut collections = self.collections.lock().expect("memory store poisoned");
            collections.insert(
                name.to_string(),
                MemCollection {
                    space: *space,
                    points: BTreeMap::new(),
                },
            );
            Ok(())
        })
    }

    fn delete_collection<'a>(&'a self, name: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut collections = self.collections.lock().expect("memory store poisoned");
            collections.remove(name);
            Ok(())
        })
    }

    fn upsert<'a>(&'a self, name: &'a str, points: Vec<PointRecord>) -> StoreFuture<'a, usize> {
        Box::pin(async move {
            let mut collections = self.collections.lock().expect("memory store poisoned");
            let collection = collections.get_mut(name).ok_or_else(|| missing(name))?;
            let want = collection.space.size;
            for p in &points {
                if p.vector.len() != want {
                    return Err(RagError::VectorSizeMismatch {
                        got: p.vector.len(),
                        want,
                    });
                }
            }
            let written = points.len();
            for p in points {
                // Last write wins on id conflict.
                collection.points.insert(p.id, (p.vector, p.payload));
            }
            Ok(written)
        })
    }

    fn search<'a>(
        &'a self,
        name: &'a str,
        vector: Vec<f32>,
        limit: usize,
        filter: Option<&'a KeywordFilter>,
    ) -> StoreFuture<'a, Vec<ScoredRecord>> {
        Box::pin(async move {
            let collections = self.collections.lock().expect("memory store poisoned");
            let collection = collections.get(name).ok_or_else(|| missing(name))?;

            let mut hits: Vec<ScoredRecord> = collection
                .points
                .iter()
                .filter(|(_, (_, payload))| filter.is_none_or(|f| matches_filter(payload, f)))
                .map(|(id, (point_vector, payload))| ScoredRecord {
                    id: *id,
                    score: score_for(collection.space.distance, &vector, point_vector),
                    vector: point_vector.clone(),
                    payload: payload.clone(),
                })
                .collect();

            // Ties fall back to id so ordering stays deterministic.
            hits.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.id.cmp(&b.id))
            });
            hits.truncate(limit);
            Ok(hits)
        })
    }

    fn count<'a>(&'a self, name: &'a str) -> StoreFuture<'a, usize> {
        Box::pin(async move {
            let collections = self.collections.lock().expect("memory store poisoned");
            let collection = collections.get(name).ok_or_else(|| missing(name))?;
            Ok(collection.points.len())
        })
    }
}
