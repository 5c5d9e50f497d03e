//! Thin adapter around `qdrant-client` to isolate API usage.
//!
//! This facade concentrates all Qdrant interactions behind the
//! [`VectorStore`] trait, hiding the verbose builder pattern and keeping the
//! rest of the pipeline decoupled from `qdrant-client`.

use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, Distance, FieldCondition, Filter,
    Match, MinShould, PointStruct, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
    condition::ConditionOneOf, r#match::MatchValue, vectors_config,
};
use qdrant_client::{Payload, Qdrant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{DistanceKind, QdrantConfig};
use crate::errors::RagError;
use crate::store::{KeywordFilter, PointRecord, ScoredRecord, StoreFuture, VectorSpace, VectorStore};

/// Qdrant-backed [`VectorStore`] (gRPC, builder API).
pub struct QdrantStore {
    client: Qdrant,
}

impl QdrantStore {
    /// Creates a new store from the given configuration.
    ///
    /// Supports optional API key authentication (Qdrant Cloud).
    ///
    /// # Errors
    /// Returns `RagError::Collection` if the client cannot be constructed.
    pub fn new(cfg: &QdrantConfig) -> Result<Self, RagError> {
        let mut builder = Qdrant::from_url(&cfg.url);
        if let Some(key) = &cfg.api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder
            .build()
            .map_err(|e| RagError::Collection(format!("client build: {e}")))?;
        Ok(Self { client })
    }
}

fn to_distance(kind: DistanceKind) -> Distance {
    match kind {
        DistanceKind::Cosine => Distance::Cosine,
        DistanceKind::Dot => Distance::Dot,
        DistanceKind::Euclid => Distance::Euclid,
    }
}

/// OR-filter over `search_terms` (min_should = 1), mirroring the keyword
/// recall pass.
fn terms_filter(filter: &KeywordFilter) -> Filter {
    let should: Vec<Condition> = filter
        .terms
        .iter()
        .map(|t| Condition {
            condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
                key: "search_terms".to_string(),
                r#match: Some(Match {
                    match_value: Some(MatchValue::Keyword(t.clone())),
                }),
                ..Default::default()
            })),
        })
        .collect();

    Filter {
        must: Vec::new(),
        must_not: Vec::new(),
        min_should: Some(MinShould {
            conditions: should.clone(),
            min_count: 1,
        }),
        should,
    }
}

/// Vector size declared by an existing collection, when determinable.
fn info_vector_size(info: qdrant_client::qdrant::CollectionInfo) -> Option<usize> {
    let cfg = info.config?.params?.vectors_config?.config?;
    match cfg {
        vectors_config::Config::Params(p) => Some(p.size as usize),
        vectors_config::Config::ParamsMap(_) => None,
    }
}

fn point_id_to_uuid(sp: &qdrant_client::qdrant::ScoredPoint) -> Uuid {
    use qdrant_client::qdrant::point_id::PointIdOptions;
    match sp.id.as_ref().and_then(|p| p.point_id_options.as_ref()) {
        Some(PointIdOptions::Uuid(s)) => Uuid::parse_str(s).unwrap_or(Uuid::nil()),
        Some(PointIdOptions::Num(n)) => Uuid::from_u128(*n as u128),
        None => Uuid::nil(),
    }
}

fn point_vector(sp: &qdrant_client::qdrant::ScoredPoint) -> Vec<f32> {
    use qdrant_client::qdrant::vectors_output::VectorsOptions;
    match sp.vectors.as_ref().and_then(|v| v.vectors_options.as_ref()) {
        Some(VectorsOptions::Vector(v)) => v.data.clone(),
        _ => Vec::new(),
    }
}

/// Converts a Qdrant payload map into JSON.
fn payload_to_json(
    payload: std::collections::HashMap<String, qdrant_client::qdrant::Value>,
) -> serde_json::Value {
    let mut m = serde_json::Map::new();
    for (k, v) in payload {
        m.insert(k, v.into_json());
    }
    serde_json::Value::Object(m)
}

impl VectorStore for QdrantStore {
    fn collection_dim<'a>(&'a self, name: &'a str) -> StoreFuture<'a, Option<usize>> {
        Box::pin(async move {
            let exists = self
                .client
                .collection_exists(name)
                .await
                .map_err(|e| RagError::Collection(format!("collection_exists: {e}")))?;
            if !exists {
                debug!("collection '{name}' not found");
                return Ok(None);
            }
            let info = self
                .client
                .collection_info(name)
                .await
                .map_err(|e| RagError::Collection(format!("collection_info: {e}")))?;
            match info.result.and_then(info_vector_size) {
                Some(size) => Ok(Some(size)),
                None => Err(RagError::Collection(format!(
                    "collection '{name}' has an unsupported vectors config"
                ))),
            }
        })
    }

    fn create_collection<'a>(
        &'a self,
        name: &'a str,
        space: &'a VectorSpace,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            info!(
                "creating collection '{name}' with size={} distance={:?}",
                space.size, space.distance
            );
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(name).vectors_config(VectorParamsBuilder::new(
                        space.size as u64,
                        to_distance(space.distance),
                    )),
                )
                .await
                .map_err(|e| RagError::Collection(format!("create_collection: {e}")))?;
            Ok(())
        })
    }

    fn delete_collection<'a>(&'a self, name: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.client
                .delete_collection(name)
                .await
                .map_err(|e| RagError::Collection(format!("delete_collection: {e}")))?;
            Ok(())
        })
    }

    fn upsert<'a>(&'a self, name: &'a str, points: Vec<PointRecord>) -> StoreFuture<'a, usize> {
        Box::pin(async move {
            if points.is_empty() {
                debug!("no points provided for upsert");
                return Ok(0);
            }

            let mut qdrant_points = Vec::with_capacity(points.len());
            for p in points {
                let payload = Payload::try_from(p.payload)
                    .map_err(|e| RagError::Collection(format!("payload convert: {e}")))?;
                qdrant_points.push(PointStruct::new(p.id.to_string(), p.vector, payload));
            }

            let written = qdrant_points.len();
            self.client
                .upsert_points(UpsertPointsBuilder::new(name, qdrant_points).wait(true))
                .await
                .map_err(|e| RagError::Collection(format!("upsert_points: {e}")))?;

            debug!("upserted {written} points into '{name}'");
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
            let mut builder = SearchPointsBuilder::new(name, vector, limit as u64)
                .with_payload(true)
                .with_vectors(true);
            if let Some(f) = filter {
                builder = builder.filter(terms_filter(f));
            }

            let resp = self
                .client
                .search_points(builder)
                .await
                .map_err(|e| RagError::Search(format!("search_points: {e}")))?;

            let mut out = Vec::with_capacity(resp.result.len());
            for sp in resp.result {
                let id = point_id_to_uuid(&sp);
                if id.is_nil() {
                    warn!("skipping hit with unreadable point id in '{name}'");
                    continue;
                }
                out.push(ScoredRecord {
                    id,
                    score: sp.score,
                    vector: point_vector(&sp),
                    payload: payload_to_json(sp.payload),
                });
            }
            debug!("search in '{name}' returned {} hits", out.len());
            Ok(out)
        })
    }

    fn count<'a>(&'a self, name: &'a str) -> StoreFuture<'a, usize> {
        Box::pin(async move {
            let resp = self
                .client
                .count(CountPointsBuilder::new(name).exact(true))
                .await
                .map_err(|e| RagError::Collection(format!("count: {e}")))?;
            Ok(resp.result.map(|r| r.count as usize).unwrap_or(0))
        })
    }
}
