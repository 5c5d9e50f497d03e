//! Batched upsert: embed chunks, build points, write with retry.
//!
//! Batches bound peak memory and network payload size. A failed batch is
//! retried as a whole; earlier batches stay committed (at-least-once, no
//! rollback).

use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tracing::{debug, info};

use crate::config::RagConfig;
use crate::document::Chunk;
use crate::embed::EmbeddingProvider;
use crate::errors::RagError;
use crate::retry::with_retry;
use crate::store::{PointRecord, VectorStore};

/// Lowercased keyword tokens stored in the payload for the lexical search
/// pass.
pub(crate) fn search_terms(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut terms: Vec<String> = lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.len() >= 3)
        .map(|s| s.to_string())
        .collect();
    terms.sort();
    terms.dedup();
    terms.truncate(128);
    terms
}

/// Embeds chunks in batches and writes `(vector, payload)` points into the
/// collection.
///
/// Returns the number of points upserted. On failure after retry exhaustion
/// the error is `RagError::Upsert` carrying the index of the failed batch
/// and the count of points already committed.
pub async fn upsert_chunks(
    store: &dyn VectorStore,
    cfg: &RagConfig,
    collection: &str,
    chunks: &[Chunk],
    embedder: &dyn EmbeddingProvider,
) -> Result<usize, RagError> {
    if chunks.is_empty() {
        debug!("no chunks to upsert");
        return Ok(0);
    }

    let batch_size = cfg.upsert_batch.max(1);
    let total_batches = chunks.len().div_ceil(batch_size);
    info!(
        "upserting {} chunks into '{collection}' in {total_batches} batches",
        chunks.len()
    );

    let pb = ProgressBar::new(total_batches as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
        )
        .unwrap()
        .progress_chars("##-"),
    );

    let mut committed = 0usize;
    for (batch_index, batch) in chunks.chunks(batch_size).enumerate() {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

        let written = with_retry(
            || {
                let texts = &texts;
                async move {
                    let vectors = embedder.embed(texts).await?;
                    let points = build_points(batch, &vectors, cfg.embedding.dim)?;
                    store.upsert(collection, points).await
                }
            },
            cfg.retry.max_retries,
            cfg.retry.base_delay(),
        )
        .await
        .map_err(|e| RagError::Upsert {
            batch_index,
            committed,
            source: Box::new(e),
        })?;

        committed += written;
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("upserted {committed} points into '{collection}'");
    Ok(committed)
}

/// Points for one batch; every vector is checked against the declared
/// collection size before anything is written.
fn build_points(
    batch: &[Chunk],
    vectors: &[Vec<f32>],
    want_dim: usize,
) -> Result<Vec<PointRecord>, RagError> {
    if vectors.len() != batch.len() {
        return Err(RagError::Embedding(format!(
            "provider returned {} vectors for {} texts",
            vectors.len(),
            batch.len()
        )));
    }

    let mut points = Vec::with_capacity(batch.len());
    for (chunk, vector) in batch.iter().zip(vectors) {
        if vector.len() != want_dim {
            return Err(RagError::VectorSizeMismatch {
                got: vector.len(),
                want: want_dim,
            });
        }
        points.push(PointRecord {
            id: chunk.record_id(),
            vector: vector.clone(),
            payload: json!({
                "text": chunk.text,
                "source": chunk.doc_id,
                "seq": chunk.seq,
                "segment": chunk.segment,
                "search_terms": search_terms(&chunk.text),
            }),
        });
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_terms_are_lowercased_deduplicated_tokens() {
        let terms = search_terms("The Vector store, the VECTOR index; ok?");
        assert!(terms.contains(&"vector".to_string()));
        assert!(terms.contains(&"store".to_string()));
        assert!(terms.contains(&"index".to_string()));
        // Short tokens are dropped, duplicates collapsed.
        assert!(!terms.contains(&"ok".to_string()));
        assert_eq!(
            terms.iter().filter(|t| t.as_str() == "vector").count(),
            1
        );
    }

    #[test]
    fn build_points_rejects_dimension_drift() {
        let chunk = Chunk {
            doc_id: "a.txt".into(),
            seq: 0,
            segment: 0,
            span: (0, 5),
            overlap_prev: 0,
            text: "hello".into(),
        };
        let err = build_points(&[chunk], &[vec![0.0; 3]], 4).unwrap_err();
        assert!(matches!(
            err,
            RagError::VectorSizeMismatch { got: 3, want: 4 }
        ));
    }
}
