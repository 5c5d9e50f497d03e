//! Hybrid retrieval: dense + keyword candidates, MMR re-ranking.
//!
//! Pipeline: embed query → dense top-`fetch_k` → optional keyword-filtered
//! pass over `search_terms` → union by id → MMR down to `k`.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::RagConfig;
use crate::embed::EmbeddingProvider;
use crate::errors::RagError;
use crate::retry::with_retry;
use crate::store::{KeywordFilter, ScoredRecord, VectorStore, cosine_similarity};

/// A single retrieval hit, best first.
#[derive(Clone, Debug)]
pub struct SearchHit {
    pub id: Uuid,
    /// Relevance score from the retrieval pass (not the MMR objective).
    pub score: f32,
    pub text: String,
    pub source: Option<String>,
    pub payload: Value,
}

/// Runs the hybrid search and returns at most `cfg.search.k` hits.
///
/// An empty or under-filled collection is not an error: fewer than `k`
/// records simply come back in relevance order.
///
/// # Errors
/// Config violations are rejected before any network call; embedding and
/// retrieval failures propagate as typed errors.
pub async fn search(
    store: &dyn VectorStore,
    cfg: &RagConfig,
    collection: &str,
    query: &str,
    embedder: &dyn EmbeddingProvider,
) -> Result<Vec<SearchHit>, RagError> {
    cfg.validate()?;
    info!(
        "search '{collection}' k={} fetch_k={} hybrid={}",
        cfg.search.k, cfg.search.fetch_k, cfg.search.hybrid
    );

    let query_vector = with_retry(
        || embedder.embed_query(query),
        cfg.retry.max_retries,
        cfg.retry.base_delay(),
    )
    .await?;

    // Dense candidates.
    let mut candidates = store
        .search(collection, query_vector.clone(), cfg.search.fetch_k, None)
        .await?;

    // Keyword recall pass (hybrid mode only); union by id, dense hits first.
    if cfg.search.hybrid {
        let terms = query_terms(query);
        if terms.is_empty() {
            debug!("no usable query terms; skipping lexical pass");
        } else {
            let filter = KeywordFilter { terms };
            let lexical = store
                .search(collection, query_vector.clone(), cfg.search.fetch_k, Some(&filter))
                .await?;
            let mut seen: HashSet<Uuid> = candidates.iter().map(|r| r.id).collect();
            for record in lexical {
                if seen.insert(record.id) {
                    candidates.push(record);
                }
            }
        }
    }

    if let Some(min_score) = cfg.search.min_score {
        candidates.retain(|r| r.score >= min_score);
    }

    if candidates.is_empty() {
        debug!("no candidates for query");
        return Ok(Vec::new());
    }

    // Best relevance first; MMR tie-breaks fall back to this rank.
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let picked = mmr_select(&candidates, cfg.search.k, cfg.search.mmr_lambda);
    let hits: Vec<SearchHit> = picked.into_iter().map(|i| to_hit(&candidates[i])).collect();
    debug!("returning {} hits", hits.len());
    Ok(hits)
}

/// Query tokens for the lexical pass: lowercased alphanumeric runs of at
/// least 3 characters, deduplicated.
fn query_terms(query: &str) -> Vec<String> {
    let q = query.to_lowercase();
    let mut terms: Vec<String> = q
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.len() >= 3)
        .map(|s| s.to_string())
        .collect();
    terms.sort();
    terms.dedup();
    terms
}

/// Greedy Maximal-Marginal-Relevance selection over relevance-sorted
/// candidates; returns indices into `candidates` in pick order.
///
/// Objective per step: `lambda * relevance - (1 - lambda) * max_sim` where
/// `max_sim` is the cosine similarity to the closest already-selected
/// candidate. Strict comparison keeps the earlier (higher-relevance)
/// candidate on ties, so `lambda = 1.0` reproduces plain relevance order.
fn mmr_select(candidates: &[ScoredRecord], k: usize, lambda: f32) -> Vec<usize> {
    let mut selected: Vec<usize> = Vec::with_capacity(k.min(candidates.len()));
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();

    while selected.len() < k && !remaining.is_empty() {
        let mut best_pos = 0usize;
        let mut best_score = f32::NEG_INFINITY;

        for (pos, &candidate) in remaining.iter().enumerate() {
            let relevance = candidates[candidate].score;
            let redundancy = selected
                .iter()
                .map(|&s| cosine_similarity(&candidates[candidate].vector, &candidates[s].vector))
                .fold(0.0f32, f32::max);
            let objective = lambda * relevance - (1.0 - lambda) * redundancy;
            if objective > best_score {
                best_score = objective;
                best_pos = pos;
            }
        }
        selected.push(remaining.remove(best_pos));
    }
    selected
}

fn to_hit(record: &ScoredRecord) -> SearchHit {
    let text = record
        .payload
        .get("text")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let source = record
        .payload
        .get("source")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    SearchHit {
        id: record.id,
        score: record.score,
        text,
        source,
        payload: record.payload.clone(),
    }
}

/// Renders hits as a prompt context block with `[source:...]` citations.
pub fn format_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, h)| {
            let src = h.source.clone().unwrap_or_else(|| format!("doc{}", i + 1));
            format!("[source:{src}] {}", h.text)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
