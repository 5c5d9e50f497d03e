//! End-to-end pipeline scenarios over the in-process store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rag_pipeline::{
    Document, DocumentSegment, EmbeddingProvider, KeywordFilter, MemoryStore, PointRecord,
    RagConfig, RagError, RagPipeline, ScoredRecord, StoreFuture, VectorSpace, VectorStore,
};

const DIM: usize = 8;

/// Known content words, one embedding dimension each; everything else is
/// ignored. Keeps retrieval scores fully predictable.
const VOCAB: [&str; 8] = [
    "alpha", "beta", "gamma", "particles", "decay", "rays", "detector", "nucleus",
];

fn embed_text(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        if let Some(i) = VOCAB.iter().position(|w| *w == token) {
            v[i] += 1.0;
        }
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// Deterministic bag-of-words embedder over a fixed vocabulary.
struct StubEmbedder;

impl EmbeddingProvider for StubEmbedder {
    fn embed<'a>(&'a self, texts: &'a [String]) -> StoreFuture<'a, Vec<Vec<f32>>> {
        Box::pin(async move { Ok(texts.iter().map(|t| embed_text(t)).collect()) })
    }
}

fn test_config() -> RagConfig {
    let mut cfg = RagConfig::new_default("http://localhost:6334", "pipeline_test");
    cfg.embedding.dim = DIM;
    cfg.chunking.chunk_size = 500;
    cfg.chunking.chunk_overlap = 50;
    cfg.upsert_batch = 4;
    cfg.retry.max_retries = 2;
    cfg.retry.base_delay_ms = 1;
    cfg.search.k = 2;
    cfg.search.fetch_k = 10;
    cfg
}

fn pipeline() -> RagPipeline {
    RagPipeline::new(test_config(), Arc::new(MemoryStore::new())).unwrap()
}

/// Three separator-free pages sized to split into exactly 4 + 3 + 3 chunks
/// at chunk_size=500 / overlap=50.
fn three_page_document() -> Document {
    Document {
        id: "report.pdf".into(),
        segments: vec![
            DocumentSegment { index: 0, text: "x".repeat(1850) },
            DocumentSegment { index: 1, text: "y".repeat(1400) },
            DocumentSegment { index: 2, text: "z".repeat(1400) },
        ],
    }
}

#[tokio::test]
async fn ingest_three_pages_upserts_every_chunk() {
    let p = pipeline();

    let report = p
        .index_document(&three_page_document(), &StubEmbedder)
        .await
        .unwrap();

    assert_eq!(report.segments, 3);
    assert_eq!(report.chunks, 10);
    assert_eq!(report.upserted, 10);
    assert_eq!(p.count().await.unwrap(), 10);
}

#[tokio::test]
async fn reingesting_identical_chunks_is_idempotent() {
    let p = pipeline();
    let doc = three_page_document();

    p.index_document(&doc, &StubEmbedder).await.unwrap();
    let report = p.index_document(&doc, &StubEmbedder).await.unwrap();

    assert_eq!(report.upserted, 10);
    // Deterministic ids: the second run overwrote, not duplicated.
    assert_eq!(p.count().await.unwrap(), 10);
}

#[tokio::test]
async fn search_on_empty_collection_returns_no_hits() {
    let p = pipeline();
    p.ensure_collection().await.unwrap();

    let hits = p.search("anything at all", &StubEmbedder).await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn fetch_k_smaller_than_k_is_rejected() {
    let mut cfg = test_config();
    cfg.search.k = 8;
    cfg.search.fetch_k = 2;

    let err = RagPipeline::new(cfg, Arc::new(MemoryStore::new())).unwrap_err();
    assert!(matches!(err, RagError::Config(_)));
}

#[tokio::test]
async fn hybrid_search_finds_the_matching_source() {
    let p = pipeline();
    for (name, text) in [
        ("alpha.txt", "alpha particles scatter in the detector chamber"),
        ("beta.txt", "beta decay emits electrons from the nucleus"),
        ("gamma.txt", "gamma rays are high energy photons"),
    ] {
        p.index_document(&Document::from_text(name, text), &StubEmbedder)
            .await
            .unwrap();
    }
    assert_eq!(p.count().await.unwrap(), 3);

    let hits = p.search("alpha particles", &StubEmbedder).await.unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].source.as_deref(), Some("alpha.txt"));
    assert!(hits[0].text.contains("alpha"));
    assert!(hits[0].score > 0.0);
}

#[tokio::test]
async fn fewer_records_than_k_returns_all_of_them() {
    let p = pipeline();
    p.index_document(
        &Document::from_text("only.txt", "gamma rays are high energy photons"),
        &StubEmbedder,
    )
    .await
    .unwrap();

    let hits = p.search("gamma rays", &StubEmbedder).await.unwrap();
    assert_eq!(hits.len(), 1);
}

/// Store wrapper that lets the first `ok_calls` upserts through, then fails
/// every later one.
struct FlakyStore {
    inner: MemoryStore,
    ok_calls: usize,
    upsert_calls: AtomicUsize,
}

impl FlakyStore {
    fn new(ok_calls: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            ok_calls,
            upsert_calls: AtomicUsize::new(0),
        }
    }
}

impl VectorStore for FlakyStore {
    fn collection_dim<'a>(&'a self, name: &'a str) -> StoreFuture<'a, Option<usize>> {
        self.inner.collection_dim(name)
    }

    fn create_collection<'a>(
        &'a self,
        name: &'a str,
        space: &'a VectorSpace,
    ) -> StoreFuture<'a, ()> {
        self.inner.create_collection(name, space)
    }

    fn delete_collection<'a>(&'a self, name: &'a str) -> StoreFuture<'a, ()> {
        self.inner.delete_collection(name)
    }

    fn upsert<'a>(&'a self, name: &'a str, points: Vec<PointRecord>) -> StoreFuture<'a, usize> {
        let call = self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.ok_calls {
            Box::pin(async { Err(RagError::Collection("injected outage".into())) })
        } else {
            self.inner.upsert(name, points)
        }
    }

    fn search<'a>(
        &'a self,
        name: &'a str,
        vector: Vec<f32>,
        limit: usize,
        filter: Option<&'a KeywordFilter>,
    ) -> StoreFuture<'a, Vec<ScoredRecord>> {
        self.inner.search(name, vector, limit, filter)
    }

    fn count<'a>(&'a self, name: &'a str) -> StoreFuture<'a, usize> {
        self.inner.count(name)
    }
}

#[tokio::test]
async fn upsert_keeps_partial_progress_on_batch_failure() {
    let store = Arc::new(FlakyStore::new(1));
    let p = RagPipeline::new(test_config(), store.clone()).unwrap();

    let err = p
        .index_document(&three_page_document(), &StubEmbedder)
        .await
        .unwrap_err();

    match err {
        RagError::Upsert {
            batch_index,
            committed,
            ..
        } => {
            assert_eq!(batch_index, 1);
            assert_eq!(committed, 4);
        }
        other => panic!("unexpected error: {other}"),
    }

    // The first batch stays committed; nothing was rolled back.
    assert_eq!(store.count("pipeline_test").await.unwrap(), 4);
}
