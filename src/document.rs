//! Core data models: documents, segments, chunks and stable record ids.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One raw text segment of a source document (a PDF page, a Markdown
/// section, or a whole plain-text file).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentSegment {
    /// Position of the segment within the source (e.g. page number, 0-based).
    pub index: usize,
    pub text: String,
}

/// A loaded source document. Immutable once constructed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Source identifier (file name).
    pub id: String,
    /// Ordered raw text segments; page boundaries are preserved here so
    /// chunking can track provenance.
    pub segments: Vec<DocumentSegment>,
}

impl Document {
    /// Single-segment document from an in-memory string.
    pub fn from_text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            segments: vec![DocumentSegment {
                index: 0,
                text: text.into(),
            }],
        }
    }
}

/// A bounded-size slice of source text produced for embedding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Source document id.
    pub doc_id: String,
    /// Sequence index, global across the document.
    pub seq: usize,
    /// Index of the originating segment.
    pub segment: usize,
    /// Character span (start, end) within the originating segment.
    pub span: (usize, usize),
    /// Characters shared with the previous chunk of the same segment.
    pub overlap_prev: usize,
    pub text: String,
}

impl Chunk {
    /// Deterministic record id derived from `(doc_id, seq)`.
    ///
    /// Re-ingesting an unchanged document produces identical ids, so
    /// upserts are idempotent (last-write-wins on conflict).
    pub fn record_id(&self) -> Uuid {
        stable_uuid(&format!("{}#{}", self.doc_id, self.seq))
    }
}

/// Deterministic UUIDv5 from an arbitrary string id.
pub fn stable_uuid(id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, id.as_bytes())
}
