//! Separator-priority splitter producing bounded, overlapping chunks.
//!
//! Goals:
//! - Every chunk holds at most `chunk_size` characters.
//! - Consecutive chunks of a segment share exactly `chunk_overlap`
//!   characters, so context survives the cut.
//! - Cuts land on the strongest available separator inside the window;
//!   a hard character cut is the last resort.
//! - Output is deterministic: re-splitting an unchanged document yields an
//!   identical chunk sequence with identical record ids.

use tracing::{debug, trace};

use crate::config::ChunkingConfig;
use crate::document::{Chunk, Document};
use crate::errors::RagError;

/// Cut-point priority, strongest first: paragraph break, line break,
/// sentence-ending punctuation, clause punctuation, word boundary.
/// The hard character cut is handled explicitly as the fallback.
const SEPARATORS: [&str; 9] = ["\n\n", "\n", ". ", "? ", "! ", "; ", ": ", ", ", " "];

/// Splits a document into overlapping chunks.
///
/// Segments are split independently, so page boundaries are always chunk
/// boundaries and `overlap_prev` is 0 for the first chunk of each segment.
/// Lengths and spans are measured in characters.
///
/// # Errors
/// Returns `RagError::Chunking` when `chunk_size == 0` or
/// `chunk_overlap >= chunk_size`.
pub fn split(doc: &Document, cfg: &ChunkingConfig) -> Result<Vec<Chunk>, RagError> {
    if cfg.chunk_size == 0 {
        return Err(RagError::Chunking("chunk_size must be > 0".into()));
    }
    if cfg.chunk_overlap >= cfg.chunk_size {
        return Err(RagError::Chunking(format!(
            "chunk_overlap {} must be smaller than chunk_size {}",
            cfg.chunk_overlap, cfg.chunk_size
        )));
    }

    let mut out = Vec::new();
    let mut seq = 0usize;
    for segment in &doc.segments {
        split_segment(&doc.id, segment.index, &segment.text, cfg, &mut seq, &mut out);
    }
    debug!("split '{}' into {} chunks", doc.id, out.len());
    Ok(out)
}

fn split_segment(
    doc_id: &str,
    segment: usize,
    text: &str,
    cfg: &ChunkingConfig,
    seq: &mut usize,
    out: &mut Vec<Chunk>,
) {
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    if n == 0 {
        trace!("segment {segment} of '{doc_id}' is empty; skipping");
        return;
    }

    let mut start = 0usize;
    let mut first = true;
    loop {
        let window_end = (start + cfg.chunk_size).min(n);
        let end = if window_end == n {
            n
        } else {
            cut_point(&chars, start, window_end, cfg.chunk_overlap)
        };

        out.push(Chunk {
            doc_id: doc_id.to_owned(),
            seq: *seq,
            segment,
            span: (start, end),
            overlap_prev: if first { 0 } else { cfg.chunk_overlap },
            text: chars[start..end].iter().collect(),
        });
        *seq += 1;
        first = false;

        if end == n {
            break;
        }
        // The next chunk re-reads exactly `chunk_overlap` trailing characters.
        start = end - cfg.chunk_overlap;
    }
}

/// Picks the cut for the window `[start, window_end)`: the latest occurrence
/// of the strongest separator that still moves the window forward
/// (`cut > start + overlap`), or a hard cut at `window_end`.
fn cut_point(chars: &[char], start: usize, window_end: usize, overlap: usize) -> usize {
    let min_cut = start + overlap + 1;
    for sep in SEPARATORS {
        let sep_chars: Vec<char> = sep.chars().collect();
        if let Some(cut) = rfind_separator(chars, start, window_end, &sep_chars) {
            if cut >= min_cut {
                return cut;
            }
        }
    }
    trace!("no separator in window [{start}, {window_end}); hard cut");
    window_end
}

/// Latest position `p` in `(start, window_end]` such that the separator ends
/// exactly at `p`.
fn rfind_separator(chars: &[char], start: usize, window_end: usize, sep: &[char]) -> Option<usize> {
    let w = sep.len();
    if w == 0 || window_end - start < w {
        return None;
    }
    let mut p = window_end;
    while p >= start + w {
        if chars[p - w..p] == *sep {
            return Some(p);
        }
        p -= 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentSegment;

    fn cfg(size: usize, overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size: size,
            chunk_overlap: overlap,
        }
    }

    fn sample_text() -> String {
        let mut s = String::new();
        for i in 0..40 {
            s.push_str(&format!("Sentence number {i} talks about retrieval. "));
            if i % 7 == 6 {
                s.push_str("\n\n");
            }
        }
        s
    }

    #[test]
    fn chunks_respect_size_and_exact_overlap() {
        let doc = Document::from_text("sample.txt", sample_text());
        let chunks = split(&doc, &cfg(200, 30)).unwrap();
        assert!(chunks.len() > 1);

        for c in &chunks {
            assert!(c.text.chars().count() <= 200, "chunk too long: {}", c.seq);
        }
        for pair in chunks.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            assert_eq!(next.span.0, prev.span.1 - 30);
            assert_eq!(next.overlap_prev, 30);
            let tail: String = prev.text.chars().skip(prev.text.chars().count() - 30).collect();
            let head: String = next.text.chars().take(30).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn splitting_is_deterministic() {
        let doc = Document::from_text("sample.txt", sample_text());
        let a = split(&doc, &cfg(180, 20)).unwrap();
        let b = split(&doc, &cfg(180, 20)).unwrap();
        assert_eq!(a, b);
        let ids_a: Vec<_> = a.iter().map(|c| c.record_id()).collect();
        let ids_b: Vec<_> = b.iter().map(|c| c.record_id()).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn prefers_paragraph_break_over_weaker_separators() {
        let doc = Document::from_text("p.txt", "aaaa bb.\n\ncccc dddd eeee");
        let chunks = split(&doc, &cfg(12, 2)).unwrap();
        assert!(chunks[0].text.ends_with("\n\n"), "got {:?}", chunks[0].text);
    }

    #[test]
    fn hard_cut_when_no_separator_fits() {
        let doc = Document::from_text("raw.txt", "x".repeat(1850));
        let chunks = split(&doc, &cfg(500, 50)).unwrap();
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].span, (0, 500));
        assert_eq!(chunks[1].span, (450, 950));
        assert_eq!(chunks[3].span, (1350, 1850));
    }

    #[test]
    fn page_boundaries_are_chunk_boundaries() {
        let doc = Document {
            id: "multi.pdf".into(),
            segments: vec![
                DocumentSegment { index: 0, text: "first page ".repeat(30) },
                DocumentSegment { index: 1, text: "second page ".repeat(30) },
            ],
        };
        let chunks = split(&doc, &cfg(120, 10)).unwrap();

        // seq is global, spans restart per segment.
        let seqs: Vec<_> = chunks.iter().map(|c| c.seq).collect();
        assert_eq!(seqs, (0..chunks.len()).collect::<Vec<_>>());
        let first_of_second = chunks.iter().find(|c| c.segment == 1).unwrap();
        assert_eq!(first_of_second.span.0, 0);
        assert_eq!(first_of_second.overlap_prev, 0);
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        let doc = Document::from_text("a.txt", "hello");
        assert!(matches!(
            split(&doc, &cfg(10, 10)),
            Err(RagError::Chunking(_))
        ));
    }

    #[test]
    fn empty_document_yields_no_chunks() {
        let doc = Document { id: "empty.txt".into(), segments: vec![] };
        assert!(split(&doc, &cfg(100, 10)).unwrap().is_empty());
    }
}
