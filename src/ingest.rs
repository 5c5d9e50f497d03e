//! Source loading: PDF, Markdown and plain-text files into [`Document`]s.
//!
//! PDF pages and Markdown `---` sections become separate segments so that
//! chunking never crosses a page boundary.

use std::path::Path;

use tracing::{debug, info};

use crate::document::{Document, DocumentSegment};
use crate::errors::RagError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SourceFormat {
    Pdf,
    Markdown,
    Text,
}

fn detect_format(path: &Path) -> Result<SourceFormat, RagError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => Ok(SourceFormat::Pdf),
        Some("md") | Some("markdown") => Ok(SourceFormat::Markdown),
        Some("txt") | Some("text") => Ok(SourceFormat::Text),
        _ => Err(RagError::Ingest(format!(
            "unsupported source format: {}",
            path.display()
        ))),
    }
}

/// Loads a source document from disk.
///
/// # Errors
/// Returns `RagError::Ingest` when the file does not exist, cannot be read,
/// or has an unsupported extension. An empty source is not an error; it
/// yields a document with zero segments.
pub fn load(path: impl AsRef<Path>) -> Result<Document, RagError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(RagError::Ingest(format!(
            "file not found: {}",
            path.display()
        )));
    }
    let format = detect_format(path)?;

    let id = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .unwrap_or_else(|| path.display().to_string());

    let raw_segments: Vec<String> = match format {
        SourceFormat::Pdf => load_pdf_pages(path)?,
        SourceFormat::Markdown => read_source(path)?
            .split("---")
            .map(|s| s.to_string())
            .collect(),
        SourceFormat::Text => vec![read_source(path)?],
    };

    // Keep original positions as segment indices, drop blank segments.
    let segments: Vec<DocumentSegment> = raw_segments
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(index, text)| DocumentSegment { index, text })
        .collect();

    info!("loaded '{}': {} segments ({format:?})", id, segments.len());
    Ok(Document { id, segments })
}

fn read_source(path: &Path) -> Result<String, RagError> {
    std::fs::read_to_string(path)
        .map_err(|e| RagError::Ingest(format!("read {}: {e}", path.display())))
}

/// One string per PDF page, in page order.
fn load_pdf_pages(path: &Path) -> Result<Vec<String>, RagError> {
    let pages = pdf_extract::extract_text_by_pages(path)
        .map_err(|e| RagError::Ingest(format!("pdf extract {}: {e}", path.display())))?;
    debug!("extracted {} pdf pages from {}", pages.len(), path.display());
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn markdown_sections_become_segments() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "notes.md", "# One\nfirst\n---\nsecond\n---\n\n---\nfourth");

        let doc = load(&path).unwrap();
        assert_eq!(doc.id, "notes.md");
        // The blank third section is dropped, indices keep their position.
        assert_eq!(doc.segments.len(), 3);
        assert_eq!(doc.segments[0].index, 0);
        assert_eq!(doc.segments[2].index, 3);
        assert!(doc.segments[1].text.contains("second"));
    }

    #[test]
    fn plain_text_is_a_single_segment() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "plain.txt", "just one body of text");

        let doc = load(&path).unwrap();
        assert_eq!(doc.segments.len(), 1);
        assert_eq!(doc.segments[0].text, "just one body of text");
    }

    #[test]
    fn missing_file_is_an_ingest_error() {
        let err = load("/definitely/not/here.txt").unwrap_err();
        assert!(matches!(err, RagError::Ingest(_)));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "sheet.xlsx", "not really a spreadsheet");

        let err = load(&path).unwrap_err();
        assert!(matches!(err, RagError::Ingest(_)));
        assert!(err.to_string().contains("unsupported"));
    }

    #[test]
    fn empty_source_yields_zero_segments() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "empty.txt", "   \n  ");

        let doc = load(&path).unwrap();
        assert!(doc.segments.is_empty());
    }
}
