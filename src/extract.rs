//! Text extraction for document sources.
//!
//! Document sources are read fully into memory and converted into a
//! [`Document`] batch before indexing. PDFs go through `pdf-extract`;
//! plain text and markdown are read as UTF-8.

use std::path::Path;

use crate::error::FolioError;
use crate::models::Document;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";

/// Content type for a path, by extension.
pub fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    match ext.as_str() {
        "pdf" => Some(MIME_PDF),
        "txt" => Some(MIME_TEXT),
        "md" | "markdown" => Some(MIME_MARKDOWN),
        _ => None,
    }
}

/// Read a document source from disk into a one-element batch.
pub fn load_document(path: &Path) -> Result<Vec<Document>, FolioError> {
    let read_err = |detail: String| FolioError::SourceRead {
        path: path.to_path_buf(),
        detail,
    };

    let content_type = content_type_for(path)
        .ok_or_else(|| read_err("unsupported file extension".to_string()))?;
    let bytes = std::fs::read(path).map_err(|e| read_err(e.to_string()))?;
    let body = extract_text(&bytes, content_type).map_err(read_err)?;

    if body.trim().is_empty() {
        return Err(read_err("no extractable text".to_string()));
    }

    Ok(vec![Document {
        source_path: path.to_path_buf(),
        content_type: content_type.to_string(),
        body,
    }])
}

/// Extract plain text from raw bytes of the given content type.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, String> {
    match content_type {
        MIME_PDF => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| format!("PDF extraction failed: {}", e)),
        MIME_TEXT | MIME_MARKDOWN => String::from_utf8(bytes.to_vec())
            .map_err(|e| format!("invalid UTF-8: {}", e)),
        other => Err(format!("unsupported content-type: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type_for(Path::new("a/Canada.PDF")), Some(MIME_PDF));
        assert_eq!(content_type_for(Path::new("notes.txt")), Some(MIME_TEXT));
        assert_eq!(content_type_for(Path::new("pop.csv")), None);
    }

    #[test]
    fn invalid_pdf_is_source_read_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();
        let err = load_document(&path).unwrap_err();
        assert!(matches!(err, FolioError::SourceRead { .. }));
    }

    #[test]
    fn text_document_loads() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("guide.txt");
        std::fs::write(&path, "Ottawa is the capital.").unwrap();
        let docs = load_document(&path).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].body, "Ottawa is the capital.");
        assert_eq!(docs[0].content_type, MIME_TEXT);
    }

    #[test]
    fn empty_text_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.txt");
        std::fs::write(&path, "   \n").unwrap();
        assert!(load_document(&path).is_err());
    }
}
