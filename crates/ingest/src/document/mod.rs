pub mod chunker;
mod md;
mod pdf;
mod txt;

use thiserror::Error;

use veridoc_core::document::DocumentMetadata;

/// The document-format error class: any of these is fatal to the job and
/// produces no chunks.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("document could not be decoded: {0}")]
    Malformed(String),

    #[error("document contains no extractable text")]
    Empty,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A page of extracted text.
#[derive(Debug, Clone)]
pub struct PageContent {
    /// 1-based page number (for PDFs). For TXT/MD, always 1.
    pub page_number: usize,
    /// The extracted text content.
    pub text: String,
}

/// Result of decoding an upload: extracted pages plus audit metadata.
#[derive(Debug, Clone)]
pub struct DecodedDocument {
    pub filename: String,
    /// File type: "pdf", "txt", "md"
    pub file_type: String,
    pub pages: Vec<PageContent>,
    pub metadata: DocumentMetadata,
}

impl DecodedDocument {
    /// Get all text concatenated.
    pub fn full_text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Decode raw upload bytes based on the filename extension.
///
/// Deterministic: the same bytes always produce the same pages, which is
/// what makes downstream chunking reproducible.
pub fn decode_document(bytes: &[u8], filename: &str) -> Result<DecodedDocument, DecodeError> {
    let ext = filename.rsplit('.').next().unwrap_or("").to_lowercase();
    let file_type = ext.as_str();

    let pages = match file_type {
        "pdf" => pdf::extract_pdf(bytes)?,
        "txt" | "text" => txt::extract_txt(bytes)?,
        "md" | "markdown" => md::extract_md(bytes)?,
        other => return Err(DecodeError::UnsupportedType(other.to_string())),
    };

    if pages.iter().all(|p| p.text.trim().is_empty()) {
        return Err(DecodeError::Empty);
    }

    let metadata = DocumentMetadata {
        filename: filename.to_string(),
        file_type: file_type.to_string(),
        byte_size: bytes.len() as u64,
        page_count: pages.len(),
    };

    Ok(DecodedDocument {
        filename: filename.to_string(),
        file_type: file_type.to_string(),
        pages,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_txt_document() {
        let doc = decode_document(b"Hello, world!", "note.txt").unwrap();
        assert_eq!(doc.file_type, "txt");
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.metadata.byte_size, 13);
        assert_eq!(doc.metadata.page_count, 1);
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = decode_document(b"anything", "form.docx").unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedType(ref ext) if ext == "docx"));
    }

    #[test]
    fn empty_document_is_rejected() {
        let err = decode_document(b"   \n\t  ", "blank.txt").unwrap_err();
        assert!(matches!(err, DecodeError::Empty));
    }

    #[test]
    fn garbage_pdf_is_rejected() {
        let err = decode_document(b"not a pdf at all", "bad.pdf").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }
}
