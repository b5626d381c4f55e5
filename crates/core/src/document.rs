use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stable identifier for one end-to-end processing run.
pub type JobId = String;

/// Derive the job id for an upload: filename stem plus a short digest of the
/// raw bytes. Identical bytes map to the same id (idempotent re-upload);
/// changed bytes under the same filename get a fresh id, so earlier reports
/// are never overwritten.
pub fn job_id_for(filename: &str, bytes: &[u8]) -> JobId {
    let base = filename.rsplit('/').next().unwrap_or(filename);
    let stem = base.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(base);

    let sanitized: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();

    let digest = Sha256::digest(bytes);
    let mut hex = String::with_capacity(8);
    for byte in &digest[..4] {
        hex.push_str(&format!("{byte:02x}"));
    }

    format!("{sanitized}-{hex}")
}

/// Descriptive metadata captured while decoding an upload.
///
/// Persisted beside the report for audit purposes; never required by the
/// analysis itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub filename: String,
    pub file_type: String,
    pub byte_size: u64,
    pub page_count: usize,
}

/// A bounded slice of document content submitted as one unit to the
/// reasoning service. Owned by its document; indices are 0-based and dense.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 0-based index within the document.
    pub index: usize,
    /// The chunk text content.
    pub content: String,
    /// Page number the chunk came from (1-based for PDFs).
    pub page_number: Option<usize>,
    /// Section heading (markdown documents).
    pub section_heading: Option<String>,
    /// Character offset in the original document.
    pub char_offset: usize,
}

/// One structured field value returned by the document-understanding service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedField {
    pub value: String,
    /// Service-reported confidence in [0, 1].
    pub confidence: f32,
}

/// Extracted fields keyed by field name, in service order.
pub type FieldMap = IndexMap<String, ExtractedField>;

/// Reference to a stored image region (e.g. a signature crop). Only the
/// reference travels through the pipeline, never the bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRef {
    pub label: String,
    pub url: String,
    /// Bounding box as [left, top, right, bottom] in page coordinates.
    pub bounding_box: Option<[f32; 4]>,
}
