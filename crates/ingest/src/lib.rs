pub mod document;

pub use document::chunker::chunk_document;
pub use document::{decode_document, DecodeError, DecodedDocument, PageContent};
