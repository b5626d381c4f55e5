pub mod analyzer;
pub mod extraction;
pub mod provider;
pub mod providers;
mod retry;

pub use analyzer::{ChunkContext, RiskAnalyzer, VerdictError};
pub use extraction::{
    extract_with_retry, ExtractError, ExtractionOutput, ExtractionRequest, FieldExtractor,
    ImageCrop,
};
pub use provider::{ModelError, VerdictModel, VerdictRequest};
