//! Extraction adapter: normalizes a document-understanding service into the
//! pipeline's schema. The raw service response never crosses this boundary;
//! service failures are translated into the pipeline's own taxonomy.

mod http;

pub use http::HttpExtractor;

use async_trait::async_trait;
use base64::Engine;
use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

use veridoc_core::document::{ExtractedField, FieldMap};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("extraction request timed out")]
    Timeout,

    #[error("extraction service unavailable: {0}")]
    Unavailable(String),

    #[error("malformed extraction response: {0}")]
    MalformedResponse(String),
}

impl ExtractError {
    /// Timeouts and outages are retried; a malformed response is a contract
    /// problem and is not.
    pub fn is_transient(&self) -> bool {
        matches!(self, ExtractError::Timeout | ExtractError::Unavailable(_))
    }
}

/// One extraction call: the configured model id, the document text, and the
/// field names this deployment expects. The schema is data, not code.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRequest<'a> {
    pub model: &'a str,
    pub content: &'a str,
    pub schema: &'a [String],
}

/// An image region returned by the service, decoded to bytes so the caller
/// can hand it straight to the image store.
#[derive(Debug, Clone)]
pub struct ImageCrop {
    pub label: String,
    pub bounding_box: Option<[f32; 4]>,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// Normalized extraction result.
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutput {
    pub fields: FieldMap,
    pub crop: Option<ImageCrop>,
}

/// Trait for document-understanding backends.
#[async_trait]
pub trait FieldExtractor: Send + Sync {
    async fn extract(&self, request: ExtractionRequest<'_>) -> Result<ExtractionOutput, ExtractError>;
}

/// Call the extractor, retrying transient failures with backoff up to
/// `max_attempts`. Malformed responses fail immediately.
pub async fn extract_with_retry(
    extractor: &dyn FieldExtractor,
    request: ExtractionRequest<'_>,
    max_attempts: u32,
) -> Result<ExtractionOutput, ExtractError> {
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match extractor.extract(request).await {
            Ok(output) => return Ok(output),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = crate::retry::backoff_delay(attempt);
                tracing::warn!(
                    attempt = attempt,
                    error = %e,
                    "transient extraction failure, retrying in {:?}",
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

// ── Wire format ─────────────────────────────────────────────────────

/// Service response shape. Strict: a field without a confidence is a
/// malformed response, not a guess.
#[derive(Debug, Deserialize)]
pub(crate) struct WireResponse {
    #[serde(default)]
    pub fields: IndexMap<String, WireField>,
    pub crop: Option<WireCrop>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireField {
    pub value: String,
    pub confidence: f32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireCrop {
    pub label: String,
    pub bounding_box: Option<[f32; 4]>,
    #[serde(default = "default_media_type")]
    pub media_type: String,
    /// Base64-encoded image bytes.
    pub data: String,
}

fn default_media_type() -> String {
    "image/png".to_string()
}

/// Translate the wire response into the pipeline schema.
pub(crate) fn normalize(wire: WireResponse) -> Result<ExtractionOutput, ExtractError> {
    let mut fields = FieldMap::new();
    for (name, field) in wire.fields {
        if !field.confidence.is_finite() || !(0.0..=1.0).contains(&field.confidence) {
            return Err(ExtractError::MalformedResponse(format!(
                "field '{name}' confidence out of range: {}",
                field.confidence
            )));
        }
        fields.insert(
            name,
            ExtractedField {
                value: field.value,
                confidence: field.confidence,
            },
        );
    }

    let crop = match wire.crop {
        Some(c) => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(c.data.as_bytes())
                .map_err(|e| {
                    ExtractError::MalformedResponse(format!("crop is not valid base64: {e}"))
                })?;
            Some(ImageCrop {
                label: c.label,
                bounding_box: c.bounding_box,
                media_type: c.media_type,
                bytes,
            })
        }
        None => None,
    };

    Ok(ExtractionOutput { fields, crop })
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_fields_and_crop() {
        let wire: WireResponse = serde_json::from_str(
            r#"{
                "fields": {
                    "name": {"value": "Ada Lovelace", "confidence": 0.98},
                    "amount": {"value": "1200.00", "confidence": 0.71}
                },
                "crop": {
                    "label": "signature",
                    "bounding_box": [10.0, 20.0, 110.0, 60.0],
                    "data": "aGVsbG8="
                }
            }"#,
        )
        .unwrap();

        let output = normalize(wire).unwrap();
        assert_eq!(output.fields.len(), 2);
        assert_eq!(output.fields["name"].value, "Ada Lovelace");
        let crop = output.crop.unwrap();
        assert_eq!(crop.label, "signature");
        assert_eq!(crop.bytes, b"hello");
        assert_eq!(crop.media_type, "image/png");
    }

    #[test]
    fn field_order_is_preserved() {
        let wire: WireResponse = serde_json::from_str(
            r#"{"fields": {"z": {"value": "1", "confidence": 0.9}, "a": {"value": "2", "confidence": 0.9}}}"#,
        )
        .unwrap();
        let output = normalize(wire).unwrap();
        let names: Vec<&String> = output.fields.keys().collect();
        assert_eq!(names, vec!["z", "a"]);
    }

    #[test]
    fn missing_confidence_is_malformed() {
        let result: Result<WireResponse, _> =
            serde_json::from_str(r#"{"fields": {"name": {"value": "Ada"}}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn out_of_range_confidence_is_malformed() {
        let wire: WireResponse = serde_json::from_str(
            r#"{"fields": {"name": {"value": "Ada", "confidence": 3.5}}}"#,
        )
        .unwrap();
        assert!(matches!(
            normalize(wire),
            Err(ExtractError::MalformedResponse(_))
        ));
    }

    #[test]
    fn invalid_base64_crop_is_malformed() {
        let wire: WireResponse = serde_json::from_str(
            r#"{"fields": {}, "crop": {"label": "signature", "data": "%%%not-base64%%%"}}"#,
        )
        .unwrap();
        assert!(matches!(
            normalize(wire),
            Err(ExtractError::MalformedResponse(_))
        ));
    }

    #[test]
    fn empty_response_normalizes_to_empty_output() {
        let wire: WireResponse = serde_json::from_str(r#"{"fields": {}}"#).unwrap();
        let output = normalize(wire).unwrap();
        assert!(output.fields.is_empty());
        assert!(output.crop.is_none());
    }

    // ── Retry semantics ─────────────────────────────────────────────

    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyExtractor {
        failures_before_success: u32,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl FieldExtractor for FlakyExtractor {
        async fn extract(
            &self,
            _request: ExtractionRequest<'_>,
        ) -> Result<ExtractionOutput, ExtractError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures_before_success {
                Err(ExtractError::Unavailable("flaky".to_string()))
            } else {
                Ok(ExtractionOutput::default())
            }
        }
    }

    struct MalformedExtractor {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl FieldExtractor for MalformedExtractor {
        async fn extract(
            &self,
            _request: ExtractionRequest<'_>,
        ) -> Result<ExtractionOutput, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ExtractError::MalformedResponse("bad schema".to_string()))
        }
    }

    fn request<'a>(schema: &'a [String]) -> ExtractionRequest<'a> {
        ExtractionRequest {
            model: "prebuilt-document",
            content: "document text",
            schema,
        }
    }

    #[tokio::test]
    async fn transient_extraction_failures_retry_within_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let extractor = FlakyExtractor {
            failures_before_success: 2,
            calls: calls.clone(),
        };
        let schema = vec![];
        let output = extract_with_retry(&extractor, request(&schema), 3)
            .await
            .unwrap();
        assert!(output.fields.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_budget_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let extractor = FlakyExtractor {
            failures_before_success: 10,
            calls: calls.clone(),
        };
        let schema = vec![];
        let err = extract_with_retry(&extractor, request(&schema), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Unavailable(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn malformed_responses_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let extractor = MalformedExtractor { calls: calls.clone() };
        let schema = vec![];
        let err = extract_with_retry(&extractor, request(&schema), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::MalformedResponse(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
