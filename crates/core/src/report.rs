//! Report assembly.
//!
//! Merges the full ordered list of chunk outcomes into one document-level
//! report. Pure over its inputs: the tampered set is derived exclusively
//! from the verdicts plus the policy, so re-assembling the same outcomes
//! always yields the same classification.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::FieldMap;
use crate::verdict::{ChunkOutcome, ChunkVerdict, FailureStage, RiskLevel};

// ── Policy ──────────────────────────────────────────────────────────

/// Tamper-classification policy. Lives here, not in the analyzer, so the
/// thresholds can change without re-querying any model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskPolicy {
    /// Minimum confidence for a `medium` verdict to count as tampered.
    pub medium_confidence_threshold: f32,
    /// Extracted fields below this confidence get a review issue.
    pub min_field_confidence: f32,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            medium_confidence_threshold: 7.0,
            min_field_confidence: 0.5,
        }
    }
}

impl RiskPolicy {
    /// A chunk is tampered iff risk is high, or risk is medium with
    /// confidence at or above the configured threshold.
    pub fn is_tampered(&self, verdict: &ChunkVerdict) -> bool {
        match verdict.risk {
            RiskLevel::High => true,
            RiskLevel::Medium => verdict.confidence >= self.medium_confidence_threshold,
            RiskLevel::Low => false,
        }
    }
}

// ── Report model ────────────────────────────────────────────────────

/// Overall processing status. `Success` means processing completed; a
/// document full of tampered chunks still reports `Success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Success,
    Error,
}

/// One field-level or chunk-level problem surfaced to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub field: String,
    pub description: String,
    pub action: String,
}

/// Per-chunk verdicts in chunk order, nested under `response` in the
/// serialized report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub explanation: Vec<ChunkVerdict>,
}

/// The consolidated document-level report. Written once per job; every
/// subsequent poll reads the same object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub form_id: String,
    pub status: ReportStatus,
    pub timestamp: DateTime<Utc>,
    pub request_id: Uuid,
    pub tampered_chunks: Vec<usize>,
    pub response: AnalysisResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay_image_url: Option<String>,
    pub issues: Vec<Issue>,
}

// ── Assembly ────────────────────────────────────────────────────────

/// Everything the assembler needs about one finished job.
#[derive(Debug, Default)]
pub struct AssemblyInput<'a> {
    pub form_id: &'a str,
    /// All chunk outcomes, failures included. May arrive unordered.
    pub outcomes: &'a [ChunkOutcome],
    /// Structured fields from the extraction service, if any were produced.
    pub fields: Option<&'a FieldMap>,
    /// Field names the deployment requires the document to carry.
    pub required_fields: &'a [String],
    /// Set when decoding/chunking failed before any chunk existed.
    pub fatal: Option<&'a str>,
    /// Set when document-level extraction failed after retries.
    pub extraction_failure: Option<&'a str>,
}

/// Merge chunk outcomes into one report.
///
/// Status is `Error` only when nothing could be evaluated: a fatal decode
/// failure, or not a single chunk with a verdict. Per-chunk failures and
/// field problems become issues without flipping the status.
pub fn assemble(input: AssemblyInput<'_>, policy: &RiskPolicy) -> Report {
    let mut outcomes: Vec<&ChunkOutcome> = input.outcomes.iter().collect();
    outcomes.sort_by_key(|o| o.chunk());

    let explanation: Vec<ChunkVerdict> = outcomes
        .iter()
        .filter_map(|o| o.verdict())
        .cloned()
        .collect();

    let tampered: BTreeSet<usize> = explanation
        .iter()
        .filter(|v| policy.is_tampered(v))
        .map(|v| v.chunk)
        .collect();

    let mut issues = Vec::new();

    if let Some(detail) = input.fatal {
        issues.push(Issue {
            field: "document".to_string(),
            description: detail.to_string(),
            action: "Re-upload the document in a readable format (PDF, TXT, or MD).".to_string(),
        });
    }

    if let Some(detail) = input.extraction_failure {
        issues.push(Issue {
            field: "extraction".to_string(),
            description: detail.to_string(),
            action: "Retry once the extraction service is reachable.".to_string(),
        });
    }

    for failure in outcomes.iter().filter_map(|o| o.failure()) {
        let action = match failure.stage {
            FailureStage::Extraction => "Retry once the extraction service is reachable.",
            FailureStage::Analysis => "Re-submit the document to re-evaluate this chunk.",
        };
        issues.push(Issue {
            field: format!("chunk {}", failure.chunk),
            description: failure.detail.clone(),
            action: action.to_string(),
        });
    }

    if let Some(fields) = input.fields {
        for name in input.required_fields {
            if !fields.contains_key(name) {
                issues.push(Issue {
                    field: name.clone(),
                    description: "required field missing from extraction output".to_string(),
                    action: "Verify the document contains this field, then re-upload.".to_string(),
                });
            }
        }
        for (name, field) in fields {
            if field.confidence < policy.min_field_confidence {
                issues.push(Issue {
                    field: name.clone(),
                    description: format!(
                        "extracted with low confidence ({:.2})",
                        field.confidence
                    ),
                    action: "Manually verify this field value.".to_string(),
                });
            }
        }
    }

    let status = if input.fatal.is_some() || explanation.is_empty() {
        ReportStatus::Error
    } else {
        ReportStatus::Success
    };

    Report {
        form_id: input.form_id.to_string(),
        status,
        timestamp: Utc::now(),
        request_id: Uuid::new_v4(),
        tampered_chunks: tampered.into_iter().collect(),
        response: AnalysisResponse { explanation },
        overlay_image_url: None,
        issues,
    }
}

// ── Tests ───────────────────────────────────────────────────────────
