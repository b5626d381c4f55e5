//! Risk analyzer: one reasoning-service request per chunk, strict verdict
//! parsing, bounded retry for transient failures.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use veridoc_core::config::AnalysisConfig;
use veridoc_core::document::{Chunk, FieldMap, ImageRef};
use veridoc_core::verdict::{ChunkVerdict, RiskLevel};

use crate::provider::{ModelError, VerdictModel, VerdictRequest};
use crate::providers::create_provider;
use crate::retry::backoff_delay;

/// Built-in evaluation instruction, used when no override path is configured.
const DEFAULT_INSTRUCTION: &str = include_str!("../prompts/tamper-analysis.md");

#[derive(Debug, thiserror::Error)]
pub enum VerdictError {
    #[error("model error: {0}")]
    Model(#[from] ModelError),
    #[error("chunk analysis timed out")]
    Timeout,
    /// The service answered, but not with a valid verdict. Never retried:
    /// a malformed verdict indicates a prompt/policy problem, not a
    /// transient one.
    #[error("unparseable verdict: {0}")]
    Parse(String),
}

impl VerdictError {
    fn is_transient(&self) -> bool {
        match self {
            VerdictError::Timeout => true,
            VerdictError::Model(e) => e.is_transient(),
            VerdictError::Parse(_) => false,
        }
    }
}

/// Extra evidence handed to the model alongside a chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkContext<'a> {
    pub fields: Option<&'a FieldMap>,
    pub image: Option<&'a ImageRef>,
    pub total_chunks: usize,
}

/// Sends each chunk to the reasoning service and validates the returned
/// verdict. Chunks are independent; callers may dispatch concurrently.
pub struct RiskAnalyzer {
    model: Box<dyn VerdictModel>,
    instruction: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
    max_attempts: u32,
}

impl RiskAnalyzer {
    pub fn new(model: Box<dyn VerdictModel>, instruction: String, config: &AnalysisConfig) -> Self {
        Self {
            model,
            instruction,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(config.timeout_secs),
            max_attempts: config.max_attempts.max(1),
        }
    }

    /// Build from config: create the configured provider and load the
    /// instruction template (override path, or the built-in default).
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, ModelError> {
        let model = create_provider(config)?;
        let instruction = load_instruction(config.prompt_path.as_deref())?;
        Ok(Self::new(model, instruction, config))
    }

    /// Evaluate one chunk. Transient failures (timeouts, rate limits, 5xx)
    /// are retried with exponential backoff up to the attempt budget;
    /// parse failures are returned immediately.
    pub async fn judge_chunk(
        &self,
        chunk: &Chunk,
        context: ChunkContext<'_>,
    ) -> Result<ChunkVerdict, VerdictError> {
        let request = VerdictRequest {
            instruction: self.instruction.clone(),
            content: render_chunk(chunk, &context),
            image_url: context.image.map(|i| i.url.clone()),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;

            let err = match tokio::time::timeout(self.timeout, self.model.judge(&request)).await {
                Err(_) => VerdictError::Timeout,
                Ok(Err(e)) => VerdictError::Model(e),
                Ok(Ok(raw)) => {
                    debug!(chunk = chunk.index, "model response: {}", raw);
                    return parse_verdict(&raw, chunk.index);
                }
            };

            if !err.is_transient() || attempt >= self.max_attempts {
                return Err(err);
            }

            let delay = backoff_delay(attempt);
            warn!(
                chunk = chunk.index,
                attempt = attempt,
                error = %err,
                "transient analysis failure, retrying in {:?}",
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Load the instruction template from an override path, or fall back to the
/// built-in default.
fn load_instruction(path: Option<&str>) -> Result<String, ModelError> {
    match path {
        Some(p) => std::fs::read_to_string(p).map_err(|e| {
            ModelError::NotConfigured(format!("failed to read instruction template at {p}: {e}"))
        }),
        None => Ok(DEFAULT_INSTRUCTION.to_string()),
    }
}

/// Render the user message for one chunk: position, content, and any
/// extracted-field evidence.
fn render_chunk(chunk: &Chunk, context: &ChunkContext<'_>) -> String {
    let mut out = String::new();

    if context.total_chunks > 0 {
        out.push_str(&format!(
            "Chunk {} of {}",
            chunk.index + 1,
            context.total_chunks
        ));
    } else {
        out.push_str(&format!("Chunk {}", chunk.index + 1));
    }
    if let Some(page) = chunk.page_number {
        out.push_str(&format!(" (page {page})"));
    }
    if let Some(ref heading) = chunk.section_heading {
        out.push_str(&format!(", section \"{heading}\""));
    }
    out.push_str(":\n\n");
    out.push_str(&chunk.content);

    if let Some(fields) = context.fields {
        if !fields.is_empty() {
            out.push_str("\n\nFields extracted from this document:\n");
            for (name, field) in fields {
                out.push_str(&format!(
                    "- {}: {} (confidence {:.2})\n",
                    name, field.value, field.confidence
                ));
            }
        }
    }

    out
}

// ── Verdict parsing ─────────────────────────────────────────────────

/// Raw verdict shape expected from the model. `risk` stays a string here so
/// invalid values produce a precise error instead of a serde blur.
#[derive(Deserialize)]
struct RawVerdict {
    risk: String,
    confidence: f32,
    reasoning: String,
}

/// Validate the model's response into a [`ChunkVerdict`]. Missing fields,
/// unknown risk values, and out-of-range confidence all fail; nothing is
/// defaulted.
pub fn parse_verdict(raw: &str, chunk: usize) -> Result<ChunkVerdict, VerdictError> {
    let json_str = extract_json(raw);

    let parsed: RawVerdict = serde_json::from_str(json_str)
        .map_err(|e| VerdictError::Parse(format!("invalid verdict object: {e}")))?;

    let risk = match parsed.risk.to_lowercase().as_str() {
        "low" => RiskLevel::Low,
        "medium" => RiskLevel::Medium,
        "high" => RiskLevel::High,
        other => {
            return Err(VerdictError::Parse(format!(
                "risk must be low, medium, or high, got '{other}'"
            )))
        }
    };

    if !parsed.confidence.is_finite() || !(0.0..=10.0).contains(&parsed.confidence) {
        return Err(VerdictError::Parse(format!(
            "confidence must be within 0..=10, got {}",
            parsed.confidence
        )));
    }

    Ok(ChunkVerdict {
        chunk,
        risk,
        confidence: parsed.confidence,
        reasoning: parsed.reasoning,
    })
}

/// Extract JSON from a model response, handling markdown code blocks.
fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();

    // Handle ```json ... ``` blocks
    if let Some(start) = trimmed.find("```json") {
        let json_start = start + 7;
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    // Handle ``` ... ``` blocks
    if let Some(start) = trimmed.find("```") {
        let json_start = start + 3;
        // Skip past any language identifier on the same line
        let after_tick = &trimmed[json_start..];
        let content_start = after_tick.find('\n').map_or(0, |n| n + 1);
        if let Some(end) = after_tick[content_start..].find("```") {
            return after_tick[content_start..content_start + end].trim();
        }
    }

    // Try raw JSON (starts with {)
    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            return &trimmed[start..=end];
        }
    }

    trimmed
}

// ── Tests ───────────────────────────────────────────────────────────
