use serde::{Deserialize, Serialize};

/// Risk level assigned to one chunk by the reasoning service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// The structured judgment returned for one chunk.
///
/// Serialized field names are part of the report contract:
/// `{chunk, risk, confidence, reasoning}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkVerdict {
    /// Back-reference to the chunk index (0-based).
    pub chunk: usize,
    pub risk: RiskLevel,
    /// Model-reported confidence in [0, 10].
    pub confidence: f32,
    pub reasoning: String,
}

/// Pipeline stage a chunk failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Extraction,
    Analysis,
}

/// An explicit per-chunk failure record. Failed chunks are carried through
/// to report assembly, never silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkFailure {
    pub chunk: usize,
    pub stage: FailureStage,
    pub detail: String,
}

/// The result of processing one chunk: a verdict or a recorded failure.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    Verdict(ChunkVerdict),
    Failed(ChunkFailure),
}

impl ChunkOutcome {
    /// The chunk index this outcome belongs to.
    pub fn chunk(&self) -> usize {
        match self {
            ChunkOutcome::Verdict(v) => v.chunk,
            ChunkOutcome::Failed(f) => f.chunk,
        }
    }

    pub fn verdict(&self) -> Option<&ChunkVerdict> {
        match self {
            ChunkOutcome::Verdict(v) => Some(v),
            ChunkOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ChunkFailure> {
        match self {
            ChunkOutcome::Verdict(_) => None,
            ChunkOutcome::Failed(f) => Some(f),
        }
    }
}
