use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::report::RiskPolicy;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u16(key: &str, default: u16) -> u16 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_f32(key: &str, default: f32) -> f32 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_list(key: &str, default: &str) -> Vec<String> {
    env_or(key, default)
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub aws: AwsConfig,
    pub chunking: ChunkingConfig,
    pub extraction: ExtractionConfig,
    pub analysis: AnalysisConfig,
    pub policy: RiskPolicy,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            storage: StorageConfig::from_env(),
            aws: AwsConfig::from_env(),
            chunking: ChunkingConfig::from_env(),
            extraction: ExtractionConfig::from_env(),
            analysis: AnalysisConfig::from_env(),
            policy: RiskPolicy {
                medium_confidence_threshold: env_f32("MEDIUM_CONFIDENCE_THRESHOLD", 7.0),
                min_field_confidence: env_f32("MIN_FIELD_CONFIDENCE", 0.5),
            },
        }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  server:     port={}", self.server.port);
        tracing::info!("  storage:    data_dir={}", self.storage.data_dir.display());
        tracing::info!(
            "  aws:        region={}, bucket={}",
            self.aws.region,
            self.aws.s3_bucket.as_deref().unwrap_or("(none)")
        );
        tracing::info!(
            "  chunking:   max_tokens={}, min_tokens={}",
            self.chunking.max_chunk_tokens,
            self.chunking.min_chunk_tokens
        );
        tracing::info!(
            "  extraction: model={}, configured={}",
            self.extraction.model,
            self.extraction.is_configured()
        );
        tracing::info!(
            "  analysis:   provider={}, configured={}",
            self.analysis.provider,
            self.analysis.is_configured()
        );
        tracing::info!(
            "  policy:     medium_confidence_threshold={}",
            self.policy.medium_confidence_threshold
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    /// File extensions accepted by the upload endpoint.
    pub allowed_extensions: Vec<String>,
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    fn from_env() -> Self {
        Self {
            host: env_or("HOST", "0.0.0.0"),
            port: env_u16("PORT", 3001),
            cors_origin: env_or("CORS_ORIGIN", "*"),
            allowed_extensions: env_list("ALLOWED_EXTENSIONS", "pdf,txt,md"),
            max_upload_bytes: env_usize("MAX_UPLOAD_BYTES", 25 * 1024 * 1024),
        }
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Base URL used to form retrievable references for stored images.
    pub public_base_url: Option<String>,
}

impl StorageConfig {
    fn from_env() -> Self {
        Self {
            data_dir: PathBuf::from(env_or("DATA_DIR", "data")),
            public_base_url: env_opt("PUBLIC_BASE_URL"),
        }
    }
}

// ── AWS / S3 ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_prefix: Option<String>,
    pub endpoint_url: Option<String>,
}

impl AwsConfig {
    fn from_env() -> Self {
        Self {
            region: env_or("AWS_REGION", "us-east-1"),
            access_key_id: env_opt("AWS_ACCESS_KEY_ID"),
            secret_access_key: env_opt("AWS_SECRET_ACCESS_KEY"),
            session_token: env_opt("AWS_SESSION_TOKEN"),
            s3_bucket: env_opt("S3_BUCKET"),
            s3_prefix: env_opt("S3_PREFIX"),
            endpoint_url: env_opt("AWS_ENDPOINT_URL"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.access_key_id.is_some() && self.s3_bucket.is_some()
    }
}

// ── Chunking ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum tokens per chunk, sized to the reasoning model's context.
    pub max_chunk_tokens: usize,
    /// Fragments below this merge into their neighbour.
    pub min_chunk_tokens: usize,
}

impl ChunkingConfig {
    fn from_env() -> Self {
        Self {
            max_chunk_tokens: env_usize("MAX_CHUNK_TOKENS", 500),
            min_chunk_tokens: env_usize("MIN_CHUNK_TOKENS", 25),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_tokens: 500,
            min_chunk_tokens: 25,
        }
    }
}

// ── Extraction service ────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    /// Field names this deployment expects the document to carry.
    /// Schema is data, not code.
    pub required_fields: Vec<String>,
}

impl ExtractionConfig {
    fn from_env() -> Self {
        Self {
            endpoint: env_opt("EXTRACTION_ENDPOINT"),
            api_key: env_opt("EXTRACTION_API_KEY"),
            model: env_or("EXTRACTION_MODEL", "prebuilt-document"),
            timeout_secs: env_u64("EXTRACTION_TIMEOUT_SECS", 30),
            max_attempts: env_u32("EXTRACTION_MAX_ATTEMPTS", 3),
            required_fields: env_list("REQUIRED_FIELDS", ""),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }
}

// ── Risk analysis ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// "openai" or "anthropic"
    pub provider: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Override path for the evaluation instruction template.
    pub prompt_path: Option<String>,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    /// Concurrent chunk calls per job, bounded for rate limits.
    pub max_concurrent_chunks: usize,
}

impl AnalysisConfig {
    fn from_env() -> Self {
        Self {
            provider: env_or("ANALYSIS_PROVIDER", "openai"),
            openai_api_key: env_opt("OPENAI_API_KEY"),
            openai_model: env_or("OPENAI_MODEL", "gpt-4o"),
            openai_base_url: env_opt("OPENAI_BASE_URL"),
            anthropic_api_key: env_opt("ANTHROPIC_API_KEY"),
            anthropic_model: env_or("ANTHROPIC_MODEL", "claude-sonnet-4-5-20250929"),
            temperature: env_f32("ANALYSIS_TEMPERATURE", 0.1),
            max_tokens: env_u32("ANALYSIS_MAX_TOKENS", 800),
            prompt_path: env_opt("ANALYSIS_PROMPT_PATH"),
            timeout_secs: env_u64("ANALYSIS_TIMEOUT_SECS", 60),
            max_attempts: env_u32("ANALYSIS_MAX_ATTEMPTS", 3),
            max_concurrent_chunks: env_usize("MAX_CONCURRENT_CHUNKS", 4),
        }
    }

    pub fn is_configured(&self) -> bool {
        match self.provider.as_str() {
            "openai" => self.openai_api_key.is_some(),
            "anthropic" => self.anthropic_api_key.is_some(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_list_splits_and_trims() {
        assert_eq!(
            env_list("VERIDOC_TEST_MISSING_KEY", "name, signature ,amount"),
            vec!["name", "signature", "amount"]
        );
        assert!(env_list("VERIDOC_TEST_MISSING_KEY", "").is_empty());
    }

    #[test]
    fn analysis_config_requires_provider_key() {
        let mut config = AnalysisConfig {
            provider: "openai".to_string(),
            openai_api_key: None,
            openai_model: "gpt-4o".to_string(),
            openai_base_url: None,
            anthropic_api_key: None,
            anthropic_model: "claude-sonnet-4-5-20250929".to_string(),
            temperature: 0.1,
            max_tokens: 800,
            prompt_path: None,
            timeout_secs: 60,
            max_attempts: 3,
            max_concurrent_chunks: 4,
        };
        assert!(!config.is_configured());
        config.openai_api_key = Some("sk-test".to_string());
        assert!(config.is_configured());
        config.provider = "unknown".to_string();
        assert!(!config.is_configured());
    }
}
