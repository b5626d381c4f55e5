use async_trait::async_trait;

/// One risk-evaluation request: the deployment's instruction, the chunk
/// content (with any extracted context rendered in), and at most one image
/// reference for multimodal providers.
#[derive(Debug, Clone)]
pub struct VerdictRequest {
    pub instruction: String,
    pub content: String,
    /// Image evidence by URL reference; bytes never travel through here.
    pub image_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Trait for reasoning-service backends. Returns the raw assistant text;
/// the analyzer owns parsing and validation.
#[async_trait]
pub trait VerdictModel: Send + Sync {
    async fn judge(&self, request: &VerdictRequest) -> Result<String, ModelError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status}: {body}")]
    Api { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    Parse(String),
    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

impl ModelError {
    /// Transient errors (rate limits, 5xx, network) are worth a bounded
    /// retry; everything else indicates a request or policy problem.
    pub fn is_transient(&self) -> bool {
        match self {
            ModelError::Http(_) => true,
            ModelError::Api { status, .. } => *status == 429 || (500..=599).contains(status),
            ModelError::Parse(_) | ModelError::NotConfigured(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_classify_by_status() {
        assert!(ModelError::Api { status: 429, body: String::new() }.is_transient());
        assert!(ModelError::Api { status: 503, body: String::new() }.is_transient());
        assert!(!ModelError::Api { status: 400, body: String::new() }.is_transient());
        assert!(!ModelError::Api { status: 401, body: String::new() }.is_transient());
    }

    #[test]
    fn parse_errors_are_not_transient() {
        assert!(!ModelError::Parse("bad json".to_string()).is_transient());
        assert!(!ModelError::NotConfigured("no key".to_string()).is_transient());
    }
}
