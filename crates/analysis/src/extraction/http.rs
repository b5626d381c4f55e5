use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use veridoc_core::config::ExtractionConfig;

use super::{normalize, ExtractError, ExtractionOutput, ExtractionRequest, FieldExtractor, WireResponse};

/// HTTP adapter for a document-understanding service.
pub struct HttpExtractor {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpExtractor {
    pub fn new(endpoint: String, api_key: Option<String>, timeout: std::time::Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            endpoint,
            api_key,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        let endpoint = config.endpoint.clone().ok_or_else(|| {
            ExtractError::Unavailable("EXTRACTION_ENDPOINT not configured".to_string())
        })?;
        Ok(Self::new(
            endpoint,
            config.api_key.clone(),
            std::time::Duration::from_secs(config.timeout_secs),
        ))
    }
}

#[async_trait]
impl FieldExtractor for HttpExtractor {
    async fn extract(
        &self,
        request: ExtractionRequest<'_>,
    ) -> Result<ExtractionOutput, ExtractError> {
        let url = format!("{}/analyze", self.endpoint.trim_end_matches('/'));
        let body = json!({
            "model": request.model,
            "content": request.content,
            "fields": request.schema,
        });

        debug!("extraction request to {}", url);

        let mut builder = self.client.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = builder.send().await.map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status.as_u16()));
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::MalformedResponse(e.to_string()))?;

        normalize(wire)
    }
}

fn classify_request_error(err: reqwest::Error) -> ExtractError {
    if err.is_timeout() {
        ExtractError::Timeout
    } else {
        ExtractError::Unavailable(err.to_string())
    }
}

/// Map a non-success HTTP status into the pipeline taxonomy.
fn classify_status(status: u16) -> ExtractError {
    match status {
        408 | 504 => ExtractError::Timeout,
        429 => ExtractError::Unavailable(format!("rate limited ({status})")),
        500..=599 => ExtractError::Unavailable(format!("service error ({status})")),
        other => ExtractError::MalformedResponse(format!("service rejected request ({other})")),
    }
}
