use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::provider::{ModelError, VerdictModel, VerdictRequest};

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
        }
    }
}

#[async_trait]
impl VerdictModel for AnthropicProvider {
    async fn judge(&self, request: &VerdictRequest) -> Result<String, ModelError> {
        let url = "https://api.anthropic.com/v1/messages";

        let mut user_content = vec![json!({ "type": "text", "text": request.content })];
        if let Some(ref image_url) = request.image_url {
            user_content.push(json!({
                "type": "image",
                "source": { "type": "url", "url": image_url },
            }));
        }

        // The Anthropic API takes the system prompt as a separate parameter.
        let body = json!({
            "model": self.model,
            "system": request.instruction,
            "messages": [
                { "role": "user", "content": user_content },
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        debug!("Anthropic request to {}", url);

        let response = self
            .client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api { status, body });
        }

        let resp: serde_json::Value = response.json().await?;
        let content = resp["content"][0]["text"]
            .as_str()
            .ok_or_else(|| ModelError::Parse("missing content[0].text".into()))?
            .to_string();

        Ok(content)
    }
}
