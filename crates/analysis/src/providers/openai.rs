use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::provider::{ModelError, VerdictModel, VerdictRequest};

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url,
        }
    }
}

#[async_trait]
impl VerdictModel for OpenAiProvider {
    async fn judge(&self, request: &VerdictRequest) -> Result<String, ModelError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut user_content = vec![json!({ "type": "text", "text": request.content })];
        if let Some(ref image_url) = request.image_url {
            user_content.push(json!({
                "type": "image_url",
                "image_url": { "url": image_url },
            }));
        }

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.instruction },
                { "role": "user", "content": user_content },
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        debug!("OpenAI request to {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
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
        let content = resp["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ModelError::Parse("missing choices[0].message.content".into()))?
            .to_string();

        Ok(content)
    }
}
