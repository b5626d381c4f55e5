mod anthropic;
mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

use veridoc_core::config::AnalysisConfig;

use crate::provider::{ModelError, VerdictModel};

/// Create the provider selected by config.
pub fn create_provider(config: &AnalysisConfig) -> Result<Box<dyn VerdictModel>, ModelError> {
    match config.provider.as_str() {
        "openai" => {
            let api_key = config
                .openai_api_key
                .clone()
                .ok_or_else(|| ModelError::NotConfigured("OPENAI_API_KEY not set".into()))?;
            Ok(Box::new(OpenAiProvider::new(
                api_key,
                config.openai_model.clone(),
                config
                    .openai_base_url
                    .clone()
                    .unwrap_or_else(|| "https://api.openai.com".to_string()),
            )))
        }
        "anthropic" => {
            let api_key = config
                .anthropic_api_key
                .clone()
                .ok_or_else(|| ModelError::NotConfigured("ANTHROPIC_API_KEY not set".into()))?;
            Ok(Box::new(AnthropicProvider::new(
                api_key,
                config.anthropic_model.clone(),
            )))
        }
        other => Err(ModelError::NotConfigured(format!(
            "unknown analysis provider '{other}'"
        ))),
    }
}
