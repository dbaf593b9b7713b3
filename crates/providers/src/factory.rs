use std::sync::Arc;
use switchyard_core::config::ModelConfig;
use switchyard_core::{Config, Error, Result};
use tracing::debug;

use crate::{OpenAIProvider, Provider};

/// Fallback `api_base` for known OpenAI-compatible providers.
fn default_api_base(provider_name: &str) -> &'static str {
    match provider_name {
        "grok" | "xai" => "https://api.x.ai/v1",
        "groq" => "https://api.groq.com/openai/v1",
        "openrouter" => "https://openrouter.ai/api/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        _ => "https://api.openai.com/v1",
    }
}

/// Build a provider for one model entry.
///
/// Fails with `Error::Config` when the provider is unknown or has no API key
/// in the config or environment.
pub fn create_provider(config: &Config, model: &ModelConfig) -> Result<Arc<dyn Provider>> {
    let name = model.provider.as_str();
    if name.is_empty() {
        return Err(Error::Config(format!("model '{}' has no provider", model.model)));
    }
    let provider_cfg = config
        .get_provider(name)
        .ok_or_else(|| Error::Config(format!("provider '{}' not found in providers section", name)))?;

    let api_key = provider_cfg.resolved_api_key(name).ok_or_else(|| {
        Error::Config(format!(
            "provider '{}' has no API key (set providers.{}.apiKey or {}_API_KEY)",
            name,
            name,
            name.to_uppercase()
        ))
    })?;

    let api_base = provider_cfg
        .api_base
        .as_deref()
        .filter(|b| !b.trim().is_empty())
        .unwrap_or_else(|| default_api_base(name));

    debug!(provider = name, model = %model.model, api_base, "Creating provider");
    Ok(Arc::new(OpenAIProvider::new(
        &api_key,
        Some(api_base),
        &model.model,
        model.max_tokens,
        model.temperature,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::config::ProviderConfig;

    fn model(provider: &str) -> ModelConfig {
        ModelConfig {
            provider: provider.to_string(),
            model: "test-model".to_string(),
            temperature: 0.2,
            max_tokens: 100,
        }
    }

    #[test]
    fn test_unknown_provider() {
        let config = Config::default();
        let err = create_provider(&config, &model("nope-provider-x")).err().unwrap();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_missing_key() {
        let mut config = Config::default();
        config
            .providers
            .insert("switchyard-keyless".to_string(), ProviderConfig::default());
        let err = create_provider(&config, &model("switchyard-keyless")).err().unwrap();
        assert!(err.to_string().contains("no API key"));
    }

    #[test]
    fn test_configured_key() {
        let mut config = Config::default();
        config.providers.insert(
            "local".to_string(),
            ProviderConfig {
                api_key: "sk-test".to_string(),
                api_base: Some("http://127.0.0.1:9/v1".to_string()),
            },
        );
        let provider = create_provider(&config, &model("local")).unwrap();
        assert_eq!(provider.model(), "test-model");
    }

    #[test]
    fn test_default_api_base() {
        assert_eq!(default_api_base("grok"), "https://api.x.ai/v1");
        assert_eq!(default_api_base("groq"), "https://api.groq.com/openai/v1");
    }
}
