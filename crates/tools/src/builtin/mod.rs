pub mod code_generation;
pub mod text_generation;
pub mod web_search;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use switchyard_core::{CapabilityOrigin, Config, Error, ParameterSchema, Result};
use switchyard_providers::create_provider;

use crate::discovery::{CapabilityDefinition, Discovered, DiscoverySource};

pub use code_generation::CodeGenerationCapability;
pub use text_generation::TextGenerationCapability;
pub use web_search::WebSearchCapability;

pub const TEXT_GENERATION: &str = "text_generation";
pub const CODE_GENERATION: &str = "code_generation";
pub const WEB_SEARCH: &str = "web_search";

/// Fetch a required, non-empty string parameter.
pub(crate) fn required_str(params: &Map<String, Value>, key: &str) -> Result<String> {
    match params.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(Error::Validation(format!("parameter '{}' must not be empty", key))),
        Some(_) => Err(Error::Validation(format!("parameter '{}' must be a string", key))),
        None => Err(Error::Validation(format!("missing required parameter '{}'", key))),
    }
}

pub(crate) fn optional_str<'a>(params: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str()).filter(|s| !s.trim().is_empty())
}

fn schema(pairs: &[(&str, &str)]) -> ParameterSchema {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// The capabilities compiled into the binary, filtered by `tools.enabled`.
pub struct BuiltinSource {
    config: Config,
}

impl BuiltinSource {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn load(&self, name: &str) -> Discovered {
        let origin = CapabilityOrigin::Builtin;
        let built = match name {
            TEXT_GENERATION => create_provider(&self.config, &self.config.models.text_generation).map(|provider| {
                CapabilityDefinition {
                    name: TEXT_GENERATION.to_string(),
                    description: "Generate explanations, answers and prose for a prompt".to_string(),
                    parameters: schema(&[
                        ("prompt", "The question or instruction to answer"),
                        ("system", "Optional system prompt override"),
                    ]),
                    origin,
                    handler: Arc::new(TextGenerationCapability::new(provider)),
                }
            }),
            CODE_GENERATION => create_provider(&self.config, &self.config.models.code_generation).map(|provider| {
                CapabilityDefinition {
                    name: CODE_GENERATION.to_string(),
                    description: "Write, explain or fix source code".to_string(),
                    parameters: schema(&[
                        ("prompt", "Description of the code to write"),
                        ("language", "Optional target programming language"),
                    ]),
                    origin,
                    handler: Arc::new(CodeGenerationCapability::new(provider)),
                }
            }),
            WEB_SEARCH => Ok(CapabilityDefinition {
                name: WEB_SEARCH.to_string(),
                description: "Search the web for current information".to_string(),
                parameters: schema(&[
                    ("query", "The search query"),
                    ("max_results", "Maximum number of results (1-10)"),
                ]),
                origin,
                handler: Arc::new(WebSearchCapability::new(self.config.tools.web_search.max_results)),
            }),
            other => Err(Error::Config(format!("unknown builtin capability '{}'", other))),
        };

        match built {
            Ok(def) => Discovered::Loaded(def),
            Err(e) => Discovered::failed(format!("builtin:{}", name), e.to_string()),
        }
    }
}

#[async_trait]
impl DiscoverySource for BuiltinSource {
    fn name(&self) -> &str {
        "builtin"
    }

    async fn enumerate(&self) -> Result<Vec<Discovered>> {
        Ok(self.config.tools.enabled.iter().map(|name| self.load(name)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use switchyard_core::config::ProviderConfig;

    fn loaded_names(found: &[Discovered]) -> Vec<String> {
        found
            .iter()
            .filter_map(|d| match d {
                Discovered::Loaded(def) => Some(def.name.clone()),
                Discovered::Failed { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_required_str() {
        let params = json!({"prompt": "hi", "blank": " ", "n": 3});
        let params = params.as_object().unwrap();
        assert_eq!(required_str(params, "prompt").unwrap(), "hi");
        assert!(required_str(params, "blank").unwrap_err().is_invalid_params());
        assert!(required_str(params, "n").unwrap_err().is_invalid_params());
        assert!(required_str(params, "missing").unwrap_err().is_invalid_params());
    }

    #[tokio::test]
    async fn test_keyless_llm_builtins_fail_but_search_loads() {
        let mut config = Config::default();
        config.providers.insert(
            "switchyard-nokey".to_string(),
            ProviderConfig::default(),
        );
        config.models.text_generation.provider = "switchyard-nokey".to_string();
        config.models.code_generation.provider = "switchyard-nokey".to_string();
        config.tools.enabled.push("teleport".to_string());

        let found = BuiltinSource::new(config).enumerate().await.unwrap();
        assert_eq!(found.len(), 4);
        assert_eq!(loaded_names(&found), vec!["web_search"]);
    }

    #[tokio::test]
    async fn test_keyed_builtins_load() {
        let mut config = Config::default();
        config.providers.insert(
            "local".to_string(),
            ProviderConfig {
                api_key: "sk-test".to_string(),
                api_base: Some("http://127.0.0.1:9/v1".to_string()),
            },
        );
        config.models.text_generation.provider = "local".to_string();
        config.models.code_generation.provider = "local".to_string();

        let found = BuiltinSource::new(config).enumerate().await.unwrap();
        let mut names = loaded_names(&found);
        names.sort();
        assert_eq!(names, vec!["code_generation", "text_generation", "web_search"]);
    }
}
