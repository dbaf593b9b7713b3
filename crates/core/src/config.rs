use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::paths::Paths;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_base: Option<String>,
}

impl ProviderConfig {
    /// The configured key, or `<NAME>_API_KEY` from the environment when the
    /// config leaves it empty.
    pub fn resolved_api_key(&self, provider_name: &str) -> Option<String> {
        let key = self.api_key.trim();
        if !key.is_empty() {
            return Some(key.to_string());
        }
        let var = format!("{}_API_KEY", provider_name.to_uppercase().replace('-', "_"));
        std::env::var(var).ok().filter(|v| !v.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

impl ModelConfig {
    fn text_generation() -> Self {
        Self {
            provider: "grok".to_string(),
            model: "grok-beta".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
        }
    }

    fn code_generation() -> Self {
        Self {
            provider: "groq".to_string(),
            model: "llama3-70b-8192".to_string(),
            temperature: 0.2,
            max_tokens: 800,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierConfig {
    #[serde(default = "default_classifier_enabled")]
    pub enabled: bool,
    #[serde(default = "default_classifier_provider")]
    pub provider: String,
    #[serde(default = "default_classifier_model")]
    pub model: String,
    #[serde(default = "default_classifier_temperature")]
    pub temperature: f32,
    #[serde(default = "default_classifier_max_tokens")]
    pub max_tokens: u32,
    /// Upper bound on one classification call. A timeout routes through the
    /// keyword fallback.
    #[serde(default = "default_classifier_timeout")]
    pub timeout_secs: u64,
}

fn default_classifier_enabled() -> bool {
    true
}

fn default_classifier_provider() -> String {
    "groq".to_string()
}

fn default_classifier_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

fn default_classifier_temperature() -> f32 {
    0.1
}

fn default_classifier_max_tokens() -> u32 {
    200
}

fn default_classifier_timeout() -> u64 {
    10
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: default_classifier_enabled(),
            provider: default_classifier_provider(),
            model: default_classifier_model(),
            temperature: default_classifier_temperature(),
            max_tokens: default_classifier_max_tokens(),
            timeout_secs: default_classifier_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelsConfig {
    #[serde(default = "ModelConfig::text_generation")]
    pub text_generation: ModelConfig,
    #[serde(default = "ModelConfig::code_generation")]
    pub code_generation: ModelConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            text_generation: ModelConfig::text_generation(),
            code_generation: ModelConfig::code_generation(),
            classifier: ClassifierConfig::default(),
        }
    }
}

/// A keyword as written in config: either a bare string that inherits the
/// tool's weight, or an object with its own weight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum KeywordEntry {
    Plain(String),
    Weighted { keyword: String, weight: u32 },
}

impl KeywordEntry {
    pub fn keyword(&self) -> &str {
        match self {
            KeywordEntry::Plain(k) => k,
            KeywordEntry::Weighted { keyword, .. } => keyword,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolKeywords {
    pub tool: String,
    #[serde(default = "default_priority_weight")]
    pub priority_weight: u32,
    #[serde(default)]
    pub keywords: Vec<KeywordEntry>,
}

fn default_priority_weight() -> u32 {
    1
}

impl ToolKeywords {
    pub fn new(tool: &str, priority_weight: u32, keywords: &[&str]) -> Self {
        Self {
            tool: tool.to_string(),
            priority_weight,
            keywords: keywords.iter().map(|k| KeywordEntry::Plain(k.to_string())).collect(),
        }
    }
}

/// One flattened fallback rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRule {
    pub tool: String,
    pub keyword: String,
    pub priority_weight: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingConfig {
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: u8,
    /// Capability chosen when a low-confidence request asks for live data.
    #[serde(default = "default_live_data_tool")]
    pub live_data_tool: String,
    #[serde(default = "default_live_data_indicators")]
    pub live_data_indicators: Vec<String>,
    /// Capability used when neither pass selects anything.
    #[serde(default = "default_default_tool")]
    pub default_tool: Option<String>,
    /// Order matters: it is the registration order used for the final
    /// fallback tie-break.
    #[serde(default = "default_rules")]
    pub rules: Vec<ToolKeywords>,
}

fn default_confidence_threshold() -> u8 {
    70
}

fn default_live_data_tool() -> String {
    "web_search".to_string()
}

fn default_live_data_indicators() -> Vec<String> {
    [
        "current", "latest", "today", "tonight", "tomorrow", "yesterday", "now", "price",
        "prices", "weather", "news", "trending", "real-time", "realtime", "recent", "happening",
        "update", "score", "stock", "flight", "flights", "book", "booking", "ticket", "cheapest",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_default_tool() -> Option<String> {
    Some("text_generation".to_string())
}

fn default_rules() -> Vec<ToolKeywords> {
    vec![
        ToolKeywords::new(
            "text_generation",
            1,
            &[
                "explain", "what is", "how does", "why", "difference between", "concept",
                "theory", "protocol", "detail", "describe", "tell me about",
            ],
        ),
        ToolKeywords::new(
            "code_generation",
            2,
            &[
                "write code", "generate code", "implement", "coding", "programming", "script",
                "function", "algorithm", "create a", "build a",
            ],
        ),
        ToolKeywords::new(
            "web_search",
            3,
            &[
                "current", "latest", "today", "price", "weather", "news", "trending",
                "real-time", "recent", "happening", "update", "book", "flight", "ticket",
            ],
        ),
    ]
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            live_data_tool: default_live_data_tool(),
            live_data_indicators: default_live_data_indicators(),
            default_tool: default_default_tool(),
            rules: default_rules(),
        }
    }
}

impl RoutingConfig {
    /// Flatten the grouped table into individual rules, preserving order.
    pub fn keyword_rules(&self) -> Vec<KeywordRule> {
        let mut rules = Vec::new();
        for group in &self.rules {
            for entry in &group.keywords {
                let priority_weight = match entry {
                    KeywordEntry::Plain(_) => group.priority_weight,
                    KeywordEntry::Weighted { weight, .. } => *weight,
                };
                rules.push(KeywordRule {
                    tool: group.tool.clone(),
                    keyword: entry.keyword().to_string(),
                    priority_weight,
                });
            }
        }
        rules
    }

    pub fn validate(&self) -> Result<()> {
        if self.confidence_threshold > 100 {
            return Err(Error::Config(format!(
                "routing.confidenceThreshold must be within 0..=100, got {}",
                self.confidence_threshold
            )));
        }
        for group in &self.rules {
            if group.tool.trim().is_empty() {
                return Err(Error::Config("routing rule with empty tool name".to_string()));
            }
            if group.priority_weight == 0 {
                return Err(Error::Config(format!(
                    "routing rule '{}' has priorityWeight 0 (must be >= 1)",
                    group.tool
                )));
            }
        }
        for rule in self.keyword_rules() {
            if rule.keyword.trim().is_empty() {
                return Err(Error::Config(format!("routing rule '{}' has an empty keyword", rule.tool)));
            }
            if rule.priority_weight == 0 {
                return Err(Error::Config(format!(
                    "keyword '{}' for '{}' has weight 0 (must be >= 1)",
                    rule.keyword, rule.tool
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatcherConfig {
    /// Entries kept in each of the request and response history buffers.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
    /// Budget for one call on the user endpoint. Unset means classifier
    /// timeout plus two capability calls plus a few seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_timeout_secs: Option<u64>,
}

fn default_history_limit() -> usize {
    100
}

fn default_call_timeout() -> u64 {
    30
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            call_timeout_secs: default_call_timeout(),
            api_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSearchConfig {
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
        }
    }
}

fn default_max_results() -> u32 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsConfig {
    /// Builtin capabilities to load. Manifest capabilities are not filtered.
    #[serde(default = "default_enabled_tools")]
    pub enabled: Vec<String>,
    #[serde(default)]
    pub web_search: WebSearchConfig,
    #[serde(default)]
    pub manifest_dir: Option<String>,
}

fn default_enabled_tools() -> Vec<String> {
    vec![
        "text_generation".to_string(),
        "web_search".to_string(),
        "code_generation".to_string(),
    ]
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_tools(),
            web_search: WebSearchConfig::default(),
            manifest_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_host")]
    pub host: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

fn default_gateway_host() -> String {
    "0.0.0.0".to_string()
}

fn default_gateway_port() -> u16 {
    5000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_providers")]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_providers() -> HashMap<String, ProviderConfig> {
    let mut providers = HashMap::new();
    providers.insert("grok".to_string(), ProviderConfig {
        api_key: String::new(),
        api_base: Some("https://api.x.ai/v1".to_string()),
    });
    providers.insert("groq".to_string(), ProviderConfig {
        api_key: String::new(),
        api_base: Some("https://api.groq.com/openai/v1".to_string()),
    });
    providers
}

impl Default for Config {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            models: ModelsConfig::default(),
            routing: RoutingConfig::default(),
            dispatcher: DispatcherConfig::default(),
            tools: ToolsConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            tracing::debug!(path = %config_path.display(), "Loading config");
            Self::load(&config_path)
        } else {
            tracing::debug!(path = %config_path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.routing.validate()?;
        if self.dispatcher.call_timeout_secs == 0 {
            return Err(Error::Config("dispatcher.callTimeoutSecs must be at least 1".to_string()));
        }
        if self.dispatcher.api_timeout_secs == Some(0) {
            return Err(Error::Config("dispatcher.apiTimeoutSecs must be at least 1".to_string()));
        }
        if self.models.classifier.timeout_secs == 0 {
            return Err(Error::Config("models.classifier.timeoutSecs must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Timeout for the user endpoint. A chat can classify, search and then
    /// structure, so the default covers all three in sequence.
    pub fn api_timeout_secs(&self) -> u64 {
        self.dispatcher.api_timeout_secs.unwrap_or_else(|| {
            self.models.classifier.timeout_secs + 2 * self.dispatcher.call_timeout_secs + 5
        })
    }

    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    pub fn is_tool_enabled(&self, name: &str) -> bool {
        self.tools.enabled.iter().any(|t| t == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.routing.confidence_threshold, 70);
        assert_eq!(cfg.dispatcher.history_limit, 100);
        assert_eq!(cfg.gateway.port, 5000);
        assert!(cfg.is_tool_enabled("web_search"));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let raw = r#"{ "gateway": { "port": 8080 }, "dispatcher": { "historyLimit": 5 } }"#;
        let cfg: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.gateway.port, 8080);
        assert_eq!(cfg.gateway.host, "0.0.0.0");
        assert_eq!(cfg.dispatcher.history_limit, 5);
        assert_eq!(cfg.dispatcher.call_timeout_secs, 30);
        assert!(cfg.providers.contains_key("groq"));
        assert_eq!(cfg.routing.rules.len(), 3);
    }

    #[test]
    fn test_keyword_entries_accept_both_forms() {
        let raw = r#"{
  "routing": {
    "rules": [
      { "tool": "code_generation", "priorityWeight": 3,
        "keywords": ["write code", { "keyword": "rag", "weight": 2 }] }
    ]
  }
}"#;
        let cfg: Config = serde_json::from_str(raw).unwrap();
        let rules = cfg.routing.keyword_rules();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].keyword, "write code");
        assert_eq!(rules[0].priority_weight, 3);
        assert_eq!(rules[1].keyword, "rag");
        assert_eq!(rules[1].priority_weight, 2);
    }

    #[test]
    fn test_api_timeout_outlasts_a_full_chat() {
        let mut cfg = Config::default();
        assert_eq!(cfg.api_timeout_secs(), 10 + 2 * 30 + 5);
        cfg.dispatcher.call_timeout_secs = 1;
        cfg.models.classifier.timeout_secs = 1;
        assert!(cfg.api_timeout_secs() > cfg.models.classifier.timeout_secs + 2 * cfg.dispatcher.call_timeout_secs);

        let cfg: Config = serde_json::from_str(r#"{ "dispatcher": { "apiTimeoutSecs": 120 } }"#).unwrap();
        assert_eq!(cfg.api_timeout_secs(), 120);
        let cfg: Config = serde_json::from_str(r#"{ "dispatcher": { "apiTimeoutSecs": 0 } }"#).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_weight_rejected() {
        let raw = r#"{ "routing": { "rules": [ { "tool": "x", "keywords": [{ "keyword": "k", "weight": 0 }] } ] } }"#;
        let cfg: Config = serde_json::from_str(raw).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_threshold_above_100_rejected() {
        let raw = r#"{ "routing": { "confidenceThreshold": 101 } }"#;
        let cfg: Config = serde_json::from_str(raw).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut cfg = Config::default();
        cfg.gateway.port = 6001;
        cfg.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.gateway.port, 6001);
        assert_eq!(loaded.routing.keyword_rules(), cfg.routing.keyword_rules());
    }

    #[test]
    fn test_resolved_api_key_prefers_config() {
        let p = ProviderConfig { api_key: " sk-1 ".to_string(), api_base: None };
        assert_eq!(p.resolved_api_key("switchyard-test-none").as_deref(), Some("sk-1"));
    }
}
