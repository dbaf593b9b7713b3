use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use switchyard_core::types::ChatMessage;
use switchyard_core::{Error, Result};
use switchyard_providers::Provider;
use tracing::debug;

/// The primary classifier's verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub tool: String,
    /// 0..=100
    pub confidence: u8,
    pub reasoning: String,
}

/// Primary intent classifier. Any error sends the router to its keyword
/// fallback.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, text: &str, available_tools: &[String]) -> Result<Classification>;
}

const SYSTEM_PROMPT: &str = "You are a query routing expert. Respond only with valid JSON.";

/// Asks a small, fast chat model which capability fits the request.
pub struct LlmClassifier {
    provider: Arc<dyn Provider>,
}

impl LlmClassifier {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    fn build_prompt(text: &str, available_tools: &[String]) -> String {
        format!(
            r#"You are an intelligent query router. Analyze the user's query and determine which tool should handle it.

Available tools:
- code_generation: writing code, implementing features, building applications, algorithms
- web_search: real-time info, bookings, prices, news, weather, current events
- text_generation: explanations, definitions, concepts, tutorials, general knowledge

User Query: "{}"

Respond in JSON format:
{{"recommended_tool": "tool_name", "confidence": 85, "reasoning": "brief explanation"}}

Rules:
- Confidence is an integer from 0 to 100
- Only use tools from this list: {}

Respond ONLY with valid JSON, no other text."#,
            text.replace('"', "'"),
            available_tools.join(", ")
        )
    }
}

#[async_trait]
impl IntentClassifier for LlmClassifier {
    async fn classify(&self, text: &str, available_tools: &[String]) -> Result<Classification> {
        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(&Self::build_prompt(text, available_tools)),
        ];
        let response = self.provider.chat(&messages).await?;
        let raw = response
            .content
            .ok_or_else(|| Error::Provider("classifier returned no content".to_string()))?;
        debug!(model = self.provider.model(), raw = %raw, "Classifier output");
        parse_classification(&raw)
    }
}

/// Find the first balanced `{...}` in model output (which may be fenced or
/// wrapped in prose).
pub(crate) fn extract_json_object(raw: &str) -> Option<&str> {
    let mut start = None;
    let mut depth: i32 = 0;
    for (idx, ch) in raw.char_indices() {
        if ch == '{' {
            if start.is_none() {
                start = Some(idx);
            }
            depth += 1;
        } else if ch == '}' && depth > 0 {
            depth -= 1;
            if depth == 0 {
                if let Some(s) = start {
                    return Some(&raw[s..=idx]);
                }
            }
        }
    }
    None
}

pub(crate) fn parse_classification(raw: &str) -> Result<Classification> {
    let json = extract_json_object(raw)
        .ok_or_else(|| Error::Provider(format!("no JSON object in classifier output: {}", raw.trim())))?;
    let value: Value = serde_json::from_str(json)?;

    let tool = value
        .get("recommended_tool")
        .or_else(|| value.get("tool"))
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::Provider("classifier output has no recommended_tool".to_string()))?
        .to_string();

    let confidence = match value.get("confidence") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    // Some models answer on a 0..1 scale.
    let confidence = if confidence > 0.0 && confidence < 1.0 {
        confidence * 100.0
    } else {
        confidence
    };

    let reasoning = value
        .get("reasoning")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    Ok(Classification {
        tool,
        confidence: confidence.round().clamp(0.0, 100.0) as u8,
        reasoning,
    })
}
