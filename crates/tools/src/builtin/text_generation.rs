use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use switchyard_core::types::ChatMessage;
use switchyard_core::{CapabilityHandler, Error, Result};
use switchyard_providers::Provider;
use tracing::debug;

use super::{optional_str, required_str};

const SYSTEM_PROMPT: &str = "You are a knowledgeable assistant. Answer clearly and accurately. \
Use short paragraphs and lists where they help, and say so when you are unsure.";

/// Run one system + user exchange and return the completion text.
pub(crate) async fn complete(provider: &dyn Provider, system: &str, prompt: &str) -> Result<Value> {
    let messages = [ChatMessage::system(system), ChatMessage::user(prompt)];
    let response = provider.chat(&messages).await?;
    let content = response
        .content
        .ok_or_else(|| Error::Capability(format!("model '{}' returned an empty completion", provider.model())))?;
    debug!(model = provider.model(), chars = content.len(), "Completion received");
    Ok(json!({
        "content": content,
        "model": provider.model(),
        "usage": response.usage,
    }))
}

pub struct TextGenerationCapability {
    provider: Arc<dyn Provider>,
}

impl TextGenerationCapability {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl CapabilityHandler for TextGenerationCapability {
    async fn execute(&self, params: Map<String, Value>) -> Result<Value> {
        let prompt = required_str(&params, "prompt")?;
        let system = optional_str(&params, "system").unwrap_or(SYSTEM_PROMPT);
        complete(self.provider.as_ref(), system, &prompt).await
    }
}
