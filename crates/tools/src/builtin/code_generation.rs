use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use switchyard_core::{CapabilityHandler, Result};
use switchyard_providers::Provider;

use super::text_generation::complete;
use super::{optional_str, required_str};

const SYSTEM_PROMPT: &str = "You are an expert software engineer. Write correct, idiomatic, \
well-structured code. Return the code in fenced blocks followed by a brief explanation.";

pub struct CodeGenerationCapability {
    provider: Arc<dyn Provider>,
}

impl CodeGenerationCapability {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }
}

fn build_prompt(prompt: &str, language: Option<&str>) -> String {
    match language {
        Some(lang) => format!("Language: {}\n\n{}", lang, prompt),
        None => prompt.to_string(),
    }
}

#[async_trait]
impl CapabilityHandler for CodeGenerationCapability {
    async fn execute(&self, params: Map<String, Value>) -> Result<Value> {
        let prompt = required_str(&params, "prompt")?;
        let prompt = build_prompt(&prompt, optional_str(&params, "language"));
        complete(self.provider.as_ref(), SYSTEM_PROMPT, &prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt() {
        assert_eq!(build_prompt("sort a list", None), "sort a list");
        assert_eq!(build_prompt("sort a list", Some("rust")), "Language: rust\n\nsort a list");
    }
}
