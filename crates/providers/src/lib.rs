pub mod client;
pub mod factory;
pub mod openai;

use async_trait::async_trait;
use switchyard_core::types::{ChatMessage, LLMResponse};
use switchyard_core::Result;

/// A chat-completion backend.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<LLMResponse>;

    /// Model identifier, for logs and metadata.
    fn model(&self) -> &str;
}

pub use factory::create_provider;
pub use openai::OpenAIProvider;
