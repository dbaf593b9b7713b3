pub mod capability;
pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use capability::{CapabilityDescriptor, CapabilityHandler, CapabilityOrigin, ParameterSchema};
pub use config::Config;
pub use error::{Error, Result};
pub use paths::Paths;
pub use types::{ChatMessage, LLMResponse};
