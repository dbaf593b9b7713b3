use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Parameter name → human-readable description.
pub type ParameterSchema = BTreeMap<String, String>;

/// Execution contract every capability implements.
///
/// Capabilities receive named parameters only; positional `params` arrays are
/// rejected before the handler is reached.
#[async_trait::async_trait]
pub trait CapabilityHandler: Send + Sync {
    async fn execute(&self, params: Map<String, Value>) -> Result<Value>;
}

/// Where a capability definition came from (builtin, a manifest file, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityOrigin {
    Builtin,
    Manifest(String),
    Other(String),
}

impl fmt::Display for CapabilityOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityOrigin::Builtin => write!(f, "builtin"),
            CapabilityOrigin::Manifest(path) => write!(f, "manifest:{}", path),
            CapabilityOrigin::Other(label) => write!(f, "{}", label),
        }
    }
}

/// Immutable metadata plus handler for one discovered capability.
///
/// Built once per discovery cycle and shared behind `Arc` by the registry
/// snapshot and the dispatcher method table. There are no setters.
#[derive(Clone)]
pub struct CapabilityDescriptor {
    name: String,
    description: String,
    parameter_schema: ParameterSchema,
    origin: CapabilityOrigin,
    handler: Arc<dyn CapabilityHandler>,
}

impl CapabilityDescriptor {
    /// Build a descriptor, rejecting names that cannot serve as a JSON-RPC
    /// method name.
    pub fn new(
        name: &str,
        description: &str,
        parameter_schema: ParameterSchema,
        origin: CapabilityOrigin,
        handler: Arc<dyn CapabilityHandler>,
    ) -> Result<Self> {
        validate_name(name)?;
        let description = if description.trim().is_empty() {
            "No description".to_string()
        } else {
            description.trim().to_string()
        };
        Ok(Self {
            name: name.to_string(),
            description,
            parameter_schema,
            origin,
            handler,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameter_schema(&self) -> &ParameterSchema {
        &self.parameter_schema
    }

    pub fn origin(&self) -> &CapabilityOrigin {
        &self.origin
    }

    pub fn handler(&self) -> Arc<dyn CapabilityHandler> {
        self.handler.clone()
    }

    /// Client-facing metadata, as returned by `mcp.list_tools`.
    pub fn metadata(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "parameters": self.parameter_schema,
            "origin": self.origin.to_string(),
        })
    }
}

impl fmt::Debug for CapabilityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameter_schema", &self.parameter_schema)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Validation("capability name must not be empty".to_string()));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/')))
    {
        return Err(Error::Validation(format!(
            "capability name '{}' contains invalid character '{}'",
            name, bad
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait::async_trait]
    impl CapabilityHandler for Noop {
        async fn execute(&self, _params: Map<String, Value>) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn test_descriptor_metadata() {
        let mut schema = ParameterSchema::new();
        schema.insert("query".to_string(), "The search query".to_string());
        let d = CapabilityDescriptor::new(
            "web_search",
            "Search the web",
            schema,
            CapabilityOrigin::Builtin,
            Arc::new(Noop),
        )
        .unwrap();
        let meta = d.metadata();
        assert_eq!(meta["name"], "web_search");
        assert_eq!(meta["parameters"]["query"], "The search query");
        assert_eq!(meta["origin"], "builtin");
    }

    #[test]
    fn test_descriptor_rejects_bad_names() {
        let empty = CapabilityDescriptor::new("", "x", ParameterSchema::new(), CapabilityOrigin::Builtin, Arc::new(Noop));
        assert!(empty.is_err());
        let spaced = CapabilityDescriptor::new("web search", "x", ParameterSchema::new(), CapabilityOrigin::Builtin, Arc::new(Noop));
        assert!(spaced.is_err());
    }

    #[test]
    fn test_blank_description_defaults() {
        let d = CapabilityDescriptor::new("echo", "  ", ParameterSchema::new(), CapabilityOrigin::Builtin, Arc::new(Noop)).unwrap();
        assert_eq!(d.description(), "No description");
    }
}
