use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::{Arc, Weak};
use switchyard_core::config::DispatcherConfig;
use switchyard_core::{CapabilityDescriptor, Error, Result};
use switchyard_rpc::{handler_fn, Dispatcher, MethodHandler, Reply};
use tracing::{info, warn};

use crate::discovery::DiscoverySource;
use crate::registry::{CapabilityRegistry, ReloadReport};

pub const LIST_TOOLS: &str = "mcp.list_tools";
pub const RELOAD_TOOLS: &str = "mcp.reload_tools";

/// Exposes one capability as a dispatcher method. Capabilities take named
/// parameters only.
struct CapabilityMethod {
    descriptor: Arc<CapabilityDescriptor>,
}

#[async_trait]
impl MethodHandler for CapabilityMethod {
    async fn call(&self, params: Value) -> Result<Value> {
        let params = match params {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => {
                return Err(Error::Validation(format!(
                    "'{}' expects named parameters (an object)",
                    self.descriptor.name()
                )))
            }
        };
        self.descriptor.handler().execute(params).await
    }
}

struct Inner {
    registry: CapabilityRegistry,
    dispatcher: Dispatcher,
}

impl Inner {
    async fn reload(&self) -> Result<ReloadReport> {
        self.registry
            .reload_with(|snapshot, report| {
                let mut add = Vec::new();
                for descriptor in snapshot.list() {
                    if is_meta_method(descriptor.name()) {
                        warn!(name = %descriptor.name(), "Capability shadows a meta method, not exposed");
                        continue;
                    }
                    add.push((
                        descriptor.name().to_string(),
                        Arc::new(CapabilityMethod { descriptor }) as Arc<dyn MethodHandler>,
                    ));
                }
                let remove: Vec<String> = report
                    .removed
                    .iter()
                    .filter(|name| !is_meta_method(name))
                    .cloned()
                    .collect();
                self.dispatcher.replace_methods(&remove, add);
            })
            .await
    }

    fn list_tools(&self) -> Vec<Value> {
        self.registry.list().iter().map(|d| d.metadata()).collect()
    }
}

fn is_meta_method(name: &str) -> bool {
    name == LIST_TOOLS || name == RELOAD_TOOLS
}

/// The capability endpoint: a registry plus a dispatcher whose method table
/// mirrors the registry snapshot, and the `mcp.*` meta methods.
#[derive(Clone)]
pub struct CapabilityServer {
    inner: Arc<Inner>,
}

impl CapabilityServer {
    pub fn new(source: Arc<dyn DiscoverySource>, config: &DispatcherConfig) -> Self {
        let inner = Arc::new(Inner {
            registry: CapabilityRegistry::new(source),
            dispatcher: Dispatcher::new("mcp", config),
        });
        register_meta_methods(&inner);
        Self { inner }
    }

    /// Initial discovery. Same as [`reload`](Self::reload).
    pub async fn start(&self) -> Result<ReloadReport> {
        let report = self.reload().await?;
        info!(tools = report.total, "Capability server started");
        Ok(report)
    }

    pub async fn reload(&self) -> Result<ReloadReport> {
        self.inner.reload().await
    }

    pub async fn handle(&self, raw: &[u8]) -> Option<String> {
        self.inner.dispatcher.handle(raw).await
    }

    pub async fn handle_value(&self, message: Value) -> Option<Reply> {
        self.inner.dispatcher.handle_value(message).await
    }

    /// Metadata for every loaded capability, ordered by name.
    pub fn list_tools(&self) -> Vec<Value> {
        self.inner.list_tools()
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.inner.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }
}

fn register_meta_methods(inner: &Arc<Inner>) {
    let weak: Weak<Inner> = Arc::downgrade(inner);
    inner.dispatcher.register(
        LIST_TOOLS,
        handler_fn(move |_| {
            let weak = weak.clone();
            async move {
                let inner = weak
                    .upgrade()
                    .ok_or_else(|| Error::Other("capability server shut down".to_string()))?;
                Ok(json!({ "tools": inner.list_tools() }))
            }
        }),
    );

    let weak: Weak<Inner> = Arc::downgrade(inner);
    inner.dispatcher.register(
        RELOAD_TOOLS,
        handler_fn(move |_| {
            let weak = weak.clone();
            async move {
                let inner = weak
                    .upgrade()
                    .ok_or_else(|| Error::Other("capability server shut down".to_string()))?;
                let report = inner.reload().await?;
                Ok(json!({
                    "status": "reloaded",
                    "tool_count": report.total,
                    "added": report.added,
                    "removed": report.removed,
                }))
            }
        }),
    );
}
