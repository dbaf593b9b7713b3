use async_trait::async_trait;
use std::sync::Arc;
use switchyard_core::{CapabilityHandler, CapabilityOrigin, ParameterSchema, Result};

/// Everything a source knows about one loadable capability.
#[derive(Clone)]
pub struct CapabilityDefinition {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
    pub origin: CapabilityOrigin,
    pub handler: Arc<dyn CapabilityHandler>,
}

impl std::fmt::Debug for CapabilityDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityDefinition")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Outcome of loading one entry. A failed entry is skipped by the registry,
/// the rest of the set still loads.
#[derive(Debug)]
pub enum Discovered {
    Loaded(CapabilityDefinition),
    Failed { origin: String, reason: String },
}

impl Discovered {
    pub fn failed(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Discovered::Failed {
            origin: origin.into(),
            reason: reason.into(),
        }
    }
}

/// Enumerates capability definitions.
///
/// Returning `Err` means the source as a whole could not be read; the
/// registry then keeps its previous snapshot. Not assumed reentrant.
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    fn name(&self) -> &str;
    async fn enumerate(&self) -> Result<Vec<Discovered>>;
}

/// Concatenates several sources in order. Earlier sources win on name
/// collisions.
pub struct CompositeSource {
    sources: Vec<Arc<dyn DiscoverySource>>,
}

impl CompositeSource {
    pub fn new(sources: Vec<Arc<dyn DiscoverySource>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl DiscoverySource for CompositeSource {
    fn name(&self) -> &str {
        "composite"
    }

    async fn enumerate(&self) -> Result<Vec<Discovered>> {
        let mut all = Vec::new();
        for source in &self.sources {
            let found = source.enumerate().await?;
            tracing::debug!(source = source.name(), count = found.len(), "Source enumerated");
            all.extend(found);
        }
        Ok(all)
    }
}
