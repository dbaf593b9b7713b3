use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use switchyard_core::{CapabilityDescriptor, Error, Result};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::discovery::{Discovered, DiscoverySource};

/// Immutable view of the loaded capabilities, replaced wholesale on reload.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    generation: u64,
    entries: BTreeMap<String, Arc<CapabilityDescriptor>>,
}

impl RegistrySnapshot {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, name: &str) -> Option<Arc<CapabilityDescriptor>> {
        self.entries.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Descriptors ordered by name.
    pub fn list(&self) -> Vec<Arc<CapabilityDescriptor>> {
        self.entries.values().cloned().collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReloadReport {
    pub generation: u64,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub total: usize,
}

/// Owns the current capability snapshot.
///
/// Readers clone the snapshot `Arc` and never block on discovery. Reloads
/// are serialized; a failed discovery leaves the previous snapshot active.
pub struct CapabilityRegistry {
    source: Arc<dyn DiscoverySource>,
    snapshot: RwLock<Arc<RegistrySnapshot>>,
    reload_lock: Mutex<()>,
}

impl CapabilityRegistry {
    pub fn new(source: Arc<dyn DiscoverySource>) -> Self {
        Self {
            source,
            snapshot: RwLock::new(Arc::new(RegistrySnapshot::default())),
            reload_lock: Mutex::new(()),
        }
    }

    /// Run discovery and build descriptors without publishing them.
    pub async fn discover(&self) -> Result<BTreeMap<String, Arc<CapabilityDescriptor>>> {
        let found = self.source.enumerate().await.map_err(|e| match e {
            Error::Discovery(_) => e,
            other => Error::Discovery(format!("{}: {}", self.source.name(), other)),
        })?;

        let mut entries = BTreeMap::new();
        for item in found {
            let def = match item {
                Discovered::Loaded(def) => def,
                Discovered::Failed { origin, reason } => {
                    warn!(origin = %origin, reason = %reason, "Skipping capability that failed to load");
                    continue;
                }
            };
            if entries.contains_key(&def.name) {
                warn!(name = %def.name, origin = %def.origin, "Duplicate capability name, keeping the first");
                continue;
            }
            match CapabilityDescriptor::new(&def.name, &def.description, def.parameters, def.origin, def.handler) {
                Ok(descriptor) => {
                    debug!(name = %descriptor.name(), origin = %descriptor.origin(), "Capability discovered");
                    entries.insert(descriptor.name().to_string(), Arc::new(descriptor));
                }
                Err(e) => {
                    warn!(name = %def.name, error = %e, "Skipping capability with invalid metadata");
                }
            }
        }
        Ok(entries)
    }

    /// Re-run discovery and publish the result.
    pub async fn reload(&self) -> Result<ReloadReport> {
        self.reload_with(|_, _| {}).await
    }

    /// Like [`reload`](Self::reload), but runs `on_swap` with the new
    /// snapshot while reloads are still serialized, so dependent tables can be
    /// updated in the same critical section.
    pub async fn reload_with<F>(&self, on_swap: F) -> Result<ReloadReport>
    where
        F: FnOnce(&RegistrySnapshot, &ReloadReport),
    {
        let _guard = self.reload_lock.lock().await;

        let entries = match self.discover().await {
            Ok(entries) => entries,
            Err(e) => {
                error!(error = %e, "Capability discovery failed, keeping previous snapshot");
                return Err(e);
            }
        };

        let previous = self.snapshot();
        let added: Vec<String> = entries
            .keys()
            .filter(|name| !previous.contains(name))
            .cloned()
            .collect();
        let removed: Vec<String> = previous
            .entries
            .keys()
            .filter(|name| !entries.contains_key(*name))
            .cloned()
            .collect();

        let next = Arc::new(RegistrySnapshot {
            generation: previous.generation + 1,
            entries,
        });
        let report = ReloadReport {
            generation: next.generation,
            added,
            removed,
            total: next.len(),
        };

        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = next.clone();
        on_swap(&next, &report);

        info!(
            generation = report.generation,
            total = report.total,
            added = ?report.added,
            removed = ?report.removed,
            "Capability registry reloaded"
        );
        Ok(report)
    }

    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.snapshot.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn list(&self) -> Vec<Arc<CapabilityDescriptor>> {
        self.snapshot().list()
    }

    pub fn describe(&self, name: &str) -> Result<Arc<CapabilityDescriptor>> {
        self.snapshot()
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("capability '{}'", name)))
    }
}
