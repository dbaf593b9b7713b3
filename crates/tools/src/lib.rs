pub mod builtin;
pub mod client;
pub mod discovery;
pub mod manifest;
pub mod registry;
pub mod server;

use std::path::PathBuf;
use std::sync::Arc;
use switchyard_core::{Config, Paths};

pub use builtin::BuiltinSource;
pub use client::CapabilityClient;
pub use discovery::{CapabilityDefinition, CompositeSource, Discovered, DiscoverySource};
pub use manifest::{CapabilityManifest, ManifestSource, ProcessCapability};
pub use registry::{CapabilityRegistry, RegistrySnapshot, ReloadReport};
pub use server::CapabilityServer;

/// Directory scanned for capability manifests.
pub fn manifest_dir(config: &Config, paths: &Paths) -> PathBuf {
    config
        .tools
        .manifest_dir
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| paths.capabilities_dir())
}

/// Builtins first, then manifests, so a manifest cannot shadow a builtin.
pub fn default_source(config: &Config, paths: &Paths) -> Arc<dyn DiscoverySource> {
    Arc::new(CompositeSource::new(vec![
        Arc::new(BuiltinSource::new(config.clone())),
        Arc::new(ManifestSource::new(manifest_dir(config, paths))),
    ]))
}
