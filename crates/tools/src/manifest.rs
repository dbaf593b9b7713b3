use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use switchyard_core::{CapabilityHandler, CapabilityOrigin, Error, ParameterSchema, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::discovery::{CapabilityDefinition, Discovered, DiscoverySource};

/// On-disk description of an external process capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityManifest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: ParameterSchema,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<String>,
}

impl CapabilityManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let manifest: CapabilityManifest = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };
        if manifest.command.trim().is_empty() {
            return Err(Error::Validation("manifest has an empty command".to_string()));
        }
        Ok(manifest)
    }

    fn resolve_command(&self, base: &Path) -> Result<PathBuf> {
        if self.command.contains('/') {
            let candidate = base.join(&self.command);
            if candidate.exists() {
                return Ok(candidate);
            }
            return Err(Error::NotFound(format!("command '{}'", self.command)));
        }
        which::which(&self.command).map_err(|_| Error::NotFound(format!("command '{}' on PATH", self.command)))
    }
}

/// Runs a child process per call: params as JSON on stdin, result from
/// stdout (JSON, or `{"output": text}` otherwise).
pub struct ProcessCapability {
    command: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl ProcessCapability {
    pub fn new(command: PathBuf) -> Self {
        Self {
            command,
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }
}

#[async_trait]
impl CapabilityHandler for ProcessCapability {
    async fn execute(&self, params: Map<String, Value>) -> Result<Value> {
        let input = serde_json::to_string(&Value::Object(params))?;

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            Error::Capability(format!("failed to spawn '{}': {}", self.command.display(), e))
        })?;

        // Feed stdin while stdout is drained, or a child that echoes a large
        // input blocks on a full pipe. A process may exit without reading its
        // input; its exit status decides.
        let writer = child.stdin.take().map(|mut stdin| {
            let command = self.command.display().to_string();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(input.as_bytes()).await {
                    debug!(command = %command, error = %e, "Process did not consume stdin");
                }
            })
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::Capability(format!("process execution failed: {}", e)))?;
        if let Some(writer) = writer {
            if let Err(e) = writer.await {
                debug!(command = %self.command.display(), error = %e, "Stdin writer aborted");
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Capability(format!(
                "process exited with code {:?}: {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(serde_json::from_str(stdout.trim())
            .unwrap_or_else(|_| serde_json::json!({ "output": stdout.trim() })))
    }
}

/// Loads every `*.json`, `*.yaml` and `*.yml` manifest in one directory.
/// A missing directory yields no capabilities.
pub struct ManifestSource {
    dir: PathBuf,
}

impl ManifestSource {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn load_one(path: &Path) -> Discovered {
        let origin = path.display().to_string();
        let manifest = match CapabilityManifest::load(path) {
            Ok(m) => m,
            Err(e) => return Discovered::failed(format!("manifest:{}", origin), e.to_string()),
        };
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let command = match manifest.resolve_command(base) {
            Ok(c) => c,
            Err(e) => return Discovered::failed(format!("manifest:{}", origin), e.to_string()),
        };

        let mut process = ProcessCapability::new(command).with_args(manifest.args.clone());
        if let Some(dir) = &manifest.working_dir {
            process = process.with_working_dir(base.join(dir));
        }

        Discovered::Loaded(CapabilityDefinition {
            name: manifest.name,
            description: manifest.description,
            parameters: manifest.parameters,
            origin: CapabilityOrigin::Manifest(origin),
            handler: Arc::new(process),
        })
    }
}

#[async_trait]
impl DiscoverySource for ManifestSource {
    fn name(&self) -> &str {
        "manifest"
    }

    async fn enumerate(&self) -> Result<Vec<Discovered>> {
        if !self.dir.exists() {
            debug!(dir = %self.dir.display(), "Manifest directory missing, nothing to load");
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            Error::Discovery(format!("cannot read manifest dir {}: {}", self.dir.display(), e))
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && matches!(
                        p.extension().and_then(|e| e.to_str()),
                        Some("json") | Some("yaml") | Some("yml")
                    )
            })
            .collect();
        paths.sort();

        let found: Vec<Discovered> = paths.iter().map(|p| Self::load_one(p)).collect();
        for item in &found {
            if let Discovered::Failed { origin, reason } = item {
                warn!(origin = %origin, reason = %reason, "Manifest rejected");
            }
        }
        Ok(found)
    }
}
