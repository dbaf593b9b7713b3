use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".switchyard"))
            .unwrap_or_else(|| PathBuf::from(".switchyard"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    /// Default location for capability manifests.
    pub fn capabilities_dir(&self) -> PathBuf {
        self.base.join("capabilities")
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.base)?;
        std::fs::create_dir_all(self.capabilities_dir())?;
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_under_base() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path().join("home"));
        assert_eq!(paths.config_file(), dir.path().join("home").join("config.json"));
        paths.ensure_dirs().unwrap();
        assert!(paths.capabilities_dir().is_dir());
    }
}
