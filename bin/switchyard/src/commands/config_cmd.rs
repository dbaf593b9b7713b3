use switchyard_core::{Config, Paths};

/// Write the default configuration and create the capability directory.
pub async fn init(force: bool) -> anyhow::Result<()> {
    let paths = Paths::new();
    let config_path = paths.config_file();
    if config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite it.",
            config_path.display()
        );
    }
    paths.ensure_dirs()?;
    Config::default().save(&config_path)?;

    println!("Wrote {}", config_path.display());
    println!("Capability manifests go in {}", paths.capabilities_dir().display());
    println!("Set provider keys in the file or via GROK_API_KEY / GROQ_API_KEY.");
    Ok(())
}

/// Show the effective configuration as pretty-printed JSON.
pub async fn show() -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let mut json = serde_json::to_value(&config)?;

    // Never echo secrets.
    if let Some(providers) = json.get_mut("providers").and_then(|p| p.as_object_mut()) {
        for provider in providers.values_mut() {
            if let Some(key) = provider.get_mut("apiKey") {
                if key.as_str().map_or(false, |k| !k.is_empty()) {
                    *key = serde_json::Value::String("***".to_string());
                }
            }
        }
    }

    println!();
    println!("Configuration");
    println!("  File: {}", paths.config_file().display());
    println!();
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
