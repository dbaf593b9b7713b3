use super::bootstrap;

/// List loaded capabilities.
pub async fn list() -> anyhow::Result<()> {
    let services = bootstrap::start_default(false).await?;
    let tools = services.server.list_tools();

    println!();
    println!("Capabilities ({} loaded)", tools.len());
    println!();
    for tool in &tools {
        let name = tool["name"].as_str().unwrap_or("");
        let desc = tool["description"].as_str().unwrap_or("");
        let short_desc: String = desc.chars().take(60).collect();
        let ellipsis = if desc.chars().count() > 60 { "..." } else { "" };
        println!("  {:<22} {}{}", name, short_desc, ellipsis);
    }
    println!();
    Ok(())
}

/// Show one capability's metadata.
pub async fn info(name: &str) -> anyhow::Result<()> {
    let services = bootstrap::start_default(false).await?;
    let descriptor = services
        .server
        .registry()
        .describe(name)
        .map_err(|_| anyhow::anyhow!("Capability '{}' not found. Use `switchyard tools list` to see what is loaded.", name))?;

    println!();
    println!("{}", descriptor.name());
    println!();
    println!("  Description: {}", descriptor.description());
    println!("  Origin:      {}", descriptor.origin());
    println!();
    if descriptor.parameter_schema().is_empty() {
        println!("  Parameters: (none declared)");
    } else {
        println!("  Parameters:");
        for (param, desc) in descriptor.parameter_schema() {
            println!("    {:<16} {}", param, desc);
        }
    }
    println!();
    Ok(())
}
