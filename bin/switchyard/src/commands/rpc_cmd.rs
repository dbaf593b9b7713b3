use super::bootstrap;

/// Send one raw JSON-RPC message through the user endpoint, or the
/// capability endpoint with `mcp`.
pub async fn run(json: &str, mcp: bool) -> anyhow::Result<()> {
    let services = bootstrap::start_default(!mcp).await?;
    let reply = if mcp {
        services.server.handle(json.as_bytes()).await
    } else {
        services.api.handle(json.as_bytes()).await
    };

    match reply {
        Some(body) => {
            let pretty = serde_json::from_str::<serde_json::Value>(&body)
                .and_then(|v| serde_json::to_string_pretty(&v))
                .unwrap_or(body);
            println!("{}", pretty);
        }
        None => println!("(notification, no response)"),
    }
    Ok(())
}
