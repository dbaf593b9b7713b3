use super::bootstrap;

/// Route and execute one request, printing the answer.
pub async fn run(message: &str, verbose: bool) -> anyhow::Result<()> {
    let services = bootstrap::start_default(true).await?;
    let reply = services.runtime.chat(message).await?;

    if verbose {
        for event in &reply.status_updates {
            eprintln!("  [{:.3}] {}", event.timestamp, event.text);
        }
        eprintln!("{}", serde_json::to_string_pretty(&reply.metadata)?);
    }
    println!("{}", reply.response);
    Ok(())
}
