use switchyard_agent::RouteOutcome;

use super::bootstrap;

/// Print the routing decision for `text` without executing anything.
pub async fn run(text: &str, use_classifier: bool) -> anyhow::Result<()> {
    let services = bootstrap::start_default(use_classifier).await?;
    let (outcome, status) = services.runtime.route(text).await;

    println!();
    for event in &status {
        println!("  [{:.3}] {}", event.timestamp, event.text);
    }
    println!();
    match outcome {
        RouteOutcome::Selected(decision) => {
            println!("  Tool:       {}", decision.tool);
            println!("  Confidence: {}%", decision.confidence);
            println!("  Source:     {}", decision.source);
            println!("  Reasoning:  {}", decision.reasoning);
        }
        RouteOutcome::NoMatch { reasoning } => {
            println!("  No match: {}", reasoning);
        }
    }
    println!();
    Ok(())
}
