use std::sync::Arc;
use std::time::Duration;
use switchyard_agent::{AgentRuntime, Router};
use switchyard_core::{Config, Paths};
use switchyard_rpc::Dispatcher;
use switchyard_tools::{default_source, CapabilityServer};
use tracing::info;

/// Everything a command needs: the capability endpoint, the agent and the
/// user endpoint dispatcher with the agent's methods registered.
pub struct Services {
    pub config: Config,
    pub server: CapabilityServer,
    pub runtime: Arc<AgentRuntime>,
    pub api: Arc<Dispatcher>,
}

pub fn load_config() -> anyhow::Result<(Paths, Config)> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    Ok((paths, config))
}

/// Discover capabilities and wire the endpoints together.
pub async fn start(config: Config, paths: &Paths, use_classifier: bool) -> anyhow::Result<Services> {
    let server = CapabilityServer::new(default_source(&config, paths), &config.dispatcher);
    let report = server.start().await?;

    let router = if use_classifier {
        Router::from_config(&config)
    } else {
        Router::new(&config.routing, None)
    };
    info!(
        capabilities = report.total,
        classifier = router.has_classifier(),
        "Services ready"
    );

    let runtime = Arc::new(AgentRuntime::new(server.clone(), router, &config.routing));
    let api = Arc::new(
        Dispatcher::new("api", &config.dispatcher)
            .with_call_timeout(Duration::from_secs(config.api_timeout_secs())),
    );
    runtime.register_methods(&api);

    Ok(Services {
        config,
        server,
        runtime,
        api,
    })
}

/// Load config from the default location and start.
pub async fn start_default(use_classifier: bool) -> anyhow::Result<Services> {
    let (paths, config) = load_config()?;
    start(config, &paths, use_classifier).await
}
