use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use switchyard_rpc::Dispatcher;
use switchyard_tools::CapabilityServer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::bootstrap;

#[derive(Clone)]
struct GatewayState {
    api: Arc<Dispatcher>,
    server: CapabilityServer,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    capabilities: usize,
    generation: u64,
}

/// Map a dispatcher result onto HTTP: a reply is 200 JSON, no reply is 204.
fn rpc_response(reply: Option<String>) -> Response {
    match reply {
        Some(body) => (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], body).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn handle_api(State(state): State<GatewayState>, body: Bytes) -> Response {
    rpc_response(state.api.handle(&body).await)
}

async fn handle_mcp(State(state): State<GatewayState>, body: Bytes) -> Response {
    rpc_response(state.server.handle(&body).await)
}

async fn handle_health(State(state): State<GatewayState>) -> impl IntoResponse {
    let snapshot = state.server.registry().snapshot();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        capabilities: snapshot.len(),
        generation: snapshot.generation(),
    })
}

async fn handle_tools(State(state): State<GatewayState>) -> impl IntoResponse {
    Json(json!({ "tools": state.server.list_tools() }))
}

async fn handle_tools_reload(State(state): State<GatewayState>) -> Response {
    match state.server.reload().await {
        Ok(report) => (StatusCode::OK, Json(json!(report))).into_response(),
        Err(e) => {
            error!(error = %e, "Reload requested over HTTP failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/api", post(handle_api))
        .route("/mcp", post(handle_mcp))
        .route("/health", get(handle_health))
        .route("/tools", get(handle_tools))
        .route("/tools/reload", post(handle_tools_reload))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let services = bootstrap::start_default(true).await?;
    let host = host.unwrap_or_else(|| services.config.gateway.host.clone());
    let port = port.unwrap_or(services.config.gateway.port);

    let app = build_router(GatewayState {
        api: services.api.clone(),
        server: services.server.clone(),
    });

    let bind_addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "Gateway listening");
    println!("switchyard gateway on http://{}", bind_addr);
    println!("  POST /api   user endpoint (agent.*)");
    println!("  POST /mcp   capability endpoint (mcp.*, capabilities)");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_response_status() {
        assert_eq!(rpc_response(None).status(), StatusCode::NO_CONTENT);
        let response = rpc_response(Some("{}".to_string()));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
