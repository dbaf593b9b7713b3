use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use switchyard_core::config::RoutingConfig;
use switchyard_core::{Error, Result};
use switchyard_rpc::{handler_fn, Dispatcher};
use switchyard_tools::builtin::TEXT_GENERATION;
use switchyard_tools::{CapabilityClient, CapabilityServer, ReloadReport};
use tracing::{info, warn};
use uuid::Uuid;

use crate::router::{RouteOutcome, Router, RoutingDecision};
use crate::status::{StatusChannel, StatusEvent};

pub const CHAT: &str = "agent.chat";
pub const EXECUTE_TOOL: &str = "agent.execute_tool";
pub const LIST_CAPABILITIES: &str = "agent.list_capabilities";
pub const REFRESH_CAPABILITIES: &str = "agent.refresh_capabilities";
pub const ROUTE: &str = "agent.route";

const NO_MATCH_REPLY: &str =
    "I'm not sure how to help with that. Try asking a question, requesting code, or searching for something current.";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMetadata {
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Seconds spent in the capability call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure_time: Option<f64>,
    pub total_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    pub status_updates: Vec<StatusEvent>,
    pub metadata: ChatMetadata,
}

/// Routes user requests to capabilities and packages the answer with the
/// request's status events.
pub struct AgentRuntime {
    client: CapabilityClient,
    router: Router,
    default_tool: Option<String>,
    live_data_tool: String,
}

impl AgentRuntime {
    pub fn new(server: CapabilityServer, router: Router, routing: &RoutingConfig) -> Self {
        Self {
            client: CapabilityClient::new(server),
            router,
            default_tool: routing.default_tool.clone().filter(|t| !t.trim().is_empty()),
            live_data_tool: routing.live_data_tool.clone(),
        }
    }

    pub fn server(&self) -> &CapabilityServer {
        self.client.server()
    }

    fn available_tools(&self) -> Vec<String> {
        self.server().registry().snapshot().names()
    }

    /// Routing decision only, without executing anything.
    pub async fn route(&self, message: &str) -> (RouteOutcome, Vec<StatusEvent>) {
        let mut status = StatusChannel::new();
        let outcome = self.router.route(message, &self.available_tools(), &mut status).await;
        (outcome, status.drain())
    }

    /// Route a request, run the chosen capability and collect the answer.
    ///
    /// Capability failures are reported in the reply, not as errors; only an
    /// empty message is rejected.
    pub async fn chat(&self, message: &str) -> Result<ChatReply> {
        let message = message.trim();
        if message.is_empty() {
            return Err(Error::Validation("message must not be empty".to_string()));
        }
        let started = Instant::now();
        let mut status = StatusChannel::new();
        let mut metadata = ChatMetadata {
            request_id: Uuid::new_v4().to_string(),
            ..ChatMetadata::default()
        };
        info!(request_id = %metadata.request_id, "Chat request");

        let available = self.available_tools();
        let outcome = self.router.route(message, &available, &mut status).await;
        let tool = match outcome {
            RouteOutcome::Selected(decision) => {
                record_decision(&mut metadata, &decision);
                Some(decision.tool)
            }
            RouteOutcome::NoMatch { reasoning } => {
                metadata.reasoning = Some(reasoning);
                match self.default_tool.as_ref().filter(|t| available.contains(t)) {
                    Some(default) => {
                        status.emit(format!("Using default capability {}", default));
                        Some(default.clone())
                    }
                    None => None,
                }
            }
        };

        let response = match tool {
            None => NO_MATCH_REPLY.to_string(),
            Some(tool) => {
                metadata.tool_used = Some(tool.clone());
                let result = if tool == self.live_data_tool {
                    self.search_and_structure(message, &mut status, &mut metadata).await
                } else {
                    self.generate(&tool, message, &mut status, &mut metadata).await
                };
                match result {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(tool = %tool, error = %e, "Capability failed");
                        status.emit(format!("Error: {}", e));
                        metadata.error = Some(e.to_string());
                        format!("Sorry, {} failed: {}", tool, e)
                    }
                }
            }
        };

        status.emit("Done");
        metadata.total_time = started.elapsed().as_secs_f64();
        Ok(ChatReply {
            response,
            status_updates: status.drain(),
            metadata,
        })
    }

    async fn generate(
        &self,
        tool: &str,
        message: &str,
        status: &mut StatusChannel,
        metadata: &mut ChatMetadata,
    ) -> Result<String> {
        status.emit(format!("Running {}...", tool));
        let started = Instant::now();
        let result = self.client.call(tool, json!({ "prompt": message })).await;
        metadata.tool_time = Some(started.elapsed().as_secs_f64());
        Ok(result_text(&result?))
    }

    /// Search, then have text generation turn the hits into an answer. The
    /// raw results are returned when that second step fails.
    async fn search_and_structure(
        &self,
        message: &str,
        status: &mut StatusChannel,
        metadata: &mut ChatMetadata,
    ) -> Result<String> {
        status.emit("Searching the web...");
        let started = Instant::now();
        let result = self.client.call(&self.live_data_tool, json!({ "query": message })).await;
        let elapsed = started.elapsed().as_secs_f64();
        metadata.search_time = Some(elapsed);
        metadata.tool_time = Some(elapsed);
        let raw = result_text(&result?);

        if !self.server().registry().snapshot().contains(TEXT_GENERATION) {
            return Ok(format!("Search Results:\n\n{}", raw));
        }

        status.emit("Structuring results...");
        let started = Instant::now();
        let prompt = format!(
            "Based on these search results:\n{}\n\nProvide a concise, well-structured answer to: {}",
            raw, message
        );
        let structured = self.client.call(TEXT_GENERATION, json!({ "prompt": prompt })).await;
        metadata.structure_time = Some(started.elapsed().as_secs_f64());
        match structured {
            Ok(value) => Ok(result_text(&value)),
            Err(e) => {
                warn!(error = %e, "Structuring search results failed, returning raw results");
                status.emit("Could not structure results, returning raw search results");
                Ok(format!("Search Results:\n\n{}", raw))
            }
        }
    }

    /// Call one capability directly with caller-supplied parameters.
    pub async fn execute_tool(&self, tool: &str, params: Value) -> Result<Value> {
        self.client.call(tool, params).await
    }

    pub async fn list_capabilities(&self) -> Result<Vec<Value>> {
        self.client.list_tools().await
    }

    pub async fn refresh_capabilities(&self) -> Result<ReloadReport> {
        self.server().reload().await
    }

    /// Expose the runtime on a user-facing dispatcher.
    pub fn register_methods(self: &Arc<Self>, dispatcher: &Dispatcher) {
        let runtime = Arc::clone(self);
        dispatcher.register(
            CHAT,
            handler_fn(move |params| {
                let runtime = runtime.clone();
                async move {
                    let message = string_param(&params, "message")?;
                    let reply = runtime.chat(&message).await?;
                    Ok(serde_json::to_value(reply)?)
                }
            }),
        );

        let runtime = Arc::clone(self);
        dispatcher.register(
            EXECUTE_TOOL,
            handler_fn(move |params| {
                let runtime = runtime.clone();
                async move {
                    let tool = string_param(&params, "tool_name")?;
                    let tool_params = params.get("tool_params").cloned().unwrap_or_else(|| json!({}));
                    runtime.execute_tool(&tool, tool_params).await
                }
            }),
        );

        let runtime = Arc::clone(self);
        dispatcher.register(
            LIST_CAPABILITIES,
            handler_fn(move |_| {
                let runtime = runtime.clone();
                async move {
                    let tools = runtime.list_capabilities().await?;
                    Ok(json!({ "capabilities": tools }))
                }
            }),
        );

        let runtime = Arc::clone(self);
        dispatcher.register(
            REFRESH_CAPABILITIES,
            handler_fn(move |_| {
                let runtime = runtime.clone();
                async move {
                    let report = runtime.refresh_capabilities().await?;
                    Ok(json!({
                        "status": "refreshed",
                        "tool_count": report.total,
                        "added": report.added,
                        "removed": report.removed,
                    }))
                }
            }),
        );

        let runtime = Arc::clone(self);
        dispatcher.register(
            ROUTE,
            handler_fn(move |params| {
                let runtime = runtime.clone();
                async move {
                    let message = string_param(&params, "message")?;
                    let (outcome, status) = runtime.route(&message).await;
                    let decision = match outcome {
                        RouteOutcome::Selected(d) => json!(d),
                        RouteOutcome::NoMatch { reasoning } => json!({ "tool": null, "reasoning": reasoning }),
                    };
                    Ok(json!({ "decision": decision, "status_updates": status }))
                }
            }),
        );
    }
}

fn record_decision(metadata: &mut ChatMetadata, decision: &RoutingDecision) {
    metadata.confidence = Some(decision.confidence);
    metadata.source = Some(decision.source.to_string());
    metadata.reasoning = Some(decision.reasoning.clone());
}

fn string_param(params: &Value, key: &str) -> Result<String> {
    match params.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(Error::Validation(format!("parameter '{}' must be a string", key))),
        None => Err(Error::Validation(format!("missing required parameter '{}'", key))),
    }
}

/// Best-effort plain text from a capability result.
fn result_text(value: &Value) -> String {
    if let Some(s) = value.as_str() {
        return s.to_string();
    }
    for key in ["content", "formatted", "output"] {
        if let Some(s) = value.get(key).and_then(|v| v.as_str()) {
            return s.to_string();
        }
    }
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::DecisionSource;
    use async_trait::async_trait;
    use serde_json::Map;
    use std::sync::Mutex;
    use std::time::Duration;
    use switchyard_core::Config;
    use switchyard_core::config::DispatcherConfig;
    use switchyard_core::{CapabilityHandler, CapabilityOrigin, ParameterSchema};
    use switchyard_tools::{CapabilityDefinition, Discovered, DiscoverySource};

    /// Records every call and answers from a fixed script.
    struct Scripted {
        name: &'static str,
        calls: Arc<Mutex<Vec<(String, Value)>>>,
        fail: bool,
        delay: Duration,
    }

    #[async_trait]
    impl CapabilityHandler for Scripted {
        async fn execute(&self, params: Map<String, Value>) -> Result<Value> {
            self.calls
                .lock()
                .unwrap()
                .push((self.name.to_string(), Value::Object(params.clone())));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(Error::Capability(format!("{} is down", self.name)));
            }
            Ok(match self.name {
                "web_search" => json!({ "formatted": "1. Oslo weather\n   Rain\n   URL: https://w.example" }),
                "code_generation" => json!({ "content": "fn main() {}", "model": "fake" }),
                _ => json!({ "content": format!("answer to: {}", params["prompt"].as_str().unwrap_or_default()) }),
            })
        }
    }

    struct Fakes {
        tools: Vec<&'static str>,
        failing: Vec<&'static str>,
        calls: Arc<Mutex<Vec<(String, Value)>>>,
        delay: Duration,
    }

    #[async_trait]
    impl DiscoverySource for Fakes {
        fn name(&self) -> &str {
            "fakes"
        }

        async fn enumerate(&self) -> Result<Vec<Discovered>> {
            Ok(self
                .tools
                .iter()
                .map(|name| {
                    Discovered::Loaded(CapabilityDefinition {
                        name: name.to_string(),
                        description: format!("fake {}", name),
                        parameters: ParameterSchema::new(),
                        origin: CapabilityOrigin::Other("test".to_string()),
                        handler: Arc::new(Scripted {
                            name: *name,
                            calls: self.calls.clone(),
                            fail: self.failing.contains(name),
                            delay: self.delay,
                        }),
                    })
                })
                .collect())
        }
    }

    async fn runtime_with(
        tools: Vec<&'static str>,
        failing: Vec<&'static str>,
        routing: RoutingConfig,
    ) -> (Arc<AgentRuntime>, Arc<Mutex<Vec<(String, Value)>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let source = Arc::new(Fakes {
            tools,
            failing,
            calls: calls.clone(),
            delay: Duration::ZERO,
        });
        let server = CapabilityServer::new(source, &DispatcherConfig::default());
        server.start().await.unwrap();
        let router = Router::new(&routing, None);
        (Arc::new(AgentRuntime::new(server, router, &routing)), calls)
    }

    async fn runtime() -> (Arc<AgentRuntime>, Arc<Mutex<Vec<(String, Value)>>>) {
        runtime_with(
            vec!["code_generation", "text_generation", "web_search"],
            vec![],
            RoutingConfig::default(),
        )
        .await
    }

    #[tokio::test]
    async fn test_chat_routes_to_code_generation() {
        let (runtime, calls) = runtime().await;
        let reply = runtime.chat("write code that parses CSV").await.unwrap();
        assert_eq!(reply.response, "fn main() {}");
        assert_eq!(reply.metadata.tool_used.as_deref(), Some("code_generation"));
        assert_eq!(reply.metadata.source.as_deref(), Some("fallback"));
        assert!(reply.metadata.tool_time.is_some());
        assert!(reply.metadata.error.is_none());
        assert_eq!(reply.status_updates.last().unwrap().text, "Done");

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1["prompt"], "write code that parses CSV");
    }

    #[tokio::test]
    async fn test_chat_search_is_structured_by_text_generation() {
        let (runtime, calls) = runtime().await;
        let reply = runtime.chat("weather in Oslo today").await.unwrap();
        assert!(reply.response.starts_with("answer to: Based on these search results:"));
        assert!(reply.metadata.search_time.is_some());
        assert!(reply.metadata.structure_time.is_some());

        let calls = calls.lock().unwrap();
        assert_eq!(calls[0].0, "web_search");
        assert_eq!(calls[0].1["query"], "weather in Oslo today");
        assert_eq!(calls[1].0, "text_generation");
        let texts: Vec<&str> = reply.status_updates.iter().map(|e| e.text.as_str()).collect();
        assert!(texts.contains(&"Searching the web..."));
        assert!(texts.contains(&"Structuring results..."));
    }

    #[tokio::test]
    async fn test_chat_returns_raw_results_when_structuring_fails() {
        let (runtime, _) = runtime_with(
            vec!["text_generation", "web_search"],
            vec!["text_generation"],
            RoutingConfig::default(),
        )
        .await;
        let reply = runtime.chat("latest rust news").await.unwrap();
        assert!(reply.response.starts_with("Search Results:\n\n1. Oslo weather"));
        assert!(reply.metadata.error.is_none());
    }

    #[tokio::test]
    async fn test_chat_reports_capability_failure() {
        let (runtime, _) = runtime_with(
            vec!["code_generation", "text_generation"],
            vec!["code_generation"],
            RoutingConfig::default(),
        )
        .await;
        let reply = runtime.chat("implement a linked list").await.unwrap();
        assert!(reply.response.starts_with("Sorry, code_generation failed"));
        assert!(reply.metadata.error.as_deref().unwrap().contains("code_generation is down"));
    }

    #[tokio::test]
    async fn test_no_match_uses_default_tool_or_canned_reply() {
        let (runtime, _) = runtime().await;
        let reply = runtime.chat("hmm").await.unwrap();
        assert_eq!(reply.metadata.tool_used.as_deref(), Some("text_generation"));
        assert_eq!(reply.response, "answer to: hmm");

        let mut routing = RoutingConfig::default();
        routing.default_tool = None;
        let (runtime, calls) = runtime_with(vec!["code_generation"], vec![], routing).await;
        let reply = runtime.chat("hmm").await.unwrap();
        assert_eq!(reply.response, NO_MATCH_REPLY);
        assert!(reply.metadata.tool_used.is_none());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let (runtime, _) = runtime().await;
        assert!(runtime.chat("   ").await.unwrap_err().is_invalid_params());
    }

    async fn call(api: &Dispatcher, method: &str, params: Value) -> Value {
        let raw = json!({"jsonrpc": "2.0", "method": method, "params": params, "id": 3}).to_string();
        serde_json::from_str(&api.handle(raw.as_bytes()).await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_user_endpoint_methods() {
        let (runtime, _) = runtime().await;
        let api = Dispatcher::new("api", &DispatcherConfig::default());
        runtime.register_methods(&api);

        let out = call(&api, CHAT, json!({"message": "explain borrowing"})).await;
        assert_eq!(out["id"], 3);
        assert_eq!(out["result"]["metadata"]["tool_used"], "text_generation");
        assert!(out["result"]["status_updates"].as_array().unwrap().len() >= 3);

        let out = call(&api, CHAT, json!({})).await;
        assert_eq!(out["error"]["code"], -32602);

        let out = call(&api, EXECUTE_TOOL, json!({"tool_name": "code_generation", "tool_params": {"prompt": "x"}})).await;
        assert_eq!(out["result"]["content"], "fn main() {}");

        let out = call(&api, EXECUTE_TOOL, json!({"tool_name": "ghost"})).await;
        assert_eq!(out["error"]["code"], -32603);

        let out = call(&api, LIST_CAPABILITIES, json!({})).await;
        assert_eq!(out["result"]["capabilities"].as_array().unwrap().len(), 3);

        let out = call(&api, REFRESH_CAPABILITIES, json!({})).await;
        assert_eq!(out["result"]["status"], "refreshed");
        assert_eq!(out["result"]["tool_count"], 3);

        let out = call(&api, ROUTE, json!({"message": "write code for RAG"})).await;
        assert_eq!(out["result"]["decision"]["tool"], "code_generation");
        assert_eq!(out["result"]["decision"]["source"], "fallback");
    }

    #[tokio::test]
    async fn test_user_endpoint_outlasts_chained_capability_calls() {
        let mut config = Config::default();
        config.dispatcher.call_timeout_secs = 1;
        config.models.classifier.timeout_secs = 1;

        let source = Arc::new(Fakes {
            tools: vec!["text_generation", "web_search"],
            failing: vec![],
            calls: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::from_millis(700),
        });
        let server = CapabilityServer::new(source, &config.dispatcher);
        server.start().await.unwrap();
        let router = Router::new(&config.routing, None);
        let runtime = Arc::new(AgentRuntime::new(server, router, &config.routing));

        // Search then structure takes longer than a single capability budget.
        let tight = Dispatcher::new("api", &config.dispatcher);
        runtime.register_methods(&tight);
        let out = call(&tight, CHAT, json!({"message": "latest rust news"})).await;
        assert_eq!(out["error"]["code"], -32603);

        let api = Dispatcher::new("api", &config.dispatcher)
            .with_call_timeout(Duration::from_secs(config.api_timeout_secs()));
        runtime.register_methods(&api);
        let out = call(&api, CHAT, json!({"message": "latest rust news"})).await;
        assert!(out["error"].is_null());
        assert_eq!(out["result"]["metadata"]["tool_used"], "web_search");
        assert!(out["result"]["response"]
            .as_str()
            .unwrap()
            .starts_with("answer to: Based on these search results:"));
    }

    #[tokio::test]
    async fn test_route_only_does_not_execute() {
        let (runtime, calls) = runtime().await;
        let (outcome, status) = runtime.route("explain lifetimes").await;
        let decision = outcome.decision().unwrap();
        assert_eq!(decision.tool, "text_generation");
        assert_eq!(decision.source, DecisionSource::Fallback);
        assert!(!status.is_empty());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_result_text_extraction() {
        assert_eq!(result_text(&json!("plain")), "plain");
        assert_eq!(result_text(&json!({"content": "c", "formatted": "f"})), "c");
        assert_eq!(result_text(&json!({"formatted": "f"})), "f");
        assert_eq!(result_text(&json!({"output": "o"})), "o");
        assert_eq!(result_text(&json!({"n": 1})), "{\n  \"n\": 1\n}");
    }
}
