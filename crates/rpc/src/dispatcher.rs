use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use switchyard_core::config::DispatcherConfig;
use switchyard_core::{Error, Result};

use crate::error::RpcError;
use crate::history::{BoundedHistory, HistoryEntry};
use crate::message::{Reply, Request, Response};

/// Aborts the spawned handler if the caller stops waiting for it.
struct AbortOnDrop<T>(tokio::task::JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// A callable bound to a method name.
///
/// `params` is the request's `params` member as sent (object or array), or
/// `Value::Null` when it was omitted.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    async fn call(&self, params: Value) -> Result<Value>;
}

struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> MethodHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    async fn call(&self, params: Value) -> Result<Value> {
        (self.f)(params).await
    }
}

/// Wrap an async closure as a method handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn MethodHandler>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(FnHandler { f })
}

type MethodTable = HashMap<String, Arc<dyn MethodHandler>>;

/// JSON-RPC 2.0 message handler.
///
/// The method table is published as an `Arc` and replaced wholesale on every
/// change, so a call resolves its handler against one complete table.
pub struct Dispatcher {
    name: String,
    methods: RwLock<Arc<MethodTable>>,
    requests: BoundedHistory,
    responses: BoundedHistory,
    call_timeout: Duration,
}

impl Dispatcher {
    pub fn new(name: &str, config: &DispatcherConfig) -> Self {
        Self {
            name: name.to_string(),
            methods: RwLock::new(Arc::new(HashMap::new())),
            requests: BoundedHistory::new(config.history_limit),
            responses: BoundedHistory::new(config.history_limit),
            call_timeout: Duration::from_secs(config.call_timeout_secs.max(1)),
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn table(&self) -> Arc<MethodTable> {
        self.methods.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn update<F: FnOnce(&mut MethodTable)>(&self, f: F) {
        let mut guard = self.methods.write().unwrap_or_else(|e| e.into_inner());
        let mut next = (**guard).clone();
        f(&mut next);
        *guard = Arc::new(next);
    }

    /// Bind `method` to `handler`. An existing binding is overwritten.
    pub fn register(&self, method: &str, handler: Arc<dyn MethodHandler>) {
        self.update(|table| {
            if table.insert(method.to_string(), handler).is_some() {
                debug!(dispatcher = %self.name, method, "Method handler replaced");
            }
        });
        debug!(dispatcher = %self.name, method, "Method registered");
    }

    pub fn unregister(&self, method: &str) -> bool {
        let mut removed = false;
        self.update(|table| removed = table.remove(method).is_some());
        removed
    }

    /// Remove `remove` and bind `add` in a single table swap.
    pub fn replace_methods(&self, remove: &[String], add: Vec<(String, Arc<dyn MethodHandler>)>) {
        let (removed, added) = (remove.len(), add.len());
        self.update(|table| {
            for name in remove {
                table.remove(name);
            }
            for (name, handler) in add {
                table.insert(name, handler);
            }
        });
        info!(dispatcher = %self.name, removed, added, "Method table swapped");
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.table().contains_key(method)
    }

    /// Registered method names, sorted.
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn request_history(&self) -> Vec<HistoryEntry> {
        self.requests.entries()
    }

    pub fn response_history(&self) -> Vec<HistoryEntry> {
        self.responses.entries()
    }

    /// Handle one raw message. `None` means nothing is sent back.
    pub async fn handle(&self, raw: &[u8]) -> Option<String> {
        let value: Value = match serde_json::from_slice(raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(dispatcher = %self.name, error = %e, "Unparseable message");
                self.requests
                    .push(Value::String(String::from_utf8_lossy(raw).into_owned()));
                let response = Response::error(Value::Null, RpcError::parse_error(e));
                self.responses.push(response.to_value());
                return Some(Reply::Single(response).to_json());
            }
        };
        self.handle_value(value).await.map(|reply| reply.to_json())
    }

    /// Handle an already-decoded message (single request or batch).
    pub async fn handle_value(&self, value: Value) -> Option<Reply> {
        match value {
            Value::Array(items) if items.is_empty() => {
                self.requests.push(Value::Array(Vec::new()));
                let response = Response::error(Value::Null, RpcError::invalid_request("empty batch"));
                self.responses.push(response.to_value());
                Some(Reply::Single(response))
            }
            Value::Array(items) => {
                let responses: Vec<Response> =
                    futures::future::join_all(items.into_iter().map(|item| self.handle_single(item)))
                        .await
                        .into_iter()
                        .flatten()
                        .collect();
                if responses.is_empty() {
                    None
                } else {
                    Some(Reply::Batch(responses))
                }
            }
            other => self.handle_single(other).await.map(Reply::Single),
        }
    }

    async fn handle_single(&self, value: Value) -> Option<Response> {
        self.requests.push(value.clone());

        let response = match Request::from_value(value) {
            Err((id, err)) => {
                warn!(dispatcher = %self.name, code = err.code, message = %err.message, "Invalid request");
                Some(Response::error(id, err))
            }
            Ok(request) => {
                let outcome = self.invoke(&request).await;
                match (request.id, outcome) {
                    (None, outcome) => {
                        if let Err(err) = outcome {
                            debug!(dispatcher = %self.name, method = %request.method, error = %err, "Notification failed");
                        }
                        None
                    }
                    (Some(id), Ok(result)) => Some(Response::success(id, result)),
                    (Some(id), Err(err)) => Some(Response::error(id, err)),
                }
            }
        };

        if let Some(response) = &response {
            self.responses.push(response.to_value());
        }
        response
    }

    async fn invoke(&self, request: &Request) -> std::result::Result<Value, RpcError> {
        let handler = match self.table().get(&request.method) {
            Some(h) => h.clone(),
            None => {
                warn!(
                    dispatcher = %self.name,
                    method = %request.method,
                    available = ?self.method_names(),
                    "Method not found"
                );
                return Err(RpcError::method_not_found(&request.method));
            }
        };

        debug!(dispatcher = %self.name, method = %request.method, "Dispatching");
        let params = request.params.clone();
        let mut task = AbortOnDrop(tokio::spawn(async move { handler.call(params).await }));

        match tokio::time::timeout(self.call_timeout, &mut task.0).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(e))) => {
                warn!(dispatcher = %self.name, method = %request.method, error = %e, "Handler failed");
                Err(RpcError::from(e))
            }
            Ok(Err(join_err)) => {
                warn!(dispatcher = %self.name, method = %request.method, error = %join_err, "Handler aborted");
                let reason = if join_err.is_panic() {
                    format!("handler for '{}' panicked", request.method)
                } else {
                    format!("handler for '{}' was cancelled", request.method)
                };
                Err(RpcError::internal(reason))
            }
            Err(_) => {
                warn!(dispatcher = %self.name, method = %request.method, "Handler timed out");
                Err(RpcError::from(Error::Timeout(format!(
                    "'{}' did not complete within {}s",
                    request.method,
                    self.call_timeout.as_secs_f64()
                ))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dispatcher() -> Dispatcher {
        let d = Dispatcher::new("test", &DispatcherConfig::default());
        d.register("echo", handler_fn(|params| async move { Ok(params) }));
        d.register(
            "fail",
            handler_fn(|_| async move { Err(Error::Capability("backend down".to_string())) }),
        );
        d.register(
            "strict",
            handler_fn(|_| async move { Err(Error::Validation("missing 'query'".to_string())) }),
        );
        d
    }

    async fn call(d: &Dispatcher, raw: &str) -> Option<Value> {
        d.handle(raw.as_bytes())
            .await
            .map(|s| serde_json::from_str(&s).unwrap())
    }

    #[tokio::test]
    async fn test_unknown_method_exact_wire() {
        let d = dispatcher();
        let out = d
            .handle(br#"{"jsonrpc":"2.0","method":"ghost.method","params":{},"id":7}"#)
            .await
            .unwrap();
        assert_eq!(
            out,
            r#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"Method not found: ghost.method"},"id":7}"#
        );
        assert!(!d.method_names().contains(&"ghost.method".to_string()));
    }

    #[tokio::test]
    async fn test_success_echoes_id() {
        let d = dispatcher();
        let out = call(&d, r#"{"jsonrpc":"2.0","method":"echo","params":{"a":1},"id":"req-1"}"#)
            .await
            .unwrap();
        assert_eq!(out["id"], "req-1");
        assert_eq!(out["result"], json!({"a": 1}));

        let out = call(&d, r#"{"jsonrpc":"2.0","method":"echo","params":[1,2],"id":42}"#)
            .await
            .unwrap();
        assert_eq!(out["id"], 42);
        assert_eq!(out["result"], json!([1, 2]));
    }

    #[tokio::test]
    async fn test_notifications_produce_nothing() {
        let d = dispatcher();
        assert!(call(&d, r#"{"jsonrpc":"2.0","method":"echo","params":{}}"#).await.is_none());
        assert!(call(&d, r#"{"jsonrpc":"2.0","method":"echo","id":null}"#).await.is_none());
        assert!(call(&d, r#"{"jsonrpc":"2.0","method":"ghost"}"#).await.is_none());
        assert!(call(&d, r#"{"jsonrpc":"2.0","method":"fail"}"#).await.is_none());
    }

    #[tokio::test]
    async fn test_parse_error() {
        let d = dispatcher();
        let out = call(&d, "{not json").await.unwrap();
        assert_eq!(out["error"]["code"], -32700);
        assert!(out["id"].is_null());
        assert!(out["error"]["message"].as_str().unwrap().starts_with("Parse error:"));
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let d = dispatcher();
        let out = call(&d, r#"{"method":"echo","id":3}"#).await.unwrap();
        assert_eq!(out["error"]["code"], -32600);
        assert_eq!(out["id"], 3);

        let out = call(&d, r#"{"jsonrpc":"2.0","params":{},"id":4}"#).await.unwrap();
        assert_eq!(out["error"]["code"], -32600);
        assert_eq!(out["id"], 4);

        let out = call(&d, r#"{"jsonrpc":"2.0","method":"echo","params":7}"#).await.unwrap();
        assert_eq!(out["error"]["code"], -32600);
        assert!(out["id"].is_null());
    }

    #[tokio::test]
    async fn test_handler_errors_map_to_codes() {
        let d = dispatcher();
        let out = call(&d, r#"{"jsonrpc":"2.0","method":"strict","params":{},"id":1}"#)
            .await
            .unwrap();
        assert_eq!(out["error"]["code"], -32602);

        let out = call(&d, r#"{"jsonrpc":"2.0","method":"fail","params":{},"id":2}"#)
            .await
            .unwrap();
        assert_eq!(out["error"]["code"], -32603);
        assert!(out["error"]["message"].as_str().unwrap().contains("backend down"));
    }

    #[tokio::test]
    async fn test_panicking_handler_is_contained() {
        let d = dispatcher();
        d.register(
            "boom",
            handler_fn(|_| async move {
                if true {
                    panic!("kaboom");
                }
                Ok(Value::Null)
            }),
        );
        let out = call(&d, r#"{"jsonrpc":"2.0","method":"boom","id":1}"#).await.unwrap();
        assert_eq!(out["error"]["code"], -32603);
        assert_eq!(out["id"], 1);
    }

    #[tokio::test]
    async fn test_slow_handler_times_out() {
        let d = dispatcher().with_call_timeout(Duration::from_millis(50));
        d.register(
            "slow",
            handler_fn(|_| async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Value::Null)
            }),
        );
        let out = call(&d, r#"{"jsonrpc":"2.0","method":"slow","id":1}"#).await.unwrap();
        assert_eq!(out["error"]["code"], -32603);
        assert!(out["error"]["message"].as_str().unwrap().contains("Timeout"));
    }

    #[tokio::test]
    async fn test_dropped_call_cancels_handler() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let d = dispatcher();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();
        d.register(
            "slow",
            handler_fn(move |_| {
                let flag = flag.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    flag.store(true, Ordering::SeqCst);
                    Ok(Value::Null)
                }
            }),
        );

        let raw = br#"{"jsonrpc":"2.0","method":"slow","id":1}"#;
        let out = tokio::time::timeout(Duration::from_millis(20), d.handle(raw)).await;
        assert!(out.is_err());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_register_overwrites() {
        let d = dispatcher();
        d.register("echo", handler_fn(|_| async move { Ok(json!("v2")) }));
        let out = call(&d, r#"{"jsonrpc":"2.0","method":"echo","id":1}"#).await.unwrap();
        assert_eq!(out["result"], "v2");
    }

    #[tokio::test]
    async fn test_replace_methods_removes_access() {
        let d = dispatcher();
        d.replace_methods(
            &["echo".to_string()],
            vec![("ping".to_string(), handler_fn(|_| async move { Ok(json!("pong")) }))],
        );
        let out = call(&d, r#"{"jsonrpc":"2.0","method":"echo","id":1}"#).await.unwrap();
        assert_eq!(out["error"]["code"], -32601);
        let out = call(&d, r#"{"jsonrpc":"2.0","method":"ping","id":2}"#).await.unwrap();
        assert_eq!(out["result"], "pong");
        assert!(d.unregister("ping"));
        assert!(!d.unregister("ping"));
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let config = DispatcherConfig {
            history_limit: 3,
            ..DispatcherConfig::default()
        };
        let d = Dispatcher::new("test", &config);
        d.register("echo", handler_fn(|params| async move { Ok(params) }));
        for i in 0..5 {
            let raw = format!(r#"{{"jsonrpc":"2.0","method":"echo","params":[{}],"id":{}}}"#, i, i);
            d.handle(raw.as_bytes()).await;
        }
        d.handle(b"garbage").await;

        let requests = d.request_history();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].message["id"], 3);
        assert_eq!(requests[2].message, Value::String("garbage".to_string()));

        let responses = d.response_history();
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[2].message["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn test_batch() {
        let d = dispatcher();
        let out = call(
            &d,
            r#"[
                {"jsonrpc":"2.0","method":"echo","params":["a"],"id":1},
                {"jsonrpc":"2.0","method":"echo","params":["n"]},
                {"jsonrpc":"2.0","method":"ghost","id":2},
                5
            ]"#,
        )
        .await
        .unwrap();
        let items = out.as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["result"], json!(["a"]));
        assert_eq!(items[1]["error"]["code"], -32601);
        assert_eq!(items[2]["error"]["code"], -32600);

        let out = call(&d, "[]").await.unwrap();
        assert_eq!(out["error"]["code"], -32600);

        assert!(call(&d, r#"[{"jsonrpc":"2.0","method":"echo"}]"#).await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_handle_during_swaps() {
        let d = Arc::new(dispatcher());
        let mut tasks = Vec::new();
        for i in 0..50u64 {
            let d = d.clone();
            tasks.push(tokio::spawn(async move {
                let raw = format!(r#"{{"jsonrpc":"2.0","method":"echo","params":[{}],"id":{}}}"#, i, i);
                let out: Value = serde_json::from_str(&d.handle(raw.as_bytes()).await.unwrap()).unwrap();
                assert_eq!(out["id"], i);
                assert_eq!(out["result"], json!([i]));
            }));
        }
        for n in 0..20 {
            d.register(&format!("extra{}", n), handler_fn(|_| async move { Ok(Value::Null) }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        assert!(d.has_method("extra19"));
    }
}
