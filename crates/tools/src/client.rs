use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use switchyard_core::{Error, Result};
use switchyard_rpc::error::{INVALID_PARAMS, METHOD_NOT_FOUND};
use switchyard_rpc::{Reply, Request, RpcError};
use tracing::debug;

use crate::server::{CapabilityServer, LIST_TOOLS, RELOAD_TOOLS};

/// Calls capabilities through the capability endpoint's JSON-RPC dispatcher,
/// in process, with monotonically increasing request ids.
pub struct CapabilityClient {
    server: CapabilityServer,
    next_id: AtomicU64,
}

impl CapabilityClient {
    pub fn new(server: CapabilityServer) -> Self {
        Self {
            server,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn server(&self) -> &CapabilityServer {
        &self.server
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = Request::new(Some(json!(id)), method, params);
        debug!(id, method, "Capability call");

        let response = match self.server.handle_value(request.to_value()).await {
            Some(Reply::Single(response)) => response,
            Some(Reply::Batch(_)) => {
                return Err(Error::Other(format!("unexpected batch reply to request {}", id)))
            }
            None => return Err(Error::Other(format!("no reply to request {}", id))),
        };

        if response.id() != &json!(id) {
            return Err(Error::Other(format!(
                "response id {} does not match request id {}",
                response.id(),
                id
            )));
        }
        response.into_result().map_err(|e| into_core_error(method, e))
    }

    pub async fn list_tools(&self) -> Result<Vec<Value>> {
        let result = self.call(LIST_TOOLS, Value::Null).await?;
        Ok(result
            .get("tools")
            .and_then(|t| t.as_array())
            .cloned()
            .unwrap_or_default())
    }

    pub async fn reload_tools(&self) -> Result<Value> {
        self.call(RELOAD_TOOLS, Value::Null).await
    }
}

fn into_core_error(method: &str, err: RpcError) -> Error {
    match err.code {
        METHOD_NOT_FOUND => Error::NotFound(format!("capability '{}'", method)),
        INVALID_PARAMS => Error::Validation(
            err.message
                .strip_prefix("Invalid params: ")
                .unwrap_or(&err.message)
                .to_string(),
        ),
        _ => Error::Other(
            err.message
                .strip_prefix("Internal error: ")
                .unwrap_or(&err.message)
                .to_string(),
        ),
    }
}
