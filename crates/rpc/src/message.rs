use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RpcError;

pub const JSONRPC_VERSION: &str = "2.0";

/// A structurally valid inbound request.
///
/// `params` is `Value::Null` when the member was omitted, otherwise an object
/// or an array.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: Option<Value>,
    pub method: String,
    pub params: Value,
}

impl Request {
    pub fn new(id: Option<Value>, method: &str, params: Value) -> Self {
        Self {
            id,
            method: method.to_string(),
            params,
        }
    }

    /// Validate a decoded JSON value as a request.
    ///
    /// On failure returns the id to echo (or null) together with a `-32600`.
    pub fn from_value(value: Value) -> std::result::Result<Self, (Value, RpcError)> {
        let mut obj = match value {
            Value::Object(obj) => obj,
            other => {
                return Err((
                    Value::Null,
                    RpcError::invalid_request(format!("expected an object, got {}", type_name(&other))),
                ))
            }
        };

        let id = obj.remove("id").filter(|v| !v.is_null());
        let echo = id.clone().unwrap_or(Value::Null);

        match obj.get("jsonrpc") {
            Some(Value::String(v)) if v == JSONRPC_VERSION => {}
            Some(_) => {
                return Err((echo, RpcError::invalid_request("jsonrpc must be \"2.0\"")));
            }
            None => {
                return Err((echo, RpcError::invalid_request("missing jsonrpc version")));
            }
        }

        let method = match obj.remove("method") {
            Some(Value::String(m)) => m,
            Some(_) => return Err((echo, RpcError::invalid_request("method must be a string"))),
            None => return Err((echo, RpcError::invalid_request("missing method"))),
        };

        let params = match obj.remove("params") {
            None => Value::Null,
            Some(p @ Value::Object(_)) | Some(p @ Value::Array(_)) => p,
            Some(other) => {
                return Err((
                    echo,
                    RpcError::invalid_request(format!(
                        "params must be an object or array, got {}",
                        type_name(&other)
                    )),
                ))
            }
        };

        Ok(Self { id, method, params })
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("jsonrpc".to_string(), Value::String(JSONRPC_VERSION.to_string()));
        obj.insert("method".to_string(), Value::String(self.method.clone()));
        if !self.params.is_null() {
            obj.insert("params".to_string(), self.params.clone());
        }
        if let Some(id) = &self.id {
            obj.insert("id".to_string(), id.clone());
        }
        Value::Object(obj)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub jsonrpc: String,
    pub result: Value,
    pub id: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub jsonrpc: String,
    pub error: RpcError,
    pub id: Value,
}

/// One outbound response. Field order on the wire is `jsonrpc`, then
/// `result`/`error`, then `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    // Error first: a missing `result` would otherwise decode as null.
    Error(ErrorResponse),
    Success(SuccessResponse),
}

impl Response {
    pub fn success(id: Value, result: Value) -> Self {
        Response::Success(SuccessResponse {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result,
            id,
        })
    }

    pub fn error(id: Value, error: RpcError) -> Self {
        Response::Error(ErrorResponse {
            jsonrpc: JSONRPC_VERSION.to_string(),
            error,
            id,
        })
    }

    pub fn id(&self) -> &Value {
        match self {
            Response::Success(r) => &r.id,
            Response::Error(r) => &r.id,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }

    pub fn into_result(self) -> std::result::Result<Value, RpcError> {
        match self {
            Response::Success(r) => Ok(r.result),
            Response::Error(r) => Err(r.error),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// What the dispatcher sends back for one inbound message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Single(Response),
    Batch(Vec<Response>),
}

impl Reply {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"jsonrpc":"2.0","error":{{"code":{},"message":"Internal error: response encoding failed"}},"id":null}}"#,
                crate::error::INTERNAL_ERROR
            )
        })
    }

    pub fn into_single(self) -> Option<Response> {
        match self {
            Reply::Single(r) => Some(r),
            Reply::Batch(_) => None,
        }
    }
}
