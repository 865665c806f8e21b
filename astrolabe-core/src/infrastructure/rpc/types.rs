use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";
pub const METHOD_NOT_FOUND: i64 = -32601;

#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

impl<'a> RpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcNotification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: Value,
}

impl<'a> RpcNotification<'a> {
    pub fn new(method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Option<Value>,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id: Some(id),
        }
    }

    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
            id: Some(id),
        }
    }

    pub fn method_not_found(id: Value, method: &str) -> Self {
        Self::error(
            id,
            METHOD_NOT_FOUND,
            format!("client does not implement method '{method}'"),
        )
    }
}

/// Classification of one inbound JSON-RPC message
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Response { id: u64, outcome: Result<Value, RpcError> },
    Request { id: Value, method: String, params: Value },
    Notification { method: String, params: Value },
    Unknown,
}

impl Inbound {
    pub fn classify(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return Inbound::Unknown;
        };
        let method = map
            .get("method")
            .and_then(Value::as_str)
            .map(str::to_string);
        let id = map.remove("id").filter(|id| !id.is_null());

        match (id, method) {
            (Some(id), Some(method)) => Inbound::Request {
                id,
                method,
                params: map.remove("params").unwrap_or(Value::Null),
            },
            (None, Some(method)) => Inbound::Notification {
                method,
                params: map.remove("params").unwrap_or(Value::Null),
            },
            (Some(id), None) => {
                let Some(id) = response_id(&id) else {
                    return Inbound::Unknown;
                };
                let outcome = match map.remove("error") {
                    Some(error) => Err(serde_json::from_value(error).unwrap_or(RpcError {
                        code: -32000,
                        message: "unknown error".to_string(),
                        data: None,
                    })),
                    None => Ok(map.remove("result").unwrap_or(Value::Null)),
                };
                Inbound::Response { id, outcome }
            }
            (None, None) => Inbound::Unknown,
        }
    }
}

/// Request ids are numeric on the way out; peers may echo them as strings.
fn response_id(id: &Value) -> Option<u64> {
    match id {
        Value::Number(num) => num.as_u64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}
