//! MCP session on top of a [`Transport`].

use crate::constants::PROTOCOL_VERSION;
use crate::domain::tool::ToolDescriptor;
use crate::infrastructure::transport::{Transport, TransportError};
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

pub struct McpSession {
    server: String,
    transport: Box<dyn Transport>,
    instructions: Option<String>,
}

impl McpSession {
    /// Run the `initialize` / `notifications/initialized` exchange. A failed
    /// handshake closes the transport before the error is returned.
    pub async fn handshake(
        server: &str,
        transport: Box<dyn Transport>,
    ) -> Result<Self, TransportError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
                "title": "Astrolabe MCP Client"
            },
            "capabilities": {}
        });

        let init_result = match transport.request("initialize", params).await {
            Ok(result) => result,
            Err(err) => return Err(abandon(server, transport, err).await),
        };
        if let Err(err) = transport
            .notify("notifications/initialized", json!({}))
            .await
        {
            return Err(abandon(server, transport, err).await);
        }

        let version = init_result
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        if version != PROTOCOL_VERSION {
            debug!(server, version, "server negotiated a different protocol version");
        }
        let instructions = init_result
            .get("instructions")
            .and_then(Value::as_str)
            .filter(|text| !text.trim().is_empty())
            .map(str::to_string);

        Ok(Self {
            server: server.to_string(),
            transport,
            instructions,
        })
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    /// Fetch every page of `tools/list`.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, TransportError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = match &cursor {
                Some(cursor) => json!({ "cursor": cursor }),
                None => json!({}),
            };
            let result = self.transport.request("tools/list", params).await?;
            for entry in result
                .get("tools")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default()
            {
                match ToolDescriptor::from_value(entry) {
                    Some(tool) => tools.push(tool),
                    None => warn!(server = %self.server, "ignoring tool entry without a name"),
                }
            }
            cursor = result
                .get("nextCursor")
                .and_then(Value::as_str)
                .map(str::to_string);
            if cursor.is_none() {
                break;
            }
        }
        info!(server = %self.server, count = tools.len(), "Listed tools");
        Ok(tools)
    }

    pub async fn call_tool(&self, tool: &str, arguments: Value) -> Result<Value, TransportError> {
        let params = json!({
            "name": tool,
            "arguments": match arguments {
                Value::Null => Value::Object(Map::new()),
                other => other,
            }
        });
        self.transport.request("tools/call", params).await
    }

    pub async fn close(&self) -> Result<(), TransportError> {
        self.transport.close().await
    }
}

async fn abandon(
    server: &str,
    transport: Box<dyn Transport>,
    err: TransportError,
) -> TransportError {
    if let Err(close_err) = transport.close().await {
        warn!(server, %close_err, "failed to release transport after handshake error");
    }
    err
}
