//! # Transports
//!
//! A [`Transport`] carries MCP JSON-RPC traffic to one peer and correlates
//! requests with their responses. Two implementations exist:
//!
//! - [`StdioTransport`]: spawns the server as a child process and exchanges
//!   newline-delimited JSON over its stdin/stdout.
//! - [`HttpTransport`]: Streamable HTTP; every message is a POST whose answer
//!   is either a JSON body or a server-sent event stream.
//!
//! A [`Connector`] turns a validated [`TransportConfig`] into a live
//! transport. [`NativeConnector`] is the production implementation; tests
//! substitute their own.

mod error;
mod http;
mod stdio;

pub use error::TransportError;
pub use http::{HttpTransport, SseEvent, take_sse_event};
pub use stdio::StdioTransport;

use crate::config::TransportConfig;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and wait for the matching response's `result`.
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError>;

    /// Send a notification; no response is expected.
    async fn notify(&self, method: &str, params: Value) -> Result<(), TransportError>;

    /// Release the channel. Further requests fail with
    /// [`TransportError::Closed`].
    async fn close(&self) -> Result<(), TransportError>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        server: &str,
        config: &TransportConfig,
    ) -> Result<Box<dyn Transport>, TransportError>;
}

/// Opens real child processes and HTTP clients.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeConnector;

#[async_trait]
impl Connector for NativeConnector {
    async fn connect(
        &self,
        server: &str,
        config: &TransportConfig,
    ) -> Result<Box<dyn Transport>, TransportError> {
        match config {
            TransportConfig::Stdio(stdio) => {
                let transport = StdioTransport::spawn(server, stdio)?;
                Ok(Box::new(transport))
            }
            TransportConfig::Http(http) => {
                let transport = HttpTransport::new(server, http)?;
                Ok(Box::new(transport))
            }
        }
    }
}
