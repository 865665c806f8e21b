use super::{ConnectionError, ConnectionState, McpSession};
use crate::config::ServerConfig;
use crate::constants::{DEFAULT_TOOL_RETRIES, DEFAULT_TOOL_RETRY_DELAY_MS};
use crate::domain::tool::ToolDescriptor;
use crate::infrastructure::transport::{Connector, NativeConnector};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, warn};

/// Connection to one configured MCP server.
///
/// Resources are acquired by [`initialize`](Self::initialize) in the order
/// transport, then session, and released by [`cleanup`](Self::cleanup) in
/// reverse. Cleanup is serialized by its own lock so concurrent callers
/// release everything exactly once.
pub struct ServerConnection {
    name: String,
    config: ServerConfig,
    connector: Arc<dyn Connector>,
    inner: AsyncMutex<ConnectionInner>,
    cleanup_lock: AsyncMutex<()>,
}

struct ConnectionInner {
    state: ConnectionState,
    session: Option<Arc<McpSession>>,
}

impl ServerConnection {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_connector(config, Arc::new(NativeConnector))
    }

    pub fn with_connector(config: ServerConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            name: config.name.clone(),
            config,
            connector,
            inner: AsyncMutex::new(ConnectionInner {
                state: ConnectionState::Uninitialized,
                session: None,
            }),
            cleanup_lock: AsyncMutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    /// `instructions` announced by the server during the handshake
    pub async fn instructions(&self) -> Option<String> {
        let inner = self.inner.lock().await;
        inner
            .session
            .as_ref()
            .and_then(|session| session.instructions().map(str::to_string))
    }

    /// Connect and complete the session handshake.
    ///
    /// Configuration is validated before anything is acquired: a
    /// [`ConnectionError::Config`] leaves the state untouched and the call
    /// can be retried. Any later failure releases what was acquired and
    /// leaves the connection `Closed`.
    pub async fn initialize(&self) -> Result<(), ConnectionError> {
        let transport_config = self.config.transport()?;

        {
            let mut inner = self.inner.lock().await;
            match inner.state {
                ConnectionState::Ready => return Ok(()),
                ConnectionState::Connecting | ConnectionState::Closing => {
                    return Err(ConnectionError::Busy {
                        server: self.name.clone(),
                        state: inner.state,
                    });
                }
                ConnectionState::Uninitialized | ConnectionState::Closed => {
                    inner.state = ConnectionState::Connecting;
                }
            }
        }

        info!(server = %self.name, "Initializing server");
        let outcome = match self.connector.connect(&self.name, &transport_config).await {
            Ok(transport) => McpSession::handshake(&self.name, transport).await,
            Err(err) => Err(err),
        };

        let mut inner = self.inner.lock().await;
        match outcome {
            Ok(session) => {
                inner.session = Some(Arc::new(session));
                inner.state = ConnectionState::Ready;
                info!(server = %self.name, "Server initialized successfully");
                Ok(())
            }
            Err(err) => {
                inner.state = ConnectionState::Closed;
                error!(server = %self.name, %err, "Error initializing server");
                Err(err.into())
            }
        }
    }

    /// Fetch the server's tools. Not cached.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ConnectionError> {
        let session = self.ready_session().await?;
        info!(server = %self.name, "Listing tools");
        Ok(session.list_tools().await?)
    }

    /// Run a tool with the default budget of two attempts one second apart.
    pub async fn execute_tool(&self, tool: &str, arguments: Value) -> Result<Value, ConnectionError> {
        self.execute_tool_with(
            tool,
            arguments,
            DEFAULT_TOOL_RETRIES,
            Duration::from_millis(DEFAULT_TOOL_RETRY_DELAY_MS),
        )
        .await
    }

    /// Run a tool, retrying every failure after a fixed `delay` until
    /// `retries` attempts were made. The last error is returned.
    pub async fn execute_tool_with(
        &self,
        tool: &str,
        arguments: Value,
        retries: u32,
        delay: Duration,
    ) -> Result<Value, ConnectionError> {
        let session = self.ready_session().await?;
        let retries = retries.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            info!(
                server = %self.name,
                tool,
                attempt,
                max_attempts = retries,
                "Executing tool"
            );
            debug!(server = %self.name, tool, %arguments, "Tool arguments");

            match session.call_tool(tool, arguments.clone()).await {
                Ok(result) => {
                    log_progress(tool, &result);
                    info!(server = %self.name, tool, "Tool executed successfully");
                    return Ok(result);
                }
                Err(err) if attempt < retries => {
                    warn!(
                        server = %self.name,
                        tool,
                        attempt,
                        %err,
                        "Error executing tool, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    error!(
                        server = %self.name,
                        tool,
                        attempts = retries,
                        %err,
                        "Max retries reached for tool"
                    );
                    return Err(err.into());
                }
            }
        }
    }

    /// Release session then transport. Safe to call any number of times
    /// from any number of tasks; errors are logged, never returned.
    pub async fn cleanup(&self) {
        let _guard = self.cleanup_lock.lock().await;

        let session = {
            let mut inner = self.inner.lock().await;
            match inner.state {
                ConnectionState::Ready => {
                    inner.state = ConnectionState::Closing;
                    inner.session.take()
                }
                state => {
                    debug!(server = %self.name, %state, "Nothing to clean up");
                    return;
                }
            }
        };

        info!(server = %self.name, "Cleaning up server");
        if let Some(session) = session {
            if let Err(err) = session.close().await {
                error!(server = %self.name, %err, "Error during cleanup of server");
            }
        }
        self.inner.lock().await.state = ConnectionState::Closed;
        info!(server = %self.name, "Server cleaned up");
    }

    async fn ready_session(&self) -> Result<Arc<McpSession>, ConnectionError> {
        let inner = self.inner.lock().await;
        match (&inner.state, &inner.session) {
            (ConnectionState::Ready, Some(session)) => Ok(Arc::clone(session)),
            _ => Err(ConnectionError::NotInitialized {
                server: self.name.clone(),
                state: inner.state,
            }),
        }
    }
}

fn log_progress(tool: &str, result: &Value) {
    let (Some(progress), Some(total)) = (
        result.get("progress").and_then(Value::as_f64),
        result.get("total").and_then(Value::as_f64),
    ) else {
        return;
    };
    if total > 0.0 {
        let percent = progress / total * 100.0;
        info!(tool, progress, total, "Tool progress: {percent:.1}%");
    } else {
        info!(tool, progress, total, "Tool progress (total is zero)");
    }
}
