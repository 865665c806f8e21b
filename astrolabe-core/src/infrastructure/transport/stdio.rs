use super::{Transport, TransportError};
use crate::config::StdioConfig;
use crate::infrastructure::rpc::{Inbound, RpcNotification, RpcRequest, RpcResponse};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type Responder = oneshot::Sender<Result<Value, TransportError>>;

/// Child-process transport speaking newline-delimited JSON-RPC.
pub struct StdioTransport {
    inner: Arc<StdioInner>,
    reader: AsyncMutex<Option<JoinHandle<()>>>,
}

struct StdioInner {
    server: String,
    child: AsyncMutex<Option<Child>>,
    writer: AsyncMutex<Option<BufWriter<ChildStdin>>>,
    pending: AsyncMutex<HashMap<u64, Responder>>,
    id_counter: AtomicU64,
    closed: AtomicBool,
}

impl StdioTransport {
    /// Spawn the configured command. Configured environment entries are
    /// layered over the inherited environment.
    pub fn spawn(server: &str, config: &StdioConfig) -> Result<Self, TransportError> {
        info!(
            server,
            command = %config.command.display(),
            args = ?config.args,
            "Spawning MCP server process"
        );
        let mut command = Command::new(&config.command);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &config.cwd {
            command.current_dir(dir);
        }
        if !config.args.is_empty() {
            command.args(&config.args);
        }
        for (key, value) in &config.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|source| TransportError::Spawn {
            server: server.to_string(),
            source,
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::transport(server, "failed to capture server stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::transport(server, "failed to capture server stdout"))?;

        let inner = Arc::new(StdioInner {
            server: server.to_string(),
            child: AsyncMutex::new(Some(child)),
            writer: AsyncMutex::new(Some(BufWriter::new(stdin))),
            pending: AsyncMutex::new(HashMap::new()),
            id_counter: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        });

        let reader_inner = Arc::clone(&inner);
        let reader = tokio::spawn(async move {
            reader_inner.reader_loop(stdout).await;
        });

        Ok(Self {
            inner,
            reader: AsyncMutex::new(Some(reader)),
        })
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        self.inner.send_request(method, params).await
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), TransportError> {
        self.inner
            .write_message(&RpcNotification::new(method, params))
            .await
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.inner.closed.store(true, Ordering::SeqCst);
        // Closing stdin first lets well-behaved servers exit on their own.
        self.inner.writer.lock().await.take();

        let mut outcome = Ok(());
        if let Some(mut child) = self.inner.child.lock().await.take() {
            if let Err(err) = child.kill().await {
                debug!(
                    server = %self.inner.server,
                    %err,
                    "failed to kill MCP server process (may have already exited)"
                );
            }
            if let Err(source) = child.wait().await {
                outcome = Err(TransportError::transport(
                    &self.inner.server,
                    format!("failed to reap server process: {source}"),
                ));
            }
        }

        if let Some(reader) = self.reader.lock().await.take() {
            reader.abort();
        }
        self.inner.fail_all_pending().await;
        outcome
    }
}

impl StdioInner {
    async fn send_request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(self.closed_error());
        }
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        if let Err(err) = self.write_message(&RpcRequest::new(id, method, params)).await {
            self.pending.lock().await.remove(&id);
            return Err(err);
        }

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(TransportError::Cancelled {
                server: self.server.clone(),
            }),
        }
    }

    async fn reader_loop(self: Arc<Self>, stdout: ChildStdout) {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(raw)) = lines.next_line().await {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('\u{1b}') {
                debug!(
                    server = %self.server,
                    line = trimmed,
                    "skipping non-JSON ANSI log line from MCP server"
                );
                continue;
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(value) => {
                    if let Err(err) = self.process_inbound_message(value).await {
                        warn!(
                            server = %self.server,
                            %err,
                            "failed to process message from MCP server"
                        );
                    }
                }
                Err(source) => {
                    warn!(
                        server = %self.server,
                        line = trimmed,
                        %source,
                        "received invalid JSON from MCP server"
                    );
                }
            }
        }

        if !self.closed.load(Ordering::SeqCst) {
            warn!(server = %self.server, "MCP server closed its output stream");
        }
        self.writer.lock().await.take();
        self.fail_all_pending().await;
    }

    async fn process_inbound_message(&self, value: Value) -> Result<(), TransportError> {
        match Inbound::classify(value) {
            Inbound::Response { id, outcome } => {
                let responder = self.pending.lock().await.remove(&id);
                match responder {
                    Some(sender) => {
                        let outcome = outcome.map_err(|error| TransportError::Rpc {
                            server: self.server.clone(),
                            code: error.code,
                            message: error.message,
                        });
                        let _ = sender.send(outcome);
                    }
                    None => debug!(
                        server = %self.server,
                        response_id = id,
                        "received response for unknown request"
                    ),
                }
                Ok(())
            }
            Inbound::Request { id, method, .. } => self.handle_server_request(id, &method).await,
            Inbound::Notification { method, .. } => {
                log_notification(&self.server, &method);
                Ok(())
            }
            Inbound::Unknown => {
                debug!(server = %self.server, "ignoring unrecognised message");
                Ok(())
            }
        }
    }

    async fn handle_server_request(&self, id: Value, method: &str) -> Result<(), TransportError> {
        let response = match method {
            "ping" => RpcResponse::success(id, json!({})),
            other => {
                warn!(
                    server = %self.server,
                    method = other,
                    "server sent unsupported request"
                );
                RpcResponse::method_not_found(id, other)
            }
        };
        self.write_message(&response).await
    }

    async fn write_message<T: Serialize>(&self, message: &T) -> Result<(), TransportError> {
        let mut encoded =
            serde_json::to_string(message).map_err(|source| TransportError::InvalidJson {
                server: self.server.clone(),
                source,
            })?;
        encoded.push('\n');

        let mut writer = self.writer.lock().await;
        let stream = writer.as_mut().ok_or_else(|| self.closed_error())?;
        let io_error = |source: std::io::Error| TransportError::transport(&self.server, source.to_string());
        stream
            .write_all(encoded.as_bytes())
            .await
            .map_err(io_error)?;
        stream.flush().await.map_err(io_error)?;
        Ok(())
    }

    async fn fail_all_pending(&self) {
        let mut pending = self.pending.lock().await;
        for (_, sender) in pending.drain() {
            let _ = sender.send(Err(TransportError::Terminated {
                server: self.server.clone(),
            }));
        }
    }

    fn closed_error(&self) -> TransportError {
        TransportError::Closed {
            server: self.server.clone(),
        }
    }
}

/// Shared by both transports.
pub(super) fn log_notification(server: &str, method: &str) {
    match method {
        "notifications/tools/list_changed" => warn!(
            server,
            "server reported a changed tool list; restart the session to refresh the registry"
        ),
        _ => debug!(server, method, "received notification from server"),
    }
}
