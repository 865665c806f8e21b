use super::stdio::log_notification;
use super::{Transport, TransportError};
use crate::config::HttpConfig;
use crate::constants::PROTOCOL_VERSION;
use crate::infrastructure::rpc::{Inbound, RpcNotification, RpcRequest, RpcResponse};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

const SESSION_HEADER: &str = "mcp-session-id";
const PROTOCOL_HEADER: &str = "mcp-protocol-version";
const ACCEPT_BOTH: &str = "application/json, text/event-stream";

/// Streamable HTTP transport.
///
/// The session id handed out by the server on `initialize` is echoed on every
/// later request and released with a `DELETE` on close.
pub struct HttpTransport {
    server: String,
    url: String,
    headers: HeaderMap,
    read_timeout: Duration,
    http: Client,
    session_id: Mutex<Option<String>>,
    id_counter: AtomicU64,
    closed: AtomicBool,
}

/// One parsed server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

impl HttpTransport {
    pub fn new(server: &str, config: &HttpConfig) -> Result<Self, TransportError> {
        let http = Client::builder()
            .build()
            .map_err(|source| TransportError::Http {
                server: server.to_string(),
                source,
            })?;
        info!(server, url = %config.url, "Opening streamable HTTP transport");
        Ok(Self {
            server: server.to_string(),
            url: config.url.clone(),
            headers: config.headers.clone(),
            read_timeout: config.read_timeout,
            http,
            session_id: Mutex::new(None),
            id_counter: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        })
    }

    /// Session id assigned by the server, if any
    pub fn session_id(&self) -> Option<String> {
        self.session_id
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }

    async fn post<T: Serialize>(&self, body: &T) -> Result<Response, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed {
                server: self.server.clone(),
            });
        }
        let mut request = self
            .http
            .post(&self.url)
            .timeout(self.read_timeout)
            .headers(self.headers.clone())
            .header(ACCEPT, ACCEPT_BOTH)
            .header(PROTOCOL_HEADER, PROTOCOL_VERSION)
            .json(body);
        if let Some(session) = self.session_id() {
            request = request.header(SESSION_HEADER, session);
        }

        let response = request.send().await.map_err(|source| self.http_error(source))?;
        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            if let Ok(mut guard) = self.session_id.lock() {
                if guard.as_deref() != Some(session) {
                    debug!(server = %self.server, session, "MCP session established");
                    *guard = Some(session.to_string());
                }
            }
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                server: self.server.clone(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn read_response(&self, id: u64, response: Response) -> Result<Value, TransportError> {
        let is_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("text/event-stream"))
            .unwrap_or(false);

        if !is_stream {
            let value: Value = response
                .json()
                .await
                .map_err(|source| self.http_error(source))?;
            return match self.handle_inbound(id, value).await? {
                Some(outcome) => outcome,
                None => Err(TransportError::transport(
                    &self.server,
                    format!("response to request {id} was missing"),
                )),
            };
        }

        let mut stream = response.bytes_stream();
        let mut pending: Vec<u8> = Vec::new();
        let mut buffer = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| self.http_error(source))?;
            pending.extend_from_slice(&chunk);
            let (text, invalid) = take_utf8(&mut pending);
            if invalid {
                warn!(server = %self.server, "Invalid UTF-8 in SSE stream, replaced");
            }
            buffer.push_str(&text);
            if buffer.contains('\r') {
                buffer = buffer.replace("\r\n", "\n");
            }

            while let Some(event) = take_sse_event(&mut buffer) {
                if event.data.is_empty() {
                    continue;
                }
                let value: Value = match serde_json::from_str(&event.data) {
                    Ok(value) => value,
                    Err(source) => {
                        warn!(server = %self.server, %source, "Failed to parse SSE event");
                        continue;
                    }
                };
                if let Some(outcome) = self.handle_inbound(id, value).await? {
                    return outcome;
                }
            }
        }

        Err(TransportError::Terminated {
            server: self.server.clone(),
        })
    }

    /// Returns the outcome once the response for `id` is seen.
    async fn handle_inbound(
        &self,
        id: u64,
        value: Value,
    ) -> Result<Option<Result<Value, TransportError>>, TransportError> {
        match Inbound::classify(value) {
            Inbound::Response {
                id: response_id,
                outcome,
            } if response_id == id => Ok(Some(outcome.map_err(|error| TransportError::Rpc {
                server: self.server.clone(),
                code: error.code,
                message: error.message,
            }))),
            Inbound::Response { id: other, .. } => {
                debug!(server = %self.server, response_id = other, "received response for unknown request");
                Ok(None)
            }
            Inbound::Request {
                id: request_id,
                method,
                ..
            } => {
                let reply = match method.as_str() {
                    "ping" => RpcResponse::success(request_id, json!({})),
                    other => {
                        warn!(server = %self.server, method = other, "server sent unsupported request");
                        RpcResponse::method_not_found(request_id, other)
                    }
                };
                self.post(&reply).await?;
                Ok(None)
            }
            Inbound::Notification { method, .. } => {
                log_notification(&self.server, &method);
                Ok(None)
            }
            Inbound::Unknown => Ok(None),
        }
    }

    fn http_error(&self, source: reqwest::Error) -> TransportError {
        TransportError::Http {
            server: self.server.clone(),
            source,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        debug!(server = %self.server, id, method, "Posting MCP request");
        let response = self.post(&RpcRequest::new(id, method, params)).await?;
        self.read_response(id, response).await
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), TransportError> {
        self.post(&RpcNotification::new(method, params)).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let Some(session) = self.session_id() else {
            return Ok(());
        };

        let response = self
            .http
            .delete(&self.url)
            .timeout(self.read_timeout)
            .headers(self.headers.clone())
            .header(SESSION_HEADER, session)
            .send()
            .await
            .map_err(|source| self.http_error(source))?;
        match response.status() {
            status if status.is_success() => Ok(()),
            // Servers may refuse client-initiated session termination.
            StatusCode::METHOD_NOT_ALLOWED => Ok(()),
            status => Err(TransportError::Status {
                server: self.server.clone(),
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

/// Decode the complete UTF-8 prefix of `pending`, leaving an unfinished
/// multi-byte sequence at its end for the next chunk. Invalid sequences
/// become U+FFFD; the flag reports whether any were seen.
fn take_utf8(pending: &mut Vec<u8>) -> (String, bool) {
    let mut text = String::new();
    let mut invalid = false;
    loop {
        match std::str::from_utf8(pending) {
            Ok(valid) => {
                text.push_str(valid);
                pending.clear();
                return (text, invalid);
            }
            Err(err) => {
                let valid_up_to = err.valid_up_to();
                text.push_str(std::str::from_utf8(&pending[..valid_up_to]).unwrap_or_default());
                match err.error_len() {
                    None => {
                        pending.drain(..valid_up_to);
                        return (text, invalid);
                    }
                    Some(len) => {
                        invalid = true;
                        text.push(char::REPLACEMENT_CHARACTER);
                        pending.drain(..valid_up_to + len);
                    }
                }
            }
        }
    }
}

/// Remove the next complete event from `buffer`. Events are separated by a
/// blank line; multi-line `data:` fields are joined with `\n`.
pub fn take_sse_event(buffer: &mut String) -> Option<SseEvent> {
    let event_end = buffer.find("\n\n")?;
    let block: String = buffer.drain(..event_end + 2).collect();

    let mut event = None;
    let mut data = String::new();
    for line in block.lines() {
        if let Some(value) = line.strip_prefix("event:") {
            event = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(value.strip_prefix(' ').unwrap_or(value));
        }
    }
    Some(SseEvent { event, data })
}
