// Streamable HTTP transport tests - a wiremock server stands in for the MCP peer

use astrolabe_core::config::{ServerConfig, TransportConfig};
use astrolabe_core::transport::{HttpTransport, Transport, TransportError};
use astrolabe_core::{ConnectionError, ConnectionState, ServerConnection};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const SESSION: &str = "session-7f3a";

fn initialize_result() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": {
            "protocolVersion": "2025-06-18",
            "capabilities": { "tools": {} },
            "serverInfo": { "name": "remote", "version": "1.0.0" },
            "instructions": "Ferramentas de inventário."
        }
    })
}

async fn mount_handshake(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(body_partial_json(json!({ "method": "initialize" })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("mcp-session-id", SESSION)
                .set_body_json(initialize_result()),
        )
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(header("mcp-session-id", SESSION))
        .and(body_partial_json(json!({ "method": "notifications/initialized" })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(server)
        .await;
}

/// Answers every request with a JSON-RPC error carrying the request's id.
struct RpcFailure;

impl Respond for RpcFailure {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": body["id"],
            "error": { "code": -32602, "message": "unknown host" }
        }))
    }
}

/// Serves a single POST, answering with `chunks` as a chunked SSE body.
/// Each chunk is flushed on its own so the client sees them separately.
async fn serve_chunked_sse(chunks: Vec<Vec<u8>>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.expect("accept");
        let mut reader = BufReader::new(socket);
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).await.expect("request header");
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().expect("content length");
                }
            }
        }
        let mut body = vec![0; content_length];
        reader.read_exact(&mut body).await.expect("request body");

        let mut socket = reader.into_inner();
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\nconnection: close\r\n\r\n",
            )
            .await
            .expect("response head");
        for chunk in chunks {
            socket
                .write_all(format!("{:x}\r\n", chunk.len()).as_bytes())
                .await
                .expect("chunk size");
            socket.write_all(&chunk).await.expect("chunk");
            socket.write_all(b"\r\n").await.expect("chunk end");
            socket.flush().await.expect("flush");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        socket.write_all(b"0\r\n\r\n").await.expect("last chunk");
        socket.flush().await.expect("flush");
    });
    format!("http://{addr}/mcp")
}

fn connection(server: &MockServer) -> ServerConnection {
    ServerConnection::new(ServerConfig::http("remote", format!("{}/mcp", server.uri())))
}

#[tokio::test]
async fn session_lifecycle_over_json_and_sse() {
    let server = MockServer::start().await;
    mount_handshake(&server).await;

    let stream = concat!(
        "event: message\n",
        "data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/message\",\"params\":{\"level\":\"info\"}}\n\n",
        ": keep-alive\n\n",
        "event: message\n",
        "data: {\"jsonrpc\":\"2.0\",\"id\":\"srv-1\",\"method\":\"ping\"}\n\n",
        "event: message\n",
        "data: {\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"tools\":[",
        "{\"name\":\"lookup\",\"description\":\"Find a host\",",
        "\"inputSchema\":{\"type\":\"object\",\"properties\":{\"host\":{\"type\":\"string\"}},\"required\":[\"host\"]}}",
        "]}}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(header("mcp-session-id", SESSION))
        .and(body_partial_json(json!({ "method": "tools/list" })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(stream, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(body_partial_json(json!({ "id": "srv-1", "result": {} })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(header("mcp-session-id", SESSION))
        .and(body_partial_json(json!({
            "method": "tools/call",
            "params": { "name": "lookup", "arguments": { "host": "db-1" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "result": { "content": [{ "type": "text", "text": "db-1 is up" }] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/mcp"))
        .and(header("mcp-session-id", SESSION))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let connection = connection(&server);
    connection.initialize().await.expect("initialize");
    assert_eq!(
        connection.instructions().await.as_deref(),
        Some("Ferramentas de inventário.")
    );

    let tools = connection.list_tools().await.expect("tools");
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "lookup");

    let result = connection
        .execute_tool("lookup", json!({ "host": "db-1" }))
        .await
        .expect("tool result");
    assert_eq!(result["content"][0]["text"], "db-1 is up");

    connection.cleanup().await;
    assert_eq!(connection.state().await, ConnectionState::Closed);
}

#[tokio::test]
async fn http_error_status_fails_initialize() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let connection = connection(&server);
    let err = connection.initialize().await.expect_err("initialize fails");

    match err {
        ConnectionError::Transport(TransportError::Status { status, body, .. }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(connection.state().await, ConnectionState::Closed);
}

#[tokio::test]
async fn rpc_error_is_retried_then_returned() {
    let server = MockServer::start().await;
    mount_handshake(&server).await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(body_partial_json(json!({ "method": "tools/call" })))
        .respond_with(RpcFailure)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(405))
        .expect(1)
        .mount(&server)
        .await;

    let connection = connection(&server);
    connection.initialize().await.expect("initialize");

    let err = connection
        .execute_tool_with("lookup", json!({ "host": "x" }), 2, Duration::from_millis(10))
        .await
        .expect_err("rpc error");

    match err {
        ConnectionError::Transport(TransportError::Rpc { code, message, .. }) => {
            assert_eq!(code, -32602);
            assert_eq!(message, "unknown host");
        }
        other => panic!("unexpected error {other:?}"),
    }

    connection.cleanup().await;
    assert_eq!(connection.state().await, ConnectionState::Closed);
}

#[tokio::test]
async fn sse_event_split_inside_multibyte_character() {
    let event = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"text\":\"execução\"}}\n\n"
        .as_bytes();
    let split = event.iter().position(|byte| *byte == 0xC3).expect("multi-byte char") + 1;
    let url = serve_chunked_sse(vec![event[..split].to_vec(), event[split..].to_vec()]).await;

    let TransportConfig::Http(config) = ServerConfig::http("chunked", url)
        .transport()
        .expect("http config")
    else {
        panic!("expected http transport");
    };
    let transport = HttpTransport::new("chunked", &config).expect("transport");

    let result = transport
        .request("tools/call", json!({ "name": "echo", "arguments": {} }))
        .await
        .expect("response survives the split");
    assert_eq!(result, json!({ "text": "execução" }));
}
