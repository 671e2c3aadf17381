//! End-to-end client flow over the stdio transport, with a scripted
//! knowledge-graph server on the other end of the line channels.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use mcp_harness::client::{Client, ClientState};
use mcp_harness::transport::{StdioTransport, Transport};
use mcp_harness::{Error, Request, RequestId};

/// A fake server that answers initialize/tools requests the way the
/// knowledge-graph memory server does: one JSON line in, one line out,
/// tool payloads embedded as JSON text content.
fn spawn_fake_server(
    mut from_client: mpsc::Receiver<String>,
    to_client: mpsc::Sender<String>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(line) = from_client.recv().await {
            let msg: Value = serde_json::from_str(&line).expect("client sent invalid JSON");
            let Some(id) = msg.get("id") else {
                // notifications get no reply
                continue;
            };
            let reply = match msg["method"].as_str() {
                Some("initialize") => json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": {
                        "protocolVersion": msg["params"]["protocolVersion"],
                        "capabilities": {"tools": {}},
                        "serverInfo": {"name": "memory-server", "version": "1.0.0"}
                    }
                }),
                Some("tools/list") => json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": {
                        "tools": [
                            {"name": "create_entities", "description": "Create entities", "inputSchema": {"type": "object"}},
                            {"name": "read_graph", "description": "Read the graph", "inputSchema": {"type": "object"}}
                        ]
                    }
                }),
                Some("tools/call") => {
                    let name = msg["params"]["name"].as_str().unwrap_or_default();
                    if name == "delete_entities" {
                        // tool-level failure: still a valid Response
                        json!({
                            "jsonrpc": "2.0",
                            "id": id,
                            "result": {
                                "content": [{"type": "text", "text": "entity not found"}],
                                "isError": true
                            }
                        })
                    } else {
                        let payload = json!({"entities": [], "relations": []}).to_string();
                        json!({
                            "jsonrpc": "2.0",
                            "id": id,
                            "result": {
                                "content": [{"type": "text", "text": payload}]
                            }
                        })
                    }
                }
                _ => json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {"code": -32601, "message": "method not found"}
                }),
            };
            if to_client.send(reply.to_string()).await.is_err() {
                break;
            }
        }
    })
}

fn wire() -> (Arc<StdioTransport>, tokio::task::JoinHandle<()>) {
    let (to_client_tx, to_client_rx) = mpsc::channel(32);
    let (from_client_tx, from_client_rx) = mpsc::channel(32);
    let server = spawn_fake_server(from_client_rx, to_client_tx);
    let transport = Arc::new(StdioTransport::new(to_client_rx, from_client_tx));
    (transport, server)
}

#[tokio::test]
async fn test_full_handshake_and_tool_flow() {
    let (transport, _server) = wire();
    let client = Client::new(transport);

    let init = client.initialize().await.unwrap();
    assert_eq!(init.server_info.unwrap().name, "memory-server");
    assert_eq!(client.state(), ClientState::Initialized);
    client.send_initialized().await.unwrap();

    let tools = client.tools_list().await.unwrap();
    assert_eq!(tools.tools.len(), 2);
    assert_eq!(tools.tools[0].name, "create_entities");

    let result = client.tools_call("read_graph", Some(json!({}))).await.unwrap();
    assert!(!result.is_error);
    let payload = result.text_json().unwrap();
    assert_eq!(payload["entities"], json!([]));

    // tool-level error is independent of the protocol layer
    let result = client
        .tools_call("delete_entities", Some(json!({"names": ["ghost"]})))
        .await
        .unwrap();
    assert!(result.is_error);
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_tool_calls_rejected_before_handshake() {
    let (transport, _server) = wire();
    let client = Client::new(transport);

    assert!(matches!(
        client.tools_list().await.unwrap_err(),
        Error::NotInitialized
    ));
    assert_eq!(client.state(), ClientState::Uninitialized);
}

#[tokio::test]
async fn test_concurrent_calls_resolve_out_of_order_replies() {
    // server that buffers three requests and answers them in reverse order
    let (to_client_tx, to_client_rx) = mpsc::channel(32);
    let (from_client_tx, mut from_client_rx) = mpsc::channel::<String>(32);
    let server = tokio::spawn(async move {
        let mut ids = Vec::new();
        for _ in 0..3 {
            let line = from_client_rx.recv().await.unwrap();
            let msg: Value = serde_json::from_str(&line).unwrap();
            ids.push(msg["id"].as_i64().unwrap());
        }
        for id in ids.iter().rev() {
            let reply = json!({"jsonrpc": "2.0", "id": id, "result": {"echo": id}});
            to_client_tx.send(reply.to_string()).await.unwrap();
        }
    });
    let transport = Arc::new(StdioTransport::new(to_client_rx, from_client_tx));

    let calls: Vec<_> = (0..3)
        .map(|_| {
            let transport = transport.clone();
            tokio::spawn(async move {
                let id = transport.next_id();
                let request = Request::new("tools/call", Some(json!({})), id.clone());
                let response = transport
                    .send_request(request, Duration::from_secs(1))
                    .await
                    .unwrap();
                (id, response)
            })
        })
        .collect();

    for call in calls {
        let (id, response) = call.await.unwrap();
        // each caller got the reply bearing its own id
        assert_eq!(response.id, id);
        if let RequestId::Number(n) = id {
            assert_eq!(response.result.unwrap()["echo"], json!(n));
        }
    }
    server.await.unwrap();
}
