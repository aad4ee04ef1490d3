//! Stdio JSON-RPC server tests over in-memory pipes.
#![cfg(feature = "server")]

mod common;

use std::sync::Arc;

use serde_json::{Value, json};
use tokio::io::AsyncReadExt;

use bifrost::server::{self, jsonrpc};
use bifrost::{Bifrost, HistoryLedger};
use common::MockProvider;

async fn gateway() -> Arc<bifrost::Gateway> {
    let gateway = Bifrost::builder()
        .provider(Arc::new(MockProvider::new("mock").models(&["m1"])))
        .provider(Arc::new(
            MockProvider::new("boom").handler(|_, _| panic!("backend exploded")),
        ))
        .history(HistoryLedger::in_memory(10))
        .build()
        .await
        .unwrap();
    Arc::new(gateway)
}

/// Feed `input` to the server and collect responses keyed by id.
async fn exchange(input: &str) -> Vec<Value> {
    let (mut client, server_side) = tokio::io::duplex(1 << 20);
    server::serve(gateway().await, input.as_bytes(), server_side)
        .await
        .unwrap();

    let mut output = String::new();
    client.read_to_string(&mut output).await.unwrap();
    let mut responses: Vec<Value> = output
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    responses.sort_by_key(|r| r["id"].as_i64().unwrap_or(-1));
    responses
}

#[tokio::test]
async fn initialize_reports_server_info() {
    let responses = exchange(
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26"}}
{"jsonrpc":"2.0","method":"notifications/initialized"}
{"jsonrpc":"2.0","id":2,"method":"ping"}
"#,
    )
    .await;

    assert_eq!(responses.len(), 2);
    let init = &responses[0]["result"];
    assert_eq!(init["protocolVersion"], "2025-03-26");
    assert_eq!(init["serverInfo"]["name"], "bifrost");
    assert_eq!(init["serverInfo"]["version"], bifrost::version_string());
    assert!(init["capabilities"]["tools"].is_object());
    assert_eq!(responses[1]["result"], json!({}));
}

#[tokio::test]
async fn tools_list_and_call() {
    let responses = exchange(
        r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}
{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"use_mock","arguments":{"model":"m1","prompt":"hi"}}}
{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"list_mock_models","arguments":{}}}
"#,
    )
    .await;

    let tools = responses[0]["result"]["tools"].as_array().unwrap();
    let names: Vec<_> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(
        names,
        vec!["use_boom", "list_boom_models", "use_mock", "list_mock_models"]
    );
    assert!(tools[2]["inputSchema"]["properties"]["prompt"].is_object());

    assert_eq!(
        responses[1]["result"],
        json!({"content": [{"type": "text", "text": "echo: hi"}], "isError": false})
    );
    assert_eq!(responses[2]["result"]["content"][0]["text"], "m1");
}

#[tokio::test]
async fn provider_failures_are_results_not_rpc_errors() {
    let responses = exchange(
        r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"use_missing","arguments":{"model":"m","prompt":"hi"}}}
{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"use_mock","arguments":{"model":"m1","prompt":""}}}
"#,
    )
    .await;

    for response in &responses {
        assert!(response.get("error").is_none());
        assert_eq!(response["result"]["isError"], true);
    }
    assert!(
        responses[0]["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Provider not found: missing")
    );
}

#[tokio::test]
async fn protocol_errors_use_json_rpc_codes() {
    let responses = exchange(
        r#"{"jsonrpc":"2.0","id":1,"method":"resources/list"}
{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"frobnicate"}}
{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{}}
not json at all
"#,
    )
    .await;

    assert_eq!(responses.len(), 4);
    // parse error carries a null id and sorts first
    assert_eq!(responses[0]["id"], Value::Null);
    assert_eq!(responses[0]["error"]["code"], jsonrpc::PARSE_ERROR);
    assert_eq!(responses[1]["error"]["code"], jsonrpc::METHOD_NOT_FOUND);
    assert_eq!(responses[2]["error"]["code"], jsonrpc::INVALID_PARAMS);
    assert!(
        responses[2]["error"]["message"]
            .as_str()
            .unwrap()
            .contains("Unknown tool: frobnicate")
    );
    assert_eq!(responses[3]["error"]["code"], jsonrpc::INVALID_PARAMS);
}

#[tokio::test]
async fn unknown_notifications_are_ignored() {
    let responses = exchange(
        r#"{"jsonrpc":"2.0","method":"notifications/cancelled","params":{"requestId":1}}
{"jsonrpc":"2.0","method":"something/else"}

"#,
    )
    .await;
    assert!(responses.is_empty());
}

#[tokio::test]
async fn invoke_calls_land_in_gateway_history() {
    let gateway = gateway().await;
    let request = jsonrpc::parse_line(
        r#"{"jsonrpc":"2.0","id":"a","method":"tools/call","params":{"name":"use_mock","arguments":{"model":"m1","prompt":"hi"}}}"#,
    )
    .unwrap();

    let response = server::handle_request(&gateway, request).await.unwrap();
    assert_eq!(response.id, json!("a"));
    assert_eq!(gateway.history().len().await, 1);
}

#[tokio::test]
async fn panicking_provider_still_gets_an_answer() {
    let gateway = gateway().await;
    let (mut client, server_side) = tokio::io::duplex(1 << 20);
    let input = r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"use_boom","arguments":{"model":"m1","prompt":"hi"}}}
"#;
    server::serve(Arc::clone(&gateway), input.as_bytes(), server_side)
        .await
        .unwrap();

    let mut output = String::new();
    client.read_to_string(&mut output).await.unwrap();
    let responses: Vec<Value> = output
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["id"], 7);
    assert_eq!(responses[0]["result"]["isError"], true);
    assert!(
        responses[0]["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("backend exploded")
    );
    assert_eq!(gateway.history().len().await, 1);
}
