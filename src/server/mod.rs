//! Newline-delimited JSON-RPC server exposing a [`Gateway`] as tools.
//!
//! One request per input line, one response per output line. Requests are
//! read in order but each runs on its own task, so a `tools/list` does not
//! wait behind a slow `tools/call`. Responses flow through a bounded
//! channel to a single writer task, which keeps output lines whole.
//!
//! ```text
//! stdin ─► reader loop ─► spawn(handle) ─┐
//!                         spawn(handle) ─┼─► mpsc ─► writer task ─► stdout
//!                         spawn(handle) ─┘
//! ```
//!
//! Provider failures are tool results with `isError: true`; only protocol
//! mistakes (bad JSON, unknown method, unknown tool) are JSON-RPC errors.

pub mod jsonrpc;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::gateway::Gateway;
use crate::{BifrostError, Result};
use jsonrpc::{INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND, RpcRequest, RpcResponse};

/// Protocol revision reported when the client does not name one.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// Responses buffered between handlers and the writer.
pub const OUTBOUND_BUFFER: usize = 64;

/// Serve over the process's stdin/stdout until stdin closes.
pub async fn serve_stdio(gateway: Arc<Gateway>) -> Result<()> {
    serve(gateway, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Serve over arbitrary byte streams until `reader` reaches EOF.
///
/// In-flight requests are drained before returning.
pub async fn serve<R, W>(gateway: Arc<Gateway>, reader: R, writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<RpcResponse>(OUTBOUND_BUFFER);
    let writer_task = tokio::spawn(write_responses(rx, writer));

    let mut lines = BufReader::new(reader).lines();
    let mut in_flight = JoinSet::new();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match jsonrpc::parse_line(&line) {
            Ok(request) => {
                let gateway = Arc::clone(&gateway);
                let tx = tx.clone();
                in_flight.spawn(async move {
                    if let Some(response) = handle_guarded(&gateway, request).await {
                        // receiver gone means the writer hit an I/O error
                        let _ = tx.send(response).await;
                    }
                });
            }
            Err(response) => {
                debug!("rejecting unparseable line");
                if tx.send(response).await.is_err() {
                    break;
                }
            }
        }
        // reap finished handlers so the set does not grow unbounded
        while let Some(joined) = in_flight.try_join_next() {
            if let Err(e) = joined {
                warn!(error = %e, "request handler crashed");
            }
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "request handler crashed");
        }
    }
    drop(tx);
    match writer_task.await {
        Ok(result) => result,
        Err(e) => Err(BifrostError::Io(std::io::Error::other(e))),
    }
}

async fn write_responses<W>(mut rx: mpsc::Receiver<RpcResponse>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_vec(&response)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}

/// [`handle_request`], answering with `INTERNAL_ERROR` if it panics.
async fn handle_guarded(gateway: &Gateway, request: RpcRequest) -> Option<RpcResponse> {
    let id = request.id.clone();
    let method = request.method.clone();
    match AssertUnwindSafe(handle_request(gateway, request))
        .catch_unwind()
        .await
    {
        Ok(response) => response,
        Err(_) => {
            error!(%method, "request handler panicked");
            id.map(|id| {
                RpcResponse::failure(id, INTERNAL_ERROR, format!("internal error handling {method}"))
            })
        }
    }
}

/// Handle one request. Notifications and unknown notifications yield `None`.
pub async fn handle_request(gateway: &Gateway, request: RpcRequest) -> Option<RpcResponse> {
    let Some(id) = request.id.clone() else {
        debug!(method = %request.method, "notification");
        return None;
    };

    let response = match request.method.as_str() {
        "initialize" => RpcResponse::success(id, initialize_result(&request.params)),
        "ping" => RpcResponse::success(id, json!({})),
        "tools/list" => {
            let tools = gateway.list_tools().await;
            match serde_json::to_value(tools) {
                Ok(tools) => RpcResponse::success(id, json!({ "tools": tools })),
                Err(e) => RpcResponse::failure(id, INTERNAL_ERROR, e.to_string()),
            }
        }
        "tools/call" => call_tool(gateway, id, &request.params).await,
        other => {
            debug!(method = other, "unknown method");
            RpcResponse::failure(id, METHOD_NOT_FOUND, format!("Method not found: {other}"))
        }
    };
    Some(response)
}

fn initialize_result(params: &Value) -> Value {
    let protocol_version = params
        .get("protocolVersion")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_PROTOCOL_VERSION);
    info!(protocol_version, "client initialized");
    json!({
        "protocolVersion": protocol_version,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": crate::version_string(),
        },
    })
}

async fn call_tool(gateway: &Gateway, id: Value, params: &Value) -> RpcResponse {
    let Some(name) = params.get("name").and_then(Value::as_str) else {
        return RpcResponse::failure(id, INVALID_PARAMS, "tools/call requires a string 'name'");
    };
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

    match gateway.call_tool(name, &arguments).await {
        Ok(result) => match serde_json::to_value(result) {
            Ok(result) => RpcResponse::success(id, result),
            Err(e) => RpcResponse::failure(id, INTERNAL_ERROR, e.to_string()),
        },
        Err(e @ BifrostError::UnknownTool(_)) => {
            RpcResponse::failure(id, INVALID_PARAMS, e.to_string())
        }
        Err(e) => RpcResponse::failure(id, INTERNAL_ERROR, e.to_string()),
    }
}
