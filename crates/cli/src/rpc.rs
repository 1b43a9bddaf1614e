//! Newline-delimited JSON-RPC 2.0 over TCP.
//!
//! Every request runs on its own task. Responses for one connection are
//! written by a single writer task, in completion order.

use orchestrator::Agent;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

pub const PARSE_ERROR: i64 = -32700;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const AGENT_ERROR: i64 = -32000;

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
pub struct Response {
    jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl Response {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Accept connections until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    agent: Arc<dyn Agent>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "serving agent API");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("stopped accepting connections");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                debug!(%peer, "client connected");
                tokio::spawn(handle_connection(stream, Arc::clone(&agent), cancel.child_token()));
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, agent: Arc<dyn Agent>, cancel: CancellationToken) {
    let (read_half, mut write_half) = stream.into_split();
    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(64);

    let writer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if let Err(err) = write_half.write_all(&line).await {
                warn!(%err, "failed to write response");
                break;
            }
        }
    });

    let mut lines = BufReader::new(read_half).lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!(%err, "failed to read request");
                break;
            }
        };
        let agent = Arc::clone(&agent);
        let tx = tx.clone();
        tokio::spawn(async move {
            let response = handle_line(agent, &line).await;
            match serde_json::to_vec(&response) {
                Ok(mut out) => {
                    out.push(b'\n');
                    let _ = tx.send(out).await;
                }
                Err(err) => error!(%err, "failed to encode response"),
            }
        });
    }

    // The writer drains once every in-flight request has answered.
    drop(tx);
    let _ = writer.await;
    debug!("client disconnected");
}

/// Decode one request line, run it and build the response.
pub async fn handle_line(agent: Arc<dyn Agent>, line: &str) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(err) => return Response::failure(Value::Null, RpcError::new(PARSE_ERROR, err.to_string())),
    };
    let Request { id, method, params } = request;
    trace!(%method, ?id, "request");

    let task = tokio::spawn(async move { dispatch(agent.as_ref(), &method, params).await });
    match task.await {
        Ok(Ok(result)) => Response::result(id, result),
        Ok(Err(err)) => Response::failure(id, err),
        Err(err) => {
            error!(%err, "request handler panicked");
            Response::failure(id, RpcError::new(AGENT_ERROR, "internal error"))
        }
    }
}

async fn dispatch(agent: &dyn Agent, method: &str, params: Value) -> Result<Value, RpcError> {
    match method {
        "Agent.GetSnapshot" => call(params, |req| agent.get_snapshot(req)).await,
        "Agent.ReconcileFlightRecorder" => {
            call(params, |req| agent.reconcile_flight_recorder(req)).await
        }
        "DebugInfo.ListFunctions" => call(params, |req| agent.list_functions(req)).await,
        "DebugInfo.ListTypes" => call(params, |req| agent.list_types(req)).await,
        "DebugInfo.GetTypeInfo" => call(params, |req| agent.get_type_info(req)).await,
        "DebugInfo.ListVars" => call(params, |req| agent.list_vars(req)).await,
        _ => Err(RpcError::new(
            METHOD_NOT_FOUND,
            format!("unknown method `{method}`"),
        )),
    }
}

async fn call<P, R, F, Fut>(params: Value, handler: F) -> Result<Value, RpcError>
where
    P: DeserializeOwned,
    R: Serialize,
    F: FnOnce(P) -> Fut,
    Fut: Future<Output = Result<R, orchestrator::Error>>,
{
    let params = match params {
        // Go's net/rpc clients wrap the argument in a one-element array.
        Value::Array(mut items) if items.len() == 1 => items.remove(0),
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    let request: P = serde_json::from_value(params)
        .map_err(|err| RpcError::new(INVALID_PARAMS, err.to_string()))?;
    let response = handler(request)
        .await
        .map_err(|err| RpcError::new(AGENT_ERROR, err.to_string()))?;
    serde_json::to_value(response).map_err(|err| RpcError::new(AGENT_ERROR, err.to_string()))
}
