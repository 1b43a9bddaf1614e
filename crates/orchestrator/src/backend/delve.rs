#![forbid(unsafe_code)]

//! [`ProcessBackend`] over Delve's headless JSON-RPC API.
//!
//! Delve speaks JSON-RPC 1.0 framed as one JSON document per line. A single
//! connection carries every call; a reader task routes each response to the
//! caller waiting on its request id.

use crate::backend::{
    BreakpointInfo, DebuggerState, FieldInfo, ListVarsQuery, NewBreakpoint, ProcessBackend,
    ResolvedLocation, StackWalkOutput, StackWalkRequest, TypeInfo, VarInfo,
};
use crate::domain::FlightRecorderData;
use crate::error::Error;
use crate::script;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// In-flight calls by request id. `None` once the connection is gone.
type Pending = Arc<Mutex<Option<HashMap<u64, oneshot::Sender<Response>>>>>;

#[derive(Debug, Deserialize)]
struct Response {
    id: Option<u64>,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Value,
}

#[derive(Serialize)]
struct Request<'a, P> {
    method: String,
    params: [&'a P; 1],
    id: u64,
}

pub struct DelveClient {
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    pending: Pending,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
}

impl DelveClient {
    /// Connect to a Delve server started with `--headless --api-version=2`.
    pub async fn connect(address: &str, timeout: Duration) -> Result<Self, Error> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(address))
            .await
            .map_err(|_| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("connecting to {address} timed out after {timeout:?}"),
                ))
            })??;
        stream.set_nodelay(true)?;
        debug!(%address, "connected to delve");

        let (read_half, write_half) = stream.into_split();
        let pending: Pending = Arc::new(Mutex::new(Some(HashMap::new())));
        let reader = tokio::spawn(read_responses(read_half, Arc::clone(&pending)));

        Ok(Self {
            writer: tokio::sync::Mutex::new(write_half),
            pending,
            next_id: AtomicU64::new(1),
            reader,
        })
    }

    async fn send<P: Serialize>(&self, method: &str, params: &P, id: u64) -> Result<(), Error> {
        let mut line = serde_json::to_vec(&Request {
            method: format!("RPCServer.{method}"),
            params: [params],
            id,
        })?;
        line.push(b'\n');
        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: &P,
    ) -> Result<R, Error> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            let calls = pending.as_mut().ok_or(Error::Disconnected)?;
            calls.insert(id, tx);
        }

        trace!(method, id, "delve call");
        if let Err(err) = self.send(method, params, id).await {
            self.forget(id);
            return Err(err);
        }

        let response = rx.await.map_err(|_| Error::Disconnected)?;
        if !response.error.is_null() {
            let message = match response.error {
                Value::String(message) => message,
                other => other.to_string(),
            };
            return Err(Error::Rpc {
                method: method.to_owned(),
                message,
            });
        }
        Ok(serde_json::from_value(response.result)?)
    }

    /// Send a call whose reply is never awaited.
    async fn notify<P: Serialize>(&self, method: &str, params: &P) -> Result<(), Error> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        trace!(method, id, "delve call, reply ignored");
        self.send(method, params, id).await
    }

    fn forget(&self, id: u64) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(calls) = pending.as_mut() {
            calls.remove(&id);
        }
    }
}

impl Drop for DelveClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_responses(read_half: OwnedReadHalf, pending: Pending) {
    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => {
                let response: Response = match serde_json::from_str(&line) {
                    Ok(response) => response,
                    Err(err) => {
                        warn!(%err, "undecodable delve response");
                        continue;
                    }
                };
                let Some(id) = response.id else {
                    continue;
                };
                let waiter = pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .as_mut()
                    .and_then(|calls| calls.remove(&id));
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => trace!(id, "dropping unawaited delve reply"),
                }
            }
            Ok(None) => {
                debug!("delve closed the connection");
                break;
            }
            Err(err) => {
                warn!(%err, "reading from delve failed");
                break;
            }
        }
    }
    // Dropping the senders fails every outstanding call with `Disconnected`.
    pending.lock().unwrap_or_else(PoisonError::into_inner).take();
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CommandIn<'a> {
    name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CommandOut {
    state: WireState,
}

#[derive(Deserialize)]
struct WireState {
    #[serde(rename = "Running", default)]
    running: bool,
    #[serde(default)]
    exited: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ExecScriptIn<'a> {
    script: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ExecScriptOut {
    #[serde(default)]
    val: String,
}

#[derive(Serialize)]
struct Empty {}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FlightRecorderOut {
    #[serde(default)]
    data: BTreeMap<String, Vec<String>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ListBreakpointsIn {
    all: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BreakpointsOut {
    #[serde(default)]
    breakpoints: Vec<WireBreakpoint>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct BreakpointIn<'a> {
    breakpoint: &'a WireBreakpoint,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BreakpointOut {
    breakpoint: WireBreakpoint,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ClearBreakpointIn {
    id: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WireBreakpoint {
    #[serde(default)]
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    addrs: Vec<u64>,
    #[serde(default)]
    file: String,
    #[serde(default)]
    line: i64,
    #[serde(rename = "Script", default, skip_serializing_if = "String::is_empty")]
    script: String,
}

impl From<WireBreakpoint> for BreakpointInfo {
    fn from(bp: WireBreakpoint) -> Self {
        Self {
            id: bp.id,
            name: bp.name,
            addrs: bp.addrs,
            file: bp.file,
            line: bp.line,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct FindLocationIn<'a> {
    scope: EvalScope,
    loc: &'a str,
    find_instructions: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct EvalScope {
    #[serde(rename = "GoroutineID")]
    goroutine_id: i64,
    frame: i64,
    deferred_call: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FindLocationOut {
    #[serde(default)]
    locations: Vec<WireLocation>,
}

#[derive(Deserialize)]
struct WireLocation {
    pc: u64,
    #[serde(default)]
    file: String,
    #[serde(default)]
    line: i64,
    #[serde(default)]
    function: Option<WireFunction>,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct FilterIn<'a> {
    filter: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FuncsOut {
    #[serde(default)]
    funcs: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TypesOut {
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct TypeInfoIn<'a> {
    name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TypeInfoOut {
    #[serde(rename = "Type")]
    type_info: WireType,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireType {
    name: String,
    #[serde(default)]
    fields: Vec<WireField>,
    #[serde(default)]
    fields_not_loaded: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireField {
    name: String,
    #[serde(default)]
    type_name: String,
    #[serde(default)]
    embedded: bool,
}

impl From<WireType> for TypeInfo {
    fn from(typ: WireType) -> Self {
        Self {
            // Delve does not report this directly.
            has_fields: typ.fields_not_loaded || !typ.fields.is_empty(),
            name: typ.name,
            fields: typ
                .fields
                .into_iter()
                .map(|field| FieldInfo {
                    field_name: field.name,
                    type_name: field.type_name,
                    embedded: field.embedded,
                })
                .collect(),
            fields_not_loaded: typ.fields_not_loaded,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ListVarsIn<'a> {
    func_name: &'a str,
    #[serde(rename = "PCOffset")]
    pc_offset: i64,
    type_recursion_limit: i64,
    max_types: i64,
    max_fields_per_struct: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListVarsOut {
    #[serde(default)]
    vars: Vec<WireVar>,
    #[serde(default)]
    types: Vec<WireType>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireVar {
    name: String,
    #[serde(rename = "Type", default)]
    type_name: String,
    #[serde(default)]
    formal_parameter: bool,
    #[serde(default)]
    loclist_available: bool,
}

#[async_trait]
impl ProcessBackend for DelveClient {
    async fn halt(&self) -> Result<DebuggerState, Error> {
        let out: CommandOut = self.call("Command", &CommandIn { name: "halt" }).await?;
        Ok(DebuggerState {
            running: out.state.running,
            exited: out.state.exited,
        })
    }

    async fn resume(&self) -> Result<(), Error> {
        // The reply only arrives once the target stops again.
        self.notify("Command", &CommandIn { name: "continue" }).await
    }

    async fn run_stack_walk(&self, request: &StackWalkRequest) -> Result<StackWalkOutput, Error> {
        let source = script::stack_walk_script(request)?;
        let out: ExecScriptOut = self
            .call("ExecScript", &ExecScriptIn { script: &source })
            .await
            .map_err(|err| match err {
                Error::Rpc { message, .. } => Error::Script {
                    message,
                    output: String::new(),
                },
                other => other,
            })?;
        let json = script::starlark::unquote(&out.val).map_err(|err| {
            Error::MalformedScriptOutput(format!("script value is not a quoted string: {err}"))
        })?;
        StackWalkOutput::decode(&json)
    }

    async fn flight_recorder_data(&self) -> Result<FlightRecorderData, Error> {
        let out: FlightRecorderOut = self.call("GetFlightRecorderData", &Empty {}).await?;
        Ok(FlightRecorderData { entries: out.data })
    }

    async fn list_breakpoints(&self) -> Result<Vec<BreakpointInfo>, Error> {
        let out: BreakpointsOut = self
            .call("ListBreakpoints", &ListBreakpointsIn { all: false })
            .await?;
        Ok(out.breakpoints.into_iter().map(BreakpointInfo::from).collect())
    }

    async fn create_breakpoint(&self, breakpoint: &NewBreakpoint) -> Result<BreakpointInfo, Error> {
        let wire = WireBreakpoint {
            id: 0,
            name: breakpoint.name.clone(),
            addrs: breakpoint.addrs.clone(),
            file: breakpoint.file.clone(),
            line: breakpoint.line,
            script: breakpoint.script.clone(),
        };
        let out: BreakpointOut = self
            .call("CreateBreakpoint", &BreakpointIn { breakpoint: &wire })
            .await?;
        Ok(out.breakpoint.into())
    }

    async fn clear_breakpoint(&self, id: i64) -> Result<(), Error> {
        let _: Value = self.call("ClearBreakpoint", &ClearBreakpointIn { id }).await?;
        Ok(())
    }

    async fn resolve_frame_address(&self, frame: &str) -> Result<Vec<ResolvedLocation>, Error> {
        let params = FindLocationIn {
            scope: EvalScope {
                goroutine_id: -1,
                frame: 0,
                deferred_call: 0,
            },
            loc: frame,
            find_instructions: true,
        };
        let out: FindLocationOut = self.call("FindLocation", &params).await?;
        Ok(out
            .locations
            .into_iter()
            .map(|loc| ResolvedLocation {
                pc: loc.pc,
                file: loc.file,
                line: loc.line,
                function: loc.function.map(|function| function.name),
            })
            .collect())
    }

    async fn list_functions(&self, filter: &str) -> Result<Vec<String>, Error> {
        let out: FuncsOut = self.call("ListFunctions", &FilterIn { filter }).await?;
        Ok(out.funcs)
    }

    async fn list_types(&self, filter: &str) -> Result<Vec<String>, Error> {
        let out: TypesOut = self.call("ListTypes", &FilterIn { filter }).await?;
        Ok(out.types)
    }

    async fn get_type_info(&self, name: &str) -> Result<TypeInfo, Error> {
        let out: TypeInfoOut = self.call("GetTypeInfo", &TypeInfoIn { name }).await?;
        Ok(out.type_info.into())
    }

    async fn list_vars(&self, query: &ListVarsQuery) -> Result<(Vec<VarInfo>, Vec<TypeInfo>), Error> {
        let params = ListVarsIn {
            func_name: &query.func,
            pc_offset: query.pc_offset,
            type_recursion_limit: query.type_recursion_limit,
            max_types: query.max_types,
            max_fields_per_struct: query.max_fields_per_struct,
        };
        let out: ListVarsOut = self.call("ListAvailableVariables", &params).await?;
        let vars = out
            .vars
            .into_iter()
            .map(|var| VarInfo {
                var_name: var.name,
                type_name: var.type_name,
                formal_parameter: var.formal_parameter,
                loclist_available: var.loclist_available,
            })
            .collect();
        Ok((vars, out.types.into_iter().map(TypeInfo::from).collect()))
    }
}
