#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebuggerState {
    pub running: bool,
    pub exited: bool,
}

/// A breakpoint installed in the backend. The agent only ever refers to it
/// by `name` and `id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakpointInfo {
    pub id: i64,
    pub name: String,
    pub addrs: Vec<u64>,
    pub file: String,
    pub line: i64,
}

impl BreakpointInfo {
    /// Backend-internal breakpoints use negative ids and user breakpoints
    /// without a name cannot carry an event identity.
    pub fn is_flight_recorder_candidate(&self) -> bool {
        self.id > 0 && !self.name.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBreakpoint {
    pub name: String,
    pub addrs: Vec<u64>,
    pub file: String,
    pub line: i64,
    /// Script run in the target's scripting sandbox every time the
    /// breakpoint is hit.
    pub script: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub pc: u64,
    pub file: String,
    pub line: i64,
    pub function: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub field_name: String,
    pub type_name: String,
    pub embedded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub name: String,
    pub has_fields: bool,
    pub fields: Vec<FieldInfo>,
    pub fields_not_loaded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarInfo {
    pub var_name: String,
    pub type_name: String,
    pub formal_parameter: bool,
    pub loclist_available: bool,
}

/// Variables available at `pc_offset` into `func`, with their types loaded
/// `type_recursion_limit` levels deep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListVarsQuery {
    pub func: String,
    pub pc_offset: i64,
    pub type_recursion_limit: i64,
    pub max_types: i64,
    pub max_fields_per_struct: i64,
}
