#![forbid(unsafe_code)]

use crate::domain::UnitId;
use serde::{Deserialize, Serialize};

/// Placeholder rendered for frames whose function the backend could not
/// resolve.
pub const UNKNOWN_FUNCTION: &str = "<unknown>";

/// One activation record, leaf-first within its unit's stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frame {
    /// Zero-based index from the leaf; 0 is the currently executing frame.
    pub index: usize,
    pub function: Option<String>,
    pub file: String,
    pub line: i64,
    pub pc: u64,
    /// Program counter relative to the function entry. Equals `pc` when the
    /// entry is unknown.
    pub pc_offset: u64,
}

impl Frame {
    /// Function name used for profile keys and stack text.
    pub fn function_name(&self) -> &str {
        self.function.as_deref().unwrap_or(UNKNOWN_FUNCTION)
    }
}

/// One schedulable thread of control captured by a single snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionUnit {
    pub id: UnitId,
    pub frames: Vec<Frame>,
}

impl ExecutionUnit {
    pub fn new(id: UnitId, frames: Vec<Frame>) -> Self {
        Self { id, frames }
    }
}
