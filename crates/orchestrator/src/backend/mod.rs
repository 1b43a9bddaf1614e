#![forbid(unsafe_code)]

pub mod delve;
#[cfg(test)]
pub(crate) mod fake;
mod stack_walk;
mod types;

pub use delve::DelveClient;
pub use stack_walk::{RawFrame, RawUnit, StackWalkOutput, StackWalkRequest};
pub use types::{
    BreakpointInfo, DebuggerState, FieldInfo, ListVarsQuery, NewBreakpoint, ResolvedLocation,
    TypeInfo, VarInfo,
};

use crate::domain::FlightRecorderData;
use crate::error::Error;
use async_trait::async_trait;

/// The remote process-control backend the agent orchestrates.
///
/// Every call blocks the calling task until the backend answers, except
/// [`ProcessBackend::resume`], which only waits until the resume command has
/// been sent. Implementations must not be asked to halt concurrently; the
/// [`HaltCoordinator`](crate::coordinator::HaltCoordinator) serializes that.
#[async_trait]
pub trait ProcessBackend: Send + Sync {
    /// Stop every execution unit of the target.
    async fn halt(&self) -> Result<DebuggerState, Error>;

    /// Tell the target to continue. Returns once the command is dispatched;
    /// the target may then run indefinitely.
    async fn resume(&self) -> Result<(), Error>;

    /// Walk every unit's stack and capture the requested expressions.
    async fn run_stack_walk(&self, request: &StackWalkRequest) -> Result<StackWalkOutput, Error>;

    /// Values recorded so far by flight-recorder breakpoints.
    async fn flight_recorder_data(&self) -> Result<FlightRecorderData, Error>;

    async fn list_breakpoints(&self) -> Result<Vec<BreakpointInfo>, Error>;

    async fn create_breakpoint(&self, breakpoint: &NewBreakpoint) -> Result<BreakpointInfo, Error>;

    async fn clear_breakpoint(&self, id: i64) -> Result<(), Error>;

    /// Resolve a location spec to instruction addresses.
    async fn resolve_frame_address(&self, frame: &str) -> Result<Vec<ResolvedLocation>, Error>;

    async fn list_functions(&self, filter: &str) -> Result<Vec<String>, Error>;

    async fn list_types(&self, filter: &str) -> Result<Vec<String>, Error>;

    async fn get_type_info(&self, name: &str) -> Result<TypeInfo, Error>;

    async fn list_vars(&self, query: &ListVarsQuery) -> Result<(Vec<VarInfo>, Vec<TypeInfo>), Error>;
}
