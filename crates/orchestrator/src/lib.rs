#![forbid(unsafe_code)]

pub mod api;
pub mod backend;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod flight_recorder;
pub mod profile;
pub mod script;
pub mod service;
pub mod snapshot;

pub use api::{
    GetSnapshotRequest, GetTypeInfoRequest, GetTypeInfoResponse, ListFunctionsRequest,
    ListFunctionsResponse, ListTypesRequest, ListTypesResponse, ListVarsRequest, ListVarsResponse,
    ReconcileFlightRecorderRequest, Snapshot,
};
pub use backend::{DelveClient, ProcessBackend, StackWalkOutput, StackWalkRequest};
pub use coordinator::HaltCoordinator;
pub use domain::{
    CapturedExpressionRecord, ExecutionUnit, FlightRecorderEventSpec, Frame, FramesOfInterestSpec,
    UnitId,
};
pub use error::Error;
pub use flight_recorder::{ReconcileFailure, ReconcileReport};
pub use profile::{CallGraphProfile, ProfileBuilder};
pub use service::{Agent, AgentService};
pub use snapshot::{Correlation, correlate};
