#![forbid(unsafe_code)]

//! Request and response types of the agent's service surface.

use crate::backend::{FieldInfo, TypeInfo, VarInfo};
use crate::domain::{
    CapturedExpressionRecord, FlightRecorderData, FlightRecorderEventSpec, FramesOfInterestSpec,
    TypeSpec, UnitId,
};
use crate::profile::CallGraphProfile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetSnapshotRequest {
    pub frames_of_interest: FramesOfInterestSpec,
    pub type_specs: Vec<TypeSpec>,
    /// Attach the flight recorder's current data to the snapshot.
    pub include_flight_recorder: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub profile: CallGraphProfile,
    pub frames_of_interest: Vec<CapturedExpressionRecord>,
    pub stacks: BTreeMap<UnitId, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flight_recorder: Option<FlightRecorderData>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileFlightRecorderRequest {
    pub events: Vec<FlightRecorderEventSpec>,
}

/// `limit <= 0` means no limit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListFunctionsRequest {
    pub filter: String,
    pub limit: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFunctionsResponse {
    pub funcs: Vec<String>,
}

/// `limit <= 0` means no limit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListTypesRequest {
    pub filter: String,
    pub limit: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListTypesResponse {
    pub types: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTypeInfoRequest {
    pub type_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTypeInfoResponse {
    pub fields: Vec<FieldInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListVarsRequest {
    pub func_name: String,
    pub pc_offset: i64,
    pub type_recursion_limit: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListVarsResponse {
    pub vars: Vec<VarInfo>,
    /// Types referenced by `vars`, by name.
    pub types: BTreeMap<String, TypeInfo>,
}
