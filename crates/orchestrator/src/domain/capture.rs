#![forbid(unsafe_code)]

use crate::domain::UnitId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The value of one expression evaluated at one frame, rendered as text by
/// the backend within the configured capture limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedExpr {
    pub expr: String,
    pub value: String,
}

/// One frame-of-interest hit: an expression captured at `frame_index` of
/// unit `unit_id`, where the frame matched the spec key `frame`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedExpressionRecord {
    pub unit_id: UnitId,
    pub frame_index: usize,
    pub frame: String,
    pub expr: String,
    pub value: String,
}

/// Rolling values recorded by flight-recorder breakpoints, by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightRecorderData {
    pub entries: BTreeMap<String, Vec<String>>,
}
