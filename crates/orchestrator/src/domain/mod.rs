#![forbid(unsafe_code)]

mod capture;
mod event;
mod frame;
mod ids;
mod spec;

pub use capture::{CapturedExpr, CapturedExpressionRecord, FlightRecorderData};
pub use event::{FlightRecorderEventSpec, FlightRecorderKey, GOROUTINE_ID_KEY};
pub use frame::{ExecutionUnit, Frame, UNKNOWN_FUNCTION};
pub use ids::{FunctionId, LocationId, UnitId};
pub use spec::{FramesOfInterestSpec, LoadSpec, TypeSpec};
