#![forbid(unsafe_code)]

mod builder;
mod model;
pub mod pprof;
mod strings;

pub use builder::{DUMMY_BUILD_ID, ProfileBuilder, UNIT_ID_LABEL};
pub use model::{CallGraphProfile, Function, Label, Line, Location, Mapping, Sample, ValueType};
pub use strings::StringTable;
