#![forbid(unsafe_code)]

use crate::domain::UnitId;
use crate::profile::UNIT_ID_LABEL;
use serde::{Deserialize, Serialize};

/// Deduplicated call-graph profile. The layout follows pprof's
/// `profile.proto`: every name is an index into `string_table`, and
/// function and location ids are content hashes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallGraphProfile {
    pub sample_type: Vec<ValueType>,
    pub samples: Vec<Sample>,
    pub mappings: Vec<Mapping>,
    pub locations: Vec<Location>,
    pub functions: Vec<Function>,
    pub string_table: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueType {
    pub r#type: i64,
    pub unit: i64,
}

/// One distinct call chain, leaf first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub location_ids: Vec<u64>,
    pub values: Vec<i64>,
    pub labels: Vec<Label>,
}

/// Numeric label. A sample shared by several units carries one label per
/// unit, all with the same key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub key: i64,
    pub num: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    pub id: u64,
    pub memory_start: u64,
    pub memory_limit: u64,
    pub build_id: i64,
    pub has_functions: bool,
    pub has_filenames: bool,
    pub has_line_numbers: bool,
    pub has_inline_frames: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: u64,
    pub mapping_id: u64,
    pub address: u64,
    pub lines: Vec<Line>,
    pub is_folded: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub function_id: u64,
    pub line: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub id: u64,
    pub name: i64,
    pub system_name: i64,
    pub filename: i64,
    pub start_line: i64,
}

impl CallGraphProfile {
    pub fn string(&self, idx: i64) -> Option<&str> {
        usize::try_from(idx)
            .ok()
            .and_then(|i| self.string_table.get(i))
            .map(String::as_str)
    }

    pub fn function(&self, id: u64) -> Option<&Function> {
        self.functions.iter().find(|f| f.id == id)
    }

    pub fn location(&self, id: u64) -> Option<&Location> {
        self.locations.iter().find(|l| l.id == id)
    }

    /// Units that shared the sample's call chain.
    pub fn sample_units(&self, sample: &Sample) -> Vec<UnitId> {
        sample
            .labels
            .iter()
            .filter(|label| self.string(label.key) == Some(UNIT_ID_LABEL))
            .map(|label| UnitId(label.num))
            .collect()
    }

    /// Function names of a sample's chain, leaf first.
    pub fn sample_functions(&self, sample: &Sample) -> Vec<&str> {
        sample
            .location_ids
            .iter()
            .filter_map(|id| self.location(*id))
            .filter_map(|loc| loc.lines.first())
            .filter_map(|line| self.function(line.function_id))
            .filter_map(|f| self.string(f.name))
            .collect()
    }
}
