#![forbid(unsafe_code)]

use crate::domain::{Frame, FunctionId, LocationId, UnitId};
use crate::profile::{
    CallGraphProfile, Function, Label, Line, Location, Mapping, Sample, StringTable, ValueType,
};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use tracing::trace;

/// Key of the numeric label listing the units that shared a sample's chain.
pub const UNIT_ID_LABEL: &str = "unit_id";

/// Build id of the single placeholder mapping. The agent does no symbol
/// resolution, so every location lives in one mapping spanning all
/// addresses.
pub const DUMMY_BUILD_ID: &str = "dummy-build-id";

const MAPPING_ID: u64 = 1;

#[derive(Debug, Clone)]
struct FunctionEntry {
    name: String,
    filename: String,
}

#[derive(Debug, Clone, Copy)]
struct LocationEntry {
    function_id: FunctionId,
    line: i64,
}

#[derive(Debug, Clone)]
struct SampleEntry {
    locations: Vec<LocationId>,
    units: Vec<UnitId>,
}

/// Folds call chains into a [`CallGraphProfile`].
///
/// Functions and locations are keyed by content hashes and kept in id order,
/// and strings are interned only when the profile is built, walking the
/// tables in that order. When frames sharing an id disagree on a function's
/// file or a location's line, the smallest value is kept. The resulting
/// function, location and string tables therefore depend only on the set of
/// chains added, not on the order they were added in. Only the sample list
/// reflects insertion order.
///
/// One builder serves one snapshot; it is never shared across requests.
#[derive(Debug, Default)]
pub struct ProfileBuilder {
    functions: BTreeMap<FunctionId, FunctionEntry>,
    locations: BTreeMap<LocationId, LocationEntry>,
    samples: Vec<SampleEntry>,
}

impl ProfileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one call chain (leaf first) observed on every unit in `units`.
    ///
    /// Re-adding a chain never duplicates functions, locations or strings;
    /// it only appends a sample.
    pub fn add_sample(&mut self, chain: &[Frame], units: &[UnitId]) {
        let locations = chain
            .iter()
            .map(|frame| self.get_or_add_location(frame))
            .collect();

        let mut units = units.to_vec();
        units.sort_unstable();
        units.dedup();

        self.samples.push(SampleEntry { locations, units });
    }

    pub fn num_functions(&self) -> usize {
        self.functions.len()
    }

    pub fn num_locations(&self) -> usize {
        self.locations.len()
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    fn get_or_add_location(&mut self, frame: &Frame) -> LocationId {
        let name = frame.function_name();
        let id = LocationId::of(name, frame.pc_offset);
        let function_id = self.get_or_add_function(frame);
        match self.locations.entry(id) {
            Entry::Occupied(mut entry) => {
                let entry = entry.get_mut();
                entry.line = entry.line.min(frame.line);
            }
            Entry::Vacant(entry) => {
                entry.insert(LocationEntry {
                    function_id,
                    line: frame.line,
                });
                trace!(function = name, pc_offset = frame.pc_offset, "new location");
            }
        }
        id
    }

    fn get_or_add_function(&mut self, frame: &Frame) -> FunctionId {
        let name = frame.function_name();
        let id = FunctionId::of(name);
        match self.functions.entry(id) {
            Entry::Occupied(mut entry) => {
                let entry = entry.get_mut();
                if frame.file < entry.filename {
                    entry.filename.clone_from(&frame.file);
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(FunctionEntry {
                    name: name.to_owned(),
                    filename: frame.file.clone(),
                });
            }
        }
        id
    }

    pub fn build(self) -> CallGraphProfile {
        let mut strings = StringTable::new();

        let sample_type = vec![ValueType {
            r#type: strings.intern("goroutines"),
            unit: strings.intern("count"),
        }];
        let label_key = strings.intern(UNIT_ID_LABEL);

        let mappings = vec![Mapping {
            id: MAPPING_ID,
            memory_start: 0,
            memory_limit: u64::MAX,
            build_id: strings.intern(DUMMY_BUILD_ID),
            has_functions: true,
            has_filenames: true,
            has_line_numbers: true,
            has_inline_frames: true,
        }];

        let functions = self
            .functions
            .iter()
            .map(|(id, entry)| Function {
                id: id.0,
                name: strings.intern(&entry.name),
                system_name: strings.intern(""),
                filename: strings.intern(&entry.filename),
                start_line: 0,
            })
            .collect();

        let locations = self
            .locations
            .iter()
            .map(|(id, entry)| Location {
                id: id.0,
                mapping_id: MAPPING_ID,
                // Frames carry no stable address; the id stands in for one.
                address: id.0,
                lines: vec![Line {
                    function_id: entry.function_id.0,
                    line: entry.line,
                }],
                is_folded: false,
            })
            .collect();

        let samples = self
            .samples
            .into_iter()
            .map(|entry| Sample {
                location_ids: entry.locations.iter().map(|id| id.0).collect(),
                values: vec![entry.units.len() as i64],
                labels: entry
                    .units
                    .iter()
                    .map(|unit| Label {
                        key: label_key,
                        num: unit.0,
                    })
                    .collect(),
            })
            .collect();

        CallGraphProfile {
            sample_type,
            samples,
            mappings,
            locations,
            functions,
            string_table: strings.into_vec(),
        }
    }
}
