#![forbid(unsafe_code)]

use crate::backend::StackWalkOutput;
use crate::domain::{
    CapturedExpressionRecord, ExecutionUnit, FramesOfInterestSpec, LocationId, UnitId,
};
use crate::error::Error;
use crate::profile::{CallGraphProfile, ProfileBuilder};
use crate::snapshot::stack_text;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

/// Normalized result of one stack walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Correlation {
    /// Units in ascending id order.
    pub units: Vec<ExecutionUnit>,
    /// Goroutine-dump rendering of every unit's stack.
    pub stacks: BTreeMap<UnitId, String>,
    /// Frame-of-interest hits ordered by unit id, frame index, then spec key.
    pub records: Vec<CapturedExpressionRecord>,
}

/// Match every frame of every unit against `spec` and collect the
/// expressions the walker captured there.
///
/// A frame matches a spec key when its function name ends with the key.
/// Frames without a function never match but still appear in the stack
/// text. Only captures for the matched keys' expressions are kept, in the
/// order the key lists them.
pub fn correlate(spec: &FramesOfInterestSpec, output: &StackWalkOutput) -> Result<Correlation, Error> {
    output.validate()?;

    let mut raw_units: Vec<_> = output.units.iter().collect();
    raw_units.sort_by_key(|unit| unit.id);

    let mut correlation = Correlation::default();
    for raw in raw_units {
        let unit = raw.to_unit();
        for frame in &unit.frames {
            let Some(function) = frame.function.as_deref() else {
                continue;
            };
            let captured = raw.captures.get(&frame.index);
            for (key, exprs) in spec.matches(function) {
                for expr in exprs {
                    let value = captured
                        .and_then(|values| values.iter().find(|c| &c.expr == expr))
                        .map(|c| c.value.clone());
                    if let Some(value) = value {
                        correlation.records.push(CapturedExpressionRecord {
                            unit_id: unit.id,
                            frame_index: frame.index,
                            frame: key.to_owned(),
                            expr: expr.clone(),
                            value,
                        });
                    }
                }
            }
        }
        correlation.stacks.insert(unit.id, stack_text::render(&unit));
        correlation.units.push(unit);
    }
    Ok(correlation)
}

impl Correlation {
    /// Units grouped by identical call chain, groups ordered by their
    /// lowest unit id.
    pub fn chain_groups(&self) -> Vec<(&ExecutionUnit, Vec<UnitId>)> {
        let mut index: FxHashMap<Vec<LocationId>, usize> = FxHashMap::default();
        let mut groups: Vec<(&ExecutionUnit, Vec<UnitId>)> = Vec::new();
        for unit in &self.units {
            let key: Vec<LocationId> = unit
                .frames
                .iter()
                .map(|frame| LocationId::of(frame.function_name(), frame.pc_offset))
                .collect();
            match index.get(&key) {
                Some(&group) => groups[group].1.push(unit.id),
                None => {
                    index.insert(key, groups.len());
                    groups.push((unit, vec![unit.id]));
                }
            }
        }
        groups
    }

    /// Fold every distinct chain into a call-graph profile.
    pub fn build_profile(&self) -> CallGraphProfile {
        let mut builder = ProfileBuilder::new();
        for (unit, ids) in self.chain_groups() {
            builder.add_sample(&unit.frames, &ids);
        }
        builder.build()
    }
}
