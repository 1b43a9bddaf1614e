#![forbid(unsafe_code)]

use crate::domain::{CapturedExpr, ExecutionUnit, Frame, FramesOfInterestSpec, TypeSpec, UnitId};
use crate::error::Error;
use config::CaptureLimits;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Everything the in-target stack walker needs, passed to it as data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackWalkRequest {
    pub frames_of_interest: FramesOfInterestSpec,
    pub type_specs: Vec<TypeSpec>,
    pub limits: CaptureLimits,
}

impl StackWalkRequest {
    pub fn new(frames_of_interest: FramesOfInterestSpec, limits: CaptureLimits) -> Self {
        Self {
            frames_of_interest,
            type_specs: Vec::new(),
            limits,
        }
    }

    pub fn with_type_specs(mut self, type_specs: Vec<TypeSpec>) -> Self {
        self.type_specs = type_specs;
        self
    }
}

/// Raw result of one stack walk, as produced by the in-target script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackWalkOutput {
    pub units: Vec<RawUnit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawUnit {
    pub id: i64,
    #[serde(default)]
    pub frames: Vec<RawFrame>,
    /// Captures keyed by the leaf-first index of the frame they were taken at.
    #[serde(default)]
    pub captures: BTreeMap<usize, Vec<CapturedExpr>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFrame {
    #[serde(default)]
    pub function: Option<String>,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub line: i64,
    pub pc: u64,
    /// Entry address of the frame's function, when known.
    #[serde(default)]
    pub entry: Option<u64>,
}

impl RawFrame {
    fn into_frame(self, index: usize) -> Frame {
        let pc_offset = match self.entry {
            Some(entry) if entry <= self.pc => self.pc - entry,
            _ => self.pc,
        };
        Frame {
            index,
            function: self.function,
            file: self.file,
            line: self.line,
            pc: self.pc,
            pc_offset,
        }
    }
}

impl RawUnit {
    pub fn to_unit(&self) -> ExecutionUnit {
        let frames = self
            .frames
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, frame)| frame.into_frame(index))
            .collect();
        ExecutionUnit::new(UnitId(self.id), frames)
    }
}

impl StackWalkOutput {
    /// Decode the script's JSON document and check its shape.
    pub fn decode(json: &str) -> Result<Self, Error> {
        let output: Self = serde_json::from_str(json)
            .map_err(|err| Error::MalformedScriptOutput(err.to_string()))?;
        output.validate()?;
        Ok(output)
    }

    /// Unit ids must be unique and every capture must point at a walked frame.
    pub fn validate(&self) -> Result<(), Error> {
        let mut seen = HashSet::with_capacity(self.units.len());
        for unit in &self.units {
            if !seen.insert(unit.id) {
                return Err(Error::MalformedScriptOutput(format!(
                    "duplicate unit id {}",
                    unit.id
                )));
            }
            if let Some((&index, _)) = unit
                .captures
                .iter()
                .find(|(index, _)| **index >= unit.frames.len())
            {
                return Err(Error::MalformedScriptOutput(format!(
                    "unit {} has captures for frame {index} but only {} frames",
                    unit.id,
                    unit.frames.len()
                )));
            }
        }
        Ok(())
    }
}
