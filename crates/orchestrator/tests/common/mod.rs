#![allow(dead_code)]

use async_trait::async_trait;
use orchestrator::backend::{
    BreakpointInfo, DebuggerState, FieldInfo, ListVarsQuery, NewBreakpoint, ProcessBackend,
    RawFrame, RawUnit, ResolvedLocation, StackWalkOutput, StackWalkRequest, TypeInfo, VarInfo,
};
use orchestrator::domain::{CapturedExpr, FlightRecorderData};
use orchestrator::error::Error;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Backend replaying a fixed target, recording the calls it receives.
#[derive(Default)]
pub struct ScriptedTarget {
    pub units: Vec<RawUnit>,
    pub recorded: FlightRecorderData,
    pub locations: BTreeMap<String, Vec<u64>>,
    pub breakpoints: Mutex<Vec<BreakpointInfo>>,
    pub calls: Mutex<Vec<String>>,
    pub requests: Mutex<Vec<StackWalkRequest>>,
}

impl ScriptedTarget {
    pub fn with_unit(mut self, id: i64, chain: &[(&str, u64)]) -> Self {
        self.units.push(RawUnit {
            id,
            frames: chain
                .iter()
                .map(|&(function, offset)| RawFrame {
                    function: Some(function.to_owned()),
                    file: format!("/src/{function}.go"),
                    line: 10,
                    pc: 0x1000 + offset,
                    entry: Some(0x1000),
                })
                .collect(),
            captures: BTreeMap::new(),
        });
        self
    }

    pub fn with_capture(mut self, id: i64, frame: usize, expr: &str, value: &str) -> Self {
        if let Some(unit) = self.units.iter_mut().find(|unit| unit.id == id) {
            unit.captures.entry(frame).or_default().push(CapturedExpr {
                expr: expr.to_owned(),
                value: value.to_owned(),
            });
        }
        self
    }

    pub fn with_location(mut self, frame: &str, pcs: &[u64]) -> Self {
        self.locations.insert(frame.to_owned(), pcs.to_vec());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn forget_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ProcessBackend for ScriptedTarget {
    async fn halt(&self) -> Result<DebuggerState, Error> {
        self.record("halt".into());
        Ok(DebuggerState::default())
    }

    async fn resume(&self) -> Result<(), Error> {
        self.record("resume".into());
        Ok(())
    }

    async fn run_stack_walk(&self, request: &StackWalkRequest) -> Result<StackWalkOutput, Error> {
        self.record("stack_walk".into());
        self.requests.lock().unwrap().push(request.clone());
        Ok(StackWalkOutput {
            units: self.units.clone(),
        })
    }

    async fn flight_recorder_data(&self) -> Result<FlightRecorderData, Error> {
        self.record("flight_recorder_data".into());
        Ok(self.recorded.clone())
    }

    async fn list_breakpoints(&self) -> Result<Vec<BreakpointInfo>, Error> {
        self.record("list_breakpoints".into());
        Ok(self.breakpoints.lock().unwrap().clone())
    }

    async fn create_breakpoint(&self, breakpoint: &NewBreakpoint) -> Result<BreakpointInfo, Error> {
        self.record(format!("create:{}", breakpoint.name));
        let mut breakpoints = self.breakpoints.lock().unwrap();
        let info = BreakpointInfo {
            id: breakpoints.iter().map(|bp| bp.id).max().unwrap_or(0).max(0) + 1,
            name: breakpoint.name.clone(),
            addrs: breakpoint.addrs.clone(),
            file: breakpoint.file.clone(),
            line: breakpoint.line,
        };
        breakpoints.push(info.clone());
        Ok(info)
    }

    async fn clear_breakpoint(&self, id: i64) -> Result<(), Error> {
        self.record(format!("clear:{id}"));
        self.breakpoints.lock().unwrap().retain(|bp| bp.id != id);
        Ok(())
    }

    async fn resolve_frame_address(&self, frame: &str) -> Result<Vec<ResolvedLocation>, Error> {
        self.record(format!("resolve:{frame}"));
        Ok(self
            .locations
            .get(frame)
            .into_iter()
            .flatten()
            .map(|&pc| ResolvedLocation {
                pc,
                file: "/src/main.go".into(),
                line: 42,
                function: Some(frame.to_owned()),
            })
            .collect())
    }

    async fn list_functions(&self, _filter: &str) -> Result<Vec<String>, Error> {
        Ok(Vec::new())
    }

    async fn list_types(&self, _filter: &str) -> Result<Vec<String>, Error> {
        Ok(Vec::new())
    }

    async fn get_type_info(&self, name: &str) -> Result<TypeInfo, Error> {
        Ok(TypeInfo {
            name: name.to_owned(),
            has_fields: true,
            fields: vec![FieldInfo {
                field_name: "ID".into(),
                type_name: "int".into(),
                embedded: false,
            }],
            fields_not_loaded: false,
        })
    }

    async fn list_vars(&self, query: &ListVarsQuery) -> Result<(Vec<VarInfo>, Vec<TypeInfo>), Error> {
        self.record(format!(
            "list_vars:{}:{}:{}",
            query.func, query.max_types, query.max_fields_per_struct
        ));
        let var = VarInfo {
            var_name: "req".into(),
            type_name: "*main.Request".into(),
            formal_parameter: true,
            loclist_available: true,
        };
        let typ = TypeInfo {
            name: "*main.Request".into(),
            has_fields: true,
            fields: Vec::new(),
            fields_not_loaded: true,
        };
        Ok((vec![var], vec![typ]))
    }
}
