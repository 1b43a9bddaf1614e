//! In-memory backend that records every call.

use crate::backend::{
    BreakpointInfo, DebuggerState, ListVarsQuery, NewBreakpoint, ProcessBackend,
    ResolvedLocation, StackWalkOutput, StackWalkRequest, TypeInfo, VarInfo,
};
use crate::domain::FlightRecorderData;
use crate::error::Error;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

#[derive(Default)]
pub(crate) struct FakeBackend {
    pub calls: Mutex<Vec<String>>,
    pub fail_halt: bool,
    pub fail_resume: bool,
    pub output: StackWalkOutput,
    pub breakpoints: Mutex<Vec<BreakpointInfo>>,
    pub locations: BTreeMap<String, Vec<ResolvedLocation>>,
    pub fail_clear: HashSet<i64>,
    pub fail_create: HashSet<String>,
}

impl FakeBackend {
    pub fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .breakpoints
            .lock()
            .unwrap()
            .iter()
            .filter(|bp| bp.id > 0)
            .map(|bp| bp.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn with_location(mut self, frame: &str, pcs: &[u64]) -> Self {
        let locations = pcs
            .iter()
            .map(|&pc| ResolvedLocation {
                pc,
                file: "main.go".into(),
                line: 10,
                function: Some(frame.into()),
            })
            .collect();
        self.locations.insert(frame.into(), locations);
        self
    }

    pub fn with_breakpoint(self, id: i64, name: &str) -> Self {
        self.breakpoints.lock().unwrap().push(BreakpointInfo {
            id,
            name: name.into(),
            ..BreakpointInfo::default()
        });
        self
    }
}

#[async_trait]
impl ProcessBackend for FakeBackend {
    async fn halt(&self) -> Result<DebuggerState, Error> {
        self.record("halt");
        if self.fail_halt {
            return Err(Error::Disconnected);
        }
        Ok(DebuggerState::default())
    }

    async fn resume(&self) -> Result<(), Error> {
        self.record("resume");
        if self.fail_resume {
            return Err(Error::Disconnected);
        }
        Ok(())
    }

    async fn run_stack_walk(&self, _request: &StackWalkRequest) -> Result<StackWalkOutput, Error> {
        self.record("stack_walk");
        Ok(self.output.clone())
    }

    async fn flight_recorder_data(&self) -> Result<FlightRecorderData, Error> {
        self.record("flight_recorder_data");
        Ok(FlightRecorderData::default())
    }

    async fn list_breakpoints(&self) -> Result<Vec<BreakpointInfo>, Error> {
        self.record("list_breakpoints");
        Ok(self.breakpoints.lock().unwrap().clone())
    }

    async fn create_breakpoint(&self, breakpoint: &NewBreakpoint) -> Result<BreakpointInfo, Error> {
        self.record(format!("create:{}", breakpoint.name));
        if self.fail_create.contains(&breakpoint.name) {
            return Err(Error::Rpc {
                method: "CreateBreakpoint".into(),
                message: "refused".into(),
            });
        }
        let mut breakpoints = self.breakpoints.lock().unwrap();
        let id = breakpoints.iter().map(|bp| bp.id).max().unwrap_or(0).max(0) + 1;
        let info = BreakpointInfo {
            id,
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
        if self.fail_clear.contains(&id) {
            return Err(Error::Rpc {
                method: "ClearBreakpoint".into(),
                message: "busy".into(),
            });
        }
        self.breakpoints.lock().unwrap().retain(|bp| bp.id != id);
        Ok(())
    }

    async fn resolve_frame_address(&self, frame: &str) -> Result<Vec<ResolvedLocation>, Error> {
        self.record(format!("resolve:{frame}"));
        Ok(self.locations.get(frame).cloned().unwrap_or_default())
    }

    async fn list_functions(&self, filter: &str) -> Result<Vec<String>, Error> {
        self.record(format!("list_functions:{filter}"));
        Ok(vec!["main.a".into(), "main.b".into(), "main.c".into()])
    }

    async fn list_types(&self, filter: &str) -> Result<Vec<String>, Error> {
        self.record(format!("list_types:{filter}"));
        Ok(vec!["main.T".into(), "main.U".into()])
    }

    async fn get_type_info(&self, name: &str) -> Result<TypeInfo, Error> {
        self.record(format!("get_type_info:{name}"));
        Ok(TypeInfo {
            name: name.into(),
            has_fields: false,
            fields: Vec::new(),
            fields_not_loaded: false,
        })
    }

    async fn list_vars(&self, query: &ListVarsQuery) -> Result<(Vec<VarInfo>, Vec<TypeInfo>), Error> {
        self.record(format!("list_vars:{}", query.func));
        Ok((Vec::new(), Vec::new()))
    }
}
