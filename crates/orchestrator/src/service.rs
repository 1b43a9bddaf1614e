#![forbid(unsafe_code)]

use crate::api::{
    GetSnapshotRequest, GetTypeInfoRequest, GetTypeInfoResponse, ListFunctionsRequest,
    ListFunctionsResponse, ListTypesRequest, ListTypesResponse, ListVarsRequest, ListVarsResponse,
    ReconcileFlightRecorderRequest, Snapshot,
};
use crate::backend::{ListVarsQuery, ProcessBackend, StackWalkRequest};
use crate::coordinator::HaltCoordinator;
use crate::error::Error;
use crate::flight_recorder::{self, ReconcileReport};
use crate::snapshot;
use async_trait::async_trait;
use config::{CaptureLimits, Config, Introspection};
use futures::FutureExt;
use std::sync::Arc;
use tracing::{debug, info};

/// The agent's service surface, independent of any transport.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Halt the target, walk every stack, and return the profile, the
    /// frame-of-interest captures and the raw stacks.
    async fn get_snapshot(&self, request: GetSnapshotRequest) -> Result<Snapshot, Error>;

    async fn reconcile_flight_recorder(
        &self,
        request: ReconcileFlightRecorderRequest,
    ) -> Result<ReconcileReport, Error>;

    async fn list_functions(&self, request: ListFunctionsRequest) -> Result<ListFunctionsResponse, Error>;

    async fn list_types(&self, request: ListTypesRequest) -> Result<ListTypesResponse, Error>;

    async fn get_type_info(&self, request: GetTypeInfoRequest) -> Result<GetTypeInfoResponse, Error>;

    async fn list_vars(&self, request: ListVarsRequest) -> Result<ListVarsResponse, Error>;
}

/// [`Agent`] backed by one [`ProcessBackend`]. Every call goes through the
/// same [`HaltCoordinator`], so concurrent requests take turns.
pub struct AgentService {
    coordinator: HaltCoordinator,
    capture: CaptureLimits,
    introspection: Introspection,
}

impl AgentService {
    pub fn new(config: &Config, backend: Arc<dyn ProcessBackend>) -> Self {
        Self {
            coordinator: HaltCoordinator::new(backend),
            capture: config.capture.clamp(),
            introspection: config.introspection,
        }
    }

    pub fn coordinator(&self) -> &HaltCoordinator {
        &self.coordinator
    }
}

fn truncate(mut names: Vec<String>, limit: i64) -> Vec<String> {
    match usize::try_from(limit) {
        Ok(limit) if limit > 0 => names.truncate(limit),
        _ => {}
    }
    names
}

#[async_trait]
impl Agent for AgentService {
    async fn get_snapshot(&self, request: GetSnapshotRequest) -> Result<Snapshot, Error> {
        request.frames_of_interest.validate()?;
        let walk = StackWalkRequest::new(request.frames_of_interest.clone(), self.capture)
            .with_type_specs(request.type_specs);
        let include_flight_recorder = request.include_flight_recorder;

        let (output, flight_recorder) = self
            .coordinator
            .with_halt(|target| {
                async move {
                    let output = target.run_stack_walk(&walk).await?;
                    let flight_recorder = if include_flight_recorder {
                        Some(target.flight_recorder_data().await?)
                    } else {
                        None
                    };
                    Ok::<_, Error>((output, flight_recorder))
                }
                .boxed()
            })
            .await?;

        let correlation = snapshot::correlate(&request.frames_of_interest, &output)?;
        let profile = correlation.build_profile();
        info!(
            units = correlation.units.len(),
            samples = profile.samples.len(),
            captures = correlation.records.len(),
            "snapshot taken"
        );
        Ok(Snapshot {
            profile,
            frames_of_interest: correlation.records,
            stacks: correlation.stacks,
            flight_recorder,
        })
    }

    async fn reconcile_flight_recorder(
        &self,
        request: ReconcileFlightRecorderRequest,
    ) -> Result<ReconcileReport, Error> {
        let events = request.events;
        let report = self
            .coordinator
            .with_halt(|target| async move { flight_recorder::apply(target, &events).await }.boxed())
            .await?;
        info!(
            installed = report.installed.len(),
            removed = report.removed.len(),
            untouched = report.untouched.len(),
            "flight recorder reconciled"
        );
        Ok(report)
    }

    async fn list_functions(&self, request: ListFunctionsRequest) -> Result<ListFunctionsResponse, Error> {
        let filter = request.filter;
        let funcs = self
            .coordinator
            .with_halt(|target| async move { target.list_functions(&filter).await }.boxed())
            .await?;
        Ok(ListFunctionsResponse {
            funcs: truncate(funcs, request.limit),
        })
    }

    async fn list_types(&self, request: ListTypesRequest) -> Result<ListTypesResponse, Error> {
        let filter = request.filter;
        let types = self
            .coordinator
            .with_halt(|target| async move { target.list_types(&filter).await }.boxed())
            .await?;
        Ok(ListTypesResponse {
            types: truncate(types, request.limit),
        })
    }

    async fn get_type_info(&self, request: GetTypeInfoRequest) -> Result<GetTypeInfoResponse, Error> {
        let name = request.type_name;
        let info = self
            .coordinator
            .with_halt(|target| async move { target.get_type_info(&name).await }.boxed())
            .await?;
        Ok(GetTypeInfoResponse { fields: info.fields })
    }

    async fn list_vars(&self, request: ListVarsRequest) -> Result<ListVarsResponse, Error> {
        let query = ListVarsQuery {
            func: request.func_name,
            pc_offset: request.pc_offset,
            type_recursion_limit: request.type_recursion_limit,
            max_types: self.introspection.max_types,
            max_fields_per_struct: self.introspection.max_fields_per_struct,
        };
        debug!(func = %query.func, pc_offset = query.pc_offset, "listing variables");
        let (vars, types) = self
            .coordinator
            .with_halt(|target| async move { target.list_vars(&query).await }.boxed())
            .await?;
        Ok(ListVarsResponse {
            vars,
            types: types.into_iter().map(|typ| (typ.name.clone(), typ)).collect(),
        })
    }
}
