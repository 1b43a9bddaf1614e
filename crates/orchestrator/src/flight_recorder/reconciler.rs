#![forbid(unsafe_code)]

//! Converges the backend's breakpoints onto a desired set of
//! flight-recorder events.
//!
//! Events and breakpoints are matched by name (`frame-expr`). Matching
//! breakpoints are left alone, unmatched ones are cleared, and events with
//! no breakpoint get one. A second pass with the same events does nothing.

use crate::backend::{BreakpointInfo, NewBreakpoint, ProcessBackend};
use crate::domain::FlightRecorderEventSpec;
use crate::error::Error;
use crate::script;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// What one reconciliation pass needs to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan<'a> {
    pub to_install: Vec<&'a FlightRecorderEventSpec>,
    pub to_remove: Vec<&'a BreakpointInfo>,
    pub untouched: Vec<String>,
}

impl ReconcilePlan<'_> {
    pub fn is_noop(&self) -> bool {
        self.to_install.is_empty() && self.to_remove.is_empty()
    }
}

/// Diff `desired` against `installed`.
///
/// Only named breakpoints with a positive id take part; the rest belong to
/// the backend or to a human. When two events share a name the first one
/// wins, and when two breakpoints share a name the extras are removed.
pub fn plan<'a>(
    desired: &'a [FlightRecorderEventSpec],
    installed: &'a [BreakpointInfo],
) -> ReconcilePlan<'a> {
    let mut seen = HashSet::new();
    let wanted: Vec<(String, &FlightRecorderEventSpec)> = desired
        .iter()
        .filter_map(|event| {
            let name = event.name();
            seen.insert(name.clone()).then_some((name, event))
        })
        .collect();

    let mut plan = ReconcilePlan::default();
    let mut kept = HashSet::new();
    for bp in installed.iter().filter(|bp| bp.is_flight_recorder_candidate()) {
        if seen.contains(&bp.name) && kept.insert(bp.name.as_str()) {
            plan.untouched.push(bp.name.clone());
        } else {
            plan.to_remove.push(bp);
        }
    }
    plan.to_install = wanted
        .into_iter()
        .filter(|(name, _)| !kept.contains(name.as_str()))
        .map(|(_, event)| event)
        .collect();
    plan
}

/// One event or breakpoint that could not be converged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileFailure {
    pub name: String,
    pub error: String,
}

impl ReconcileFailure {
    fn new(name: impl Into<String>, error: &Error) -> Self {
        Self {
            name: name.into(),
            error: error.to_string(),
        }
    }

    pub fn summary(failures: &[ReconcileFailure]) -> String {
        failures
            .iter()
            .map(|f| format!("{}: {}", f.name, f.error))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Outcome of a pass in which every item converged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub installed: Vec<String>,
    pub removed: Vec<String>,
    pub untouched: Vec<String>,
}

/// Run one reconciliation pass. The target must already be halted.
///
/// Invalid events fail the whole request before anything changes. After
/// that, a failing item is recorded and the pass moves on; if any item
/// failed the result is [`Error::Reconcile`] and the items before it stay
/// applied.
pub async fn apply(
    backend: &dyn ProcessBackend,
    desired: &[FlightRecorderEventSpec],
) -> Result<ReconcileReport, Error> {
    for event in desired {
        event.validate()?;
    }

    let installed = backend.list_breakpoints().await?;
    let plan = plan(desired, &installed);
    let mut report = ReconcileReport {
        untouched: plan.untouched.clone(),
        ..ReconcileReport::default()
    };
    let mut failures = Vec::new();

    for name in &plan.untouched {
        debug!(%name, "flight recorder event already installed");
    }

    for bp in &plan.to_remove {
        match backend.clear_breakpoint(bp.id).await {
            Ok(()) => {
                info!(name = %bp.name, id = bp.id, "removed flight recorder breakpoint");
                report.removed.push(bp.name.clone());
            }
            Err(err) => {
                warn!(name = %bp.name, id = bp.id, %err, "failed to remove breakpoint");
                failures.push(ReconcileFailure::new(&bp.name, &err));
            }
        }
    }

    for event in &plan.to_install {
        let name = event.name();
        match install(backend, event, &name).await {
            Ok(bp) => {
                info!(%event, id = bp.id, "installed flight recorder breakpoint");
                report.installed.push(name);
            }
            Err(err) => {
                warn!(%event, %err, "failed to install breakpoint");
                failures.push(ReconcileFailure::new(name, &err));
            }
        }
    }

    if failures.is_empty() {
        Ok(report)
    } else {
        Err(Error::Reconcile(failures))
    }
}

async fn install(
    backend: &dyn ProcessBackend,
    event: &FlightRecorderEventSpec,
    name: &str,
) -> Result<BreakpointInfo, Error> {
    let mut locations = backend.resolve_frame_address(&event.frame).await?;
    if locations.len() != 1 {
        return Err(Error::AmbiguousFrame {
            frame: event.frame.clone(),
            count: locations.len(),
        });
    }
    let location = locations.remove(0);
    backend
        .create_breakpoint(&NewBreakpoint {
            name: name.to_owned(),
            addrs: vec![location.pc],
            file: location.file,
            line: location.line,
            script: script::capture_script(event),
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::FakeBackend;
    use proptest::prelude::*;

    fn event(frame: &str, expr: &str) -> FlightRecorderEventSpec {
        FlightRecorderEventSpec::new(frame, expr, "goroutineID")
    }

    fn breakpoint(id: i64, name: &str) -> BreakpointInfo {
        BreakpointInfo {
            id,
            name: name.into(),
            ..BreakpointInfo::default()
        }
    }

    #[test]
    fn plan_diffs_by_name() {
        let desired = [event("foo", "x"), event("bar", "y")];
        let installed = [breakpoint(1, "foo-x"), breakpoint(2, "old-z")];

        let plan = plan(&desired, &installed);
        assert_eq!(plan.untouched, ["foo-x"]);
        assert_eq!(plan.to_remove, [&installed[1]]);
        assert_eq!(plan.to_install, [&desired[1]]);
    }

    #[test]
    fn plan_ignores_internal_and_unnamed_breakpoints() {
        let installed = [breakpoint(-1, "unrecovered-panic"), breakpoint(4, "")];
        let plan = plan(&[], &installed);
        assert!(plan.is_noop());
    }

    #[test]
    fn plan_dedups_both_sides() {
        let desired = [event("foo", "x"), event("foo", "x")];
        let installed = [breakpoint(1, "foo-x"), breakpoint(2, "foo-x")];

        let plan = plan(&desired, &installed);
        assert_eq!(plan.untouched, ["foo-x"]);
        assert_eq!(plan.to_remove, [&installed[1]]);
        assert!(plan.to_install.is_empty());
    }

    #[tokio::test]
    async fn installs_once_then_noop() {
        let backend = FakeBackend::default().with_location("foo", &[0x1000]);
        let desired = [event("foo", "x")];

        let report = apply(&backend, &desired).await.unwrap();
        assert_eq!(report.installed, ["foo-x"]);
        assert_eq!(backend.count("create:"), 1);
        assert_eq!(backend.count("clear:"), 0);

        backend.clear_calls();
        let report = apply(&backend, &desired).await.unwrap();
        assert_eq!(report.untouched, ["foo-x"]);
        assert_eq!(backend.count("create:"), 0);
        assert_eq!(backend.count("clear:"), 0);
    }

    #[tokio::test]
    async fn created_breakpoint_carries_capture_script() {
        let backend = FakeBackend::default().with_location("foo", &[0x1000]);
        apply(&backend, &[event("foo", "x")]).await.unwrap();

        let bp = backend.breakpoints.lock().unwrap()[0].clone();
        assert_eq!(bp.addrs, [0x1000]);
        assert_eq!(bp.name, "foo-x");
    }

    #[tokio::test]
    async fn ambiguous_frame_fails_only_that_event() {
        let backend = FakeBackend::default()
            .with_location("ok", &[0x10])
            .with_location("many", &[0x20, 0x30]);
        let desired = [event("many", "x"), event("missing", "y"), event("ok", "z")];

        let Err(Error::Reconcile(failures)) = apply(&backend, &desired).await else {
            panic!("expected reconcile failure");
        };
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].name, "many-x");
        assert!(failures[0].error.contains("Found 2 locations"));
        assert_eq!(failures[1].name, "missing-y");
        assert_eq!(backend.names(), ["ok-z"]);
    }

    #[tokio::test]
    async fn removal_failure_does_not_stop_the_pass() {
        let backend = FakeBackend {
            fail_clear: [1].into(),
            ..FakeBackend::default()
        }
        .with_breakpoint(1, "stuck-a")
        .with_breakpoint(2, "stale-b")
        .with_location("foo", &[0x10]);

        let Err(Error::Reconcile(failures)) = apply(&backend, &[event("foo", "x")]).await else {
            panic!("expected reconcile failure");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].name, "stuck-a");
        assert_eq!(backend.names(), ["foo-x", "stuck-a"]);
    }

    #[tokio::test]
    async fn invalid_event_changes_nothing() {
        let backend = FakeBackend::default().with_breakpoint(1, "stale-b");

        let err = apply(&backend, &[event("", "x")]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidEvent { .. }));
        assert!(backend.calls().is_empty());
    }

    fn arb_events() -> impl Strategy<Value = Vec<FlightRecorderEventSpec>> {
        proptest::collection::vec(("[a-c]", "[x-z]"), 0..6)
            .prop_map(|pairs| pairs.into_iter().map(|(f, e)| event(&f, &e)).collect())
    }

    proptest! {
        #[test]
        fn one_pass_converges(installed in arb_events(), desired in arb_events()) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let mut backend = FakeBackend::default();
                for frame in ["a", "b", "c"] {
                    backend = backend.with_location(frame, &[0x10]);
                }
                apply(&backend, &installed).await.unwrap();

                apply(&backend, &desired).await.unwrap();
                let mut want: Vec<_> = desired.iter().map(|e| e.name()).collect();
                want.sort();
                want.dedup();
                prop_assert_eq!(backend.names(), want);

                backend.clear_calls();
                apply(&backend, &desired).await.unwrap();
                prop_assert_eq!(backend.count("create:"), 0);
                prop_assert_eq!(backend.count("clear:"), 0);
                Ok(())
            })?;
        }
    }
}
