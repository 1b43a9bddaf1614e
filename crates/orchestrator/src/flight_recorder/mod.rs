#![forbid(unsafe_code)]

mod reconciler;

pub use reconciler::{ReconcileFailure, ReconcilePlan, ReconcileReport, apply, plan};
