//! Cluster module controller
//!
//! Reconciles VSphereClusters: discovers the cluster's control plane and
//! machine deployments, drives the cluster module service, and writes the
//! records and the `ClusterModulesAvailable` condition back.

mod context;
pub mod discovery;
mod reconciler;
pub mod signal;
pub mod state;
mod watch;

pub use context::{Context, ContextBuilder};
pub use discovery::{fetch_targets, KubeTargetLister, TargetLister, TargetResource};
pub use reconciler::{error_policy, reconcile, reconcile_modules, ModuleReconcileOutcome};
pub use signal::AvailabilitySignal;
pub use state::{ClusterStateClient, KubeClusterState};
pub use watch::clusters_for_target;
