//! Cluster module reconciliation
//!
//! One pass diffs the records stored on the VSphereCluster against the live
//! targets of its Cluster API cluster:
//!
//! 1. Records whose target is gone (or terminating) are removed in vCenter.
//! 2. Records whose target is live are verified; stale ones are dropped.
//! 3. Live targets without a verified record get a new module.
//!
//! Failures of one target never stop the others. Everything that did succeed
//! is persisted before the collected errors are returned, so the next pass
//! starts from the real state.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::{debug, error, info, instrument, warn};

use super::context::Context;
use super::discovery::fetch_targets;
use super::signal::{version_incompatible_condition, AvailabilitySignal};
use crate::clustermodule::{check_version, ClusterModuleService, TargetDescriptor, VersionSupport};
use crate::crd::{set_condition, ClusterModule, Condition, VSphereCluster};
use crate::error::ModuleOperation;
use crate::Error;

/// Result of one pass over a cluster's modules
#[derive(Debug, Default)]
pub struct ModuleReconcileOutcome {
    /// Records to persist: retained records first, then newly created ones
    pub modules: Vec<ClusterModule>,
    /// Availability computed by this pass
    pub signal: AvailabilitySignal,
    /// Failures that make the pass unsuccessful
    pub errors: Vec<Error>,
}

/// Run one pass of the cluster module diff
///
/// `existing` is the stored record list, `live` the discovered targets keyed
/// by [`TargetDescriptor::key`]. Calls to `service` run sequentially: every
/// removal and verification happens before any creation.
pub async fn reconcile_modules(
    service: &dyn ClusterModuleService,
    existing: &[ClusterModule],
    live: &BTreeMap<String, TargetDescriptor>,
) -> ModuleReconcileOutcome {
    let mut modules = Vec::with_capacity(live.len());
    let mut associated = BTreeSet::new();
    let mut errors = Vec::new();

    for record in existing {
        let key = record.key();
        // A second record for an already associated key is a duplicate
        let Some(target) = live.get(&key).filter(|_| !associated.contains(&key)) else {
            match service.remove(&record.module_uuid).await {
                Ok(()) => info!(
                    target = %record.target_object_name,
                    module_uuid = %record.module_uuid,
                    "removed cluster module without a live target"
                ),
                Err(e) => {
                    warn!(
                        target = %record.target_object_name,
                        module_uuid = %record.module_uuid,
                        error = %e,
                        "failed to remove cluster module"
                    );
                    errors.push(Error::module(
                        ModuleOperation::Remove,
                        record.target_object_name.clone(),
                        e,
                    ));
                }
            }
            continue;
        };

        match service.exists(target, &record.module_uuid).await {
            Ok(true) => {
                associated.insert(key);
                modules.push(record.clone());
            }
            Ok(false) => {
                info!(
                    target = %target,
                    module_uuid = %record.module_uuid,
                    "cluster module no longer exists, recreating"
                );
            }
            Err(e) => {
                warn!(
                    target = %target,
                    module_uuid = %record.module_uuid,
                    error = %e,
                    "failed to verify cluster module"
                );
                associated.insert(key);
                modules.push(record.clone());
                errors.push(Error::module(ModuleOperation::Verify, target.name.clone(), e));
            }
        }
    }

    let mut failed_targets = Vec::new();
    for (key, target) in live {
        if associated.contains(key) {
            continue;
        }

        match service.create(target).await {
            Ok(Some(module_uuid)) if !module_uuid.is_empty() => {
                modules.push(ClusterModule::new(
                    target.name.clone(),
                    target.is_control_plane(),
                    module_uuid,
                ));
            }
            Ok(_) => debug!(target = %target, "cluster module creation skipped"),
            Err(e) if e.is_incompatible_owner() => {
                info!(target = %target, reason = %e, "target cannot host a cluster module");
                failed_targets.push(target.name.clone());
            }
            Err(e) => {
                warn!(target = %target, error = %e, "failed to create cluster module");
                failed_targets.push(target.name.clone());
                errors.push(Error::module(ModuleOperation::Create, target.name.clone(), e));
            }
        }
    }

    ModuleReconcileOutcome {
        modules,
        signal: AvailabilitySignal::new(failed_targets.is_empty(), failed_targets),
        errors,
    }
}

/// Reconcile the cluster modules of a VSphereCluster
///
/// Skips clusters that are deleting, paused, not yet owned by a Cluster API
/// cluster, or backed by a vCenter too old for cluster modules.
#[instrument(skip(cluster, ctx), fields(cluster = %cluster.name_any()))]
pub async fn reconcile(cluster: Arc<VSphereCluster>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = cluster.name_any();
    let namespace = cluster
        .namespace()
        .ok_or_else(|| Error::validation(format!("VSphereCluster {name} has no namespace")))?;

    if cluster.metadata.deletion_timestamp.is_some() {
        debug!("cluster is being deleted, skipping");
        return Ok(Action::await_change());
    }

    if cluster.is_paused() {
        info!("reconciliation paused");
        return Ok(Action::await_change());
    }

    let Some(owner) = cluster.owner_cluster_name() else {
        info!("waiting for owner Cluster");
        return Ok(Action::await_change());
    };

    if let VersionSupport::Unsupported(version) = check_version(cluster.vcenter_version()) {
        warn!(vcenter_version = %version, "vCenter does not support cluster modules");
        update_condition(&cluster, &ctx, &namespace, version_incompatible_condition(&version))
            .await?;
        return Ok(Action::await_change());
    }

    let live = fetch_targets(ctx.lister.as_ref(), &namespace, &owner).await?;
    let service = ctx.modules.service_for(&cluster).await?;

    let outcome =
        reconcile_modules(service.as_ref(), &cluster.spec.cluster_modules, &live).await;

    persist_modules(&cluster, &ctx, &namespace, &outcome.modules).await?;
    update_condition(&cluster, &ctx, &namespace, outcome.signal.to_condition()).await?;

    match Error::aggregate(outcome.errors) {
        Some(err) => Err(err),
        None => {
            debug!(modules = outcome.modules.len(), "cluster modules in sync");
            Ok(Action::requeue(ctx.config.resync_interval))
        }
    }
}

/// Requeue a failed reconcile after the configured delay
pub fn error_policy(cluster: Arc<VSphereCluster>, error: &Error, ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        cluster = %cluster.name_any(),
        "reconciliation failed"
    );
    Action::requeue(ctx.config.error_requeue)
}

async fn persist_modules(
    cluster: &VSphereCluster,
    ctx: &Context,
    namespace: &str,
    modules: &[ClusterModule],
) -> Result<(), Error> {
    if modules == cluster.spec.cluster_modules.as_slice() {
        debug!("cluster modules unchanged, skipping update");
        return Ok(());
    }

    ctx.state
        .update_cluster_modules(
            namespace,
            &cluster.name_any(),
            cluster.resource_version(),
            modules,
        )
        .await
}

async fn update_condition(
    cluster: &VSphereCluster,
    ctx: &Context,
    namespace: &str,
    condition: Condition,
) -> Result<(), Error> {
    let mut conditions = cluster.conditions().to_vec();
    if !set_condition(&mut conditions, condition) {
        debug!("conditions unchanged, skipping status update");
        return Ok(());
    }

    ctx.state
        .update_conditions(namespace, &cluster.name_any(), &conditions)
        .await
}
