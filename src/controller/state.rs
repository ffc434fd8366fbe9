//! Persisted cluster state
//!
//! The reconciler writes two things back to the VSphereCluster: the record
//! list in `spec.clusterModules` and the conditions in `status`. Both are
//! merge patches that replace the whole list.

use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;

#[cfg(test)]
use mockall::automock;

use crate::crd::{ClusterModule, Condition, VSphereCluster};
use crate::{Error, FIELD_MANAGER};

/// Writes the reconciler's results back to a VSphereCluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterStateClient: Send + Sync {
    /// Replace `spec.clusterModules`
    ///
    /// When `resource_version` is set the write fails with a conflict if the
    /// object changed since it was read.
    async fn update_cluster_modules(
        &self,
        namespace: &str,
        name: &str,
        resource_version: Option<String>,
        modules: &[ClusterModule],
    ) -> Result<(), Error>;

    /// Replace `status.conditions`
    async fn update_conditions(
        &self,
        namespace: &str,
        name: &str,
        conditions: &[Condition],
    ) -> Result<(), Error>;
}

/// State client backed by the Kubernetes API
pub struct KubeClusterState {
    client: Client,
}

impl KubeClusterState {
    /// Create a state client using the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn modules_patch(resource_version: Option<String>, modules: &[ClusterModule]) -> serde_json::Value {
    let mut patch = serde_json::json!({
        "spec": { "clusterModules": modules }
    });
    if let Some(rv) = resource_version {
        patch["metadata"] = serde_json::json!({ "resourceVersion": rv });
    }
    patch
}

#[async_trait]
impl ClusterStateClient for KubeClusterState {
    async fn update_cluster_modules(
        &self,
        namespace: &str,
        name: &str,
        resource_version: Option<String>,
        modules: &[ClusterModule],
    ) -> Result<(), Error> {
        let api: Api<VSphereCluster> = Api::namespaced(self.client.clone(), namespace);
        api.patch(
            name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&modules_patch(resource_version, modules)),
        )
        .await?;
        Ok(())
    }

    async fn update_conditions(
        &self,
        namespace: &str,
        name: &str,
        conditions: &[Condition],
    ) -> Result<(), Error> {
        let api: Api<VSphereCluster> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({
            "status": { "conditions": conditions }
        });
        api.patch_status(
            name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await?;
        Ok(())
    }
}
