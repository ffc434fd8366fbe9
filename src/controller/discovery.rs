//! Target discovery
//!
//! Lists the control plane and machine deployments that belong to a Cluster
//! API cluster and turns them into the keyed set the reconciler diffs against.

use std::collections::BTreeMap;

use async_trait::async_trait;
use kube::api::{Api, DynamicObject, ListParams};
use kube::discovery::ApiResource;
use kube::{Client, ResourceExt};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::clustermodule::{TargetDescriptor, TargetKind};
use crate::{Error, CAPI_GROUP, CLUSTER_NAME_LABEL};

/// API group of KubeadmControlPlane
pub const CONTROL_PLANE_GROUP: &str = "controlplane.cluster.x-k8s.io";

/// API version served for both target kinds
pub const TARGET_API_VERSION: &str = "v1beta1";

/// ApiResource for KubeadmControlPlane
pub fn control_plane_resource() -> ApiResource {
    ApiResource {
        group: CONTROL_PLANE_GROUP.to_string(),
        version: TARGET_API_VERSION.to_string(),
        api_version: format!("{CONTROL_PLANE_GROUP}/{TARGET_API_VERSION}"),
        kind: TargetKind::ControlPlane.kind_name().to_string(),
        plural: "kubeadmcontrolplanes".to_string(),
    }
}

/// ApiResource for MachineDeployment
pub fn worker_pool_resource() -> ApiResource {
    ApiResource {
        group: CAPI_GROUP.to_string(),
        version: TARGET_API_VERSION.to_string(),
        api_version: format!("{CAPI_GROUP}/{TARGET_API_VERSION}"),
        kind: TargetKind::WorkerPool.kind_name().to_string(),
        plural: "machinedeployments".to_string(),
    }
}

/// The parts of a listed target object discovery cares about
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetResource {
    /// Object name
    pub name: String,
    /// Object namespace
    pub namespace: String,
    /// True once the object has a deletion timestamp
    pub marked_for_deletion: bool,
}

impl TargetResource {
    /// Create a live (not terminating) target resource
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            marked_for_deletion: false,
        }
    }

    /// Mark the resource as terminating
    pub fn deleting(mut self) -> Self {
        self.marked_for_deletion = true;
        self
    }

    fn from_dynamic(obj: &DynamicObject) -> Self {
        Self {
            name: obj.name_any(),
            namespace: obj.namespace().unwrap_or_default(),
            marked_for_deletion: obj.metadata.deletion_timestamp.is_some(),
        }
    }
}

/// Lists Cluster API objects that may own a cluster module
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TargetLister: Send + Sync {
    /// List KubeadmControlPlanes labeled with the cluster name
    async fn list_control_planes(
        &self,
        namespace: &str,
        cluster: &str,
    ) -> Result<Vec<TargetResource>, Error>;

    /// List MachineDeployments labeled with the cluster name
    async fn list_worker_pools(
        &self,
        namespace: &str,
        cluster: &str,
    ) -> Result<Vec<TargetResource>, Error>;
}

/// Lister backed by the Kubernetes API
pub struct KubeTargetLister {
    client: Client,
}

impl KubeTargetLister {
    /// Create a lister using the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn list(
        &self,
        resource: &ApiResource,
        namespace: &str,
        cluster: &str,
    ) -> Result<Vec<TargetResource>, Error> {
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, resource);
        let params = ListParams::default().labels(&format!("{CLUSTER_NAME_LABEL}={cluster}"));
        let list = api.list(&params).await?;
        Ok(list.items.iter().map(TargetResource::from_dynamic).collect())
    }
}

#[async_trait]
impl TargetLister for KubeTargetLister {
    async fn list_control_planes(
        &self,
        namespace: &str,
        cluster: &str,
    ) -> Result<Vec<TargetResource>, Error> {
        self.list(&control_plane_resource(), namespace, cluster).await
    }

    async fn list_worker_pools(
        &self,
        namespace: &str,
        cluster: &str,
    ) -> Result<Vec<TargetResource>, Error> {
        self.list(&worker_pool_resource(), namespace, cluster).await
    }
}

fn live_in(resources: Vec<TargetResource>, namespace: &str) -> Vec<TargetResource> {
    resources
        .into_iter()
        .filter(|r| r.namespace == namespace && !r.marked_for_deletion)
        .collect()
}

/// Collect the live targets of a cluster, keyed by [`TargetDescriptor::key`]
///
/// Terminating objects and objects outside `namespace` are left out. More
/// than one live control plane is an error; none is fine.
pub async fn fetch_targets(
    lister: &dyn TargetLister,
    namespace: &str,
    cluster: &str,
) -> Result<BTreeMap<String, TargetDescriptor>, Error> {
    let control_planes = live_in(lister.list_control_planes(namespace, cluster).await?, namespace);
    if control_planes.len() > 1 {
        return Err(Error::MultipleControlPlanes {
            cluster: cluster.to_string(),
            names: control_planes.into_iter().map(|r| r.name).collect(),
        });
    }

    let worker_pools = live_in(lister.list_worker_pools(namespace, cluster).await?, namespace);

    let targets: BTreeMap<String, TargetDescriptor> = control_planes
        .into_iter()
        .map(|r| TargetDescriptor::control_plane(r.name, r.namespace))
        .chain(
            worker_pools
                .into_iter()
                .map(|r| TargetDescriptor::worker_pool(r.name, r.namespace)),
        )
        .map(|t| (t.key(), t))
        .collect();

    debug!(cluster = %cluster, targets = targets.len(), "discovered cluster module targets");
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustermodule::target_key;

    fn lister(control_planes: Vec<TargetResource>, worker_pools: Vec<TargetResource>) -> MockTargetLister {
        let mut mock = MockTargetLister::new();
        mock.expect_list_control_planes()
            .returning(move |_, _| Ok(control_planes.clone()));
        mock.expect_list_worker_pools()
            .returning(move |_, _| Ok(worker_pools.clone()));
        mock
    }

    #[tokio::test]
    async fn multiple_control_planes_are_rejected() {
        let mock = lister(
            vec![
                TargetResource::new("foo-1", "default"),
                TargetResource::new("foo-2", "default"),
            ],
            vec![],
        );

        let err = fetch_targets(&mock, "default", "prod").await.unwrap_err();
        match err {
            Error::MultipleControlPlanes { cluster, names } => {
                assert_eq!(cluster, "prod");
                assert_eq!(names, vec!["foo-1", "foo-2"]);
            }
            other => panic!("expected MultipleControlPlanes, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn single_control_plane_without_worker_pools() {
        let mock = lister(vec![TargetResource::new("foo", "default")], vec![]);

        let targets = fetch_targets(&mock, "default", "prod").await.unwrap();
        assert_eq!(targets.len(), 1);
        assert!(targets[&target_key("foo", true)].is_control_plane());
    }

    #[tokio::test]
    async fn no_control_plane_is_valid() {
        let mock = lister(vec![], vec![TargetResource::new("md-0", "default")]);

        let targets = fetch_targets(&mock, "default", "prod").await.unwrap();
        assert_eq!(targets.keys().collect::<Vec<_>>(), vec!["md-0"]);
    }

    #[tokio::test]
    async fn worker_pools_in_other_namespaces_are_excluded() {
        let mock = lister(
            vec![TargetResource::new("foo", "default")],
            vec![
                TargetResource::new("foo-1", "default"),
                TargetResource::new("foo-2", "default"),
                TargetResource::new("foo", "bar"),
            ],
        );

        let targets = fetch_targets(&mock, "default", "prod").await.unwrap();
        assert_eq!(targets.len(), 3);
        assert!(targets.contains_key("foo/control-plane"));
        assert!(targets.contains_key("foo-1"));
        assert!(targets.contains_key("foo-2"));
        assert!(!targets.contains_key("foo"));
    }

    #[tokio::test]
    async fn terminating_objects_are_excluded() {
        let mock = lister(
            vec![TargetResource::new("foo", "default")],
            vec![
                TargetResource::new("foo", "default"),
                TargetResource::new("foo-1", "default").deleting(),
            ],
        );

        let targets = fetch_targets(&mock, "default", "prod").await.unwrap();
        assert_eq!(targets.len(), 2);
        assert!(!targets.contains_key("foo-1"));
    }

    /// A control plane being replaced does not count toward the limit
    #[tokio::test]
    async fn terminating_control_plane_does_not_conflict() {
        let mock = lister(
            vec![
                TargetResource::new("old", "default").deleting(),
                TargetResource::new("new", "default"),
            ],
            vec![],
        );

        let targets = fetch_targets(&mock, "default", "prod").await.unwrap();
        assert_eq!(targets.keys().collect::<Vec<_>>(), vec!["new/control-plane"]);
    }

    #[tokio::test]
    async fn lister_errors_propagate() {
        let mut mock = MockTargetLister::new();
        mock.expect_list_control_planes()
            .returning(|_, _| Err(Error::validation("api unavailable")));

        let err = fetch_targets(&mock, "default", "prod").await.unwrap_err();
        assert!(err.to_string().contains("api unavailable"));
    }

    #[test]
    fn api_resources_match_cluster_api_kinds() {
        let kcp = control_plane_resource();
        assert_eq!(kcp.api_version, "controlplane.cluster.x-k8s.io/v1beta1");
        assert_eq!(kcp.kind, "KubeadmControlPlane");

        let md = worker_pool_resource();
        assert_eq!(md.api_version, "cluster.x-k8s.io/v1beta1");
        assert_eq!(md.plural, "machinedeployments");
    }
}
