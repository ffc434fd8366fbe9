//! Mapping from target object events to VSphereClusters

use std::sync::Arc;

use kube::api::DynamicObject;
use kube::runtime::reflector::ObjectRef;
use kube::ResourceExt;

use crate::crd::VSphereCluster;
use crate::CLUSTER_NAME_LABEL;

/// VSphereClusters affected by a change to a control plane or machine deployment
///
/// Matches on namespace plus the object's cluster-name label against each
/// VSphereCluster's owner cluster.
pub fn clusters_for_target(
    obj: &DynamicObject,
    clusters: &[Arc<VSphereCluster>],
) -> Vec<ObjectRef<VSphereCluster>> {
    let Some(namespace) = obj.namespace() else {
        return Vec::new();
    };
    let Some(cluster_name) = obj.labels().get(CLUSTER_NAME_LABEL) else {
        return Vec::new();
    };

    clusters
        .iter()
        .filter(|vc| vc.namespace().as_deref() == Some(namespace.as_str()))
        .filter(|vc| vc.owner_cluster_name().as_ref() == Some(cluster_name))
        .map(|vc| ObjectRef::from_obj(vc.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::discovery::worker_pool_resource;
    use crate::crd::VSphereClusterSpec;
    use std::collections::BTreeMap;

    fn vsphere_cluster(name: &str, namespace: &str, owner: &str) -> Arc<VSphereCluster> {
        let mut vc = VSphereCluster::new(name, VSphereClusterSpec::default());
        vc.metadata.namespace = Some(namespace.to_string());
        vc.metadata.labels = Some(BTreeMap::from([(
            CLUSTER_NAME_LABEL.to_string(),
            owner.to_string(),
        )]));
        Arc::new(vc)
    }

    fn machine_deployment(namespace: &str, cluster: Option<&str>) -> DynamicObject {
        let mut md = DynamicObject::new("md-0", &worker_pool_resource()).within(namespace);
        if let Some(cluster) = cluster {
            md.metadata.labels = Some(BTreeMap::from([(
                CLUSTER_NAME_LABEL.to_string(),
                cluster.to_string(),
            )]));
        }
        md
    }

    #[test]
    fn maps_to_owning_cluster_in_same_namespace() {
        let clusters = vec![
            vsphere_cluster("prod-infra", "default", "prod"),
            vsphere_cluster("staging-infra", "default", "staging"),
            vsphere_cluster("prod-infra", "other", "prod"),
        ];

        let refs = clusters_for_target(&machine_deployment("default", Some("prod")), &clusters);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "prod-infra");
        assert_eq!(refs[0].namespace.as_deref(), Some("default"));
    }

    #[test]
    fn unlabeled_objects_map_to_nothing() {
        let clusters = vec![vsphere_cluster("prod-infra", "default", "prod")];
        assert!(clusters_for_target(&machine_deployment("default", None), &clusters).is_empty());
    }
}
